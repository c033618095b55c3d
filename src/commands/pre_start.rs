//! ExecStartPre hook

use std::path::Path;

use ctrhook::hooks::{self, require_id};

pub async fn exec_start_pre(
    config: Option<&Path>,
    id: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = require_id(id)?;
    let ctx = super::context(config).await?;
    hooks::exec_start_pre(&ctx, id).await?;
    Ok(())
}
