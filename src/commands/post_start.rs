//! ExecStartPost hook

use std::path::Path;

use ctrhook::hooks::{self, require_id};

pub async fn exec_start_post(
    config: Option<&Path>,
    id: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = require_id(id)?;
    let ctx = super::context(config).await?;
    hooks::exec_start_post(&ctx, id).await?;
    Ok(())
}
