use std::path::{Path, PathBuf};

use super::HookError;

/// Write `<root>/resolv.conf` with one `nameserver` line per entry.
/// Returns the path written.
pub async fn write_resolv_conf(root: &Path, nameservers: &[String]) -> Result<PathBuf, HookError> {
    let path = root.join("resolv.conf");
    let content: String = nameservers
        .iter()
        .map(|ns| format!("nameserver {}\n", ns))
        .collect();

    let io_err = |source| HookError::ResolvConf {
        path: path.clone(),
        source,
    };
    tokio::fs::create_dir_all(root).await.map_err(io_err)?;
    tokio::fs::write(&path, content).await.map_err(io_err)?;

    Ok(path)
}
