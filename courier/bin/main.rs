#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = locate_config()?;
    let contents = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("Unable to read {}: {e}", path.display()))?;
    let courier: courier::controller::Courier = ron::from_str(&contents)?;

    courier.run().await
}

/// Configuration is looked up in order: the `COURIER_CONFIG` environment
/// variable, `./courier.config.ron`, then `/etc/courier/courier.config.ron`.
fn locate_config() -> anyhow::Result<PathBuf> {
    if let Ok(configured) = std::env::var("COURIER_CONFIG") {
        let path = PathBuf::from(&configured);
        anyhow::ensure!(
            path.exists(),
            "COURIER_CONFIG is set, but {configured} does not exist"
        );
        return Ok(path);
    }

    ["./courier.config.ron", "/etc/courier/courier.config.ron"]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No configuration found; set COURIER_CONFIG or place a \
                 courier.config.ron in the working directory or /etc/courier"
            )
        })
}
