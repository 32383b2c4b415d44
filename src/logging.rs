//! File logging for the binary

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use apex_hud_core::config::get_data_dir;

const LOG_FILE: &str = "apex-hud.log";

/// Route `tracing` output to `<data dir>/apex-hud/apex-hud.log`.
/// `RUST_LOG` overrides the default `info` filter.
pub fn init() -> Result<PathBuf> {
    let dir = get_data_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory {}", dir.display()))?;

    let path = dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;

    Ok(path)
}
