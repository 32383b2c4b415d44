//! Configuration management
//!
//! All configuration types are exported from this module.

pub mod store;

pub use store::{
    AiConfig, BackendKind, ChatConfig, HudConfig, ModelClass, ProviderSlotConfig, TerminalConfig,
};

use std::path::PathBuf;

const APP_DIR: &str = "apex-hud";
const LOCAL_CONFIG: &str = "apex-hud.toml";

/// Find the configuration file in standard locations
pub fn find_config_file() -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        let path = cwd.join(LOCAL_CONFIG);
        if path.exists() {
            return Some(path);
        }
    }

    if let Some(dir) = get_config_dir() {
        let path = dir.join("config.toml");
        if path.exists() {
            return Some(path);
        }
    }

    None
}

/// Get the configuration directory path
pub fn get_config_dir() -> Option<PathBuf> {
    if let Some(dir) = dirs::config_dir() {
        return Some(dir.join(APP_DIR));
    }

    dirs::home_dir().map(|home| home.join(".config").join(APP_DIR))
}

/// Directory for persisted sessions and the log file
pub fn get_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
