mod config;
pub mod database;
pub mod migrations;
mod tasks;

pub use config::{Config, LoggingConfig, RemoteConfig};
pub use database::{Database, Stats, StatsPeriod, MAX_NOTES_CHARS};
pub use tasks::{NewTask, Task, TaskStats};

use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Returns the data directory, creating it if needed.
///
/// `POMOFOCUS_DATA_DIR` wins when set. Otherwise `~/.config/pomofocus[-dev]/`,
/// with the `-dev` suffix when `POMOFOCUS_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("POMOFOCUS_DATA_DIR") {
        Some(custom) if !custom.is_empty() => PathBuf::from(custom),
        _ => {
            let base_dir = dirs::home_dir()
                .ok_or_else(|| ConfigError::DataDir("home directory not found".into()))?
                .join(".config");
            let env = std::env::var("POMOFOCUS_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("pomofocus-dev")
            } else {
                base_dir.join("pomofocus")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
