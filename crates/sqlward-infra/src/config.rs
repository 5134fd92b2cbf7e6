//! Settings file loader.
//!
//! Reads `database.toml` from the data directory (`~/.sqlward/` unless
//! `SQLWARD_DATA_DIR` says otherwise). A missing or malformed file falls back
//! to defaults pointing at `{data_dir}/sqlward.db`.

use std::path::{Path, PathBuf};

use sqlward_types::DatabaseSettings;

const SETTINGS_FILE: &str = "database.toml";

/// `SQLWARD_DATA_DIR`, falling back to `~/.sqlward`.
pub fn data_dir() -> PathBuf {
    match std::env::var_os("SQLWARD_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sqlward"),
    }
}

/// SQLite database inside `data_dir`, created on first connect.
pub fn default_database_url(data_dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", data_dir.join("sqlward.db").display())
}

/// Load settings from `{data_dir}/database.toml`.
///
/// - missing file: defaults, with the URL from [`default_database_url`];
/// - unreadable or unparsable file: a warning, then the same defaults;
/// - otherwise the parsed settings (keys left out take their defaults).
pub async fn load_settings(data_dir: &Path) -> DatabaseSettings {
    let path = data_dir.join(SETTINGS_FILE);
    let fallback = || DatabaseSettings::new(default_database_url(data_dir));

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {SETTINGS_FILE} found at {}, using defaults", path.display());
            return fallback();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return fallback();
        }
    };

    match DatabaseSettings::from_toml_str(&content) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            fallback()
        }
    }
}
