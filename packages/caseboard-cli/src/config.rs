/// Client settings file: ~/.config/caseboard/client.json (or platform equivalent).
use std::fs;
use std::path::{Path, PathBuf};

use caseboard_core::SyncSettings;

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("caseboard")
        .join("client.json")
}

/// Load settings from `path`. Missing or malformed files yield defaults.
pub fn load_config(path: &Path) -> SyncSettings {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("Failed to parse config {}: {}", path.display(), e);
            SyncSettings::default()
        }),
        Err(_) => {
            log::info!("No config at {}, using defaults", path.display());
            SyncSettings::default()
        }
    }
}

/// Command-line values win over the file.
pub fn apply_overrides(
    mut settings: SyncSettings,
    base_url: Option<String>,
    token: Option<String>,
) -> SyncSettings {
    if let Some(base_url) = base_url {
        settings.base_url = base_url;
    }
    if token.is_some() {
        settings.api_token = token;
    }
    settings
}
