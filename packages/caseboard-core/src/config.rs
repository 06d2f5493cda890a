/// Client configuration shared by every front end of the board engine.
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::Position;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// API root, e.g. `https://cases.example.org/api`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token issued by the surrounding session layer.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Quiescence window before dragged positions are flushed.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// How long a fetched board graph is served from cache.
    #[serde(default = "default_freshness_secs")]
    pub freshness_secs: u64,
    #[serde(default = "default_pin_coordinate")]
    pub default_pin_x: f64,
    #[serde(default = "default_pin_coordinate")]
    pub default_pin_y: f64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000/api".to_string()
}

fn default_debounce_ms() -> u64 {
    800
}

fn default_freshness_secs() -> u64 {
    30
}

fn default_pin_coordinate() -> f64 {
    100.0
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token: None,
            debounce_ms: default_debounce_ms(),
            freshness_secs: default_freshness_secs(),
            default_pin_x: default_pin_coordinate(),
            default_pin_y: default_pin_coordinate(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl SyncSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn default_pin_position(&self) -> Position {
        Position::new(self.default_pin_x, self.default_pin_y)
    }
}
