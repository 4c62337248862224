//! # Sync Configuration
//!
//! Configuration for the backend connection and the list session.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     GROCER_API_URL=https://grocer.example.com/api                      │
//! │     GROCER_API_TOKEN=...                                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/grocer/sync.toml (Linux)                                 │
//! │     ~/Library/Application Support/app.grocer.grocer/sync.toml (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     http://localhost:3000/api, 300ms save debounce                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [api]
//! base_url = "https://grocer.example.com/api"
//! auth_token = "eyJhbGciOi..."
//! request_timeout_secs = 10
//! connect_timeout_secs = 10
//!
//! [session]
//! save_debounce_ms = 300
//! subscribe_on_open = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};

/// Upper bound for `save_debounce_ms`. Longer windows lose edits on crash.
pub const MAX_SAVE_DEBOUNCE_MS: u64 = 10_000;

// =============================================================================
// API Settings
// =============================================================================

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSettings {
    /// REST base URL, e.g. `https://grocer.example.com/api`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Static bearer token sent with every request.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// TCP/WebSocket connect timeout (seconds).
    #[serde(default = "default_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_timeout() -> u64 {
    10
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_base_url(),
            auth_token: None,
            request_timeout_secs: default_timeout(),
            connect_timeout_secs: default_timeout(),
        }
    }
}

// =============================================================================
// Session Settings
// =============================================================================

/// List session behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Quiet period before local edits are saved (milliseconds).
    #[serde(default = "default_save_debounce")]
    pub save_debounce_ms: u64,

    /// Open the push channel as soon as the list is resolved.
    #[serde(default = "default_true")]
    pub subscribe_on_open: bool,
}

fn default_save_debounce() -> u64 {
    grocer_core::DEFAULT_SAVE_DEBOUNCE_MS
}

fn default_true() -> bool {
    true
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            save_debounce_ms: default_save_debounce(),
            subscribe_on_open: true,
        }
    }
}

impl SessionSettings {
    /// Debounce window as a [`Duration`].
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Backend connection settings.
    #[serde(default)]
    pub api: ApiSettings,

    /// List session behavior.
    #[serde(default)]
    pub session: SessionSettings,
}

impl SyncConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        let url = Url::parse(&self.api.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SyncError::InvalidUrl(format!(
                "API URL must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.session.save_debounce_ms == 0 || self.session.save_debounce_ms > MAX_SAVE_DEBOUNCE_MS
        {
            return Err(SyncError::InvalidConfig(format!(
                "save_debounce_ms must be between 1 and {}, got {}",
                MAX_SAVE_DEBOUNCE_MS, self.session.save_debounce_ms
            )));
        }

        if self.api.request_timeout_secs == 0 || self.api.connect_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "timeouts must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("GROCER_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }

        if let Ok(token) = std::env::var("GROCER_API_TOKEN") {
            debug!("Overriding API token from environment");
            self.api.auth_token = Some(token);
        }

        if let Ok(ms) = std::env::var("GROCER_SAVE_DEBOUNCE_MS") {
            match ms.parse::<u64>() {
                Ok(ms) => self.session.save_debounce_ms = ms,
                Err(_) => warn!(value = %ms, "Ignoring non-numeric GROCER_SAVE_DEBOUNCE_MS"),
            }
        }

        if let Ok(secs) = std::env::var("GROCER_REQUEST_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(secs) => self.api.request_timeout_secs = secs,
                Err(_) => warn!(value = %secs, "Ignoring non-numeric GROCER_REQUEST_TIMEOUT_SECS"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("app", "grocer", "grocer")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// REST base URL without a trailing slash.
    pub fn api_base_url(&self) -> &str {
        self.api.base_url.trim_end_matches('/')
    }

    /// WebSocket base URL derived from the REST base URL
    /// (`http` → `ws`, `https` → `wss`).
    pub fn ws_base_url(&self) -> SyncResult<String> {
        let mut url = Url::parse(self.api_base_url())?;
        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => {
                return Err(SyncError::InvalidUrl(format!(
                    "Cannot derive WebSocket URL from scheme '{}'",
                    other
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| SyncError::InvalidUrl(format!("Cannot switch scheme to {}", scheme)))?;
        Ok(url.as_str().trim_end_matches('/').to_string())
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }

    /// Connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.api.connect_timeout_secs)
    }
}
