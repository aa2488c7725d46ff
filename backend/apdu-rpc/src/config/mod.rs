pub mod env;

pub use env::{
    ENV_CONFIG_DIR, ENV_HTTP_LISTEN, ENV_LISTEN, ENV_TOKEN, default_config_dir, try_load_dotenv,
};

use crate::error::config::ConfigError;

use common::{ErrorLocation, RedactedToken};

use std::collections::HashSet;
use std::net::SocketAddr;
use std::panic::Location;
use std::path::Path;

use const_format::concatcp;
use log::{info, warn};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "bridge.toml";
const CONFIG_VERSION: u32 = 1;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 19877;
pub const DEFAULT_LISTEN: &str = concatcp!(DEFAULT_HOST, ":", DEFAULT_PORT);

// ============================================
// ENUMS WITH DEFAULTS
// ============================================

/// Which platform the bridge exposes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    #[default]
    Mock,
    /// System PC/SC readers. Not linked into this build; the bridge answers
    /// `NOT_AVAILABLE` when selected.
    Pcsc,
}

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    #[serde(default)]
    pub allow_remote: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Also serve `POST /rpc` here. The HTTP binding has no auth handshake,
    /// so it shares `allow_remote` but not `auth_token`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_listen: Option<SocketAddr>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            allow_remote: false,
            auth_token: None,
            http_listen: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSection {
    #[serde(default)]
    pub kind: PlatformKind,
    #[serde(default = "default_mock_devices")]
    pub mock_devices: Vec<String>,
}

impl Default for PlatformSection {
    fn default() -> Self {
        Self {
            kind: PlatformKind::default(),
            mock_devices: default_mock_devices(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub platform: PlatformSection,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: ServerSection::default(),
            platform: PlatformSection::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT))
}
fn default_mock_devices() -> Vec<String> {
    vec![crate::platform::mock::DEFAULT_MOCK_DEVICE_ID.to_string()]
}

// ============================================
// IMPLEMENTATION
// ============================================

impl BridgeConfig {
    /// Load config from {config_dir}/bridge.toml.
    ///
    /// A missing file yields defaults. A file that exists but cannot be read,
    /// parsed or validated is an error.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults (listen {DEFAULT_LISTEN})",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {e}");
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: BridgeConfig = toml::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config TOML: {e}");
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/bridge.toml via temp file + rename.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{CONFIG_FILE_NAME}.tmp"));

        let contents = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, contents).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(validation(format!(
                "Invalid version: {} (expected 1-{CONFIG_VERSION})",
                self.version
            )));
        }

        if !self.server.allow_remote && !self.server.listen.ip().is_loopback() {
            return Err(validation(format!(
                "Listen address {} is not loopback; set server.allow_remote to expose it",
                self.server.listen
            )));
        }

        if let Some(http_listen) = self.server.http_listen {
            if !self.server.allow_remote && !http_listen.ip().is_loopback() {
                return Err(validation(format!(
                    "HTTP listen address {http_listen} is not loopback; set server.allow_remote to expose it"
                )));
            }
            if http_listen == self.server.listen && http_listen.port() != 0 {
                return Err(validation(format!(
                    "server.http_listen {http_listen} collides with server.listen"
                )));
            }
        }

        if let Some(token) = &self.server.auth_token
            && token.trim().is_empty()
        {
            return Err(validation("server.auth_token cannot be empty"));
        }

        if self.platform.kind == PlatformKind::Mock {
            if self.platform.mock_devices.is_empty() {
                return Err(validation("platform.mock_devices needs at least one id"));
            }
            let mut seen = HashSet::new();
            for id in &self.platform.mock_devices {
                if id.trim().is_empty() {
                    return Err(validation("platform.mock_devices contains an empty id"));
                }
                if !seen.insert(id.as_str()) {
                    return Err(validation(format!(
                        "platform.mock_devices lists {id} more than once"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Fills in a fresh uuid v4 token when none is configured. Returns `true`
    /// when one was generated.
    pub fn ensure_auth_token(&mut self) -> bool {
        if self.server.auth_token.is_some() {
            return false;
        }
        self.server.auth_token = Some(uuid::Uuid::new_v4().to_string());
        info!("Generated a new bridge auth token");
        true
    }

    pub fn auth_token(&self) -> Option<RedactedToken> {
        self.server.auth_token.as_deref().map(RedactedToken::new)
    }
}

#[track_caller]
fn validation(reason: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        reason: reason.into(),
    }
}
