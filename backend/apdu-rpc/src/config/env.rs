use crate::config::BridgeConfig;
use crate::error::config::ConfigError;

use common::ErrorLocation;

use std::env;
use std::net::SocketAddr;
use std::panic::Location;
use std::path::PathBuf;

use log::{info, warn};

pub const ENV_CONFIG_DIR: &str = "APDU_BRIDGE_CONFIG_DIR";
pub const ENV_LISTEN: &str = "APDU_BRIDGE_LISTEN";
pub const ENV_HTTP_LISTEN: &str = "APDU_BRIDGE_HTTP_LISTEN";
pub const ENV_TOKEN: &str = "APDU_BRIDGE_TOKEN";

const CONFIG_DIR_NAME: &str = "apdu-bridge";

/// Loads `.env` from the working directory, else from next to the
/// executable. Returns where it was found.
pub fn try_load_dotenv() -> Option<PathBuf> {
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded .env from: {path:?}");
        return Some(path);
    }

    if let Ok(exe_path) = env::current_exe()
        && let Some(exe_dir) = exe_path.parent()
    {
        let env_path = exe_dir.join(".env");
        if env_path.exists() {
            match dotenvy::from_path(&env_path) {
                Ok(()) => {
                    info!("Loaded .env from: {env_path:?}");
                    return Some(env_path);
                }
                Err(e) => warn!("Failed to parse .env at {env_path:?}: {e}"),
            }
        }
    }

    None
}

/// `$APDU_BRIDGE_CONFIG_DIR`, else `<platform config dir>/apdu-bridge`.
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = non_empty_var(ENV_CONFIG_DIR) {
        return Ok(PathBuf::from(dir));
    }

    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME))
        .ok_or_else(|| ConfigError::DirectoryNotFound {
            location: ErrorLocation::from(Location::caller()),
            reason: format!("No platform config directory; set {ENV_CONFIG_DIR}"),
        })
}

impl BridgeConfig {
    /// Applies `APDU_BRIDGE_LISTEN`, `APDU_BRIDGE_HTTP_LISTEN` and
    /// `APDU_BRIDGE_TOKEN`, then revalidates.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(listen) = non_empty_var(ENV_LISTEN) {
            self.server.listen = parse_listen(ENV_LISTEN, &listen)?;
            info!("Listen address overridden from environment: {listen}");
        }

        if let Some(listen) = non_empty_var(ENV_HTTP_LISTEN) {
            self.server.http_listen = Some(parse_listen(ENV_HTTP_LISTEN, &listen)?);
            info!("HTTP listen address overridden from environment: {listen}");
        }

        if let Some(token) = non_empty_var(ENV_TOKEN) {
            self.server.auth_token = Some(token);
            info!("Auth token overridden from environment");
        }

        self.validate()
    }
}

#[track_caller]
fn parse_listen(name: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::ValidationError {
            location: ErrorLocation::from(Location::caller()),
            reason: format!("{name}={value} is not a socket address: {e}"),
        })
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
