use apdu_bridge::bridge::Bridge;
use apdu_bridge::error::BridgeError;
use apdu_bridge::logger::initialize as LoggerInitialize;

use apdu_rpc::BridgeConfig;
use apdu_rpc::config::{CONFIG_FILE_NAME, default_config_dir, try_load_dotenv};

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::panic::Location;

use log::{error, info};

const LOG_DIR_NAME: &str = "logs";

#[tokio::main]
async fn main() -> Result<(), BridgeError> {
    // Before anything reads the environment
    let dotenv = try_load_dotenv();

    let config_dir = default_config_dir()?;
    let log_dir = config_dir.join(LOG_DIR_NAME);
    create_dir_all(&log_dir).map_err(|e| BridgeError::Bridge {
        message: format!("Failed to create log directory {}: {e}", log_dir.display()),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Initialize logger FIRST
    LoggerInitialize(&log_dir)?;

    info!("APDU bridge starting");
    if let Some(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }
    info!("Config directory: {}", config_dir.display());

    let mut config = BridgeConfig::load(&config_dir)?;
    if config.ensure_auth_token() {
        config.save(&config_dir)?;
        info!(
            "Generated auth token, stored in {}",
            config_dir.join(CONFIG_FILE_NAME).display()
        );
    }
    config.apply_env_overrides()?;

    let bridge = Bridge::from_config(&config)?;
    bridge.start().await?;
    if let Some(url) = bridge.ws_url() {
        info!("Bridge listening on {url}");
    }
    if let Some(url) = bridge.http_url() {
        info!("Bridge accepting HTTP requests on {url}");
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to wait for Ctrl-C: {e}");
    }

    info!("Shutting down");
    bridge.stop().await?;
    info!("APDU bridge stopped");
    Ok(())
}
