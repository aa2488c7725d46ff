use crate::config::{
    BridgeConfig, CONFIG_FILE_NAME, DEFAULT_LISTEN, ENV_CONFIG_DIR, ENV_HTTP_LISTEN, ENV_LISTEN,
    ENV_TOKEN, PlatformKind, default_config_dir,
};
use crate::error::ConfigError;

use std::env;
use std::path::PathBuf;

use serial_test::serial;
use tempfile::TempDir;

/// Clears the bridge variables for the duration of a test.
struct EnvGuard;

impl EnvGuard {
    fn new() -> Self {
        Self::clear();
        Self
    }

    fn clear() {
        for name in [ENV_CONFIG_DIR, ENV_LISTEN, ENV_HTTP_LISTEN, ENV_TOKEN] {
            // SAFETY: every test touching these variables is #[serial].
            unsafe { env::remove_var(name) };
        }
    }

    fn set(&self, name: &str, value: &str) {
        // SAFETY: every test touching these variables is #[serial].
        unsafe { env::set_var(name, value) };
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        Self::clear();
    }
}

#[test]
fn given_missing_file_when_loading_then_defaults_apply() {
    let dir = TempDir::new().expect("tempdir");

    let config = BridgeConfig::load(dir.path()).expect("defaults");

    assert_eq!(config.server.listen.to_string(), DEFAULT_LISTEN);
    assert!(!config.server.allow_remote);
    assert!(config.server.auth_token.is_none());
    assert_eq!(config.platform.kind, PlatformKind::Mock);
    assert_eq!(config.platform.mock_devices, vec!["mock-reader-0"]);
}

/// **VALUE**: Verifies a partial TOML file fills the rest from defaults.
///
/// **WHY THIS MATTERS**: Users write only the keys they care about. A
/// missing section must not be a parse error.
///
/// **BUG THIS CATCHES**: Would catch a section without `#[serde(default)]`.
#[test]
fn given_partial_toml_when_loading_then_missing_keys_use_defaults() {
    // GIVEN
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "[platform]\nmock_devices = [\"left\", \"right\"]\n",
    )
    .expect("write");

    // WHEN
    let config = BridgeConfig::load(dir.path()).expect("load");

    // THEN
    assert_eq!(config.platform.mock_devices, vec!["left", "right"]);
    assert_eq!(config.server.listen.to_string(), DEFAULT_LISTEN);
    assert_eq!(config.version, 1);
}

#[test]
fn given_garbage_file_when_loading_then_parse_error() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join(CONFIG_FILE_NAME), "server = [").expect("write");

    let err = BridgeConfig::load(dir.path()).expect_err("garbage");

    assert!(matches!(err, ConfigError::ParseError { .. }));
}

/// **VALUE**: Verifies a public listen address needs `allow_remote`.
///
/// **WHY THIS MATTERS**: The bridge forwards raw APDUs including PINs.
/// Binding to `0.0.0.0` by accident must not go unnoticed.
///
/// **BUG THIS CATCHES**: Would catch validation that skips the listen check.
#[test]
fn given_public_listen_without_allow_remote_when_validating_then_rejected() {
    // GIVEN
    let mut config = BridgeConfig::default();
    config.server.listen = "0.0.0.0:19877".parse().expect("addr");

    // WHEN
    let err = config.validate().expect_err("public bind");

    // THEN
    assert!(matches!(err, ConfigError::ValidationError { .. }));
    config.server.allow_remote = true;
    config.validate().expect("allowed once opted in");
}

/// **VALUE**: Verifies the optional HTTP endpoint gets the same exposure
/// check as the WebSocket one and cannot share its port.
///
/// **BUG THIS CATCHES**: Would catch an unauthenticated HTTP endpoint bound
/// publicly without opting in, or a config that fails at bind time instead.
#[test]
fn given_http_listen_when_validating_then_loopback_and_distinct_port_required() {
    // GIVEN
    let mut config = BridgeConfig::default();

    // WHEN / THEN
    config.server.http_listen = Some("0.0.0.0:19878".parse().expect("addr"));
    assert!(config.validate().is_err());

    config.server.http_listen = Some(config.server.listen);
    assert!(config.validate().is_err());

    config.server.http_listen = Some("127.0.0.1:19878".parse().expect("addr"));
    config.validate().expect("loopback on its own port");
}

#[test]
fn given_duplicate_or_empty_mock_ids_when_validating_then_rejected() {
    let mut config = BridgeConfig::default();

    config.platform.mock_devices = vec!["a".into(), "a".into()];
    assert!(config.validate().is_err());

    config.platform.mock_devices = vec![" ".into()];
    assert!(config.validate().is_err());

    config.platform.mock_devices = Vec::new();
    assert!(config.validate().is_err());

    config.platform.kind = PlatformKind::Pcsc;
    config.validate().expect("mock ids are irrelevant for pcsc");
}

#[test]
fn given_config_when_saving_then_load_returns_same_values_and_no_temp_file() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = BridgeConfig::default();
    config.server.auth_token = Some("secret".into());
    config.platform.kind = PlatformKind::Pcsc;

    config.save(dir.path()).expect("save");
    let loaded = BridgeConfig::load(dir.path()).expect("load");

    assert_eq!(loaded.server.auth_token.as_deref(), Some("secret"));
    assert_eq!(loaded.platform.kind, PlatformKind::Pcsc);
    assert!(!dir.path().join(format!("{CONFIG_FILE_NAME}.tmp")).exists());
}

#[test]
fn given_no_token_when_ensuring_then_uuid_is_generated_once() {
    let mut config = BridgeConfig::default();

    assert!(config.ensure_auth_token());
    let token = config.server.auth_token.clone().expect("generated");
    assert!(!config.ensure_auth_token());

    assert_eq!(config.server.auth_token.as_deref(), Some(token.as_str()));
    assert!(uuid::Uuid::parse_str(&token).is_ok());
    assert!(config.auth_token().expect("token").matches(&token));
}

/// **VALUE**: Verifies environment variables override the file.
///
/// **WHY THIS MATTERS**: Deployments pin the port and token via env without
/// editing the config file.
///
/// **BUG THIS CATCHES**: Would catch overrides applied before loading, which
/// the file would then clobber.
#[test]
#[serial]
fn given_env_overrides_when_applying_then_listen_and_token_change() {
    // GIVEN
    let env = EnvGuard::new();
    env.set(ENV_LISTEN, "127.0.0.1:4000");
    env.set(ENV_TOKEN, "from-env");
    let mut config = BridgeConfig::default();

    // WHEN
    config.apply_env_overrides().expect("overrides");

    // THEN
    assert_eq!(config.server.listen.port(), 4000);
    assert_eq!(config.server.auth_token.as_deref(), Some("from-env"));
}

#[test]
#[serial]
fn given_http_listen_env_when_applying_then_http_endpoint_enabled() {
    let env = EnvGuard::new();
    env.set(ENV_HTTP_LISTEN, "127.0.0.1:4001");
    let mut config = BridgeConfig::default();
    assert!(config.server.http_listen.is_none());

    config.apply_env_overrides().expect("overrides");

    assert_eq!(config.server.http_listen.map(|addr| addr.port()), Some(4001));
}

#[test]
#[serial]
fn given_bad_listen_env_when_applying_then_validation_error() {
    let env = EnvGuard::new();
    env.set(ENV_LISTEN, "not-an-address");
    let mut config = BridgeConfig::default();

    let err = config.apply_env_overrides().expect_err("bad address");

    assert!(matches!(err, ConfigError::ValidationError { .. }));
}

#[test]
#[serial]
fn given_config_dir_env_when_resolving_then_env_wins() {
    let env = EnvGuard::new();
    env.set(ENV_CONFIG_DIR, "/tmp/apdu-bridge-test");

    let dir = default_config_dir().expect("dir");

    assert_eq!(dir, PathBuf::from("/tmp/apdu-bridge-test"));
}
