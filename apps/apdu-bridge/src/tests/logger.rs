use crate::logger::{LOG_FILE_NAME, initialize};

use std::path::PathBuf;

/// **VALUE**: Verifies that calling initialize() more than once is harmless.
///
/// **WHY THIS MATTERS**: Tests and the binary may both reach initialization.
/// fern panics if a second global logger is installed.
///
/// **BUG THIS CATCHES**: Would catch removal of the Once/AtomicBool guards.
#[test]
fn given_logger_initialized_when_called_again_then_returns_ok() {
    // GIVEN
    let temp_dir = tempfile::tempdir().unwrap();

    // WHEN
    let first = initialize(temp_dir.path());
    let second = initialize(temp_dir.path());

    // THEN
    assert!(first.is_ok(), "First initialization should succeed");
    assert!(second.is_ok(), "Repeat initialization should be a no-op");
}

#[test]
fn given_log_file_name_then_names_the_bridge() {
    let path = PathBuf::from("/var/log").join(LOG_FILE_NAME);

    assert_eq!(path.file_name().unwrap(), "apdu-bridge.log");
}
