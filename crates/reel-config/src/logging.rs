//! Logging initialization for ReelApps binaries.
//!
//! Thin wrapper over the observability crate: structured JSONL goes to
//! `~/.reelapps/logs/reel.jsonl` (or the file under a custom [`Paths`] root),
//! with `RUST_LOG` taking precedence over the configured level.

use crate::Paths;

const SERVICE_NAME: &str = "reel";

/// Initialize logging under the default `~/.reelapps` layout.
///
/// ```ignore
/// init_logging("info");
/// tracing::info!("ready");
/// ```
pub fn init_logging(level: &str) {
    observability::init_with_config(observability::LogConfig {
        service_name: SERVICE_NAME.into(),
        default_level: level.into(),
        ..Default::default()
    });
}

/// Initialize logging with the log file placed under `paths`.
pub fn init_logging_with_paths(level: &str, paths: &Paths) {
    observability::init_with_config(observability::LogConfig {
        service_name: SERVICE_NAME.into(),
        default_level: level.into(),
        log_path: Some(paths.log_file()),
        also_stderr: false,
    });
}
