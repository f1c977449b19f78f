//! # Observability
//!
//! Logging bootstrap for ReelApps binaries.
//!
//! Services call [`init`] (or [`init_with_config`]) once at startup and use
//! the standard `tracing` macros everywhere else. Events are written as
//! structured JSONL to `~/.reelapps/logs/reel.jsonl`:
//!
//! - `tail -f ~/.reelapps/logs/reel.jsonl | jq` for pretty JSON
//! - credential-bearing fields (`password`, `access_token`, `apikey`, ...)
//!   are redacted before they reach the file
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "reel".into(),
//!         default_level: "debug".into(),
//!         also_stderr: true,
//!         ..Default::default()
//!     });
//!     tracing::info!("ready");
//! }
//! ```

mod json_layer;
mod redact;
mod writer;

pub use json_layer::{JsonLayer, LogEntry};
pub use writer::LogFileWriter;

use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every log line.
    pub service_name: String,

    /// Default filter (e.g. "debug", "info"). `RUST_LOG` wins when set.
    pub default_level: String,

    /// Log file path. Defaults to `~/.reelapps/logs/reel.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit compact, human-readable logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize with default settings.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize with custom settings.
///
/// If the log file cannot be opened, logging falls back to stderr only and
/// the failure is reported there. Calling this twice is a no-op.
pub fn init_with_config(config: LogConfig) {
    if let Err(e) = try_init_with_config(&config) {
        let _ = tracing_subscriber::registry()
            .with(stderr_layer().with_filter(env_filter(&config.default_level)))
            .try_init();
        tracing::warn!(error = %e, "File logging unavailable, using stderr only");
    }
}

/// Like [`init_with_config`], but surfaces a log file failure instead of
/// falling back.
pub fn try_init_with_config(config: &LogConfig) -> io::Result<()> {
    let log_path = config
        .log_path
        .clone()
        .or_else(writer::default_log_path)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no home directory for log file"))?;
    let writer = LogFileWriter::new(&log_path)?;

    let json_layer = JsonLayer::new(config.service_name.clone(), writer)
        .with_filter(env_filter(&config.default_level));
    let stderr = config
        .also_stderr
        .then(|| stderr_layer().with_filter(env_filter(&config.default_level)));

    let installed = tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(log_path = %log_path.display(), "observability initialized");
    }
    Ok(())
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_writer(io::stderr)
}
