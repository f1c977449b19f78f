//! Configuration, filesystem layout and the ReelApps deployment registry.

mod apps;
mod config;
mod error;
mod logging;
mod paths;

pub use apps::{app_config, current_app, AppConfig, AppKey, APPS, MAIN_DOMAIN};
pub use config::{Config, DEFAULT_LOG_LEVEL, DEFAULT_SUPABASE_ANON_KEY, DEFAULT_SUPABASE_URL};
pub use error::{ConfigError, ConfigResult};
pub use logging::{init_logging, init_logging_with_paths};
pub use paths::Paths;
