//! Runtime configuration.

use crate::{AppKey, ConfigError, ConfigResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use url::Url;

/// Default Supabase URL (can be baked in at compile time via `REELAPPS_SUPABASE_URL`).
pub const DEFAULT_SUPABASE_URL: &str = match option_env!("REELAPPS_SUPABASE_URL") {
    Some(url) => url,
    None => "",
};

/// Default Supabase anon key (can be baked in at compile time via `REELAPPS_SUPABASE_ANON_KEY`).
pub const DEFAULT_SUPABASE_ANON_KEY: &str = match option_env!("REELAPPS_SUPABASE_ANON_KEY") {
    Some(key) => key,
    None => "",
};

pub const DEFAULT_LOG_LEVEL: &str = "info";

const ENV_SUPABASE_URL: &str = "REELAPPS_SUPABASE_URL";
const ENV_SUPABASE_ANON_KEY: &str = "REELAPPS_SUPABASE_ANON_KEY";
const ENV_LOG_LEVEL: &str = "REELAPPS_LOG_LEVEL";
const ENV_APP: &str = "REELAPPS_APP";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_supabase_url")]
    pub supabase_url: String,
    /// Public anon key of the Supabase project.
    #[serde(default = "default_supabase_anon_key")]
    pub supabase_anon_key: String,
    /// App this client acts as, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<AppKey>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_supabase_url() -> String {
    DEFAULT_SUPABASE_URL.to_string()
}

fn default_supabase_anon_key() -> String {
    DEFAULT_SUPABASE_ANON_KEY.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            supabase_url: default_supabase_url(),
            supabase_anon_key: default_supabase_anon_key(),
            app: None,
        }
    }
}

impl Config {
    /// Load `config.json` if present, then apply environment overrides.
    pub fn load(paths: &Paths) -> ConfigResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            debug!(path = %config_path.display(), "Loading config file");
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, paths: &Paths) -> ConfigResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Apply `REELAPPS_*` overrides. Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(url) = lookup(ENV_SUPABASE_URL) {
            self.supabase_url = url;
        }
        if let Some(key) = lookup(ENV_SUPABASE_ANON_KEY) {
            self.supabase_anon_key = key;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(app) = lookup(ENV_APP) {
            self.app = Some(app.parse()?);
        }
        Ok(())
    }

    /// Check that the Supabase connection settings are usable.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.supabase_url.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "Supabase URL is not configured (set {} or supabase_url in config.json)",
                ENV_SUPABASE_URL
            )));
        }
        let url = self.supabase_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "Supabase URL must be http(s), got {}",
                url.scheme()
            )));
        }
        if self.supabase_anon_key.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "Supabase anon key is not configured (set {} or supabase_anon_key in config.json)",
                ENV_SUPABASE_ANON_KEY
            )));
        }
        Ok(())
    }

    pub fn supabase_url(&self) -> ConfigResult<Url> {
        Url::parse(&self.supabase_url).map_err(ConfigError::from)
    }
}
