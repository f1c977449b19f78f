//! CLI command implementations.

mod apps;
mod auth;
mod profile;
mod watch;

pub use apps::apps;
pub use auth::{login, logout, reset_password, signup, status, SignupArgs};
pub use profile::{profile_show, profile_update};
pub use watch::watch;

use anyhow::{Context as _, Result};
use reel_config::{app_config, init_logging_with_paths, Config, Paths};
use reel_session::SessionStore;
use reel_supabase::{
    FileSessionStorage, SessionStorage, SupabaseAuth, SupabaseClient, SupabaseProfiles,
};
use std::sync::Arc;
use tracing::info;

/// Everything a command needs: resolved paths, config and an initialized store.
pub struct Context {
    pub paths: Paths,
    pub config: Config,
    pub store: Arc<SessionStore>,
}

impl Context {
    /// Load configuration, start logging and build the session store.
    ///
    /// The store has finished its startup session check when this returns.
    pub async fn open(log_level: Option<&str>) -> Result<Self> {
        let paths = Paths::new()?;
        let config = Config::load(&paths).context("Failed to load configuration")?;

        let level = log_level.unwrap_or(&config.log_level);
        init_logging_with_paths(level, &paths);

        config.validate()?;
        paths.ensure_dirs()?;

        let client = SupabaseClient::new(
            config.supabase_url.clone(),
            config.supabase_anon_key.clone(),
        );
        let storage: Arc<dyn SessionStorage> =
            Arc::new(FileSessionStorage::new(paths.session_file()));

        let mut auth = SupabaseAuth::new(client.clone(), storage.clone());
        if let Some(app) = config.app {
            auth = auth.with_redirect_to(format!("{}/reset-password", app_config(app).url()));
        }
        let profiles = SupabaseProfiles::new(client, storage);

        let store = Arc::new(SessionStore::new(Arc::new(auth), Arc::new(profiles)));
        store.initialize().await;

        info!(
            base_dir = %paths.base_dir().display(),
            authenticated = store.snapshot().is_authenticated,
            "Session store ready"
        );

        Ok(Self {
            paths,
            config,
            store,
        })
    }
}
