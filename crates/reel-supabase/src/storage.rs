//! Local persistence for the provider session.

use parking_lot::Mutex;
use reel_session::{AuthError, AuthResult, ProviderSession};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where the adapter keeps the current session between calls (and runs).
pub trait SessionStorage: Send + Sync {
    fn load(&self) -> AuthResult<Option<ProviderSession>>;

    fn save(&self, session: &ProviderSession) -> AuthResult<()>;

    /// Remove the stored session. Returns whether one existed.
    fn clear(&self) -> AuthResult<bool>;
}

/// Process-local storage; nothing survives a restart.
#[derive(Default)]
pub struct MemorySessionStorage {
    session: Mutex<Option<ProviderSession>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self) -> AuthResult<Option<ProviderSession>> {
        Ok(self.session.lock().clone())
    }

    fn save(&self, session: &ProviderSession) -> AuthResult<()> {
        *self.session.lock() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> AuthResult<bool> {
        Ok(self.session.lock().take().is_some())
    }
}

/// Session persisted as a JSON file.
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for FileSessionStorage {
    fn load(&self) -> AuthResult<Option<ProviderSession>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AuthError::Storage(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        serde_json::from_str(&contents).map(Some).map_err(|e| {
            AuthError::Storage(format!(
                "Corrupt session file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn save(&self, session: &ProviderSession) -> AuthResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AuthError::Storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let contents = serde_json::to_string_pretty(session)
            .map_err(|e| AuthError::Storage(format!("Failed to encode session: {}", e)))?;
        fs::write(&self.path, contents).map_err(|e| {
            AuthError::Storage(format!("Failed to write {}: {}", self.path.display(), e))
        })?;

        debug!(path = %self.path.display(), "Session saved");
        Ok(())
    }

    fn clear(&self) -> AuthResult<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AuthError::Storage(format!(
                "Failed to remove {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}
