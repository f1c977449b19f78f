//! Authentication error types.

use thiserror::Error;

/// Errors surfaced by the session store and its collaborators.
///
/// Every variant renders as human-readable text, which is what ends up in
/// `SessionSnapshot::error`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The provider refused the supplied credentials.
    #[error("{message}")]
    CredentialsRejected {
        message: String,
        status: Option<u16>,
    },

    /// The provider could not be reached or failed server-side.
    #[error("Authentication service unavailable: {message}")]
    ProviderUnavailable {
        message: String,
        status: Option<u16>,
    },

    /// No profile row exists for the user.
    #[error("Profile not found")]
    ProfileNotFound,

    /// Writing to the profile store failed.
    #[error("Profile update failed: {0}")]
    ProfileWriteFailed(String),

    /// The operation requires a signed-in user.
    #[error("{0}")]
    PreconditionFailed(String),

    /// Caller supplied unusable input (empty email, empty password).
    #[error("{0}")]
    InvalidInput(String),

    /// Local session persistence failed.
    #[error("Session storage error: {0}")]
    Storage(String),
}

impl AuthError {
    /// Shorthand for a credentials rejection without an HTTP status.
    pub fn rejected(message: impl Into<String>) -> Self {
        AuthError::CredentialsRejected {
            message: message.into(),
            status: None,
        }
    }

    /// Shorthand for a transport-level failure without an HTTP status.
    pub fn unavailable(message: impl Into<String>) -> Self {
        AuthError::ProviderUnavailable {
            message: message.into(),
            status: None,
        }
    }

    /// HTTP-like status attached to the failure, if the provider reported one.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::CredentialsRejected { status, .. }
            | AuthError::ProviderUnavailable { status, .. } => *status,
            AuthError::ProfileNotFound => Some(404),
            _ => None,
        }
    }

    /// Returns true if retrying the same call may succeed.
    ///
    /// Only provider outages qualify: connection failures (no status) and
    /// 5xx responses. A 4xx from the provider is a definitive answer.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::ProviderUnavailable { status, .. } => {
                status.map_or(true, |code| (500..600).contains(&code))
            }
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
