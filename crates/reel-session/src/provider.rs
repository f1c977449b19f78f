//! Capability contracts for the identity provider and the profile store.
//!
//! Both are external services; the session store only ever talks to them
//! through these traits, which keeps it testable with in-memory doubles.

use crate::{AuthResult, NewProfile, Profile, ProfilePatch, ProviderSession, User};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Auth state change announced by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

/// Event pushed by the provider, with the session it refers to (if any).
#[derive(Debug, Clone, PartialEq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<ProviderSession>,
}

impl AuthEvent {
    pub fn new(kind: AuthEventKind, session: Option<ProviderSession>) -> Self {
        Self { kind, session }
    }
}

/// Receiving half of a provider event subscription.
pub type AuthEventStream = broadcast::Receiver<AuthEvent>;

/// Result of creating a provider account.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpOutcome {
    pub user: User,
    /// Present when the provider signed the new account in immediately.
    pub session: Option<ProviderSession>,
}

/// Identity provider: credential checks, sessions and auth events.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The session the provider currently holds for this client, if any.
    async fn get_session(&self) -> AuthResult<Option<ProviderSession>>;

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<ProviderSession>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Option<serde_json::Value>,
    ) -> AuthResult<SignUpOutcome>;

    async fn sign_out(&self) -> AuthResult<()>;

    async fn request_password_reset(&self, email: &str) -> AuthResult<()>;

    /// Subscribe to auth state changes. Dropping the stream unsubscribes.
    fn subscribe(&self) -> AuthEventStream;
}

/// Profile records keyed by user id.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Fetch the profile for a user. `Ok(None)` means no row exists.
    async fn get(&self, user_id: &str) -> AuthResult<Option<Profile>>;

    async fn create(&self, profile: &NewProfile) -> AuthResult<Profile>;

    /// Apply a partial update and return the columns the store echoed back.
    async fn update(&self, user_id: &str, patch: &ProfilePatch) -> AuthResult<ProfilePatch>;
}
