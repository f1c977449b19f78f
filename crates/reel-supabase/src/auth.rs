//! GoTrue-backed identity provider.
//!
//! Talks to `/auth/v1/*`, keeps the current session in a [`SessionStorage`]
//! and announces state changes on a broadcast channel. A client state
//! machine decides which changes are real transitions worth announcing.

use crate::client::{auth_error, check_response, transport_error, SupabaseClient};
use crate::fsm::{event_for, ClientInput, ClientMachine, ClientState};
use crate::storage::SessionStorage;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use parking_lot::Mutex;
use reel_session::{
    AuthError, AuthEvent, AuthEventStream, AuthProvider, AuthResult, ProviderSession,
    SignUpOutcome, User,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 32;

/// Retry behavior for token refresh.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Refresh this long before the token actually expires.
    pub expiry_leeway_secs: i64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
            expiry_leeway_secs: 60,
        }
    }
}

impl RefreshConfig {
    /// Delay before retry `attempt` (0-indexed), doubling up to the cap.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .initial_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }

    fn leeway(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.expiry_leeway_secs)
    }
}

/// Body of a successful token grant.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Unix seconds.
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> ProviderSession {
        let expires_at = self
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .or_else(|| self.expires_in.map(|secs| now + ChronoDuration::seconds(secs)));

        ProviderSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_at,
            user: self.user,
        }
    }
}

/// Signup answers with a full session when email confirmation is off, and
/// with the bare user (or `{ user }`) when it is on.
fn parse_signup(body: serde_json::Value, now: DateTime<Utc>) -> AuthResult<SignUpOutcome> {
    if body.get("access_token").is_some() {
        let token: TokenResponse = serde_json::from_value(body).map_err(decode_error)?;
        let session = token.into_session(now);
        return Ok(SignUpOutcome {
            user: session.user.clone(),
            session: Some(session),
        });
    }

    let user_value = match body.get("user") {
        Some(user) if user.is_object() => user.clone(),
        _ => body,
    };
    let user: User = serde_json::from_value(user_value).map_err(decode_error)?;
    Ok(SignUpOutcome {
        user,
        session: None,
    })
}

/// A logout rejected with 401/403/404 means the session is already invalid.
fn session_already_dead(error: &AuthError) -> bool {
    matches!(error.status(), Some(401 | 403 | 404))
}

fn decode_error(error: serde_json::Error) -> AuthError {
    AuthError::unavailable(format!("Unexpected response from auth service: {}", error))
}

/// [`AuthProvider`] over the Supabase GoTrue REST API.
pub struct SupabaseAuth {
    client: SupabaseClient,
    storage: Arc<dyn SessionStorage>,
    machine: Mutex<ClientMachine>,
    events: broadcast::Sender<AuthEvent>,
    refresh_config: RefreshConfig,
    /// Serializes refreshes so a rotated refresh token is never replayed.
    refresh_lock: tokio::sync::Mutex<()>,
    redirect_to: Option<String>,
}

impl SupabaseAuth {
    pub fn new(client: SupabaseClient, storage: Arc<dyn SessionStorage>) -> Self {
        Self::with_refresh_config(client, storage, RefreshConfig::default())
    }

    pub fn with_refresh_config(
        client: SupabaseClient,
        storage: Arc<dyn SessionStorage>,
        refresh_config: RefreshConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            client,
            storage,
            machine: Mutex::new(ClientMachine::new()),
            events,
            refresh_config,
            refresh_lock: tokio::sync::Mutex::new(()),
            redirect_to: None,
        }
    }

    /// Where the password reset email should send the user.
    pub fn with_redirect_to(mut self, url: impl Into<String>) -> Self {
        self.redirect_to = Some(url.into());
        self
    }

    /// Current client state.
    pub fn state(&self) -> ClientState {
        self.machine.lock().state().clone()
    }

    /// Apply an input; on a legal transition announce the matching event.
    fn transition(&self, input: ClientInput, session: Option<ProviderSession>) -> bool {
        let mut machine = self.machine.lock();
        let old_state = machine.state().clone();
        if machine.consume(&input).is_err() {
            debug!(input = ?input, state = ?old_state, "Ignoring client transition");
            return false;
        }
        let new_state = machine.state().clone();
        drop(machine);

        debug!(old_state = ?old_state, new_state = ?new_state, "Client state transition");
        if let Some(kind) = event_for(&input) {
            // No subscribers is fine.
            let _ = self.events.send(AuthEvent::new(kind, session));
        }
        true
    }

    fn store_session(&self, session: &ProviderSession) -> AuthResult<()> {
        self.storage.save(session)
    }

    async fn grant(&self, grant_type: &str, body: serde_json::Value) -> AuthResult<ProviderSession> {
        let response = self
            .client
            .auth_post(&format!("token?grant_type={}", grant_type))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_response(response, "Token grant", auth_error).await?;
        let token: TokenResponse = response.json().await.map_err(transport_error)?;
        Ok(token.into_session(Utc::now()))
    }

    async fn refresh_with_backoff(&self, stale: &ProviderSession) -> AuthResult<ProviderSession> {
        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(current) = self.storage.load()? {
            if current.refresh_token != stale.refresh_token
                && !current.is_expired(Utc::now(), self.refresh_config.leeway())
            {
                return Ok(current);
            }
        }

        self.transition(ClientInput::RefreshStarted, None);
        let mut last_error = None;

        for attempt in 0..self.refresh_config.max_retries {
            let body = json!({ "refresh_token": stale.refresh_token });
            match self.grant("refresh_token", body).await {
                Ok(session) => {
                    self.store_session(&session)?;
                    self.transition(ClientInput::RefreshSucceeded, Some(session.clone()));
                    info!(user_id = %session.user.id, "Token refreshed");
                    return Ok(session);
                }
                Err(e) if e.is_transient() => {
                    last_error = Some(e);
                    if attempt + 1 < self.refresh_config.max_retries {
                        self.transition(ClientInput::RefreshRetry, None);
                        let delay = self.refresh_config.delay_for_attempt(attempt);
                        debug!(
                            attempt = attempt + 1,
                            max_retries = self.refresh_config.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            "Refresh failed with transient error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Refresh rejected, clearing session");
                    self.storage.clear()?;
                    self.transition(ClientInput::RefreshFailed, None);
                    return Err(e);
                }
            }
        }

        warn!(
            attempts = self.refresh_config.max_retries,
            "Refresh failed after retries, clearing session"
        );
        self.storage.clear()?;
        self.transition(ClientInput::RefreshFailed, None);
        Err(last_error.unwrap_or_else(|| AuthError::unavailable("Token refresh failed")))
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    async fn get_session(&self) -> AuthResult<Option<ProviderSession>> {
        let Some(session) = self.storage.load()? else {
            return Ok(None);
        };

        if session.is_expired(Utc::now(), self.refresh_config.leeway()) {
            info!(user_id = %session.user.id, "Stored session expired, refreshing");
            return self.refresh_with_backoff(&session).await.map(Some);
        }

        if self.state() == ClientState::SignedOut {
            self.transition(ClientInput::Restore, Some(session.clone()));
        }
        Ok(Some(session))
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<ProviderSession> {
        debug!(email = %email, "Password sign-in");
        let session = self
            .grant(
                "password",
                json!({ "email": email, "password": password }),
            )
            .await?;

        self.store_session(&session)?;
        self.transition(ClientInput::SignIn, Some(session.clone()));
        info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Option<serde_json::Value>,
    ) -> AuthResult<SignUpOutcome> {
        let mut body = json!({ "email": email, "password": password });
        if let Some(metadata) = metadata {
            body["data"] = metadata;
        }

        let response = self
            .client
            .auth_post("signup")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_response(response, "Signup", auth_error).await?;
        let value: serde_json::Value = response.json().await.map_err(transport_error)?;
        let outcome = parse_signup(value, Utc::now())?;

        if let Some(session) = &outcome.session {
            self.store_session(session)?;
            self.transition(ClientInput::SignIn, Some(session.clone()));
        }
        info!(
            user_id = %outcome.user.id,
            confirmed = outcome.session.is_some(),
            "Account created"
        );
        Ok(outcome)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let stored = self.storage.load().unwrap_or_else(|e| {
            warn!(error = %e, "Could not read stored session before sign-out");
            None
        });

        let remote = match &stored {
            Some(session) => {
                let result = self
                    .client
                    .auth_post("logout")
                    .header("Authorization", format!("Bearer {}", session.access_token))
                    .send()
                    .await
                    .map_err(transport_error);
                match result {
                    Ok(response) => check_response(response, "Logout", auth_error)
                        .await
                        .map(|_| ()),
                    Err(e) => Err(e),
                }
            }
            None => Ok(()),
        };

        match remote {
            Ok(()) => {
                self.storage.clear()?;
                self.transition(ClientInput::SignOut, None);
                info!("Signed out");
                Ok(())
            }
            Err(e) if session_already_dead(&e) => {
                // The server no longer knows this session, so it is gone either way.
                self.storage.clear()?;
                self.transition(ClientInput::SignOut, None);
                info!(error = %e, "Session already invalid on the server, signed out locally");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Server sign-out failed, keeping local session");
                Err(e)
            }
        }
    }

    async fn request_password_reset(&self, email: &str) -> AuthResult<()> {
        let mut request = self.client.auth_post("recover");
        if let Some(redirect_to) = &self.redirect_to {
            request = request.query(&[("redirect_to", redirect_to.as_str())]);
        }

        let response = request
            .json(&json!({ "email": email }))
            .send()
            .await
            .map_err(transport_error)?;
        check_response(response, "Password recovery", auth_error).await?;
        info!("Password recovery email requested");
        Ok(())
    }

    fn subscribe(&self) -> AuthEventStream {
        self.events.subscribe()
    }
}
