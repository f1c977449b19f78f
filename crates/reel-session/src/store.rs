//! Session state container.
//!
//! `SessionStore` is the only writer of the session snapshot. User-initiated
//! operations and provider events both funnel through it, and every write is
//! sequenced so that an operation which started earlier can never clobber a
//! snapshot committed by one that started later.
//!
//! ## Sequencing
//!
//! ```text
//!  login ──ticket 1──► sign_in ─► fetch profile ───────────────► settle(1)  discarded
//!                                         SIGNED_OUT ─ticket 2─► settle(2)  committed
//! ```
//!
//! Each operation draws a ticket from a monotonic counter when it starts.
//! Identity and error writes are applied only when the ticket is newer than
//! the last committed identity write. Bookkeeping flags (`is_loading`,
//! `is_initializing`) are always applied so they cannot get stuck.

use crate::{
    AuthError, AuthProvider, AuthResult, ErrorInfo, NewProfile, Profile, ProfilePatch,
    ProfileRepository, ProfileSeed, ProviderSession, SessionSnapshot, User,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, OnceCell};
use tracing::{debug, info, warn};

/// Sequencing state, guarded by one lock together with every publish.
#[derive(Debug, Default)]
struct Ledger {
    /// Last ticket handed out.
    next_ticket: u64,
    /// Ticket of the newest identity write that was applied.
    committed: u64,
    /// User-initiated operations currently in flight.
    pending: usize,
}

/// How a settle affects the bookkeeping flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    /// First session check after process start.
    Startup,
    /// A user-initiated operation finished.
    UserOp,
    /// Provider-driven reconciliation, no flag changes.
    Reconcile,
}

/// Who is signed in, as observed by one operation.
#[derive(Debug)]
struct Identity {
    session: Option<ProviderSession>,
    profile: Option<Profile>,
}

impl Identity {
    fn anonymous() -> Self {
        Self {
            session: None,
            profile: None,
        }
    }

    fn signed_in(session: ProviderSession, profile: Option<Profile>) -> Self {
        Self {
            session: Some(session),
            profile,
        }
    }
}

#[derive(Debug)]
enum ProfileChange {
    Merge(ProfilePatch),
    Replace(Profile),
}

/// Profile write scoped to the user it was made for.
#[derive(Debug)]
struct ProfileUpdate {
    user_id: String,
    change: ProfileChange,
}

/// Everything a finished operation wants to write.
#[derive(Debug, Default)]
struct Write {
    identity: Option<Identity>,
    error: Option<ErrorInfo>,
    profile: Option<ProfileUpdate>,
}

impl Write {
    fn identity(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            ..Default::default()
        }
    }

    fn error(error: &AuthError) -> Self {
        Self {
            error: Some(ErrorInfo::from(error)),
            ..Default::default()
        }
    }
}

/// Owner of the session snapshot.
///
/// Construct one per process and share it behind an `Arc`. Readers use
/// [`SessionStore::snapshot`] or [`SessionStore::subscribe`]; writers call the
/// operations below.
pub struct SessionStore {
    provider: Arc<dyn AuthProvider>,
    profiles: Arc<dyn ProfileRepository>,
    snapshot: watch::Sender<SessionSnapshot>,
    ledger: Mutex<Ledger>,
    /// Completed once the first session check has settled.
    startup: OnceCell<()>,
    listener_attached: AtomicBool,
}

impl SessionStore {
    /// Create a store in the initializing state.
    pub fn new(provider: Arc<dyn AuthProvider>, profiles: Arc<dyn ProfileRepository>) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot::initial());
        Self {
            provider,
            profiles,
            snapshot,
            ledger: Mutex::new(Ledger::default()),
            startup: OnceCell::new(),
            listener_attached: AtomicBool::new(false),
        }
    }

    /// Clone of the current snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every committed snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.subscribe()
    }

    /// True once the first session check has completed.
    pub fn is_initialized(&self) -> bool {
        self.startup.initialized()
    }

    pub(crate) fn provider(&self) -> &Arc<dyn AuthProvider> {
        &self.provider
    }

    /// Record that the reconciliation listener is attached. Fails on the second call.
    pub(crate) fn claim_listener(&self) -> AuthResult<()> {
        if self.listener_attached.swap(true, Ordering::SeqCst) {
            return Err(AuthError::PreconditionFailed(
                "Auth event listener is already attached".to_string(),
            ));
        }
        Ok(())
    }

    /// Derive the snapshot from the provider's current session.
    ///
    /// The first call after construction completes startup and clears
    /// `is_initializing`; later calls re-derive without touching any flags.
    /// Provider failures are recorded in the snapshot and never returned.
    pub async fn initialize(&self) {
        if self.startup.initialized() {
            self.derive(Completion::Reconcile).await;
        } else {
            self.ensure_initialized().await;
        }
    }

    /// Sign in with email and password.
    ///
    /// On failure the error is both recorded in the snapshot and returned.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<()> {
        self.ensure_initialized().await;
        let ticket = self.begin_user_op();

        match self.sign_in_and_load(email, password).await {
            Ok(identity) => {
                let user_id = identity
                    .session
                    .as_ref()
                    .map(|s| s.user.id.clone())
                    .unwrap_or_default();
                if self.settle(ticket, Write::identity(identity), Completion::UserOp) {
                    info!(user_id = %user_id, "Login successful");
                } else {
                    debug!(user_id = %user_id, ticket, "Login result superseded by a newer write");
                }
                Ok(())
            }
            Err(error) => {
                warn!(error = %error, "Login failed");
                self.settle(ticket, Write::error(&error), Completion::UserOp);
                Err(error)
            }
        }
    }

    /// Create a provider account, and a profile row when `seed` is given.
    ///
    /// The snapshot's identity is left alone: if the provider signs the new
    /// account in implicitly it announces that through its event stream.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        seed: Option<ProfileSeed>,
    ) -> AuthResult<User> {
        self.ensure_initialized().await;
        let ticket = self.begin_user_op();

        match self.create_account(email, password, seed).await {
            Ok(user) => {
                self.settle(ticket, Write::default(), Completion::UserOp);
                Ok(user)
            }
            Err(error) => {
                warn!(error = %error, "Signup failed");
                self.settle(ticket, Write::error(&error), Completion::UserOp);
                Err(error)
            }
        }
    }

    /// Sign out with the provider.
    ///
    /// If the provider cannot confirm the sign-out the previous identity is
    /// kept and only the error is recorded.
    pub async fn logout(&self) {
        self.ensure_initialized().await;
        let ticket = self.begin_user_op();

        match self.provider.sign_out().await {
            Ok(()) => {
                info!("Logged out");
                self.settle(ticket, Write::identity(Identity::anonymous()), Completion::UserOp);
            }
            Err(error) => {
                warn!(error = %error, "Logout failed, keeping current session");
                self.settle(ticket, Write::error(&error), Completion::UserOp);
            }
        }
    }

    /// Ask the provider to email a password reset link.
    pub async fn send_password_reset_email(&self, email: &str) -> AuthResult<()> {
        self.ensure_initialized().await;
        let ticket = self.begin_user_op();

        let result = match require_email(email) {
            Ok(email) => self.provider.request_password_reset(email).await,
            Err(error) => Err(error),
        };

        match result {
            Ok(()) => {
                info!("Password reset email requested");
                self.settle(ticket, Write::default(), Completion::UserOp);
                Ok(())
            }
            Err(error) => {
                warn!(error = %error, "Password reset request failed");
                self.settle(ticket, Write::error(&error), Completion::UserOp);
                Err(error)
            }
        }
    }

    /// Update the signed-in user's profile and merge the stored columns back
    /// into the snapshot.
    ///
    /// Fails with `PreconditionFailed`, without touching the snapshot, when
    /// nobody is signed in.
    pub async fn update_profile(&self, patch: ProfilePatch) -> AuthResult<()> {
        self.ensure_initialized().await;

        let user_id = self
            .snapshot
            .borrow()
            .user_id()
            .map(str::to_owned)
            .ok_or_else(|| {
                AuthError::PreconditionFailed(
                    "You must be signed in to update your profile".to_string(),
                )
            })?;

        let ticket = self.begin_user_op();
        match self.write_profile(&user_id, &patch).await {
            Ok(change) => {
                info!(user_id = %user_id, "Profile updated");
                let write = Write {
                    profile: Some(ProfileUpdate { user_id, change }),
                    ..Default::default()
                };
                self.settle(ticket, write, Completion::UserOp);
                Ok(())
            }
            Err(error) => {
                warn!(user_id = %user_id, error = %error, "Profile update failed");
                self.settle(ticket, Write::error(&error), Completion::UserOp);
                Err(error)
            }
        }
    }

    /// Clear the snapshot's error. No I/O.
    pub fn clear_error(&self) {
        let _ledger = self.ledger.lock();
        self.snapshot
            .send_if_modified(|snapshot| snapshot.error.take().is_some());
    }

    /// Absorb a sign-out announced by the provider.
    ///
    /// Resets straight to the anonymous identity; loading flags are untouched
    /// since nobody is waiting on this.
    pub fn reconcile_signed_out(&self) {
        let mut ledger = self.ledger.lock();
        ledger.next_ticket += 1;
        let ticket = ledger.next_ticket;
        self.settle_locked(
            &mut ledger,
            ticket,
            Write::identity(Identity::anonymous()),
            Completion::Reconcile,
        );
        info!(ticket, "Signed out by provider");
    }

    /// Run the first session check exactly once; concurrent callers wait on it.
    async fn ensure_initialized(&self) {
        self.startup
            .get_or_init(|| self.derive(Completion::Startup))
            .await;
    }

    async fn derive(&self, completion: Completion) {
        let ticket = self.issue_ticket();

        let write = match self.provider.get_session().await {
            Ok(Some(session)) => {
                let profile = self.load_profile(&session.user.id).await;
                debug!(user_id = %session.user.id, ticket, "Provider session found");
                Write::identity(Identity::signed_in(session, profile))
            }
            Ok(None) => {
                debug!(ticket, "No provider session");
                Write::identity(Identity::anonymous())
            }
            Err(error) => {
                warn!(error = %error, "Session check failed, continuing signed out");
                Write {
                    identity: Some(Identity::anonymous()),
                    error: Some(ErrorInfo::from(&error)),
                    ..Default::default()
                }
            }
        };

        self.settle(ticket, write, completion);
        if completion == Completion::Startup {
            info!(
                authenticated = self.snapshot.borrow().is_authenticated,
                "Session initialized"
            );
        }
    }

    async fn sign_in_and_load(&self, email: &str, password: &str) -> AuthResult<Identity> {
        let email = require_email(email)?;
        require_password(password)?;

        let session = self.provider.sign_in(email, password).await?;
        let profile = self.load_profile(&session.user.id).await;
        Ok(Identity::signed_in(session, profile))
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
        seed: Option<ProfileSeed>,
    ) -> AuthResult<User> {
        let email = require_email(email)?;
        require_password(password)?;

        let metadata = seed
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| AuthError::InvalidInput(format!("Invalid profile data: {}", e)))?;

        let outcome = self.provider.sign_up(email, password, metadata).await?;
        info!(
            user_id = %outcome.user.id,
            signed_in = outcome.session.is_some(),
            "Account created"
        );

        if let Some(seed) = seed {
            let row = NewProfile {
                user_id: outcome.user.id.clone(),
                seed,
            };
            match self.profiles.create(&row).await {
                Ok(profile) => debug!(profile_id = %profile.id, "Profile created"),
                Err(error) => warn!(
                    user_id = %outcome.user.id,
                    error = %error,
                    "Profile creation failed after signup"
                ),
            }
        }

        Ok(outcome.user)
    }

    async fn write_profile(&self, user_id: &str, patch: &ProfilePatch) -> AuthResult<ProfileChange> {
        let echoed = self.profiles.update(user_id, patch).await?;

        let has_profile = self.snapshot.borrow().profile.is_some();
        if has_profile {
            return Ok(ProfileChange::Merge(echoed));
        }

        // Nothing to merge into yet, so take the full row.
        match self.profiles.get(user_id).await? {
            Some(profile) => Ok(ProfileChange::Replace(profile)),
            None => Err(AuthError::ProfileNotFound),
        }
    }

    /// Fetch a profile, treating every failure as "no profile".
    async fn load_profile(&self, user_id: &str) -> Option<Profile> {
        match self.profiles.get(user_id).await {
            Ok(Some(profile)) => Some(profile),
            Ok(None) | Err(AuthError::ProfileNotFound) => {
                debug!(user_id = %user_id, "No profile for user");
                None
            }
            Err(error) => {
                warn!(user_id = %user_id, error = %error, "Profile fetch failed");
                None
            }
        }
    }

    fn issue_ticket(&self) -> u64 {
        let mut ledger = self.ledger.lock();
        ledger.next_ticket += 1;
        ledger.next_ticket
    }

    /// Start a user-initiated operation: take a ticket, raise `is_loading`,
    /// clear the previous error.
    fn begin_user_op(&self) -> u64 {
        let mut ledger = self.ledger.lock();
        ledger.next_ticket += 1;
        ledger.pending += 1;
        let ticket = ledger.next_ticket;

        self.snapshot.send_if_modified(|snapshot| {
            let changed = !snapshot.is_loading || snapshot.error.is_some();
            snapshot.is_loading = true;
            snapshot.error = None;
            changed
        });
        ticket
    }

    /// Apply an operation's result. Returns whether the identity/error part
    /// was fresh enough to be applied.
    fn settle(&self, ticket: u64, write: Write, completion: Completion) -> bool {
        let mut ledger = self.ledger.lock();
        self.settle_locked(&mut ledger, ticket, write, completion)
    }

    fn settle_locked(
        &self,
        ledger: &mut Ledger,
        ticket: u64,
        write: Write,
        completion: Completion,
    ) -> bool {
        let fresh = ticket > ledger.committed;
        if fresh && write.identity.is_some() {
            ledger.committed = ticket;
        }
        if completion == Completion::UserOp {
            ledger.pending = ledger.pending.saturating_sub(1);
        }
        let pending = ledger.pending;

        self.snapshot.send_if_modified(|snapshot| {
            let before = snapshot.clone();

            match completion {
                Completion::Startup => snapshot.is_initializing = false,
                Completion::UserOp => snapshot.is_loading = pending > 0,
                Completion::Reconcile => {}
            }

            if fresh {
                if let Some(identity) = write.identity {
                    snapshot.user = identity.session.as_ref().map(|s| s.user.clone());
                    snapshot.is_authenticated = snapshot.user.is_some();
                    snapshot.session = identity.session;
                    snapshot.profile = identity.profile;
                }
                if let Some(error) = write.error {
                    snapshot.error = Some(error);
                }
            } else if write.identity.is_some() || write.error.is_some() {
                debug!(ticket, committed = ledger.committed, "Discarding stale write");
            }

            // Profile writes only need the same user to still be signed in.
            if let Some(update) = write.profile {
                if snapshot.user_id() == Some(update.user_id.as_str()) {
                    snapshot.profile = match (snapshot.profile.take(), update.change) {
                        (Some(profile), ProfileChange::Merge(patch)) => Some(profile.merge(&patch)),
                        (None, ProfileChange::Merge(_)) => None,
                        (_, ProfileChange::Replace(profile)) => Some(profile),
                    };
                } else {
                    debug!(user_id = %update.user_id, "Dropping profile write for a user no longer signed in");
                }
            }

            *snapshot != before
        });

        fresh
    }
}

fn require_email(email: &str) -> AuthResult<&str> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AuthError::InvalidInput("Email is required".to_string()));
    }
    Ok(email)
}

fn require_password(password: &str) -> AuthResult<()> {
    if password.is_empty() {
        return Err(AuthError::InvalidInput("Password is required".to_string()));
    }
    Ok(())
}
