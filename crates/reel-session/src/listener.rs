//! Event reconciliation listener.
//!
//! Subscribes to the provider's auth events for the lifetime of the process
//! and turns them into store transitions:
//!
//! - `SIGNED_IN`, `TOKEN_REFRESHED` → full re-derive (re-fetches the profile,
//!   the token may now belong to a different account)
//! - `SIGNED_OUT` → direct reset to anonymous, no round-trip
//! - everything else is ignored

use crate::{AuthEvent, AuthEventKind, AuthEventStream, AuthResult, SessionStore};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What the store should do for a given event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Re-run the session check and profile fetch.
    Rederive,
    /// Drop to the anonymous snapshot without I/O.
    ResetAnonymous,
    Ignore,
}

/// Reconciliation policy for a provider event.
pub fn reconcile_action(kind: AuthEventKind) -> ReconcileAction {
    match kind {
        AuthEventKind::SignedIn | AuthEventKind::TokenRefreshed => ReconcileAction::Rederive,
        AuthEventKind::SignedOut => ReconcileAction::ResetAnonymous,
        AuthEventKind::InitialSession
        | AuthEventKind::UserUpdated
        | AuthEventKind::PasswordRecovery => ReconcileAction::Ignore,
    }
}

/// Spawns the background task that feeds provider events into a store.
pub struct ReconciliationListener;

impl ReconciliationListener {
    /// Subscribe to the store's provider and start reconciling.
    ///
    /// A store accepts a single listener; a second call fails with
    /// `PreconditionFailed`. Must be called from within a tokio runtime.
    pub fn spawn(store: Arc<SessionStore>) -> AuthResult<ListenerHandle> {
        store.claim_listener()?;
        let events = store.provider().subscribe();
        let (stop_tx, stop_rx) = oneshot::channel();

        let task = tokio::spawn(run(store, events, stop_rx));

        Ok(ListenerHandle {
            stop: Some(stop_tx),
            task: Some(task),
        })
    }
}

/// Owns the running listener. Dropping it aborts the task.
pub struct ListenerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Stop the listener and wait for the task to exit.
    ///
    /// An event being applied when the stop arrives is finished first.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                if !error.is_cancelled() {
                    warn!(error = %error, "Auth event listener task failed");
                }
            }
        }
    }

    /// True once the task has exited (stream closed or stopped).
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    store: Arc<SessionStore>,
    mut events: AuthEventStream,
    mut stop: oneshot::Receiver<()>,
) {
    info!("Auth event listener started");

    loop {
        tokio::select! {
            _ = &mut stop => {
                debug!("Auth event listener stopping");
                break;
            }
            received = events.recv() => match received {
                Ok(event) => apply(&store, &event).await,
                Err(RecvError::Lagged(skipped)) => {
                    // Missed events cannot be replayed; re-derive from the provider.
                    warn!(skipped, "Auth event listener lagged, re-deriving session");
                    store.initialize().await;
                }
                Err(RecvError::Closed) => {
                    info!("Auth event stream closed");
                    break;
                }
            }
        }
    }
}

async fn apply(store: &SessionStore, event: &AuthEvent) {
    let action = reconcile_action(event.kind);
    debug!(
        kind = ?event.kind,
        action = ?action,
        has_session = event.session.is_some(),
        "Auth event received"
    );

    match action {
        ReconcileAction::Rederive => store.initialize().await,
        ReconcileAction::ResetAnonymous => store.reconcile_signed_out(),
        ReconcileAction::Ignore => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_and_refresh_rederive() {
        assert_eq!(
            reconcile_action(AuthEventKind::SignedIn),
            ReconcileAction::Rederive
        );
        assert_eq!(
            reconcile_action(AuthEventKind::TokenRefreshed),
            ReconcileAction::Rederive
        );
    }

    #[test]
    fn test_sign_out_resets_without_fetch() {
        assert_eq!(
            reconcile_action(AuthEventKind::SignedOut),
            ReconcileAction::ResetAnonymous
        );
    }

    #[test]
    fn test_other_events_ignored() {
        for kind in [
            AuthEventKind::InitialSession,
            AuthEventKind::UserUpdated,
            AuthEventKind::PasswordRecovery,
        ] {
            assert_eq!(reconcile_action(kind), ReconcileAction::Ignore);
        }
    }
}
