//! Ordering between user operations and provider events.

mod common;

use common::*;
use reel_session::{AuthError, AuthEventKind, ReconciliationListener, SessionSnapshot, SessionStore};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;

async fn wait_until<F>(store: &SessionStore, predicate: F)
where
    F: Fn(&SessionSnapshot) -> bool,
{
    let mut rx = store.subscribe();
    timeout(Duration::from_secs(2), rx.wait_for(|s| predicate(s)))
        .await
        .expect("timed out waiting for snapshot")
        .expect("snapshot channel closed");
}

// =============================================================================
// Stale completions
// =============================================================================

#[tokio::test]
async fn test_sign_out_event_beats_in_flight_login() {
    let provider = MockProvider::new();
    provider.add_account("u-2", "b@x.com", "pw");
    let gate = Gate::new();
    provider.gate_sign_in(gate.clone());
    let store = store_with(&provider, &MockProfiles::new());
    store.initialize().await;

    let login = {
        let store = store.clone();
        tokio::spawn(async move { store.login("b@x.com", "pw").await })
    };
    gate.reached().await;

    // Provider announces a sign-out while the login is still pending.
    store.reconcile_signed_out();
    gate.open();

    // The superseded login still reports success to its caller.
    login.await.unwrap().unwrap();

    let snapshot = store.snapshot();
    assert!(!snapshot.is_authenticated);
    assert!(snapshot.user.is_none());
    assert!(!snapshot.is_loading);
    assert_consistent(&store);
}

#[tokio::test]
async fn test_logout_beats_slower_rederive() {
    let provider = MockProvider::new();
    let profiles = MockProfiles::new();
    provider.set_current(Some(session_for("u-1", "a@x.com")));
    profiles.insert(profile_for("u-1", Some("Ada"), None));
    let store = store_with(&provider, &profiles);
    store.initialize().await;
    assert!(store.snapshot().is_authenticated);

    let gate = Gate::new();
    profiles.gate_get(gate.clone());
    let rederive = {
        let store = store.clone();
        tokio::spawn(async move { store.initialize().await })
    };
    gate.reached().await;

    store.logout().await;
    gate.open();
    rederive.await.unwrap();

    let snapshot = store.snapshot();
    assert!(!snapshot.is_authenticated);
    assert!(snapshot.profile.is_none());
    assert_consistent(&store);
}

#[tokio::test]
async fn test_failed_stale_login_does_not_touch_newer_state() {
    let provider = MockProvider::new();
    provider.add_account("u-1", "a@x.com", "pw");
    let gate = Gate::new();
    provider.gate_sign_in(gate.clone());
    let store = store_with(&provider, &MockProfiles::new());
    store.initialize().await;

    let login = {
        let store = store.clone();
        tokio::spawn(async move { store.login("a@x.com", "wrong").await })
    };
    gate.reached().await;
    store.reconcile_signed_out();
    gate.open();

    let err = login.await.unwrap().unwrap_err();
    assert!(matches!(err, AuthError::CredentialsRejected { .. }));
    // The rejection is returned to the caller but lands after a newer write.
    let snapshot = store.snapshot();
    assert!(snapshot.error.is_none());
    assert!(!snapshot.is_loading);
}

#[tokio::test]
async fn test_concurrent_operations_keep_loading_until_last_finishes() {
    let provider = MockProvider::new();
    provider.add_account("u-1", "a@x.com", "pw");
    let gate = Gate::new();
    provider.gate_sign_in(gate.clone());
    let store = store_with(&provider, &MockProfiles::new());
    store.initialize().await;

    let login = {
        let store = store.clone();
        tokio::spawn(async move { store.login("a@x.com", "pw").await })
    };
    gate.reached().await;

    store.send_password_reset_email("a@x.com").await.unwrap();
    assert!(store.snapshot().is_loading, "login still pending");

    gate.open();
    login.await.unwrap().unwrap();
    assert!(!store.snapshot().is_loading);
}

#[tokio::test]
async fn test_concurrent_logins_commit_one_account_in_full() {
    let provider = MockProvider::new();
    let profiles = MockProfiles::new();
    provider.add_account("u-a", "a@x.com", "pw-a");
    provider.add_account("u-b", "b@x.com", "pw-b");
    profiles.insert(profile_for("u-a", Some("Ada"), None));
    profiles.insert(profile_for("u-b", Some("Bea"), None));
    let store = store_with(&provider, &profiles);
    store.initialize().await;

    let gate_a = Gate::new();
    let gate_b = Gate::new();
    profiles.gate_get_for("u-a", gate_a.clone());
    profiles.gate_get_for("u-b", gate_b.clone());

    let first = {
        let store = store.clone();
        tokio::spawn(async move { store.login("a@x.com", "pw-a").await })
    };
    gate_a.reached().await;
    let second = {
        let store = store.clone();
        tokio::spawn(async move { store.login("b@x.com", "pw-b").await })
    };
    gate_b.reached().await;

    // The later login finishes first, the earlier one lands afterwards.
    gate_b.open();
    second.await.unwrap().unwrap();
    assert_eq!(store.snapshot().user_id(), Some("u-b"));
    assert!(store.snapshot().is_loading);

    gate_a.open();
    first.await.unwrap().unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.user_id(), Some("u-b"));
    assert_eq!(
        snapshot.session.as_ref().map(|s| s.user.id.as_str()),
        Some("u-b")
    );
    assert_eq!(
        snapshot.profile.as_ref().map(|p| p.user_id.as_str()),
        Some("u-b")
    );
    assert!(!snapshot.is_loading);
    assert_consistent(&store);
}

#[tokio::test]
async fn test_is_initializing_flips_once_under_concurrent_startup() {
    let provider = MockProvider::new();
    let profiles = MockProfiles::new();
    provider.set_current(Some(session_for("u-1", "a@x.com")));
    profiles.insert(profile_for("u-1", Some("Ada"), None));
    let gate = Gate::new();
    profiles.gate_get(gate.clone());
    let store = store_with(&provider, &profiles);

    let history = Arc::new(Mutex::new(vec![store.snapshot()]));
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let recorder = {
        let mut rx = store.subscribe();
        let history = history.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let value = rx.borrow_and_update().clone();
                        history.lock().unwrap().push(value);
                    }
                }
            }
        })
    };

    // Startup parks in the profile lookup for u-1.
    let startup = {
        let store = store.clone();
        tokio::spawn(async move { store.initialize().await })
    };
    gate.reached().await;
    assert!(store.snapshot().is_initializing);

    // Signed out elsewhere while the startup check is still pending.
    provider.set_current(None);
    store.reconcile_signed_out();
    let snapshot = store.snapshot();
    assert!(snapshot.is_initializing);
    assert!(!snapshot.is_authenticated);

    let second = {
        let store = store.clone();
        tokio::spawn(async move { store.initialize().await })
    };
    tokio::task::yield_now().await;

    profiles.clear_gate();
    gate.open();
    startup.await.unwrap();
    second.await.unwrap();

    let snapshot = store.snapshot();
    assert!(!snapshot.is_initializing);
    assert!(!snapshot.is_authenticated);
    assert!(snapshot.profile.is_none());
    assert_consistent(&store);

    // Later traffic never brings the flag back.
    store.reconcile_signed_out();
    store.initialize().await;
    assert!(!store.snapshot().is_initializing);

    let _ = stop_tx.send(());
    recorder.await.unwrap();
    let mut history = history.lock().unwrap().clone();
    history.push(store.snapshot());

    let flips = history
        .windows(2)
        .filter(|pair| pair[0].is_initializing && !pair[1].is_initializing)
        .count();
    assert_eq!(flips, 1);
    assert!(history
        .windows(2)
        .all(|pair| pair[0].is_initializing || !pair[1].is_initializing));
    // The startup check's identity was stale and never published.
    assert!(history.iter().all(|s| s.user.is_none()));
}

// =============================================================================
// Listener
// =============================================================================

#[tokio::test]
async fn test_listener_rederives_on_sign_in() {
    let provider = MockProvider::new();
    let profiles = MockProfiles::new();
    profiles.insert(profile_for("u-1", Some("Ada"), None));
    let store = store_with(&provider, &profiles);
    store.initialize().await;

    let handle = ReconciliationListener::spawn(store.clone()).unwrap();

    // Sign-in that happened outside this store, e.g. in another tab.
    provider.set_current(Some(session_for("u-1", "a@x.com")));
    provider.emit(AuthEventKind::SignedIn);

    wait_until(&store, |s| s.is_authenticated).await;
    let snapshot = store.snapshot();
    assert_eq!(snapshot.user_id(), Some("u-1"));
    assert!(snapshot.profile.is_some());
    assert_consistent(&store);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_listener_resets_on_sign_out() {
    let provider = MockProvider::new();
    provider.set_current(Some(session_for("u-1", "a@x.com")));
    let store = store_with(&provider, &MockProfiles::new());
    store.initialize().await;

    let handle = ReconciliationListener::spawn(store.clone()).unwrap();
    provider.emit(AuthEventKind::SignedOut);

    wait_until(&store, |s| !s.is_authenticated).await;
    assert!(store.snapshot().session.is_none());

    handle.shutdown().await;
}

#[tokio::test]
async fn test_listener_ignores_other_events() {
    let provider = MockProvider::new();
    let profiles = MockProfiles::new();
    provider.set_current(Some(session_for("u-1", "a@x.com")));
    let store = store_with(&provider, &profiles);
    store.initialize().await;
    let fetches = profiles.get_calls();

    let handle = ReconciliationListener::spawn(store.clone()).unwrap();
    provider.emit(AuthEventKind::UserUpdated);
    provider.emit(AuthEventKind::PasswordRecovery);
    provider.emit(AuthEventKind::InitialSession);
    // Events are applied in order, so once this one lands the others were handled.
    provider.emit(AuthEventKind::SignedOut);

    wait_until(&store, |s| !s.is_authenticated).await;
    // None of the ignored events re-derived the session.
    assert_eq!(profiles.get_calls(), fetches);
    let snapshot = store.snapshot();
    assert!(snapshot.error.is_none());
    assert!(!snapshot.is_loading);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_listener_attaches_once() {
    let provider = MockProvider::new();
    let store = store_with(&provider, &MockProfiles::new());

    let first = ReconciliationListener::spawn(store.clone()).unwrap();
    let second = ReconciliationListener::spawn(store.clone());

    assert!(matches!(second, Err(AuthError::PreconditionFailed(_))));
    assert_eq!(provider.subscriber_count(), 1);
    first.shutdown().await;
}

#[tokio::test]
async fn test_listener_shutdown_unsubscribes() {
    let provider = MockProvider::new();
    let store = store_with(&provider, &MockProfiles::new());

    let handle = ReconciliationListener::spawn(store.clone()).unwrap();
    assert_eq!(provider.subscriber_count(), 1);

    handle.shutdown().await;
    assert_eq!(provider.subscriber_count(), 0);
}

#[tokio::test]
async fn test_listener_drop_aborts_task() {
    let provider = MockProvider::new();
    let store = store_with(&provider, &MockProfiles::new());

    let handle = ReconciliationListener::spawn(store.clone()).unwrap();
    assert!(!handle.is_finished());
    drop(handle);

    timeout(Duration::from_secs(2), async {
        while provider.subscriber_count() > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("listener never unsubscribed");
}

#[tokio::test]
async fn test_listener_lag_triggers_rederive() {
    let provider = MockProvider::new();
    let store = store_with(&provider, &MockProfiles::new());
    store.initialize().await;

    let handle = ReconciliationListener::spawn(store.clone()).unwrap();

    // Overflow the channel before the listener gets to run. Every one of
    // these is ignorable, so only the lag recovery can pick up the session.
    provider.set_current(Some(session_for("u-1", "a@x.com")));
    for _ in 0..64 {
        provider.emit(AuthEventKind::UserUpdated);
    }

    wait_until(&store, |s| s.is_authenticated).await;
    handle.shutdown().await;
}
