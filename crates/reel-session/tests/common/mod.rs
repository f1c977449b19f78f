#![allow(dead_code)]

use async_trait::async_trait;
use reel_session::{
    AuthError, AuthEvent, AuthEventKind, AuthEventStream, AuthProvider, AuthResult, NewProfile,
    Profile, ProfilePatch, ProfileRepository, ProviderSession, Role, SessionStore, SignUpOutcome,
    User,
};
use serde_json::Map;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, Notify};

/// Pauses a mock call until the test releases it.
#[derive(Default)]
pub struct Gate {
    reached: Notify,
    release: Notify,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wait until a call is parked on this gate.
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    /// Let the parked call continue.
    pub fn open(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        self.reached.notify_one();
        self.release.notified().await;
    }
}

pub fn session_for(user_id: &str, email: &str) -> ProviderSession {
    ProviderSession {
        access_token: format!("access-{}", user_id),
        refresh_token: format!("refresh-{}", user_id),
        token_type: "bearer".to_string(),
        expires_at: None,
        user: User::new(user_id, email),
    }
}

pub fn profile_for(user_id: &str, first: Option<&str>, last: Option<&str>) -> Profile {
    Profile {
        id: format!("profile-{}", user_id),
        user_id: user_id.to_string(),
        role: Role::Candidate,
        first_name: first.map(str::to_string),
        last_name: last.map(str::to_string),
        extra: Map::new(),
    }
}

/// In-memory identity provider.
pub struct MockProvider {
    /// email -> (password, user)
    accounts: Mutex<HashMap<String, (String, User)>>,
    current: Mutex<Option<ProviderSession>>,
    get_session_error: Mutex<Option<AuthError>>,
    sign_out_error: Mutex<Option<AuthError>>,
    reset_error: Mutex<Option<AuthError>>,
    sign_in_gate: Mutex<Option<Arc<Gate>>>,
    signup_signs_in: Mutex<bool>,
    reset_requests: Mutex<Vec<String>>,
    signup_metadata: Mutex<Vec<Option<serde_json::Value>>>,
    events: broadcast::Sender<AuthEvent>,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            accounts: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            get_session_error: Mutex::new(None),
            sign_out_error: Mutex::new(None),
            reset_error: Mutex::new(None),
            sign_in_gate: Mutex::new(None),
            signup_signs_in: Mutex::new(false),
            reset_requests: Mutex::new(Vec::new()),
            signup_metadata: Mutex::new(Vec::new()),
            events,
        })
    }

    pub fn add_account(&self, user_id: &str, email: &str, password: &str) {
        self.accounts.lock().unwrap().insert(
            email.to_string(),
            (password.to_string(), User::new(user_id, email)),
        );
    }

    pub fn set_current(&self, session: Option<ProviderSession>) {
        *self.current.lock().unwrap() = session;
    }

    pub fn fail_get_session(&self, error: AuthError) {
        *self.get_session_error.lock().unwrap() = Some(error);
    }

    pub fn fail_sign_out(&self, error: AuthError) {
        *self.sign_out_error.lock().unwrap() = Some(error);
    }

    pub fn fail_reset(&self, error: AuthError) {
        *self.reset_error.lock().unwrap() = Some(error);
    }

    pub fn gate_sign_in(&self, gate: Arc<Gate>) {
        *self.sign_in_gate.lock().unwrap() = Some(gate);
    }

    pub fn signup_signs_in(&self, value: bool) {
        *self.signup_signs_in.lock().unwrap() = value;
    }

    pub fn reset_requests(&self) -> Vec<String> {
        self.reset_requests.lock().unwrap().clone()
    }

    pub fn signup_metadata(&self) -> Vec<Option<serde_json::Value>> {
        self.signup_metadata.lock().unwrap().clone()
    }

    pub fn emit(&self, kind: AuthEventKind) {
        let session = self.current.lock().unwrap().clone();
        let _ = self.events.send(AuthEvent::new(kind, session));
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

#[async_trait]
impl AuthProvider for MockProvider {
    async fn get_session(&self) -> AuthResult<Option<ProviderSession>> {
        if let Some(error) = self.get_session_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.current.lock().unwrap().clone())
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<ProviderSession> {
        let gate = self.sign_in_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }

        let account = self.accounts.lock().unwrap().get(email).cloned();
        match account {
            Some((expected, user)) if expected == password => {
                let session = session_for(&user.id, &user.email);
                *self.current.lock().unwrap() = Some(session.clone());
                Ok(session)
            }
            _ => Err(AuthError::CredentialsRejected {
                message: "Invalid login credentials".to_string(),
                status: Some(400),
            }),
        }
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Option<serde_json::Value>,
    ) -> AuthResult<SignUpOutcome> {
        self.signup_metadata.lock().unwrap().push(metadata);
        if self.accounts.lock().unwrap().contains_key(email) {
            return Err(AuthError::CredentialsRejected {
                message: "User already registered".to_string(),
                status: Some(422),
            });
        }
        let user_id = format!("user-{}", self.accounts.lock().unwrap().len() + 1);
        self.add_account(&user_id, email, password);
        let user = User::new(&user_id, email);

        let session = if *self.signup_signs_in.lock().unwrap() {
            let session = session_for(&user_id, email);
            *self.current.lock().unwrap() = Some(session.clone());
            Some(session)
        } else {
            None
        };
        Ok(SignUpOutcome { user, session })
    }

    async fn sign_out(&self) -> AuthResult<()> {
        if let Some(error) = self.sign_out_error.lock().unwrap().clone() {
            return Err(error);
        }
        *self.current.lock().unwrap() = None;
        Ok(())
    }

    async fn request_password_reset(&self, email: &str) -> AuthResult<()> {
        if let Some(error) = self.reset_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.reset_requests.lock().unwrap().push(email.to_string());
        Ok(())
    }

    fn subscribe(&self) -> AuthEventStream {
        self.events.subscribe()
    }
}

/// In-memory profile table.
pub struct MockProfiles {
    rows: Mutex<HashMap<String, Profile>>,
    get_error: Mutex<Option<AuthError>>,
    create_error: Mutex<Option<AuthError>>,
    update_error: Mutex<Option<AuthError>>,
    /// When set, `update` echoes this instead of the full row.
    update_echo: Mutex<Option<ProfilePatch>>,
    get_gate: Mutex<Option<Arc<Gate>>>,
    /// Gates that only park lookups for one user.
    user_gates: Mutex<HashMap<String, Arc<Gate>>>,
    get_calls: Mutex<usize>,
    created: Mutex<Vec<NewProfile>>,
}

impl MockProfiles {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(HashMap::new()),
            get_error: Mutex::new(None),
            create_error: Mutex::new(None),
            update_error: Mutex::new(None),
            update_echo: Mutex::new(None),
            get_gate: Mutex::new(None),
            user_gates: Mutex::new(HashMap::new()),
            get_calls: Mutex::new(0),
            created: Mutex::new(Vec::new()),
        })
    }

    pub fn insert(&self, profile: Profile) {
        self.rows
            .lock()
            .unwrap()
            .insert(profile.user_id.clone(), profile);
    }

    pub fn fail_get(&self, error: AuthError) {
        *self.get_error.lock().unwrap() = Some(error);
    }

    pub fn fail_create(&self, error: AuthError) {
        *self.create_error.lock().unwrap() = Some(error);
    }

    pub fn fail_update(&self, error: AuthError) {
        *self.update_error.lock().unwrap() = Some(error);
    }

    pub fn echo_on_update(&self, patch: ProfilePatch) {
        *self.update_echo.lock().unwrap() = Some(patch);
    }

    pub fn gate_get(&self, gate: Arc<Gate>) {
        *self.get_gate.lock().unwrap() = Some(gate);
    }

    pub fn gate_get_for(&self, user_id: &str, gate: Arc<Gate>) {
        self.user_gates
            .lock()
            .unwrap()
            .insert(user_id.to_string(), gate);
    }

    pub fn clear_gate(&self) {
        *self.get_gate.lock().unwrap() = None;
    }

    /// Number of `get` calls so far.
    pub fn get_calls(&self) -> usize {
        *self.get_calls.lock().unwrap()
    }

    pub fn created(&self) -> Vec<NewProfile> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileRepository for MockProfiles {
    async fn get(&self, user_id: &str) -> AuthResult<Option<Profile>> {
        *self.get_calls.lock().unwrap() += 1;
        let gate = self.get_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        let user_gate = self.user_gates.lock().unwrap().get(user_id).cloned();
        if let Some(gate) = user_gate {
            gate.pass().await;
        }
        if let Some(error) = self.get_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.rows.lock().unwrap().get(user_id).cloned())
    }

    async fn create(&self, profile: &NewProfile) -> AuthResult<Profile> {
        self.created.lock().unwrap().push(profile.clone());
        if let Some(error) = self.create_error.lock().unwrap().clone() {
            return Err(error);
        }
        let row = Profile {
            id: format!("profile-{}", profile.user_id),
            user_id: profile.user_id.clone(),
            role: profile.seed.role,
            first_name: profile.seed.first_name.clone(),
            last_name: profile.seed.last_name.clone(),
            extra: profile.seed.extra.clone(),
        };
        self.insert(row.clone());
        Ok(row)
    }

    async fn update(&self, user_id: &str, patch: &ProfilePatch) -> AuthResult<ProfilePatch> {
        if let Some(error) = self.update_error.lock().unwrap().clone() {
            return Err(error);
        }
        let mut rows = self.rows.lock().unwrap();
        let row = rows.remove(user_id).ok_or(AuthError::ProfileNotFound)?;
        let merged = row.merge(patch);
        rows.insert(user_id.to_string(), merged);

        Ok(self
            .update_echo
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| patch.clone()))
    }
}

pub fn store_with(provider: &Arc<MockProvider>, profiles: &Arc<MockProfiles>) -> Arc<SessionStore> {
    Arc::new(SessionStore::new(provider.clone(), profiles.clone()))
}

/// Panics if the snapshot breaks the authentication invariant.
pub fn assert_consistent(store: &SessionStore) {
    let snapshot = store.snapshot();
    if snapshot.is_authenticated {
        assert!(snapshot.user.is_some(), "authenticated without a user");
        assert!(snapshot.session.is_some(), "authenticated without a session");
    } else {
        assert!(snapshot.user.is_none(), "user present while not authenticated");
    }
}
