//! Identity, profile and snapshot records.

use crate::AuthError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identity record supplied by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: String,
    /// Provider-supplied fields this crate does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            extra: Map::new(),
        }
    }
}

/// Application role stored on the profile row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Candidate,
    Recruiter,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Candidate => "candidate",
            Role::Recruiter => "recruiter",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "candidate" => Ok(Role::Candidate),
            "recruiter" => Ok(Role::Recruiter),
            "admin" => Ok(Role::Admin),
            other => Err(AuthError::InvalidInput(format!("Unknown role: {}", other))),
        }
    }
}

/// Application record about a user, keyed by `user_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Profile {
    /// Shallow-merge a partial record into this profile.
    ///
    /// Columns present in `patch` override, absent ones are retained. The
    /// identity columns (`id`, `user_id`) never change.
    pub fn merge(mut self, patch: &ProfilePatch) -> Self {
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(first_name) = &patch.first_name {
            self.first_name = first_name.clone();
        }
        if let Some(last_name) = &patch.last_name {
            self.last_name = last_name.clone();
        }
        for (key, value) in &patch.extra {
            self.extra.insert(key.clone(), value.clone());
        }
        self
    }

    /// Display name assembled from the name columns.
    pub fn display_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
            (Some(first), None) => Some(first.clone()),
            (None, Some(last)) => Some(last.clone()),
            (None, None) => None,
        }
    }
}

/// Partial profile record: the input of `update_profile` and the columns the
/// repository echoes back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// `Some(None)` clears the column, `None` leaves it alone.
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<Option<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Distinguish an explicit `null` (`Some(None)`) from a missing key (`None`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ProfilePatch {
    /// True when the patch would not change any column.
    pub fn is_empty(&self) -> bool {
        self.role.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.extra.is_empty()
    }
}

/// Profile fields supplied at signup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSeed {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProfileSeed {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            first_name: None,
            last_name: None,
            extra: Map::new(),
        }
    }
}

/// Row handed to `ProfileRepository::create`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProfile {
    pub user_id: String,
    #[serde(flatten)]
    pub seed: ProfileSeed,
}

/// Opaque provider session handle (token material plus the identity it belongs to).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl ProviderSession {
    /// True when the access token expires within `leeway` of `now`.
    ///
    /// Sessions without an expiry never expire locally.
    pub fn is_expired(&self, now: DateTime<Utc>, leeway: Duration) -> bool {
        self.expires_at
            .map(|expires_at| expires_at - leeway <= now)
            .unwrap_or(false)
    }
}

impl fmt::Debug for ProviderSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSession")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("user", &self.user.id)
            .finish()
    }
}

/// Error as shown to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl From<&AuthError> for ErrorInfo {
    fn from(error: &AuthError) -> Self {
        Self {
            message: error.to_string(),
            status: error.status(),
        }
    }
}

/// The single authoritative view of who is logged in.
///
/// Snapshots are replaced wholesale on every transition; readers never see a
/// half-applied change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub profile: Option<Profile>,
    #[serde(skip_serializing)]
    pub session: Option<ProviderSession>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub is_initializing: bool,
    pub error: Option<ErrorInfo>,
}

impl SessionSnapshot {
    /// Snapshot at process start, before the first session check.
    pub fn initial() -> Self {
        Self {
            user: None,
            profile: None,
            session: None,
            is_authenticated: false,
            is_loading: false,
            is_initializing: true,
            error: None,
        }
    }

    /// True while the UI should show a blocking loader.
    pub fn is_blocking(&self) -> bool {
        self.is_initializing || self.is_loading
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::initial()
    }
}
