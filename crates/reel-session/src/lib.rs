//! Client-side session and identity state for ReelApps.
//!
//! This crate provides:
//! - A typed data model for users, profiles and provider sessions
//! - Capability traits for the identity provider and the profile store
//! - `SessionStore`, the single owner of the session snapshot, which serializes
//!   user-initiated operations and externally pushed auth events
//! - `ReconciliationListener`, which feeds provider auth events back into the store

mod error;
mod listener;
mod model;
mod provider;
mod store;

pub use error::{AuthError, AuthResult};
pub use listener::{reconcile_action, ListenerHandle, ReconcileAction, ReconciliationListener};
pub use model::{
    ErrorInfo, NewProfile, Profile, ProfilePatch, ProfileSeed, ProviderSession, Role,
    SessionSnapshot, User,
};
pub use provider::{
    AuthEvent, AuthEventKind, AuthEventStream, AuthProvider, ProfileRepository, SignUpOutcome,
};
pub use store::SessionStore;
