//! Supabase adapters for the ReelApps session store.
//!
//! - [`SupabaseAuth`]: identity provider over GoTrue (`/auth/v1`)
//! - [`SupabaseProfiles`]: profile repository over PostgREST (`/rest/v1/profiles`)
//! - [`SessionStorage`]: where the adapter keeps the current session
//!
//! Both adapters should share one storage instance so profile requests carry
//! the signed-in user's token.

mod auth;
mod client;
pub mod fsm;
mod profiles;
mod storage;

pub use auth::{RefreshConfig, SupabaseAuth};
pub use client::SupabaseClient;
pub use profiles::SupabaseProfiles;
pub use storage::{FileSessionStorage, MemorySessionStorage, SessionStorage};
