//! PostgREST-backed profile repository.

use crate::client::{check_response, error_message, transport_error, SupabaseClient};
use crate::storage::SessionStorage;
use async_trait::async_trait;
use reel_session::{AuthError, AuthResult, NewProfile, Profile, ProfilePatch, ProfileRepository};
use reqwest::{Method, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};

const TABLE: &str = "profiles";

fn user_filter(user_id: &str) -> String {
    format!("eq.{}", user_id)
}

fn read_error(status: StatusCode, body: &str) -> AuthError {
    AuthError::ProviderUnavailable {
        message: error_message(body).unwrap_or_else(|| format!("Profile fetch failed ({})", status)),
        status: Some(status.as_u16()),
    }
}

fn write_error(status: StatusCode, body: &str) -> AuthError {
    let detail = error_message(body).unwrap_or_else(|| status.to_string());
    AuthError::ProfileWriteFailed(detail)
}

/// Columns sent on update; identity columns are never rewritten.
fn update_body(patch: &ProfilePatch) -> AuthResult<serde_json::Value> {
    let mut body = serde_json::to_value(patch)
        .map_err(|e| AuthError::InvalidInput(format!("Invalid profile data: {}", e)))?;
    if let Some(columns) = body.as_object_mut() {
        columns.remove("id");
        columns.remove("user_id");
    }
    Ok(body)
}

/// [`ProfileRepository`] over the `profiles` table.
pub struct SupabaseProfiles {
    client: SupabaseClient,
    storage: Arc<dyn SessionStorage>,
}

impl SupabaseProfiles {
    /// Requests are authorized with the stored session's access token, so
    /// share the storage instance with [`crate::SupabaseAuth`].
    pub fn new(client: SupabaseClient, storage: Arc<dyn SessionStorage>) -> Self {
        Self { client, storage }
    }

    fn bearer(&self) -> String {
        match self.storage.load() {
            Ok(Some(session)) => session.access_token,
            Ok(None) => self.client.anon_key().to_string(),
            Err(e) => {
                warn!(error = %e, "Stored session unreadable, using anon key");
                self.client.anon_key().to_string()
            }
        }
    }
}

#[async_trait]
impl ProfileRepository for SupabaseProfiles {
    async fn get(&self, user_id: &str) -> AuthResult<Option<Profile>> {
        debug!(user_id = %user_id, "Fetching profile");
        let user_id_filter = user_filter(user_id);
        let response = self
            .client
            .rest(Method::GET, TABLE, &self.bearer())
            .query(&[
                ("user_id", user_id_filter.as_str()),
                ("select", "*"),
                ("limit", "1"),
            ])
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_response(response, "Profile fetch", read_error).await?;

        let rows: Vec<Profile> = response.json().await.map_err(transport_error)?;
        Ok(rows.into_iter().next())
    }

    async fn create(&self, profile: &NewProfile) -> AuthResult<Profile> {
        debug!(user_id = %profile.user_id, role = %profile.seed.role, "Creating profile");
        let response = self
            .client
            .rest(Method::POST, TABLE, &self.bearer())
            .header("Prefer", "return=representation")
            .json(profile)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_response(response, "Profile create", write_error).await?;

        let rows: Vec<Profile> = response.json().await.map_err(transport_error)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AuthError::ProfileWriteFailed("No row returned".to_string()))
    }

    async fn update(&self, user_id: &str, patch: &ProfilePatch) -> AuthResult<ProfilePatch> {
        let body = update_body(patch)?;
        let user_id_filter = user_filter(user_id);
        debug!(user_id = %user_id, "Updating profile");

        let response = self
            .client
            .rest(Method::PATCH, TABLE, &self.bearer())
            .query(&[("user_id", user_id_filter.as_str())])
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_response(response, "Profile update", write_error).await?;

        // PostgREST answers an update matching nothing with an empty array.
        let rows: Vec<ProfilePatch> = response.json().await.map_err(transport_error)?;
        rows.into_iter().next().ok_or(AuthError::ProfileNotFound)
    }
}
