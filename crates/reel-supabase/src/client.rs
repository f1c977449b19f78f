//! Shared HTTP plumbing for the GoTrue and PostgREST endpoints.

use reel_session::AuthError;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Length and digest of a response body, for logs.
pub(crate) fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Pull the human-readable message out of a GoTrue/PostgREST error body.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .filter(|message| !message.trim().is_empty())
        .map(str::to_string)
}

/// Map a non-success auth response to an `AuthError`.
///
/// 400/401/403/422 are the provider saying no; anything else is an outage.
pub(crate) fn auth_error(status: StatusCode, body: &str) -> AuthError {
    let code = status.as_u16();
    let message = error_message(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Unexpected response")
            .to_string()
    });

    match code {
        400 | 401 | 403 | 422 => AuthError::CredentialsRejected {
            message,
            status: Some(code),
        },
        _ => AuthError::ProviderUnavailable {
            message,
            status: Some(code),
        },
    }
}

/// Map a transport failure (connect, timeout, decode) to an `AuthError`.
pub(crate) fn transport_error(error: reqwest::Error) -> AuthError {
    AuthError::ProviderUnavailable {
        message: error.to_string(),
        status: error.status().map(|s| s.as_u16()),
    }
}

/// Supabase project endpoint plus the anonymous API key.
#[derive(Clone)]
pub struct SupabaseClient {
    http_client: reqwest::Client,
    api_url: String,
    anon_key: String,
}

impl SupabaseClient {
    /// Create a client for a project URL such as `https://xyz.supabase.co`.
    pub fn new(api_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self::with_http_client(reqwest::Client::new(), api_url, anon_key)
    }

    pub fn with_http_client(
        http_client: reqwest::Client,
        api_url: impl Into<String>,
        anon_key: impl Into<String>,
    ) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            api_url,
            anon_key: anon_key.into(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub(crate) fn anon_key(&self) -> &str {
        &self.anon_key
    }

    pub(crate) fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.api_url, path)
    }

    pub(crate) fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, table)
    }

    /// POST to an auth endpoint with the anon key attached.
    pub(crate) fn auth_post(&self, path: &str) -> RequestBuilder {
        self.http_client
            .post(self.auth_url(path))
            .header("apikey", &self.anon_key)
            .header("Content-Type", "application/json")
    }

    /// Request against a PostgREST table, authorized with `bearer`.
    pub(crate) fn rest(
        &self,
        method: reqwest::Method,
        table: &str,
        bearer: &str,
    ) -> RequestBuilder {
        self.http_client
            .request(method, self.rest_url(table))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
            .header("Accept", "application/json")
    }
}

/// Pass a successful response through, otherwise read the body and hand the
/// status to `map`.
pub(crate) async fn check_response(
    response: Response,
    context: &str,
    map: impl FnOnce(StatusCode, &str) -> AuthError,
) -> Result<Response, AuthError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body_summary = summarize_response_body(&body);
    tracing::warn!(status = %status, body_summary = %body_summary, "{} failed", context);
    Err(map(status, &body))
}
