//! Authentication boundary
//!
//! Identity is delegated to an external provider. The server only asks it
//! whether the current request carries a valid session; everything else
//! (sign-in, sign-up, token refresh) lives with the provider.

use crate::config::AuthConfig;
use crate::error::{Result, StudySphereError};
use crate::server::AppState;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cookie carrying the Supabase access token for browser requests
pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";

/// Session endpoint path
pub const SESSION_PATH: &str = "/api/session";

/// Signed-in user as reported by the auth provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Provider user id, also used as the billing customer id
    pub id: String,
    /// Email address, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name from user metadata, when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Validated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    /// Session owner
    pub user: AuthUser,
}

/// Session validation capability
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolve the session carried by the request headers
    ///
    /// `Ok(None)` means the request is anonymous or its token was rejected.
    ///
    /// # Errors
    ///
    /// Returns `StudySphereError::Authentication` when the provider could
    /// not be asked (transport failure, unexpected status).
    async fn get_session(&self, headers: &HeaderMap) -> Result<Option<AuthSession>>;
}

/// Provider used when no auth backend is configured: nobody is signed in
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuth;

#[async_trait]
impl AuthProvider for NoAuth {
    async fn get_session(&self, _headers: &HeaderMap) -> Result<Option<AuthSession>> {
        Ok(None)
    }
}

/// Supabase-backed session validation via `GET /auth/v1/user`
pub struct SupabaseAuth {
    client: reqwest::Client,
    base_url: String,
    anon_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<serde_json::Value>,
}

impl From<SupabaseUser> for AuthUser {
    fn from(user: SupabaseUser) -> Self {
        let name = user
            .user_metadata
            .as_ref()
            .and_then(|m| m.get("name"))
            .and_then(|n| n.as_str())
            .filter(|n| !n.trim().is_empty())
            .map(str::to_string);
        Self {
            id: user.id,
            email: user.email,
            name,
        }
    }
}

/// Extract the access token from `Authorization: Bearer` or the session cookie
///
/// # Examples
///
/// ```
/// use axum::http::{header, HeaderMap, HeaderValue};
/// use studysphere::auth::access_token;
///
/// let mut headers = HeaderMap::new();
/// headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; sb-access-token=abc"));
/// assert_eq!(access_token(&headers).as_deref(), Some("abc"));
/// ```
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == ACCESS_TOKEN_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

impl SupabaseAuth {
    /// Create a Supabase session validator
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, anon_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| StudySphereError::Authentication(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key,
        })
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    async fn get_session(&self, headers: &HeaderMap) -> Result<Option<AuthSession>> {
        let Some(token) = access_token(headers) else {
            return Ok(None);
        };

        let mut request = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .bearer_auth(&token);
        if let Some(key) = &self.anon_key {
            request = request.header("apikey", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StudySphereError::Authentication(format!("Session lookup failed: {}", e)))?;

        match response.status().as_u16() {
            200..=299 => {
                let user: SupabaseUser = response.json().await.map_err(|e| {
                    StudySphereError::Authentication(format!("Malformed user response: {}", e))
                })?;
                Ok(Some(AuthSession { user: user.into() }))
            }
            401 | 403 => {
                tracing::debug!("Auth provider rejected access token");
                Ok(None)
            }
            status => Err(StudySphereError::Authentication(format!(
                "Auth provider returned HTTP {}",
                status
            ))
            .into()),
        }
    }
}

/// Build the auth provider for the configuration
///
/// # Errors
///
/// Returns error if the Supabase client cannot be built
pub fn create_auth_provider(config: &AuthConfig) -> Result<Arc<dyn AuthProvider>> {
    match config.supabase_url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => {
            tracing::info!("Using Supabase auth at {}", url);
            Ok(Arc::new(SupabaseAuth::new(url, config.anon_key.clone())?))
        }
        None => {
            tracing::warn!("No auth provider configured; protected pages will redirect to login");
            Ok(Arc::new(NoAuth))
        }
    }
}

/// Gate middleware for protected pages
///
/// Anonymous requests and provider failures both redirect (307) to the
/// login path. On success the session is stored as a request extension.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match state.auth.get_session(request.headers()).await {
        Ok(Some(session)) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        Ok(None) => Redirect::temporary(&state.login_path).into_response(),
        Err(e) => {
            tracing::warn!(path = %request.uri().path(), "Session check failed: {:#}", e);
            Redirect::temporary(&state.login_path).into_response()
        }
    }
}

/// Handle `GET /api/session`: the session, or `{}` when there is none
pub async fn handle_session(State(state): State<AppState>, headers: HeaderMap) -> Json<serde_json::Value> {
    match state.auth.get_session(&headers).await {
        Ok(Some(session)) => Json(serde_json::to_value(session).unwrap_or_default()),
        Ok(None) => Json(serde_json::json!({})),
        Err(e) => {
            tracing::warn!("Session lookup failed: {:#}", e);
            Json(serde_json::json!({}))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_access_token_prefers_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok"));
        headers.insert(header::COOKIE, HeaderValue::from_static("sb-access-token=cookie"));
        assert_eq!(access_token(&headers).as_deref(), Some("tok"));
    }

    #[test]
    fn test_access_token_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("other=1; sb-access-token="));
        assert!(access_token(&headers).is_none());
        assert!(access_token(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_supabase_user_name_from_metadata() {
        let user: SupabaseUser = serde_json::from_value(serde_json::json!({
            "id": "u1",
            "email": "ada@example.com",
            "user_metadata": {"name": "Ada"}
        }))
        .unwrap();
        let user = AuthUser::from(user);
        assert_eq!(user.name.as_deref(), Some("Ada"));
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn test_no_auth_is_anonymous() {
        assert!(NoAuth.get_session(&HeaderMap::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_supabase_without_token_skips_request() {
        // Port 9 is discard; any request would fail, so Ok(None) proves no call was made
        let auth = SupabaseAuth::new("http://127.0.0.1:9", None).unwrap();
        assert!(auth.get_session(&HeaderMap::new()).await.unwrap().is_none());
    }

    #[test]
    fn test_create_auth_provider_without_url() {
        assert!(create_auth_provider(&AuthConfig::default()).is_ok());
    }
}
