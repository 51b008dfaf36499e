//! HTTP server assembly
//!
//! Routes:
//!
//! - `POST /api/chat` chat relay
//! - `GET /api/session` current auth session
//! - `GET /chat`, `/archive`, `/settings` protected pages (307 to login)
//! - `GET /login` login placeholder
//! - `/api/autumn/*`, `/api/billing/catalog` billing glue
//! - `GET /health`

pub mod api_error;

pub use api_error::ApiError;

use crate::auth::{self, AuthProvider, AuthSession};
use crate::billing::{self, AutumnClient, Catalog};
use crate::config::Config;
use crate::error::Result;
use crate::providers::{self, Provider};
use crate::relay;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;

/// Health endpoint path
pub const HEALTH_PATH: &str = "/health";

/// Pages that require a signed-in user
pub const PROTECTED_PAGES: [&str; 3] = ["/chat", "/archive", "/settings"];

/// Whether a path is already routed; the login page cannot use one of these
pub fn is_reserved_path(path: &str) -> bool {
    let fixed = [
        HEALTH_PATH,
        auth::SESSION_PATH,
        relay::CHAT_PATH,
        billing::ATTACH_PATH,
        billing::SUBSCRIBE_PATH,
        billing::CUSTOMER_PATH,
        billing::CATALOG_PATH,
    ];
    PROTECTED_PAGES.contains(&path) || fixed.contains(&path)
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    /// Provider the relay streams through
    pub provider: Arc<dyn Provider>,
    /// Session validation
    pub auth: Arc<dyn AuthProvider>,
    /// Billing API client
    pub billing: Arc<AutumnClient>,
    /// Product catalog
    pub catalog: Arc<Catalog>,
    /// Redirect target for anonymous page requests
    pub login_path: String,
}

impl AppState {
    /// Build the state from configuration
    ///
    /// # Errors
    ///
    /// Returns error if a client cannot be built or the catalog is inconsistent
    pub fn from_config(config: &Config) -> Result<Self> {
        let catalog = Catalog::standard();
        catalog.validate()?;

        Ok(Self {
            provider: providers::create_provider(&config.gemini)?,
            auth: auth::create_auth_provider(&config.auth)?,
            billing: Arc::new(AutumnClient::new(config.billing.clone())?),
            catalog: Arc::new(catalog),
            login_path: config.auth.login_path.clone(),
        })
    }
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

async fn protected_page(
    uri: axum::http::Uri,
    Extension(session): Extension<AuthSession>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "page": uri.path().trim_start_matches('/'),
        "user": session.user,
    }))
}

async fn login_page() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "page": "login" }))
}

/// Build routes for the gated pages
pub fn page_routes(state: AppState) -> Router<AppState> {
    let login_path = state.login_path.clone();
    let mut router = Router::new();
    for page in PROTECTED_PAGES {
        router = router.route(page, get(protected_page));
    }
    router
        .route_layer(middleware::from_fn_with_state(state, auth::require_session))
        .route(&login_path, get(login_page))
}

/// Build the full application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(auth::SESSION_PATH, get(auth::handle_session))
        .merge(relay::routes())
        .merge(billing::routes())
        .merge(page_routes(state.clone()))
        .with_state(state)
}

/// Bind and serve until Ctrl-C
///
/// # Errors
///
/// Returns error if the address cannot be bound or the server fails
pub async fn serve(config: &Config) -> Result<()> {
    let state = AppState::from_config(config)?;

    if config.gemini.require_api_key().is_err() {
        tracing::warn!("GOOGLE_GEMINI_API_KEY is not set; /api/chat will answer MISSING_API_KEY");
    }
    if !state.billing.is_configured() {
        tracing::warn!("AUTUMN_SECRET_KEY is not set; billing routes will answer MISSING_API_KEY");
    }

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    tracing::info!("StudySphere listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
