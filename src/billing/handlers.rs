//! Billing HTTP handlers

use crate::auth::{AuthSession, AuthUser};
use crate::billing::Catalog;
use crate::error::StudySphereError;
use crate::server::{ApiError, AppState};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Contact details sent along with a customer id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerData {
    /// Display name
    pub name: String,
    /// Email, when known
    pub email: Option<String>,
}

/// Billing identity of a signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerIdentity {
    /// Billing customer id (the auth user id)
    pub customer_id: String,
    /// Contact details
    pub customer_data: CustomerData,
}

impl CustomerIdentity {
    /// Derive the identity from an auth user
    ///
    /// The name falls back to the email local part, then to `"User"`.
    ///
    /// # Examples
    ///
    /// ```
    /// use studysphere::auth::AuthUser;
    /// use studysphere::billing::CustomerIdentity;
    ///
    /// let user = AuthUser { id: "u1".into(), email: Some("ada@uni.edu".into()), name: None };
    /// assert_eq!(CustomerIdentity::from_user(&user).customer_data.name, "ada");
    /// ```
    pub fn from_user(user: &AuthUser) -> Self {
        let name = user
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| {
                user.email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "User".to_string());

        Self {
            customer_id: user.id.clone(),
            customer_data: CustomerData {
                name,
                email: user.email.clone(),
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachBody {
    #[serde(default)]
    customer_id: Option<String>,
    #[serde(default)]
    product_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeBody {
    #[serde(default)]
    product_id: Option<String>,
}

fn parse_body<T: for<'de> Deserialize<'de>>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request("INVALID_BODY", format!("Invalid request body: {}", e)))
}

fn required(value: Option<String>, code: &'static str, message: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(code, message))
}

fn billing_error(err: anyhow::Error) -> ApiError {
    match err.downcast_ref::<StudySphereError>() {
        Some(StudySphereError::MissingApiKey(_)) => {
            ApiError::MissingApiKey("Autumn API key not configured".to_string())
        }
        Some(StudySphereError::Upstream { status, payload }) => ApiError::Upstream {
            status: *status,
            body: json!({
                "error": "Failed to attach product via Autumn API",
                "code": "AUTUMN_API_ERROR",
                "status": status,
                "details": payload,
            }),
        },
        _ => ApiError::Failed {
            code: "AUTUMN_API_ERROR",
            message: format!("Failed to attach product to customer: {}", err),
        },
    }
}

async fn attach_product(
    state: &AppState,
    customer_id: String,
    product_id: String,
) -> Result<Json<Value>, ApiError> {
    if state.catalog.product(&product_id).is_none() {
        tracing::warn!(product_id = %product_id, "Attaching product not in local catalog");
    }

    let result = state
        .billing
        .attach(&customer_id, &product_id)
        .await
        .map_err(billing_error)?;

    tracing::info!(customer_id = %customer_id, product_id = %product_id, "Product attached");

    Ok(Json(json!({
        "success": true,
        "customerId": customer_id,
        "productId": product_id,
        "result": result,
    })))
}

async fn signed_in(state: &AppState, headers: &HeaderMap) -> Result<AuthSession, ApiError> {
    let unauthenticated = || ApiError::Unauthorized {
        code: "UNAUTHENTICATED",
        message: "Sign in required".to_string(),
    };
    match state.auth.get_session(headers).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(unauthenticated()),
        Err(e) => {
            tracing::warn!("Session lookup failed: {:#}", e);
            Err(unauthenticated())
        }
    }
}

/// Handle `POST /api/autumn/attach`
pub async fn handle_attach(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body: AttachBody = parse_body(&body)?;
    let customer_id = required(body.customer_id, "MISSING_CUSTOMER_ID", "Customer ID is required")?;
    let product_id = required(body.product_id, "MISSING_PRODUCT_ID", "Product ID is required")?;
    attach_product(&state, customer_id, product_id).await
}

/// Handle `POST /api/autumn/subscribe` for the signed-in user
pub async fn handle_subscribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let session = signed_in(&state, &headers).await?;
    let body: SubscribeBody = parse_body(&body)?;
    let product_id = required(body.product_id, "MISSING_PRODUCT_ID", "Product ID is required")?;
    let identity = CustomerIdentity::from_user(&session.user);
    attach_product(&state, identity.customer_id, product_id).await
}

/// Handle `GET /api/autumn/customer`
pub async fn handle_customer(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CustomerIdentity>, ApiError> {
    let session = signed_in(&state, &headers).await?;
    Ok(Json(CustomerIdentity::from_user(&session.user)))
}

/// Handle `GET /api/billing/catalog`
pub async fn handle_catalog(State(state): State<AppState>) -> Json<Catalog> {
    Json(state.catalog.as_ref().clone())
}
