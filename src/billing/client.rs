//! Autumn billing API client

use crate::config::BillingConfig;
use crate::error::{Result, StudySphereError};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

/// Thin client for the billing REST API
pub struct AutumnClient {
    client: Client,
    config: BillingConfig,
}

#[derive(Debug, Serialize)]
struct AttachRequest<'a> {
    customer_id: &'a str,
    product_id: &'a str,
}

/// Parse a response body as JSON, wrapping plain text as `{"message": text}`
///
/// # Examples
///
/// ```
/// use studysphere::billing::client::json_or_message;
///
/// assert_eq!(json_or_message(r#"{"ok":true}"#)["ok"], true);
/// assert_eq!(json_or_message("Bad Gateway")["message"], "Bad Gateway");
/// ```
pub fn json_or_message(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::json!({ "message": text }))
}

impl AutumnClient {
    /// Create a billing client
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: BillingConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| StudySphereError::Provider(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    /// Whether a secret key is configured
    pub fn is_configured(&self) -> bool {
        self.config.require_api_key().is_ok()
    }

    /// Attach a product to a customer
    ///
    /// Ids are trimmed before being sent. Returns the upstream body on
    /// success.
    ///
    /// # Errors
    ///
    /// - `StudySphereError::MissingApiKey` when no secret key is configured
    /// - `StudySphereError::Upstream` with the parsed body on non-2xx
    /// - `StudySphereError::Provider` on transport failures
    pub async fn attach(&self, customer_id: &str, product_id: &str) -> Result<Value> {
        let api_key = self.config.require_api_key()?;
        let url = format!("{}/attach", self.config.api_base.trim_end_matches('/'));
        let body = AttachRequest {
            customer_id: customer_id.trim(),
            product_id: product_id.trim(),
        };

        tracing::debug!(
            customer_id = body.customer_id,
            product_id = body.product_id,
            "Attaching product"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| StudySphereError::Provider(format!("Billing request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StudySphereError::Provider(format!("Billing response unreadable: {}", e)))?;
        let result = json_or_message(&text);

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "Billing API error: {}", result);
            return Err(StudySphereError::Upstream {
                status: status.as_u16(),
                payload: result,
            }
            .into());
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_attach_without_key_fails_fast() {
        let client = AutumnClient::new(BillingConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            api_key: None,
        })
        .unwrap();
        assert!(!client.is_configured());
        let err = client.attach("c", "p").await.err().unwrap();
        assert!(matches!(
            err.downcast_ref::<StudySphereError>(),
            Some(StudySphereError::MissingApiKey(_))
        ));
    }

    #[test]
    fn test_attach_request_uses_snake_case() {
        let body = AttachRequest {
            customer_id: "c1",
            product_id: "study_pro",
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            serde_json::json!({"customer_id": "c1", "product_id": "study_pro"})
        );
    }
}
