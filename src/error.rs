//! Error types for StudySphere
//!
//! This module defines the domain error type used throughout the library,
//! using `thiserror` for ergonomic error handling. HTTP handlers translate
//! these into JSON bodies via [`crate::server::ApiError`].

use thiserror::Error;

/// Main error type for StudySphere operations
///
/// Covers configuration loading, provider and billing calls, session
/// store operations, and the persistence port.
#[derive(Error, Debug)]
pub enum StudySphereError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A secret required by an outbound call is not configured
    #[error("Missing API key: {0}")]
    MissingApiKey(String),

    /// Provider-related errors (request building, transport)
    #[error("Provider error: {0}")]
    Provider(String),

    /// An upstream API answered with a non-success status
    ///
    /// The payload is kept verbatim so it can be surfaced to the caller.
    #[error("Upstream returned HTTP {status}: {payload}")]
    Upstream {
        /// HTTP status code returned by the upstream API
        status: u16,
        /// Parsed JSON body, or `{"message": <text>}` when the body was not JSON
        payload: serde_json::Value,
    },

    /// Request validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// An image attachment is not a usable data URI
    #[error("Invalid image attachment: {0}")]
    InvalidImage(String),

    /// Session id not present in the store
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// A turn is already streaming into this session
    #[error("Session {0} already has a response in flight")]
    SessionBusy(String),

    /// The relay stream failed mid-turn
    #[error("Stream error: {0}")]
    Stream(String),

    /// Authentication provider errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Persistence port errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for StudySphere operations
///
/// Uses `anyhow::Error` so callers can attach context while still being
/// able to `downcast_ref::<StudySphereError>()` at the HTTP boundary.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = StudySphereError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_missing_api_key_display() {
        let error = StudySphereError::MissingApiKey("GOOGLE_GEMINI_API_KEY".to_string());
        assert_eq!(error.to_string(), "Missing API key: GOOGLE_GEMINI_API_KEY");
    }

    #[test]
    fn test_upstream_error_display() {
        let error = StudySphereError::Upstream {
            status: 429,
            payload: serde_json::json!({"error": "quota"}),
        };
        let s = error.to_string();
        assert!(s.contains("429"));
        assert!(s.contains("quota"));
    }

    #[test]
    fn test_session_busy_display() {
        let error = StudySphereError::SessionBusy("01HX".to_string());
        assert_eq!(
            error.to_string(),
            "Session 01HX already has a response in flight"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: StudySphereError = io_error.into();
        assert!(matches!(error, StudySphereError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let error: StudySphereError = json_error.into();
        assert!(matches!(error, StudySphereError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: StudySphereError = yaml_error.into();
        assert!(matches!(error, StudySphereError::Yaml(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StudySphereError>();
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = StudySphereError::SessionNotFound("abc".to_string()).into();
        assert!(matches!(
            err.downcast_ref::<StudySphereError>(),
            Some(StudySphereError::SessionNotFound(id)) if id == "abc"
        ));
    }
}
