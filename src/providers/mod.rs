//! Provider module for StudySphere
//!
//! This module contains the generative-AI provider abstraction and the
//! Google Gemini implementation the relay streams through.

pub mod base;
pub mod gemini;

pub use base::{ChatRequest, DeltaStream, FrameEvent, Message, Provider, Role};
pub use gemini::GeminiProvider;

use crate::config::GeminiConfig;
use crate::error::Result;
use std::sync::Arc;

/// Create the provider instance the relay forwards turns to
///
/// # Arguments
///
/// * `config` - Gemini provider configuration
///
/// # Errors
///
/// Returns error if the provider cannot be initialized
///
/// # Examples
///
/// ```
/// use studysphere::config::GeminiConfig;
/// use studysphere::providers::create_provider;
///
/// let provider = create_provider(&GeminiConfig::default()).unwrap();
/// assert_eq!(provider.name(), "gemini");
/// ```
pub fn create_provider(config: &GeminiConfig) -> Result<Arc<dyn Provider>> {
    Ok(Arc::new(GeminiProvider::new(config.clone())?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_without_key_succeeds() {
        // A missing key is reported per request, not at construction
        let provider = create_provider(&GeminiConfig::default());
        assert!(provider.is_ok());
    }
}
