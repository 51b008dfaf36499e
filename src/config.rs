//! Configuration management for StudySphere
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//!
//! Secrets (`GOOGLE_GEMINI_API_KEY`, `AUTUMN_SECRET_KEY`) are optional at
//! load time. Their absence is reported per request as a configuration
//! error so the server can still start and serve the routes that do not
//! need them.

use crate::cli::{Cli, Commands};
use crate::error::{Result, StudySphereError};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Main configuration structure for StudySphere
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Generative-AI provider settings
    #[serde(default)]
    pub gemini: GeminiConfig,
    /// Billing API settings
    #[serde(default)]
    pub billing: BillingConfig,
    /// Auth provider settings
    #[serde(default)]
    pub auth: AuthConfig,
    /// Terminal client settings
    #[serde(default)]
    pub client: ClientConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the server binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Google Gemini provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Base URL of the Generative Language API
    ///
    /// Overridable so tests can point the provider at a mock server.
    #[serde(default = "default_gemini_api_base")]
    pub api_base: String,

    /// Model used for text-only turns
    #[serde(default = "default_text_model")]
    pub text_model: String,

    /// Model used when the turn carries image attachments
    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    /// API key (usually supplied through `GOOGLE_GEMINI_API_KEY`)
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

fn default_gemini_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_text_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_vision_model() -> String {
    "gemini-2.0-flash-exp".to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base: default_gemini_api_base(),
            text_model: default_text_model(),
            vision_model: default_vision_model(),
            api_key: None,
        }
    }
}

impl GeminiConfig {
    /// Return the configured API key or a `MissingApiKey` error
    pub fn require_api_key(&self) -> std::result::Result<&str, StudySphereError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| StudySphereError::MissingApiKey("GOOGLE_GEMINI_API_KEY".to_string()))
    }
}

/// Billing (Autumn) API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Base URL of the billing API
    #[serde(default = "default_billing_api_base")]
    pub api_base: String,

    /// Secret key (usually supplied through `AUTUMN_SECRET_KEY`)
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

fn default_billing_api_base() -> String {
    "https://api.autumn.org".to_string()
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            api_base: default_billing_api_base(),
            api_key: None,
        }
    }
}

impl BillingConfig {
    /// Return the configured secret key or a `MissingApiKey` error
    pub fn require_api_key(&self) -> std::result::Result<&str, StudySphereError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| StudySphereError::MissingApiKey("AUTUMN_SECRET_KEY".to_string()))
    }
}

/// Auth provider configuration
///
/// When `supabase_url` is unset every request is treated as
/// unauthenticated, so protected pages always redirect to `login_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Supabase project URL
    #[serde(default)]
    pub supabase_url: Option<String>,

    /// Supabase anon (public) key sent as the `apikey` header
    #[serde(default, skip_serializing)]
    pub anon_key: Option<String>,

    /// Where unauthenticated page requests are redirected
    #[serde(default = "default_login_path")]
    pub login_path: String,
}

fn default_login_path() -> String {
    "/login".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            supabase_url: None,
            anon_key: None,
            login_path: default_login_path(),
        }
    }
}

/// Terminal client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Relay endpoint the chat client posts to
    #[serde(default = "default_relay_url")]
    pub relay_url: String,

    /// Session database path; defaults to the platform data directory
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
}

fn default_relay_url() -> String {
    "http://127.0.0.1:3000/api/chat".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: default_relay_url(),
            storage_path: None,
        }
    }
}

/// Read a non-empty environment variable
fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StudySphereError::Config(format!("Failed to read config file: {}", e))
        })?;
        serde_yaml::from_str(&contents)
            .map_err(|e| StudySphereError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Some(addr) = env_non_empty("STUDYSPHERE_BIND_ADDR") {
            tracing::debug!(bind_addr = %addr, "Env override: STUDYSPHERE_BIND_ADDR");
            self.server.bind_addr = addr;
        }

        // Provider overrides
        if let Some(key) = env_non_empty("GOOGLE_GEMINI_API_KEY") {
            tracing::debug!("Env override: GOOGLE_GEMINI_API_KEY");
            self.gemini.api_key = Some(key);
        }
        if let Some(base) = env_non_empty("STUDYSPHERE_GEMINI_API_BASE") {
            tracing::debug!(api_base = %base, "Env override: STUDYSPHERE_GEMINI_API_BASE");
            self.gemini.api_base = base;
        }
        if let Some(model) = env_non_empty("STUDYSPHERE_GEMINI_TEXT_MODEL") {
            self.gemini.text_model = model;
        }
        if let Some(model) = env_non_empty("STUDYSPHERE_GEMINI_VISION_MODEL") {
            self.gemini.vision_model = model;
        }

        // Billing overrides
        if let Some(key) = env_non_empty("AUTUMN_SECRET_KEY") {
            tracing::debug!("Env override: AUTUMN_SECRET_KEY");
            self.billing.api_key = Some(key);
        }
        if let Some(base) = env_non_empty("STUDYSPHERE_AUTUMN_API_BASE") {
            tracing::debug!(api_base = %base, "Env override: STUDYSPHERE_AUTUMN_API_BASE");
            self.billing.api_base = base;
        }

        // Auth overrides
        if let Some(url) = env_non_empty("SUPABASE_URL") {
            tracing::debug!(supabase_url = %url, "Env override: SUPABASE_URL");
            self.auth.supabase_url = Some(url);
        }
        if let Some(key) = env_non_empty("SUPABASE_ANON_KEY") {
            self.auth.anon_key = Some(key);
        }

        // Client overrides
        if let Some(url) = env_non_empty("STUDYSPHERE_RELAY_URL") {
            tracing::debug!(relay_url = %url, "Env override: STUDYSPHERE_RELAY_URL");
            self.client.relay_url = url;
        }
        if let Some(path) = env_non_empty("STUDYSPHERE_STORAGE_DB") {
            tracing::debug!(storage_path = %path, "Env override: STUDYSPHERE_STORAGE_DB");
            self.client.storage_path = Some(PathBuf::from(path));
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(path) = &cli.storage_path {
            self.client.storage_path = Some(path.clone());
        }

        match &cli.command {
            Commands::Serve { bind: Some(bind) } => {
                self.server.bind_addr = bind.clone();
            }
            Commands::Chat {
                relay: Some(relay), ..
            } => {
                self.client.relay_url = relay.clone();
            }
            _ => {}
        }
    }

    /// Validate the configuration
    ///
    /// Ensures addresses and URLs parse and that required names are set.
    /// Secrets are deliberately not checked here.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_addr.parse::<SocketAddr>().is_err() {
            return Err(StudySphereError::Config(format!(
                "server.bind_addr is not a socket address: {}",
                self.server.bind_addr
            ))
            .into());
        }

        if url::Url::parse(&self.gemini.api_base).is_err() {
            return Err(StudySphereError::Config(format!(
                "gemini.api_base is not a valid URL: {}",
                self.gemini.api_base
            ))
            .into());
        }

        if self.gemini.text_model.trim().is_empty() || self.gemini.vision_model.trim().is_empty()
        {
            return Err(StudySphereError::Config(
                "gemini.text_model and gemini.vision_model cannot be empty".to_string(),
            )
            .into());
        }

        if url::Url::parse(&self.billing.api_base).is_err() {
            return Err(StudySphereError::Config(format!(
                "billing.api_base is not a valid URL: {}",
                self.billing.api_base
            ))
            .into());
        }

        if let Some(supabase_url) = &self.auth.supabase_url {
            if url::Url::parse(supabase_url).is_err() {
                return Err(StudySphereError::Config(format!(
                    "auth.supabase_url is not a valid URL: {}",
                    supabase_url
                ))
                .into());
            }
        }

        if !self.auth.login_path.starts_with('/') {
            return Err(StudySphereError::Config(
                "auth.login_path must start with '/'".to_string(),
            )
            .into());
        }

        if crate::server::is_reserved_path(&self.auth.login_path) {
            return Err(StudySphereError::Config(format!(
                "auth.login_path cannot be an existing route: {}",
                self.auth.login_path
            ))
            .into());
        }

        if url::Url::parse(&self.client.relay_url).is_err() {
            return Err(StudySphereError::Config(format!(
                "client.relay_url is not a valid URL: {}",
                self.client.relay_url
            ))
            .into());
        }

        Ok(())
    }
}
