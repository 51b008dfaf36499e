//! StudySphere - Socratic tutoring chat relay library
//!
//! This library provides the server half (chat relay, auth gate, billing
//! glue) and the client half (session store, relay client) of the
//! StudySphere tutor.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `relay`: `POST /api/chat`, re-framing the provider stream as SSE
//! - `providers`: provider abstraction and the Gemini implementation
//! - `prompts`: the tutor system prompt
//! - `auth`: session lookup and the page gate
//! - `billing`: product catalog and the Autumn attach call
//! - `server`: router assembly and `serve`
//! - `session`: chat sessions, turns, and persistence
//! - `storage`: the key/value persistence port
//! - `client`: relay client used by the terminal chat
//! - `config`: configuration management and validation
//! - `error`: error types and result aliases
//! - `cli`: command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use studysphere::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!     studysphere::server::serve(&config).await
//! }
//! ```

pub mod auth;
pub mod billing;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod prompts;
pub mod providers;
pub mod relay;
pub mod server;
pub mod session;
pub mod sse;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, StudySphereError};
pub use session::SessionStore;

#[cfg(test)]
pub mod test_utils;
