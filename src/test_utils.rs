//! Test utilities for StudySphere
//!
//! Scripted stand-ins for the provider and auth ports, plus an
//! [`AppState`] builder for router tests.

use crate::auth::{AuthProvider, AuthSession, AuthUser, NoAuth};
use crate::billing::{AutumnClient, Catalog};
use crate::config::BillingConfig;
use crate::error::{Result, StudySphereError};
use crate::providers::{ChatRequest, DeltaStream, Provider};
use crate::server::AppState;
use async_trait::async_trait;
use axum::http::HeaderMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Provider that replays fixed deltas, or fails once with a given error
pub struct ScriptedProvider {
    deltas: Vec<String>,
    interrupted: bool,
    failure: Mutex<Option<StudySphereError>>,
    calls: AtomicUsize,
    last_request: Mutex<Option<ChatRequest>>,
}

impl ScriptedProvider {
    /// Stream `deltas` on every call
    pub fn new(deltas: Vec<String>) -> Self {
        Self {
            deltas,
            interrupted: false,
            failure: Mutex::new(None),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Stream `deltas`, then a read error, then one more delta
    pub fn interrupted(deltas: Vec<String>) -> Self {
        Self {
            interrupted: true,
            ..Self::new(deltas)
        }
    }

    /// Fail the next call with `error`
    pub fn failing(error: StudySphereError) -> Self {
        let provider = Self::new(Vec::new());
        *provider.failure.lock().unwrap() = Some(error);
        provider
    }

    /// Number of `stream_generate` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most recent request received
    pub fn last_request(&self) -> Option<ChatRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream_generate(&self, request: &ChatRequest) -> Result<DeltaStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        if let Some(error) = self.failure.lock().unwrap().take() {
            return Err(error.into());
        }

        let mut items: Vec<std::result::Result<String, StudySphereError>> =
            self.deltas.iter().cloned().map(Ok).collect();
        if self.interrupted {
            items.push(Err(StudySphereError::Stream("connection reset".to_string())));
            items.push(Ok("never".to_string()));
        }
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// Auth provider with a fixed answer
pub struct StaticAuth {
    session: Option<AuthSession>,
    fail: bool,
}

impl StaticAuth {
    /// Every request is signed in as this user
    pub fn signed_in(id: &str, email: &str) -> Self {
        Self {
            session: Some(AuthSession {
                user: AuthUser {
                    id: id.to_string(),
                    email: Some(email.to_string()),
                    name: None,
                },
            }),
            fail: false,
        }
    }

    /// Every lookup errors
    pub fn failing() -> Self {
        Self {
            session: None,
            fail: true,
        }
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn get_session(&self, _headers: &HeaderMap) -> Result<Option<AuthSession>> {
        if self.fail {
            return Err(StudySphereError::Authentication("auth backend down".to_string()).into());
        }
        Ok(self.session.clone())
    }
}

/// Router state around a scripted provider: anonymous auth, unconfigured billing
pub fn app_state_with_provider(provider: Arc<ScriptedProvider>) -> AppState {
    AppState {
        provider,
        auth: Arc::new(NoAuth),
        billing: Arc::new(AutumnClient::new(BillingConfig::default()).unwrap()),
        catalog: Arc::new(Catalog::standard()),
        login_path: "/login".to_string(),
    }
}
