use std::sync::Arc;

// --- Module Structure ---

// Session core.
pub mod auth;
pub mod storage;
pub mod token;

// Navigation and gating.
pub mod access;
pub mod guard;
pub mod routes;

// Remote platform and the views built on it.
pub mod api;
pub mod config;
pub mod handlers;
pub mod models;
pub mod scope;
pub mod views;

// --- Public Re-exports ---

pub use api::{ApiError, ApiState, HttpPlatformApi, PlatformApi};
pub use auth::{AuthContext, AuthStatus, Session};
pub use config::AppConfig;
pub use storage::{FileSessionStore, MemorySessionStore, SessionStore, SessionStoreState};

/// AppState
///
/// Implements the **Unified State Pattern** for the client: one cheaply clonable bundle
/// of the API client, the Auth Context and the configuration, handed explicitly to
/// every handler.
#[derive(Clone)]
pub struct AppState {
    /// Remote platform access.
    pub api: ApiState,
    /// The single owner of the session.
    pub auth: Arc<AuthContext>,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

impl AppState {
    /// build
    ///
    /// Wires the HTTP API client to a fresh Auth Context over `store`. The context is
    /// left in `Loading`; call `auth.mount()` before rendering anything.
    pub fn build(config: AppConfig, store: SessionStoreState) -> Result<Self, ApiError> {
        let auth = Arc::new(AuthContext::new(store));
        let api = Arc::new(HttpPlatformApi::new(&config, Arc::clone(&auth))?) as ApiState;
        Ok(Self { api, auth, config })
    }
}
