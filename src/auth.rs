use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::{
    models::Role,
    storage::{SessionStoreState, StoredSession},
    token::{self, Claims, DecodeError},
};

/// AuthStatus
///
/// `Loading` holds only until the first `AuthContext::mount()`; afterwards the state
/// alternates between `Anonymous` and `Authenticated` through `login`/`logout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthStatus {
    Loading,
    Anonymous,
    Authenticated,
}

/// Session
///
/// An immutable snapshot of the authentication state handed to every view.
///
/// Fields are private and only the three constructors build a value, so
/// `is_authenticated()` holds exactly when both a token and a username are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    username: Option<String>,
    display_name: Option<String>,
    role: Option<Role>,
    status: AuthStatus,
}

impl Session {
    pub fn loading() -> Self {
        Self::empty(AuthStatus::Loading)
    }

    pub fn anonymous() -> Self {
        Self::empty(AuthStatus::Anonymous)
    }

    /// Builds an authenticated session. An empty token or username yields an
    /// anonymous session instead.
    pub fn authenticated(
        token: impl Into<String>,
        username: impl Into<String>,
        display_name: Option<String>,
        role: Option<Role>,
    ) -> Self {
        let token = token.into();
        let username = username.into();
        if token.is_empty() || username.is_empty() {
            return Self::anonymous();
        }
        Self {
            token: Some(token),
            username: Some(username),
            display_name,
            role,
            status: AuthStatus::Authenticated,
        }
    }

    fn empty(status: AuthStatus) -> Self {
        Self {
            token: None,
            username: None,
            display_name: None,
            role: None,
            status,
        }
    }

    pub fn status(&self) -> AuthStatus {
        self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == AuthStatus::Loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == AuthStatus::Authenticated
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.is_authenticated() && self.role == Some(role)
    }
}

/// AuthContext
///
/// The single owner of session state. It is created once per client, shared as an
/// `Arc`, and passed explicitly to whatever needs it; there is no global instance.
///
/// State is replaced whole on every transition and published through a `watch`
/// channel, so subscribers always observe a consistent snapshot. No network calls
/// originate here: the context only coordinates memory and the persisted store.
pub struct AuthContext {
    store: SessionStoreState,
    state: watch::Sender<Session>,
}

impl AuthContext {
    /// Creates a context in the `Loading` state. Nothing is read until `mount()`.
    pub fn new(store: SessionStoreState) -> Self {
        let (state, _) = watch::channel(Session::loading());
        Self { store, state }
    }

    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Receiver that is notified on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// mount
    ///
    /// Resolves `Loading` exactly once by consulting the persisted store. Later calls,
    /// or a call after a `login()`/`logout()` already settled the state, change nothing.
    ///
    /// The persisted token is decoded again and the display name and role are taken
    /// from its claims rather than from the separately stored fields. A token that no
    /// longer decodes, belongs to another subject, or has expired is discarded and the
    /// store is cleared.
    pub fn mount(&self) -> AuthStatus {
        self.mount_at(Utc::now())
    }

    pub fn mount_at(&self, now: DateTime<Utc>) -> AuthStatus {
        if !self.state.borrow().is_loading() {
            return self.state.borrow().status();
        }

        let restored = match self.store.restore() {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "session store unreadable, starting anonymous");
                None
            }
        };

        let next = match restored {
            Some(stored) => self.revalidate(stored, now),
            None => Session::anonymous(),
        };

        self.state.send_if_modified(|current| {
            if current.is_loading() {
                *current = next;
                true
            } else {
                false
            }
        });

        let status = self.state.borrow().status();
        tracing::debug!(?status, "session mounted");
        status
    }

    fn revalidate(&self, stored: StoredSession, now: DateTime<Utc>) -> Session {
        let claims = match token::decode(&stored.token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!(error = %e, "discarding undecodable stored token");
                return self.discard_stored();
            }
        };

        if claims.sub != stored.username {
            tracing::warn!(
                stored = %stored.username,
                subject = %claims.sub,
                "stored username does not match token subject"
            );
            return self.discard_stored();
        }

        if claims.is_expired_at(now) {
            tracing::info!(username = %stored.username, "stored token expired");
            return self.discard_stored();
        }

        if stored.role != Some(claims.role) {
            tracing::debug!(
                stored = ?stored.role,
                token = %claims.role,
                "stored role differs from token, using token"
            );
        }

        Session::authenticated(stored.token, claims.sub, claims.display_name, Some(claims.role))
    }

    fn discard_stored(&self) -> Session {
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "failed to clear stale session");
        }
        Session::anonymous()
    }

    /// login
    ///
    /// Overwrites the in-memory session and the persisted store. No validation is
    /// performed: the token was just issued by the server. A failing store is logged
    /// and the in-memory session still switches, so the current run is signed in.
    pub fn login(
        &self,
        token: impl Into<String>,
        username: impl Into<String>,
        display_name: Option<String>,
        role: Role,
    ) {
        let session = Session::authenticated(token, username, display_name, Some(role));

        if let (Some(token), Some(username)) = (session.token(), session.username()) {
            let stored = StoredSession {
                token: token.to_string(),
                username: username.to_string(),
                display_name: session.display_name().map(str::to_string),
                role: session.role(),
            };
            if let Err(e) = self.store.save(&stored) {
                tracing::warn!(error = %e, "session not persisted");
            }
            tracing::info!(username = %username, role = %role, "logged in");
        } else {
            // An empty handle is an anonymous session; the previous record must go too.
            if let Err(e) = self.store.clear() {
                tracing::warn!(error = %e, "failed to clear persisted session");
            }
            tracing::warn!("login without token or username, session cleared");
        }

        self.state.send_replace(session);
    }

    /// Decodes a freshly issued token and logs in with its claims. On a decode error
    /// the state is left untouched.
    pub fn login_with_token(&self, token: &str) -> Result<Claims, DecodeError> {
        let claims = token::decode(token)?;
        self.login(
            token,
            claims.sub.clone(),
            claims.display_name.clone(),
            claims.role,
        );
        Ok(claims)
    }

    /// logout
    ///
    /// Clears memory and the store. Calling it while already anonymous changes nothing
    /// observable.
    pub fn logout(&self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "failed to clear persisted session");
        }

        let mut previous = None;
        self.state.send_if_modified(|current| {
            if current.status() == AuthStatus::Anonymous {
                return false;
            }
            previous = Some(std::mem::replace(current, Session::anonymous()));
            true
        });

        if let Some(username) = previous.as_ref().and_then(Session::username) {
            tracing::info!(username = %username, "logged out");
        }
    }
}
