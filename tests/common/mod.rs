#![allow(dead_code)]

use chrono::Utc;
use dobro_portal::{
    AuthContext, MemorySessionStore, Session,
    models::{Fund, FundStatus, Role},
    storage::StoredSession,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::Serialize;
use std::sync::Arc;

const SIGNING_SECRET: &[u8] = b"test-signing-secret-not-used-by-the-client";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TestClaims<'a> {
    sub: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    role: &'a str,
    iat: i64,
    exp: i64,
}

/// Mints a real HS256 token, the way the platform issues them. `ttl_secs` may be
/// negative for an already expired token.
pub fn mint(sub: &str, display_name: Option<&str>, role: &str, ttl_secs: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = TestClaims {
        sub,
        display_name,
        role,
        iat: now,
        exp: now + ttl_secs,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SIGNING_SECRET),
    )
    .expect("test token should encode")
}

pub fn stored(sub: &str, display_name: Option<&str>, role: Role, ttl_secs: i64) -> StoredSession {
    StoredSession {
        token: mint(sub, display_name, role.as_str(), ttl_secs),
        username: sub.to_string(),
        display_name: display_name.map(str::to_string),
        role: Some(role),
    }
}

pub fn session_for(username: &str, role: Role) -> Session {
    Session::authenticated(
        mint(username, Some(username), role.as_str(), 3600),
        username,
        Some(username.to_string()),
        Some(role),
    )
}

/// A context already mounted over an empty in-memory store.
pub fn mounted_anonymous() -> (Arc<AuthContext>, Arc<MemorySessionStore>) {
    let store = Arc::new(MemorySessionStore::new());
    let auth = Arc::new(AuthContext::new(store.clone()));
    auth.mount();
    (auth, store)
}

pub fn fund(id: i64, owner: &str, status: FundStatus) -> Fund {
    Fund {
        id,
        title: format!("Fund {id}"),
        description: Some("Помощь приюту".to_string()),
        target_amount: 100_000.0,
        current_amount: 25_000.0,
        owner_username: Some(format!("{owner} display")),
        username: owner.to_string(),
        status,
        ..Fund::default()
    }
}
