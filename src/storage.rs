use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::models::Role;

// The four keys of a persisted session. They are written and removed together, by
// convention only: the platform gives no transaction across them.
pub const TOKEN_KEY: &str = "token";
pub const USERNAME_KEY: &str = "username";
pub const DISPLAY_NAME_KEY: &str = "displayName";
pub const ROLE_KEY: &str = "role";

pub const SESSION_KEYS: [&str; 4] = [TOKEN_KEY, USERNAME_KEY, DISPLAY_NAME_KEY, ROLE_KEY];

/// StoredSession
///
/// The last-known session as remembered across restarts of the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub token: String,
    pub username: String,
    pub display_name: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

// 1. SessionStore Contract
/// SessionStore
///
/// A string key/value store scoped to one profile (the analog of a browser profile's
/// local storage). Implementors provide the three key-level primitives; the session
/// operations are built on top of them so every backend lays the keys out the same way.
///
/// Two processes sharing a profile see each other's writes only on their next
/// `restore()`: there is no change notification.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Writes all four keys. An absent display name or role removes its key.
    fn save(&self, session: &StoredSession) -> Result<(), StoreError> {
        self.set(TOKEN_KEY, &session.token)?;
        self.set(USERNAME_KEY, &session.username)?;
        match &session.display_name {
            Some(name) => self.set(DISPLAY_NAME_KEY, name)?,
            None => self.remove(DISPLAY_NAME_KEY)?,
        }
        match session.role {
            Some(role) => self.set(ROLE_KEY, role.as_str())?,
            None => self.remove(ROLE_KEY)?,
        }
        Ok(())
    }

    /// Removes all four keys. Removing a missing key is not an error.
    fn clear(&self) -> Result<(), StoreError> {
        for key in SESSION_KEYS {
            self.remove(key)?;
        }
        Ok(())
    }

    /// Reads the session back. A record without both a token and a username is
    /// treated as absent, as is an unrecognised role string (the role is dropped).
    fn restore(&self) -> Result<Option<StoredSession>, StoreError> {
        let token = self.get(TOKEN_KEY)?.filter(|t| !t.is_empty());
        let username = self.get(USERNAME_KEY)?.filter(|u| !u.is_empty());

        let (Some(token), Some(username)) = (token, username) else {
            return Ok(None);
        };

        let display_name = self.get(DISPLAY_NAME_KEY)?;
        let role = self.get(ROLE_KEY)?.and_then(|raw| match raw.parse::<Role>() {
            Ok(role) => Some(role),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unrecognised stored role");
                None
            }
        });

        Ok(Some(StoredSession {
            token,
            username,
            display_name,
            role,
        }))
    }
}

// 2. The Real Implementation (profile directory)
/// FileSessionStore
///
/// Keeps one file per key inside the profile directory. Writes go through a temporary
/// file and a rename so a crash never leaves a half-written token behind.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(sanitize_key(key))
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.key_path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.key_path(key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// sanitize_key
///
/// Keeps a key inside the profile directory by dropping path separators and
/// navigation segments.
fn sanitize_key(key: &str) -> String {
    key.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("_")
}

// 3. The In-Memory Implementation (tests, `--ephemeral`)
/// MemorySessionStore
///
/// Process-local store. `new_failing()` builds one whose every operation errors, to
/// exercise callers' handling of an unavailable store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
    should_fail: bool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            entries: Mutex::default(),
            should_fail: true,
        }
    }

    /// Pre-populated store, as if a previous run had saved `session`.
    pub fn with_session(session: &StoredSession) -> Self {
        let store = Self::new();
        // In-memory writes only fail in failing mode.
        let _ = store.save(session);
        store
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StoreError> {
        if self.should_fail {
            return Err(StoreError::Unavailable(
                "Mock Store Error: Simulation requested".to_string(),
            ));
        }
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("session store lock poisoned".to_string()))
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// SessionStoreState
///
/// The shared handle the Auth Context holds.
pub type SessionStoreState = Arc<dyn SessionStore>;
