use dobro_portal::{
    models::Role,
    storage::{
        DISPLAY_NAME_KEY, FileSessionStore, MemorySessionStore, ROLE_KEY, SessionStore, StoredSession,
        TOKEN_KEY, USERNAME_KEY,
    },
};

fn alice() -> StoredSession {
    StoredSession {
        token: "header.payload.signature".to_string(),
        username: "alice".to_string(),
        display_name: Some("Alice".to_string()),
        role: Some(Role::Owner),
    }
}

/// Contract every backend must satisfy.
fn check_round_trip(store: &dyn SessionStore) {
    assert_eq!(store.restore().unwrap(), None);

    store.save(&alice()).unwrap();
    assert_eq!(store.restore().unwrap(), Some(alice()));

    store.clear().unwrap();
    assert_eq!(store.restore().unwrap(), None);
    for key in [TOKEN_KEY, USERNAME_KEY, DISPLAY_NAME_KEY, ROLE_KEY] {
        assert_eq!(store.get(key).unwrap(), None, "{key} should be cleared");
    }
}

#[cfg(test)]
mod memory_tests {
    use super::*;

    #[test]
    fn test_memory_round_trip() {
        check_round_trip(&MemorySessionStore::new());
    }

    #[test]
    fn test_memory_failure() {
        let store = MemorySessionStore::new_failing();
        assert!(store.save(&alice()).is_err());
        assert!(store.restore().is_err());
        assert!(store.clear().is_err());
    }

    #[test]
    fn test_restore_requires_token_and_username() {
        let store = MemorySessionStore::new();
        store.set(TOKEN_KEY, "t.o.k").unwrap();
        assert_eq!(store.restore().unwrap(), None);

        store.set(USERNAME_KEY, "").unwrap();
        assert_eq!(store.restore().unwrap(), None);

        store.set(USERNAME_KEY, "carol").unwrap();
        let restored = store.restore().unwrap().expect("complete record");
        assert_eq!(restored.username, "carol");
        assert_eq!(restored.display_name, None);
        assert_eq!(restored.role, None);
    }

    #[test]
    fn test_unknown_stored_role_is_dropped() {
        let store = MemorySessionStore::with_session(&alice());
        store.set(ROLE_KEY, "SUPERUSER").unwrap();

        let restored = store.restore().unwrap().unwrap();
        assert_eq!(restored.role, None);
        assert_eq!(restored.username, "alice");
    }

    #[test]
    fn test_save_without_optional_fields_removes_them() {
        let store = MemorySessionStore::with_session(&alice());
        let bare = StoredSession {
            display_name: None,
            role: None,
            ..alice()
        };

        store.save(&bare).unwrap();

        assert_eq!(store.get(DISPLAY_NAME_KEY).unwrap(), None);
        assert_eq!(store.get(ROLE_KEY).unwrap(), None);
        assert_eq!(store.restore().unwrap(), Some(bare));
    }
}

#[cfg(test)]
mod file_tests {
    use super::*;

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        check_round_trip(&FileSessionStore::new(dir.path()));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        FileSessionStore::new(dir.path()).save(&alice()).unwrap();

        let reopened = FileSessionStore::new(dir.path());
        assert_eq!(reopened.restore().unwrap(), Some(alice()));
        assert_eq!(reopened.get(ROLE_KEY).unwrap().as_deref(), Some("OWNER"));
    }

    #[test]
    fn test_file_store_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("profiles").join("default");
        let store = FileSessionStore::new(&nested);

        assert_eq!(store.restore().unwrap(), None);
        store.save(&alice()).unwrap();
        assert!(nested.join(TOKEN_KEY).exists());
    }

    #[test]
    fn test_file_store_keys_stay_inside_profile() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("profile");
        let store = FileSessionStore::new(&profile);

        store.set("../../escape", "value").unwrap();

        assert!(!dir.path().join("escape").exists());
        assert_eq!(store.get("../../escape").unwrap().as_deref(), Some("value"));
        assert!(store.dir().join("escape").exists());
    }

    #[test]
    fn test_file_clear_on_empty_profile() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("never-written"));
        assert!(store.clear().is_ok());
    }
}
