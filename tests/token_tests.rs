mod common;

use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use chrono::{DateTime, Utc};
use dobro_portal::{
    models::Role,
    token::{self, DecodeError},
};

fn with_payload(json: &str) -> String {
    format!("e30.{}.sig", URL_SAFE_NO_PAD.encode(json))
}

#[cfg(test)]
mod decode_tests {
    use super::*;

    #[test]
    fn test_decode_minted_token() {
        let token = common::mint("alice", Some("Alice"), "OWNER", 3600);

        let claims = token::decode(&token).expect("minted token decodes");

        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.display_name.as_deref(), Some("Alice"));
        assert_eq!(claims.role, Role::Owner);
        assert_eq!(claims.exp.unwrap() - claims.iat.unwrap(), 3600);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_decode_ignores_signature() {
        let token = common::mint("bob", None, "DONOR", 3600);
        let (head, _) = token.rsplit_once('.').unwrap();
        let tampered = format!("{head}.not-a-real-signature");

        let claims = token::decode(&tampered).expect("signature is not checked client-side");
        assert_eq!(claims.sub, "bob");
        assert_eq!(claims.display_name, None);
        assert_eq!(claims.role, Role::Donor);
    }

    #[test]
    fn test_decode_accepts_padding_and_whitespace() {
        let payload = URL_SAFE_NO_PAD.encode(r#"{"sub":"eve","role":"ADMIN"}"#);
        let token = format!("  e30.{payload}==.sig\n");

        let claims = token::decode(&token).unwrap();
        assert_eq!(claims.sub, "eve");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp, None);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_decode_url_safe_and_standard_alphabets() {
        let json = r#"{"sub":"zoe","displayName":"~~~~~~","role":"VOLUNTEER"}"#;
        let standard = STANDARD.encode(json);
        let url_safe = URL_SAFE_NO_PAD.encode(json);
        assert!(standard.contains('+'));
        assert!(url_safe.contains('-'));

        for payload in [standard, url_safe] {
            let claims = token::decode(&format!("e30.{payload}.sig")).unwrap();
            assert_eq!(claims.sub, "zoe");
            assert_eq!(claims.display_name.as_deref(), Some("~~~~~~"));
            assert_eq!(claims.role, Role::Volunteer);
        }
    }

    #[test]
    fn test_decode_wrong_segment_count() {
        assert!(matches!(
            token::decode("only.two"),
            Err(DecodeError::Malformed { segments: 2 })
        ));
        assert!(matches!(
            token::decode("a.b.c.d"),
            Err(DecodeError::Malformed { segments: 4 })
        ));
        assert!(matches!(
            token::decode(""),
            Err(DecodeError::Malformed { segments: 1 })
        ));
    }

    #[test]
    fn test_decode_bad_encoding() {
        let result = token::decode("e30.@@@!!!.sig");
        assert!(matches!(result, Err(DecodeError::Encoding(_))));
    }

    #[test]
    fn test_decode_bad_json() {
        let result = token::decode(&with_payload("not json"));
        assert!(matches!(result, Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_decode_unknown_role_is_rejected() {
        let result = token::decode(&with_payload(r#"{"sub":"x","role":"SUPERUSER"}"#));
        assert!(matches!(result, Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_decode_missing_subject_is_rejected() {
        let result = token::decode(&with_payload(r#"{"role":"DONOR"}"#));
        assert!(matches!(result, Err(DecodeError::Json(_))));
    }
}

#[cfg(test)]
mod expiry_tests {
    use super::*;

    #[test]
    fn test_expiry_boundary() {
        let claims = token::decode(&with_payload(r#"{"sub":"a","role":"DONOR","exp":1000}"#)).unwrap();

        let before = DateTime::<Utc>::from_timestamp(999, 0).unwrap();
        let at = DateTime::<Utc>::from_timestamp(1000, 0).unwrap();

        assert!(!claims.is_expired_at(before));
        assert!(claims.is_expired_at(at));
        assert_eq!(claims.expires_at(), Some(at));
    }

    #[test]
    fn test_expired_minted_token() {
        let token = common::mint("old", None, "VOLUNTEER", -60);
        assert!(token::decode(&token).unwrap().is_expired());
    }
}
