use base64::{
    Engine, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Role;

/// Claims
///
/// The identity payload carried in the middle segment of a platform bearer token.
///
/// These claims are read on the client **without signature verification**. They are a
/// convenience for deciding what to show, never an authorization boundary: every
/// privileged call is re-checked by the server, which holds the signing key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Subject (sub): the account handle (username).
    pub sub: String,
    /// Human-readable name. Accounts created without one carry `null`.
    #[serde(default)]
    pub display_name: Option<String>,
    pub role: Role,
    /// Issued At (iat), seconds since the Unix epoch.
    #[serde(default)]
    pub iat: Option<i64>,
    /// Expiration Time (exp), seconds since the Unix epoch.
    #[serde(default)]
    pub exp: Option<i64>,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// A token without `exp` never expires client-side; the server stays the judge.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.exp {
            Some(exp) => exp <= now.timestamp(),
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// DecodeError
///
/// Why a bearer token could not be read. Callers treat every variant the same way:
/// no session can be established from this token.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("token must have 3 segments, found {segments}")]
    Malformed { segments: usize },
    #[error("token payload is not valid base64url: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("token payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("token payload is not valid claims JSON: {0}")]
    Json(#[from] serde_json::Error),
}

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

/// Token payload alphabet, padding optional.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Fallback for issuers that encode with the standard alphabet.
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// decode
///
/// Extracts the claims from a `header.payload.signature` token.
///
/// The payload is base64url without padding in well-formed tokens, but padded input
/// and the standard alphabet are accepted too.
pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(DecodeError::Malformed {
            segments: segments.len(),
        });
    }

    let payload = segments[1];
    let bytes = URL_SAFE_LENIENT
        .decode(payload)
        .or_else(|_| STANDARD_LENIENT.decode(payload))?;
    let json = String::from_utf8(bytes)?;
    let claims = serde_json::from_str::<Claims>(&json)?;

    tracing::trace!(sub = %claims.sub, role = %claims.role, "decoded bearer token");
    Ok(claims)
}
