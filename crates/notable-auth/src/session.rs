//! Locally issued session tokens.
//!
//! Tokens use the JWT compact form `header.claims.signature`, each segment
//! base64url without padding, signed with HMAC-SHA256. The header names the
//! signing key (`kid`) so keys can be rotated: one key signs, any number of
//! retired keys still verify until their tokens expire.

use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use notable_core::defaults::{SESSION_KEY_ID, SESSION_SECRET_MIN_LEN, SESSION_TTL_SECS};

use crate::error::{AuthError, Result, TokenError};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
    kid: String,
}

/// Payload of a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Local user id.
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub email: String,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct SessionTokenService {
    keys: HashMap<String, Vec<u8>>,
    active_kid: String,
    ttl: Duration,
}

impl std::fmt::Debug for SessionTokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kids: Vec<&String> = self.keys.keys().collect();
        kids.sort();
        f.debug_struct("SessionTokenService")
            .field("active_kid", &self.active_kid)
            .field("kids", &kids)
            .field("ttl_secs", &self.ttl.num_seconds())
            .finish()
    }
}

fn check_secret(kid: &str, secret: &[u8]) -> Result<()> {
    if kid.is_empty() {
        return Err(AuthError::InvalidKey("key id must not be empty".into()));
    }
    if secret.len() < SESSION_SECRET_MIN_LEN {
        return Err(AuthError::InvalidKey(format!(
            "secret for key '{}' must be at least {} bytes",
            kid, SESSION_SECRET_MIN_LEN
        )));
    }
    Ok(())
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String> {
    Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(value)?))
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> std::result::Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Invalid)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Invalid)
}

fn sign(secret: &[u8], signing_input: &str) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AuthError::InvalidKey(e.to_string()))?;
    mac.update(signing_input.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Parse `kid:secret,kid:secret` into key pairs. Blank entries are skipped.
pub fn parse_key_list(raw: &str) -> Result<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once(':')
                .map(|(kid, secret)| (kid.trim().to_string(), secret.to_string()))
                .ok_or_else(|| {
                    AuthError::InvalidKey(format!("expected kid:secret, got '{}'", entry))
                })
        })
        .collect()
}

impl SessionTokenService {
    /// Create a service that signs with `secret` under key id `kid`.
    pub fn new(kid: impl Into<String>, secret: impl AsRef<[u8]>) -> Result<Self> {
        let kid = kid.into();
        let secret = secret.as_ref();
        check_secret(&kid, secret)?;

        let mut keys = HashMap::new();
        keys.insert(kid.clone(), secret.to_vec());
        Ok(Self {
            keys,
            active_kid: kid,
            ttl: Duration::seconds(SESSION_TTL_SECS),
        })
    }

    /// Create a service signing under the default key id.
    pub fn from_secret(secret: impl AsRef<[u8]>) -> Result<Self> {
        Self::new(SESSION_KEY_ID, secret)
    }

    /// Accept tokens signed by a retired key. Never used for signing.
    pub fn with_verification_key(
        mut self,
        kid: impl Into<String>,
        secret: impl AsRef<[u8]>,
    ) -> Result<Self> {
        let kid = kid.into();
        check_secret(&kid, secret.as_ref())?;
        if kid == self.active_kid {
            return Err(AuthError::InvalidKey(format!(
                "key id '{}' is already the signing key",
                kid
            )));
        }
        self.keys.insert(kid, secret.as_ref().to_vec());
        Ok(self)
    }

    /// Set the token lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Key id used for newly issued tokens.
    pub fn active_kid(&self) -> &str {
        &self.active_kid
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for a local user, expiring one TTL from now.
    pub fn issue(&self, user_id: i64, email: &str) -> Result<String> {
        self.issue_at(user_id, email, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(&self, user_id: i64, email: &str, now: DateTime<Utc>) -> Result<String> {
        let secret = self
            .keys
            .get(&self.active_kid)
            .ok_or_else(|| AuthError::InvalidKey("signing key missing".into()))?;

        let header = TokenHeader {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
            kid: self.active_kid.clone(),
        };
        let claims = SessionClaims {
            user_id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        let signing_input = format!("{}.{}", encode_segment(&header)?, encode_segment(&claims)?);
        let signature = URL_SAFE_NO_PAD.encode(sign(secret, &signing_input)?);

        debug!(
            subsystem = "auth",
            component = "session",
            op = "issue",
            user_id,
            kid = %self.active_kid,
            "Session token issued"
        );
        Ok(format!("{}.{}", signing_input, signature))
    }

    /// Verify a token and return its claims.
    pub fn verify(&self, token: &str) -> std::result::Result<SessionClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as if the current time were `now`.
    ///
    /// The signature is checked over the raw `header.claims` bytes before the
    /// claims are decoded.
    pub fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<SessionClaims, TokenError> {
        let mut segments = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenError::Malformed);
        };

        let header: TokenHeader = decode_segment(header_b64)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::Invalid);
        }
        let secret = self.keys.get(&header.kid).ok_or(TokenError::Invalid)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::Invalid)?;
        let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::Invalid)?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::Invalid)?;

        let claims: SessionClaims = decode_segment(claims_b64)?;
        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret-0123456789";
    const ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

    fn service() -> SessionTokenService {
        SessionTokenService::from_secret(SECRET).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let svc = service();
        let token = svc.issue(7, "a@example.com").unwrap();
        let claims = svc.verify(&token).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.email, "a@example.com");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_expired_after_ttl() {
        let svc = service();
        let issued = Utc::now();
        let token = svc.issue_at(1, "a@example.com", issued).unwrap();

        let just_before = issued + Duration::seconds(3599);
        assert!(svc.verify_at(&token, just_before).is_ok());

        let at_expiry = issued + Duration::seconds(3600);
        assert_eq!(svc.verify_at(&token, at_expiry), Err(TokenError::Expired));
    }

    #[test]
    fn test_every_altered_character_is_invalid() {
        let svc = service();
        let token = svc.issue(42, "tamper@example.com").unwrap();

        for (i, c) in token.char_indices() {
            if c == '.' {
                continue;
            }
            let replacement = ALPHABET.chars().find(|r| *r != c).unwrap();
            let mut altered = token.clone();
            altered.replace_range(i..i + 1, &replacement.to_string());
            assert_eq!(
                svc.verify(&altered),
                Err(TokenError::Invalid),
                "position {} accepted",
                i
            );
        }
    }

    #[test]
    fn test_wrong_segment_count_is_malformed() {
        let svc = service();
        assert_eq!(svc.verify(""), Err(TokenError::Malformed));
        assert_eq!(svc.verify("abc.def"), Err(TokenError::Malformed));
        assert_eq!(svc.verify("a.b.c.d"), Err(TokenError::Malformed));
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let token = service().issue(1, "a@example.com").unwrap();
        let other = SessionTokenService::from_secret("a-completely-different-secret").unwrap();
        assert_eq!(other.verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_rotation_keeps_old_tokens_valid() {
        let old = SessionTokenService::new("2025", SECRET).unwrap();
        let token = old.issue(3, "r@example.com").unwrap();

        let rotated = SessionTokenService::new("2026", "next-generation-secret-xyz")
            .unwrap()
            .with_verification_key("2025", SECRET)
            .unwrap();
        assert_eq!(rotated.verify(&token).unwrap().user_id, 3);

        let fresh = rotated.issue(3, "r@example.com").unwrap();
        assert_eq!(old.verify(&fresh), Err(TokenError::Invalid));
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = SessionTokenService::from_secret("short").unwrap_err();
        assert!(matches!(err, AuthError::InvalidKey(_)));
    }

    #[test]
    fn test_parse_key_list() {
        let keys = parse_key_list(" old:first-secret-value , older:second:with-colon,").unwrap();
        assert_eq!(
            keys,
            vec![
                ("old".to_string(), "first-secret-value".to_string()),
                ("older".to_string(), "second:with-colon".to_string()),
            ]
        );
        assert!(parse_key_list("").unwrap().is_empty());
        assert!(parse_key_list("no-colon").is_err());
    }

    #[test]
    fn test_claims_use_camel_case_user_id() {
        let svc = service();
        let token = svc.issue(9, "c@example.com").unwrap();
        let claims_b64 = token.split('.').nth(1).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(claims_b64).unwrap()).unwrap();
        assert_eq!(json["userId"], 9);
        assert!(json.get("exp").is_some());
    }
}
