//! Server configuration from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `HOST` | `0.0.0.0` |
//! | `PORT` | `8080` |
//! | `DATABASE_URL` | unset: in-memory storage |
//! | `DB_MAX_CONNECTIONS` | `10` |
//! | `ALLOWED_ORIGINS` | `http://localhost:3000` |
//! | `IDENTITY_PROVIDER` | `firebase` |
//! | `JWT_SECRET` | required |
//! | `JWT_KEY_ID` | `primary` |
//! | `JWT_PREVIOUS_KEYS` | none (`kid:secret,...`) |
//! | `SESSION_TTL_SECS` | `3600` |
//!
//! The Firebase variables are read by [`notable_auth::FirebaseConfig::from_env`].

use std::fmt;

use axum::http::HeaderValue;
use tracing::warn;

use notable_auth::{parse_key_list, SessionTokenService};
use notable_core::defaults::{ALLOWED_ORIGIN, PORT, SESSION_KEY_ID, SESSION_TTL_SECS};
use notable_core::{Error, Result};
use notable_db::pool::DEFAULT_MAX_CONNECTIONS;

/// Default request body limit (1 MiB).
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Which identity provider backs registration and login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Firebase,
    Mock,
}

impl ProviderKind {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "firebase" => Ok(ProviderKind::Firebase),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(Error::Config(format!(
                "IDENTITY_PROVIDER must be 'firebase' or 'mock', got '{}'",
                other
            ))),
        }
    }
}

/// Settings the binary needs to assemble the server.
#[derive(Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub allowed_origins: Vec<HeaderValue>,
    pub provider: ProviderKind,
    pub jwt_secret: String,
    pub jwt_key_id: String,
    pub jwt_previous_keys: String,
    pub session_ttl_secs: i64,
    pub body_limit_bytes: usize,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database_url.as_ref().map(|_| "<set>"))
            .field("db_max_connections", &self.db_max_connections)
            .field("allowed_origins", &self.allowed_origins)
            .field("provider", &self.provider)
            .field("jwt_key_id", &self.jwt_key_id)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .finish_non_exhaustive()
    }
}

impl ApiConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, which returns a variable's value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Config("JWT_SECRET must be set".into()))?;

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("PORT is not a valid port: '{}'", raw)))?,
            None => PORT,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            database_url: lookup("DATABASE_URL").filter(|s| !s.is_empty()),
            db_max_connections: lookup("DB_MAX_CONNECTIONS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
            allowed_origins: parse_allowed_origins(lookup("ALLOWED_ORIGINS").as_deref()),
            provider: ProviderKind::parse(lookup("IDENTITY_PROVIDER").as_deref().unwrap_or(""))?,
            jwt_secret,
            jwt_key_id: lookup("JWT_KEY_ID")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| SESSION_KEY_ID.to_string()),
            jwt_previous_keys: lookup("JWT_PREVIOUS_KEYS").unwrap_or_default(),
            session_ttl_secs: lookup("SESSION_TTL_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|ttl| *ttl > 0)
                .unwrap_or(SESSION_TTL_SECS),
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
        })
    }

    /// Build the session token service: signing key, retired verification
    /// keys and TTL.
    pub fn session_service(&self) -> notable_auth::Result<SessionTokenService> {
        let mut sessions = SessionTokenService::new(self.jwt_key_id.as_str(), &self.jwt_secret)?
            .with_ttl(chrono::Duration::seconds(self.session_ttl_secs));
        for (kid, secret) in parse_key_list(&self.jwt_previous_keys)? {
            sessions = sessions.with_verification_key(kid, secret)?;
        }
        Ok(sessions)
    }
}

/// Parse a comma-separated CORS origin list.
///
/// Unset or blank input yields the web client's dev origin. Entries that are
/// not valid header values are dropped with a warning.
pub fn parse_allowed_origins(raw: Option<&str>) -> Vec<HeaderValue> {
    let raw = match raw {
        Some(s) if !s.trim().is_empty() => s,
        _ => return vec![HeaderValue::from_static(ALLOWED_ORIGIN)],
    };

    raw.split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ApiConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("JWT_SECRET", "0123456789abcdef0123")]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.provider, ProviderKind::Firebase);
        assert_eq!(config.jwt_key_id, "primary");
        assert_eq!(config.session_ttl_secs, 3600);
        assert!(config.database_url.is_none());
        assert_eq!(config.allowed_origins, vec![HeaderValue::from_static("http://localhost:3000")]);
    }

    #[test]
    fn test_missing_secret_is_config_error() {
        let err = config_from(&[("PORT", "9000")]).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("JWT_SECRET")));
    }

    #[test]
    fn test_bad_port_and_provider() {
        let err = config_from(&[("JWT_SECRET", "0123456789abcdef0123"), ("PORT", "http")])
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = config_from(&[
            ("JWT_SECRET", "0123456789abcdef0123"),
            ("IDENTITY_PROVIDER", "ldap"),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("ldap")));
    }

    #[test]
    fn test_session_service_accepts_previous_keys() {
        let old = SessionTokenService::new("2025", "old-secret-0123456789").unwrap();
        let token = old.issue(7, "a@example.com").unwrap();

        let config = config_from(&[
            ("JWT_SECRET", "new-secret-0123456789"),
            ("JWT_KEY_ID", "2026"),
            ("JWT_PREVIOUS_KEYS", "2025:old-secret-0123456789"),
            ("SESSION_TTL_SECS", "60"),
        ])
        .unwrap();
        let sessions = config.session_service().unwrap();
        assert_eq!(sessions.active_kid(), "2026");
        assert_eq!(sessions.ttl(), chrono::Duration::seconds(60));
        assert_eq!(sessions.verify(&token).unwrap().user_id, 7);
    }

    #[test]
    fn test_debug_hides_secret() {
        let config = config_from(&[("JWT_SECRET", "super-secret-value-123")]).unwrap();
        assert!(!format!("{:?}", config).contains("super-secret-value-123"));
    }

    #[test]
    fn test_allowed_origins_parsing() {
        let origins = parse_allowed_origins(Some("https://notes.example.com, http://localhost:3000"));
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[0].to_str().unwrap(), "https://notes.example.com");

        let origins = parse_allowed_origins(Some("https://ok.example.com,bad\u{7f}origin"));
        assert_eq!(origins.len(), 1);

        assert_eq!(parse_allowed_origins(Some("  ")).len(), 1);
        assert_eq!(parse_allowed_origins(None).len(), 1);
    }
}
