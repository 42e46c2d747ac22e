//! Centralized default constants for notable.
//!
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// SESSION TOKENS
// =============================================================================

/// Session token lifetime in seconds (1 hour).
pub const SESSION_TTL_SECS: i64 = 3600;

/// Key id used when no explicit key id is configured.
pub const SESSION_KEY_ID: &str = "primary";

/// Minimum accepted signing secret length in bytes.
pub const SESSION_SECRET_MIN_LEN: usize = 16;

// =============================================================================
// IDENTITY PROVIDER
// =============================================================================

/// Identity Toolkit REST endpoint.
pub const FIREBASE_AUTH_URL: &str = "https://identitytoolkit.googleapis.com";

/// Provider HTTP request timeout in seconds.
pub const PROVIDER_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// NOTE MUTATION
// =============================================================================

/// Compare-and-swap attempts for a collection write before giving up.
pub const CAS_MAX_ATTEMPTS: u32 = 5;

// =============================================================================
// SERVER
// =============================================================================

/// Default listen port.
pub const PORT: u16 = 8080;

/// Default CORS origin (the web client's dev server).
pub const ALLOWED_ORIGIN: &str = "http://localhost:3000";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ttl_is_one_hour() {
        assert_eq!(SESSION_TTL_SECS, 60 * 60);
    }

    #[test]
    fn test_cas_attempts_positive() {
        assert!(CAS_MAX_ATTEMPTS >= 1);
    }
}
