//! Error types for the authentication layer.

use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Session token verification failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Not a three-segment compact token.
    #[error("jwt malformed")]
    Malformed,

    /// Unknown key, bad signature, or undecodable contents.
    #[error("invalid signature")]
    Invalid,

    /// Signature is valid but `exp` has passed.
    #[error("jwt expired")]
    Expired,
}

/// Errors raised by the session service and identity bridge.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Session token rejected.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Signing key configuration is unusable.
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    /// Token claims could not be encoded.
    #[error("Failed to encode token: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Provider, store, or lookup failure.
    #[error(transparent)]
    Core(#[from] notable_core::Error),
}

impl AuthError {
    /// True when the failure is a rejected session token.
    pub fn is_token_error(&self) -> bool {
        matches!(self, AuthError::Token(_))
    }
}

impl From<AuthError> for notable_core::Error {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Core(e) => e,
            AuthError::Token(e) => notable_core::Error::Unauthorized(e.to_string()),
            AuthError::InvalidKey(m) => notable_core::Error::Config(m),
            AuthError::Encoding(e) => notable_core::Error::Serialization(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_error_messages() {
        assert_eq!(TokenError::Expired.to_string(), "jwt expired");
        assert_eq!(TokenError::Malformed.to_string(), "jwt malformed");
        assert_eq!(TokenError::Invalid.to_string(), "invalid signature");
    }

    #[test]
    fn test_core_error_passes_through_verbatim() {
        let err: AuthError = notable_core::Error::Provider("EMAIL_EXISTS".into()).into();
        assert_eq!(err.to_string(), "EMAIL_EXISTS");
        assert!(!err.is_token_error());
        assert!(AuthError::from(TokenError::Invalid).is_token_error());
    }
}
