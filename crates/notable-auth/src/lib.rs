//! # notable-auth
//!
//! Authentication for notable.
//!
//! This crate provides:
//! - [`SessionTokenService`]: HMAC-SHA256 signed session tokens with key ids
//! - [`FirebaseProvider`]: identity provider client for Firebase Authentication
//! - [`MockIdentityProvider`]: in-memory provider for tests and local runs
//! - [`IdentityBridge`]: registration, login, session checks and password reset

pub mod bridge;
pub mod error;
pub mod mailer;
pub mod mock;
pub mod provider;
pub mod session;

pub use bridge::{AuthStage, IdentityBridge, LoginSession, RegisterRequest, Registration};
pub use error::{AuthError, Result, TokenError};
pub use mailer::LogResetMailer;
pub use mock::MockIdentityProvider;
pub use provider::{FirebaseConfig, FirebaseProvider};
pub use session::{parse_key_list, SessionClaims, SessionTokenService};
