//! Identity bridge: turns an identity provider account plus a local user row
//! into a locally signed session.
//!
//! Login walks `Unauthenticated -> ProviderVerifying -> LocalLookup ->
//! SessionIssued`; any failure ends in `Rejected`. Each transition is traced
//! with the `auth_stage` field.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use notable_core::{Error, IdentityProvider, NewUser, ResetMailer, User, UserRepository};

use crate::error::{Result, TokenError};
use crate::session::{SessionClaims, SessionTokenService};

/// Position of a request in the authentication flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Unauthenticated,
    ProviderVerifying,
    LocalLookup,
    SessionIssued,
    Rejected,
}

impl AuthStage {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthStage::Unauthenticated => "unauthenticated",
            AuthStage::ProviderVerifying => "provider_verifying",
            AuthStage::LocalLookup => "local_lookup",
            AuthStage::SessionIssued => "session_issued",
            AuthStage::Rejected => "rejected",
        }
    }
}

impl fmt::Display for AuthStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traces stage transitions for one flow.
struct StageTracker {
    op: &'static str,
    stage: AuthStage,
    started: Instant,
}

impl StageTracker {
    fn start(op: &'static str) -> Self {
        Self {
            op,
            stage: AuthStage::Unauthenticated,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: AuthStage) {
        debug!(
            subsystem = "auth",
            component = "bridge",
            op = self.op,
            from = %self.stage,
            auth_stage = %next,
            "Auth stage transition"
        );
        self.stage = next;
    }

    fn reject(&mut self, err: &dyn fmt::Display) {
        warn!(
            subsystem = "auth",
            component = "bridge",
            op = self.op,
            from = %self.stage,
            auth_stage = %AuthStage::Rejected,
            error = %err,
            duration_ms = self.started.elapsed().as_millis() as u64,
            "Authentication rejected"
        );
        self.stage = AuthStage::Rejected;
    }

    /// Run `result` through the tracker, moving to `Rejected` on error.
    fn check<T, E: fmt::Display>(
        &mut self,
        result: std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        if let Err(ref e) = result {
            self.reject(e);
        }
        result
    }
}

/// Input for [`IdentityBridge::register`].
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub phone_number: Option<String>,
}

/// Result of a successful registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub provider_uid: String,
    pub user: User,
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub token: String,
    pub user_id: i64,
}

/// Bridges the identity provider, the local user store and session tokens.
#[derive(Clone)]
pub struct IdentityBridge {
    provider: Arc<dyn IdentityProvider>,
    users: Arc<dyn UserRepository>,
    sessions: Arc<SessionTokenService>,
    mailer: Arc<dyn ResetMailer>,
}

impl IdentityBridge {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        users: Arc<dyn UserRepository>,
        sessions: Arc<SessionTokenService>,
        mailer: Arc<dyn ResetMailer>,
    ) -> Self {
        Self {
            provider,
            users,
            sessions,
            mailer,
        }
    }

    pub fn sessions(&self) -> &SessionTokenService {
        &self.sessions
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Create the provider credential, then the local user.
    ///
    /// If the local insert fails the provider credential is deleted again so
    /// the two stores do not diverge. A failed cleanup is logged and the
    /// original store error is still returned.
    pub async fn register(&self, req: RegisterRequest) -> Result<Registration> {
        let start = Instant::now();
        let account = self
            .provider
            .create_credential(&req.email, &req.password)
            .await?;

        let inserted = self
            .users
            .insert(NewUser {
                email: req.email.clone(),
                username: req.username,
                phone_number: req.phone_number,
                provider_uid: Some(account.uid.clone()),
            })
            .await;

        match inserted {
            Ok(user) => {
                info!(
                    subsystem = "auth",
                    component = "bridge",
                    op = "register",
                    user_id = user.id,
                    provider_uid = %account.uid,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "User registered"
                );
                Ok(Registration {
                    provider_uid: account.uid,
                    user,
                })
            }
            Err(store_err) => {
                warn!(
                    subsystem = "auth",
                    component = "bridge",
                    op = "register",
                    provider_uid = %account.uid,
                    error = %store_err,
                    "Local user insert failed, deleting provider credential"
                );
                if let Err(cleanup_err) = self.provider.delete_credential(&account).await {
                    error!(
                        subsystem = "auth",
                        component = "bridge",
                        op = "register_compensate",
                        provider_uid = %account.uid,
                        email = %req.email,
                        error = %cleanup_err,
                        "Provider credential left without a local user"
                    );
                }
                Err(store_err.into())
            }
        }
    }

    /// Verify the password with the provider, resolve the local user by
    /// email and issue a session token.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginSession> {
        let mut tracker = StageTracker::start("login");

        tracker.advance(AuthStage::ProviderVerifying);
        let assertion = tracker.check(self.provider.sign_in(email, password).await)?;
        let identity = tracker.check(self.provider.verify_assertion(&assertion).await)?;

        tracker.advance(AuthStage::LocalLookup);
        let user = tracker.check(
            self.users
                .find_by_email(email)
                .await
                .and_then(|found| found.ok_or_else(|| Error::UserNotFound(email.to_string()))),
        )?;

        let token = tracker.check(self.sessions.issue(user.id, &user.email))?;
        tracker.advance(AuthStage::SessionIssued);

        info!(
            subsystem = "auth",
            component = "bridge",
            op = "login",
            user_id = user.id,
            provider_uid = %identity.uid,
            duration_ms = tracker.started.elapsed().as_millis() as u64,
            "Login succeeded"
        );
        Ok(LoginSession {
            token,
            user_id: user.id,
        })
    }

    /// Validate a session token.
    pub fn check(&self, token: &str) -> std::result::Result<SessionClaims, TokenError> {
        self.sessions.verify(token)
    }

    /// Generate a reset link and hand it to the mailer.
    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        let link = self.provider.generate_reset_link(email).await?;
        self.mailer.send_reset_link(email, &link).await?;
        debug!(
            subsystem = "auth",
            component = "bridge",
            op = "forgot_password",
            "Reset link dispatched"
        );
        Ok(())
    }

    /// Verify a provider assertion and return the local user registered with
    /// that provider uid.
    pub async fn resolve_provider_user(&self, assertion: &str) -> Result<User> {
        let mut tracker = StageTracker::start("resolve_provider_user");

        tracker.advance(AuthStage::ProviderVerifying);
        let identity = tracker.check(self.provider.verify_assertion(assertion).await)?;

        tracker.advance(AuthStage::LocalLookup);
        let user = tracker.check(
            self.users
                .find_by_provider_uid(&identity.uid)
                .await
                .and_then(|found| found.ok_or_else(|| Error::UserNotFound(identity.uid.clone()))),
        )?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;

    #[test]
    fn test_stage_names() {
        assert_eq!(AuthStage::ProviderVerifying.to_string(), "provider_verifying");
        assert_eq!(AuthStage::SessionIssued.as_str(), "session_issued");
    }

    #[test]
    fn test_tracker_rejects_on_error() {
        let mut tracker = StageTracker::start("test");
        tracker.advance(AuthStage::ProviderVerifying);
        let result: std::result::Result<(), &str> = tracker.check(Err("nope"));
        assert!(result.is_err());
        assert_eq!(tracker.stage, AuthStage::Rejected);
    }

    #[test]
    fn test_auth_error_converts_to_core_error() {
        let err: Error = AuthError::Token(TokenError::Expired).into();
        assert!(matches!(err, Error::Unauthorized(ref m) if m == "jwt expired"));

        let err: Error = AuthError::Core(Error::NoteNotFound(3)).into();
        assert!(matches!(err, Error::NoteNotFound(3)));
    }
}
