//! Password reset delivery.

use async_trait::async_trait;
use tracing::info;

use notable_core::{ResetMailer, Result};

/// Mailer that records reset links in the log instead of sending email.
///
/// Suitable for development and for deployments where the identity provider
/// sends its own reset emails.
#[derive(Debug, Clone, Default)]
pub struct LogResetMailer;

impl LogResetMailer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResetMailer for LogResetMailer {
    async fn send_reset_link(&self, email: &str, link: &str) -> Result<()> {
        info!(
            subsystem = "auth",
            component = "mailer",
            op = "send_reset_link",
            email,
            link,
            "Password reset link generated"
        );
        Ok(())
    }
}
