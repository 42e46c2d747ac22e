//! In-memory identity provider for tests and local development.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use notable_auth::mock::MockIdentityProvider;
//!
//! let provider = MockIdentityProvider::new()
//!     .with_account("a@example.com", "secret-pw")
//!     .with_failure("generate_reset_link", "EMAIL_NOT_FOUND");
//!
//! let assertion = provider.sign_in("a@example.com", "secret-pw").await?;
//! assert_eq!(provider.call_count("sign_in"), 1);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;

use notable_core::{Error, IdentityProvider, ProviderAccount, ProviderIdentity, Result};

/// A recorded provider call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
    pub timestamp: std::time::Instant,
}

#[derive(Debug, Clone)]
struct MockAccount {
    uid: String,
    email: String,
    password: String,
}

#[derive(Debug, Default)]
struct MockState {
    /// Accounts keyed by email.
    accounts: HashMap<String, MockAccount>,
    /// Issued ID tokens mapped to account uid.
    id_tokens: HashMap<String, String>,
    /// Operation name -> provider error message to return.
    failures: HashMap<String, String>,
    /// Shortest accepted password; unset accepts any length.
    min_password_len: Option<usize>,
}

/// Identity provider that keeps accounts in memory.
#[derive(Clone, Default)]
pub struct MockIdentityProvider {
    state: Arc<Mutex<MockState>>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register an account.
    pub fn with_account(self, email: &str, password: &str) -> Self {
        {
            let mut state = lock(&self.state);
            state.accounts.insert(
                email.to_string(),
                MockAccount {
                    uid: random_string(28),
                    email: email.to_string(),
                    password: password.to_string(),
                },
            );
        }
        self
    }

    /// Reject new credentials with shorter passwords, as Firebase does.
    pub fn with_min_password_len(self, len: usize) -> Self {
        lock(&self.state).min_password_len = Some(len);
        self
    }

    /// Make every call to `operation` fail with `message`.
    pub fn with_failure(self, operation: &str, message: &str) -> Self {
        self.set_failure(operation, message);
        self
    }

    /// Make every call to `operation` fail with `message` from now on.
    pub fn set_failure(&self, operation: &str, message: &str) {
        lock(&self.state)
            .failures
            .insert(operation.to_string(), message.to_string());
    }

    /// Remove an injected failure.
    pub fn clear_failure(&self, operation: &str) {
        lock(&self.state).failures.remove(operation);
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        lock(&self.call_log).clone()
    }

    /// Number of calls to `operation`.
    pub fn call_count(&self, operation: &str) -> usize {
        lock(&self.call_log)
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    pub fn has_account(&self, email: &str) -> bool {
        lock(&self.state).accounts.contains_key(email)
    }

    pub fn account_count(&self) -> usize {
        lock(&self.state).accounts.len()
    }

    /// Issue an ID token for an existing account, as a client SDK would
    /// after sign-in.
    pub fn id_token_for(&self, email: &str) -> Option<String> {
        let mut state = lock(&self.state);
        let uid = state.accounts.get(email)?.uid.clone();
        let token = format!("mock-id-token-{}", random_string(32));
        state.id_tokens.insert(token.clone(), uid);
        Some(token)
    }

    fn record(&self, operation: &str, input: &str) -> Result<()> {
        lock(&self.call_log).push(MockCall {
            operation: operation.to_string(),
            input: input.to_string(),
            timestamp: std::time::Instant::now(),
        });
        match lock(&self.state).failures.get(operation) {
            Some(message) => Err(Error::Provider(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn create_credential(&self, email: &str, password: &str) -> Result<ProviderAccount> {
        self.record("create_credential", email)?;
        let mut state = lock(&self.state);
        if let Some(min) = state.min_password_len {
            if password.chars().count() < min {
                return Err(Error::Provider(format!(
                    "WEAK_PASSWORD : Password should be at least {} characters",
                    min
                )));
            }
        }
        if state.accounts.contains_key(email) {
            return Err(Error::Provider("EMAIL_EXISTS".into()));
        }
        let account = MockAccount {
            uid: random_string(28),
            email: email.to_string(),
            password: password.to_string(),
        };
        let id_token = format!("mock-id-token-{}", random_string(32));
        state.id_tokens.insert(id_token.clone(), account.uid.clone());
        state.accounts.insert(email.to_string(), account.clone());

        Ok(ProviderAccount {
            uid: account.uid,
            id_token: Some(id_token),
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<String> {
        self.record("sign_in", email)?;
        let mut state = lock(&self.state);
        let account = state
            .accounts
            .get(email)
            .cloned()
            .ok_or_else(|| Error::Provider("EMAIL_NOT_FOUND".into()))?;
        if account.password != password {
            return Err(Error::Provider("INVALID_PASSWORD".into()));
        }
        let token = format!("mock-id-token-{}", random_string(32));
        state.id_tokens.insert(token.clone(), account.uid);
        Ok(token)
    }

    async fn verify_assertion(&self, assertion: &str) -> Result<ProviderIdentity> {
        self.record("verify_assertion", assertion)?;
        let state = lock(&self.state);
        let uid = state
            .id_tokens
            .get(assertion)
            .ok_or_else(|| Error::Provider("INVALID_ID_TOKEN".into()))?;
        let email = state
            .accounts
            .values()
            .find(|a| &a.uid == uid)
            .map(|a| a.email.clone());
        Ok(ProviderIdentity {
            uid: uid.clone(),
            email,
        })
    }

    async fn generate_reset_link(&self, email: &str) -> Result<String> {
        self.record("generate_reset_link", email)?;
        if !lock(&self.state).accounts.contains_key(email) {
            return Err(Error::Provider("EMAIL_NOT_FOUND".into()));
        }
        Ok(format!(
            "https://mock.identity.local/reset?mode=resetPassword&oobCode={}",
            random_string(24)
        ))
    }

    async fn delete_credential(&self, account: &ProviderAccount) -> Result<()> {
        self.record("delete_credential", &account.uid)?;
        let mut state = lock(&self.state);
        state.accounts.retain(|_, a| a.uid != account.uid);
        state.id_tokens.retain(|_, uid| uid != &account.uid);
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
