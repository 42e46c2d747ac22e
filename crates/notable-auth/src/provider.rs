//! Firebase Identity Toolkit client.
//!
//! Talks to the REST endpoints under `/v1/accounts:*`. Error bodies of the form
//! `{"error": {"message": "EMAIL_EXISTS"}}` surface as
//! [`Error::Provider`] carrying the provider's message unchanged.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use notable_core::defaults::{FIREBASE_AUTH_URL, PROVIDER_TIMEOUT_SECS};
use notable_core::{Error, IdentityProvider, ProviderAccount, ProviderIdentity, Result};

/// Configuration for [`FirebaseProvider`].
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    /// Identity Toolkit base URL.
    pub base_url: String,
    /// Web API key, sent as `?key=`.
    pub api_key: String,
    /// OAuth bearer token for privileged calls (returning reset links).
    pub admin_token: Option<String>,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            base_url: FIREBASE_AUTH_URL.to_string(),
            api_key: String::new(),
            admin_token: None,
            timeout_seconds: PROVIDER_TIMEOUT_SECS,
        }
    }
}

impl FirebaseConfig {
    /// Read `FIREBASE_API_KEY`, `FIREBASE_AUTH_URL`, `FIREBASE_ADMIN_TOKEN`
    /// and `PROVIDER_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("FIREBASE_API_KEY")
            .map_err(|_| Error::Config("FIREBASE_API_KEY must be set".into()))?;
        Ok(Self {
            base_url: std::env::var("FIREBASE_AUTH_URL")
                .unwrap_or_else(|_| FIREBASE_AUTH_URL.to_string()),
            api_key,
            admin_token: std::env::var("FIREBASE_ADMIN_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            timeout_seconds: std::env::var("PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(PROVIDER_TIMEOUT_SECS),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    local_id: String,
    id_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdTokenRequest<'a> {
    id_token: &'a str,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OobRequest<'a> {
    request_type: &'static str,
    email: &'a str,
    return_oob_link: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OobResponse {
    oob_link: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Identity provider backed by Firebase Authentication.
pub struct FirebaseProvider {
    client: Client,
    config: FirebaseConfig,
}

impl FirebaseProvider {
    /// Create a provider with the given configuration.
    pub fn new(config: FirebaseConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "auth",
            component = "firebase",
            base_url = %config.base_url,
            timeout_secs = config.timeout_seconds,
            admin = config.admin_token.is_some(),
            "Initializing Firebase identity provider"
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(FirebaseConfig::from_env()?)
    }

    pub fn config(&self) -> &FirebaseConfig {
        &self.config
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1/accounts:{}?key={}",
            self.config.base_url.trim_end_matches('/'),
            method,
            self.config.api_key
        )
    }

    async fn call<Req, Resp>(&self, method: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned + Send,
    {
        let start = Instant::now();
        let mut request = self.client.post(self.endpoint(method)).json(body);
        if let Some(token) = &self.config.admin_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Request(format!("{} request failed: {}", method, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| format!("identity provider returned {}", status));
            warn!(
                subsystem = "auth",
                component = "firebase",
                op = method,
                status = status.as_u16(),
                error = %message,
                duration_ms = start.elapsed().as_millis() as u64,
                "Identity provider call rejected"
            );
            return Err(Error::Provider(message));
        }

        debug!(
            subsystem = "auth",
            component = "firebase",
            op = method,
            duration_ms = start.elapsed().as_millis() as u64,
            "Identity provider call succeeded"
        );
        response
            .json::<Resp>()
            .await
            .map_err(|e| Error::Serialization(format!("{} response: {}", method, e)))
    }
}

#[async_trait]
impl IdentityProvider for FirebaseProvider {
    async fn create_credential(&self, email: &str, password: &str) -> Result<ProviderAccount> {
        let resp: PasswordResponse = self
            .call(
                "signUp",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        Ok(ProviderAccount {
            uid: resp.local_id,
            id_token: resp.id_token,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<String> {
        let resp: PasswordResponse = self
            .call(
                "signInWithPassword",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        resp.id_token
            .ok_or_else(|| Error::Provider("MISSING_ID_TOKEN".into()))
    }

    async fn verify_assertion(&self, assertion: &str) -> Result<ProviderIdentity> {
        let resp: LookupResponse = self
            .call("lookup", &IdTokenRequest { id_token: assertion })
            .await?;
        resp.users
            .into_iter()
            .next()
            .map(|u| ProviderIdentity {
                uid: u.local_id,
                email: u.email,
            })
            .ok_or_else(|| Error::Unauthorized("INVALID_ID_TOKEN".into()))
    }

    async fn generate_reset_link(&self, email: &str) -> Result<String> {
        let resp: OobResponse = self
            .call(
                "sendOobCode",
                &OobRequest {
                    request_type: "PASSWORD_RESET",
                    email,
                    return_oob_link: true,
                },
            )
            .await?;
        resp.oob_link
            .ok_or_else(|| Error::Provider("OOB_LINK_NOT_RETURNED".into()))
    }

    async fn delete_credential(&self, account: &ProviderAccount) -> Result<()> {
        let id_token = account.id_token.as_deref().ok_or_else(|| {
            Error::Provider(format!("no ID token to delete account {}", account.uid))
        })?;
        let _: serde_json::Value = self
            .call("delete", &IdTokenRequest { id_token })
            .await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "firebase"
    }
}
