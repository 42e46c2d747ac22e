//! Test server on an ephemeral port, backed by in-memory storage and the
//! mock identity provider.
#![allow(dead_code)]

use std::sync::Arc;

use axum::http::HeaderValue;
use serde_json::{json, Value};

use notable_api::{router, with_middleware, AppState};
use notable_auth::{IdentityBridge, LogResetMailer, MockIdentityProvider, SessionTokenService};
use notable_db::{MemoryNoteRepository, MemoryUserRepository};

pub const SECRET: &str = "api-test-secret-0123456789";
pub const ORIGIN: &str = "http://localhost:3000";
pub const PASSWORD: &str = "hunter22";

pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    pub provider: MockIdentityProvider,
}

pub async fn spawn() -> TestServer {
    spawn_with(MockIdentityProvider::new()).await
}

pub async fn spawn_with(provider: MockIdentityProvider) -> TestServer {
    let bridge = IdentityBridge::new(
        Arc::new(provider.clone()),
        Arc::new(MemoryUserRepository::new()),
        Arc::new(SessionTokenService::from_secret(SECRET).unwrap()),
        Arc::new(LogResetMailer::new()),
    );
    let state = AppState::new(Arc::new(MemoryNoteRepository::new()), bridge);
    let app = with_middleware(
        router(state),
        vec![HeaderValue::from_static(ORIGIN)],
        1024 * 1024,
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give server a moment to start
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    TestServer {
        base_url,
        client: reqwest::Client::new(),
        provider,
    }
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn register(&self, email: &str) -> reqwest::Response {
        self.client
            .post(self.url("/users/register"))
            .json(&json!({
                "email": email,
                "username": "tester",
                "password": PASSWORD,
                "phone_number": "555-0100"
            }))
            .send()
            .await
            .unwrap()
    }

    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/users/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap()
    }

    /// Register and log in, returning `(token, user_id)`.
    pub async fn session(&self, email: &str) -> (String, i64) {
        assert_eq!(self.register(email).await.status(), 200);
        let body: Value = self.login(email, PASSWORD).await.json().await.unwrap();
        (
            body["token"].as_str().unwrap().to_string(),
            body["id"].as_i64().unwrap(),
        )
    }

    /// Create a note with only the required fields, returning its JSON.
    pub async fn create_note(&self, token: &str, user_id: i64, title: &str) -> Value {
        let resp = self
            .client
            .post(self.url("/notes/create-note"))
            .bearer_auth(token)
            .json(&json!({ "userId": user_id, "title": title, "content": "body" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        resp.json().await.unwrap()
    }

    pub async fn get_json(&self, token: &str, path: &str) -> (u16, Value) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    pub async fn send_json(
        &self,
        method: reqwest::Method,
        token: &str,
        path: &str,
        body: Value,
    ) -> (u16, Value) {
        let resp = self
            .client
            .request(method, self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }
}
