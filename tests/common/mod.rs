#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use geosocial_api::{
    AppConfig, AppState, MemoryRepository, MockStorageService, SessionIssuer, create_router,
    mailer::{MailerState, MockMailer},
    models::{User, UserStatus},
    network::{FixedResolver, ServerInfo},
    repository::{Repository, RepositoryState},
    storage::StorageState,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const BASE_URL: &str = "http://10.0.0.5:5000";
pub const OPERATOR_EMAIL: &str = "operator@example.com";

/// TestApp
///
/// Full router over in-memory collaborators. The handles stay reachable so tests can
/// seed data and inspect side effects.
pub struct TestApp {
    pub router: Router,
    pub repo: Arc<MemoryRepository>,
    pub storage: Arc<MockStorageService>,
    pub mailer: Arc<MockMailer>,
    pub sessions: SessionIssuer,
    pub config: AppConfig,
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(MockMailer::new())
}

pub fn spawn_app_with(mailer: MockMailer) -> TestApp {
    let config = AppConfig::default();
    let repo = Arc::new(MemoryRepository::new());
    let storage = Arc::new(MockStorageService::new());
    let mailer = Arc::new(mailer);
    let sessions = SessionIssuer::from_config(&config);
    let server = ServerInfo::resolve(&FixedResolver("10.0.0.5".into()), 5000);

    let state = AppState {
        repo: repo.clone() as RepositoryState,
        storage: storage.clone() as StorageState,
        mailer: mailer.clone() as MailerState,
        sessions: sessions.clone(),
        server: Arc::new(server),
        config: config.clone(),
    };

    TestApp {
        router: create_router(state),
        repo,
        storage,
        mailer,
        sessions,
        config,
    }
}

impl TestApp {
    /// Sends one request and returns the status with the JSON body (`Null` when the
    /// body is empty or not JSON).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    /// Stores a verified account and returns it with a fresh access token.
    pub async fn seed_user(&self, email: &str, status: UserStatus) -> (User, String) {
        let mut user = User::new(email, "not-a-real-hash");
        user.name = email.split('@').next().unwrap_or_default().to_string();
        user.is_verified = true;
        user.status = status;
        self.repo.create_user(&user).await.unwrap();

        let token = self.sessions.issue_access_token(user.id, &user.email).unwrap();
        (user, token)
    }

    pub async fn stored_otp(&self, email: &str) -> Option<String> {
        self.repo
            .find_user_by_email(email)
            .await
            .unwrap()
            .and_then(|u| u.otp)
    }
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// MultipartBody
///
/// Hand-built `multipart/form-data` payloads for the upload endpoints.
pub struct MultipartBody {
    boundary: &'static str,
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "----geosocial-test-boundary",
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.boundary, name, file_name, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, method: Method, uri: &str, token: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());

        Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(self.body))
            .unwrap()
    }
}

/// Strips the base URL from an absolute media URL.
pub fn relative(url: &str) -> String {
    url.trim_start_matches(BASE_URL)
        .trim_start_matches('/')
        .to_string()
}
