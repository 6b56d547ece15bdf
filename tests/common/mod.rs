//! Shared test utilities.

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use filevault_server::config::{Config, LimitsConfig};
use filevault_server::{create_router, AppState};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "filevault-test-boundary";

/// A router over a temporary storage root.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    pub async fn new() -> Self {
        Self::with_limits(10, 100).await
    }

    pub async fn with_limits(streaming: usize, unary: usize) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let mut config = Config::default();
        config.storage.root = temp_dir.path().join("uploads");
        config.limits = LimitsConfig { streaming, unary };

        let state = AppState::new(config)
            .await
            .expect("Failed to create app state");
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body)
    }

    pub async fn upload(&self, filename: &str, data: &[u8]) -> (StatusCode, Value) {
        let body = MultipartBuilder::new()
            .text("filename", filename)
            .file("file", None, data)
            .build();
        let (status, _, body) = self.send(upload_request(Body::from(body))).await;
        (status, to_json(&body))
    }

    pub async fn list(&self) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri("/api/v1/files")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, to_json(&body))
    }

    pub async fn download(&self, id: &str) -> (StatusCode, HeaderMap, Bytes) {
        let request = Request::builder()
            .uri(format!("/api/v1/files/{}", id))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }
}

#[allow(dead_code)]
pub fn upload_request(body: Body) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/files")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(body)
        .unwrap()
}

#[allow(dead_code)]
pub fn to_json(body: &[u8]) -> Value {
    if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(body).unwrap_or(Value::Null)
    }
}

/// Hand-rolled multipart/form-data body using [`BOUNDARY`].
#[allow(dead_code)]
pub struct MultipartBuilder {
    body: Vec<u8>,
}

#[allow(dead_code)]
impl MultipartBuilder {
    pub fn new() -> Self {
        Self { body: Vec::new() }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: Option<&str>, data: &[u8]) -> Self {
        let disposition = match filename {
            Some(filename) => format!(
                "form-data; name=\"{}\"; filename=\"{}\"",
                name, filename
            ),
            None => format!("form-data; name=\"{}\"", name),
        };
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: {}\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, disposition
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Body without the closing boundary, as left by a client that went away.
    pub fn build_truncated(self) -> Vec<u8> {
        self.body
    }

    pub fn build(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.body
    }
}
