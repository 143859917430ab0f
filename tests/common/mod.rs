//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use easel_engine::GenerationSettings;
use easel_providers::gemini::ImageClient;
use easel_types::{ApiKey, KeyStore, KeyStoreError, Provider};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_MODEL: &str = "gemini-2.5-flash-image";

pub fn generate_path() -> String {
    format!("/models/{TEST_MODEL}:generateContent")
}

/// Fixed key pool with a refresh counter; refresh never fails.
pub struct StaticKeyStore {
    keys: Vec<ApiKey>,
    refreshes: AtomicUsize,
}

impl StaticKeyStore {
    pub fn gemini(raw: &[&str]) -> Self {
        Self {
            keys: raw
                .iter()
                .map(|key| ApiKey::new(Provider::Gemini, (*key).to_string()))
                .collect(),
            refreshes: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::gemini(&[])
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

impl KeyStore for StaticKeyStore {
    fn refresh(&self) -> Result<(), KeyStoreError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn list(&self, provider: Provider) -> Vec<ApiKey> {
        self.keys
            .iter()
            .filter(|key| key.provider() == provider)
            .cloned()
            .collect()
    }
}

/// Collects rotation progress lines from a dispatch cycle.
#[derive(Default)]
pub struct LogCapture {
    lines: Mutex<Vec<String>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn wait_count(&self) -> usize {
        self.lines()
            .iter()
            .filter(|line| line.starts_with("Waiting"))
            .count()
    }
}

/// Settings with a millisecond rotation delay so exhaustion paths run fast.
pub fn fast_settings() -> GenerationSettings {
    GenerationSettings {
        model: TEST_MODEL.to_string(),
        timeout: Duration::from_millis(250),
        retry_delay: Duration::from_millis(1),
    }
}

/// Client wired to the mock server.
///
/// Uses a plain HTTP client because the shared hardened one is HTTPS-only,
/// and matches the timeout in [`fast_settings`].
pub fn mock_client(server: &MockServer) -> ImageClient {
    ImageClient::new(TEST_MODEL)
        .with_base_url(server.uri())
        .with_http_client(reqwest::Client::new())
        .with_timeout(Duration::from_millis(250))
}

/// A GenerateContent response with one text part and one inline image part.
pub fn image_response(bytes: &[u8]) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{
            "content": {
                "parts": [
                    { "text": "Rendering complete." },
                    { "inlineData": { "mimeType": "image/png", "data": STANDARD.encode(bytes) } }
                ]
            }
        }]
    })
}

/// Mount a success response matched to any key.
pub async fn mount_image(server: &MockServer, bytes: &[u8]) {
    Mock::given(method("POST"))
        .and(path(generate_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response(bytes)))
        .mount(server)
        .await;
}

/// Mount a success response for one specific API key, expected exactly once.
pub async fn mount_image_for_key(server: &MockServer, key: &str, bytes: &[u8]) {
    Mock::given(method("POST"))
        .and(path(generate_path()))
        .and(header("x-goog-api-key", key))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response(bytes)))
        .expect(1)
        .mount(server)
        .await;
}

/// Mount an error status for one specific API key, expected exactly once.
pub async fn mount_status_for_key(server: &MockServer, key: &str, status: u16, body: &str) {
    Mock::given(method("POST"))
        .and(path(generate_path()))
        .and(header("x-goog-api-key", key))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .expect(1)
        .mount(server)
        .await;
}

/// Mount a response for one key delayed beyond the test client timeout.
pub async fn mount_slow_response_for_key(server: &MockServer, key: &str, delay: Duration) {
    Mock::given(method("POST"))
        .and(path(generate_path()))
        .and(header("x-goog-api-key", key))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(image_response(b"LATE"))
                .set_delay(delay),
        )
        .expect(1)
        .mount(server)
        .await;
}

/// Mount a catch-all that must never be hit.
pub async fn mount_unreachable(server: &MockServer) {
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(server)
        .await;
}
