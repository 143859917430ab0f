//! Google Gemini image generation client.
//!
//! Talks to the GenerateContent API in image mode and extracts the first
//! inline image payload from the response. Credential selection is delegated
//! to [`rotation`](crate::rotation): one dispatch cycle walks the key store's
//! Gemini keys until a request succeeds.

use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Value, json};

use easel_types::{ApiKey, KeyStore, Provider};

use crate::rotation::{LogFn, RotationConfig, run_with_rotation};
use crate::{
    AttemptError, DEFAULT_REQUEST_TIMEOUT, GEMINI_API_BASE_URL, GenerateError, http_client,
    read_capped_error_body,
};

/// A generated image with its declared MIME type.
#[derive(Clone)]
pub struct GeneratedImage {
    /// Decoded image bytes.
    pub bytes: Vec<u8>,
    /// MIME type as declared by the API (e.g., "image/png").
    pub mime_type: String,
}

impl fmt::Debug for GeneratedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedImage")
            .field("bytes", &format!("<{} bytes>", self.bytes.len()))
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Client for the Gemini GenerateContent endpoint in image mode.
#[derive(Debug, Clone)]
pub struct ImageClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl ImageClient {
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: http_client().clone(),
            base_url: GEMINI_API_BASE_URL.to_string(),
            model: model.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Per-request timeout covering the whole response, not just connect.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the API base URL (tests point this at a local mock server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the HTTP client. The default shared client is HTTPS-only.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Run one dispatch cycle: refresh the store, then rotate through its
    /// Gemini keys until a request succeeds.
    pub async fn generate(
        &self,
        store: &dyn KeyStore,
        prompt: &str,
        rotation: &RotationConfig,
        on_log: Option<LogFn<'_>>,
    ) -> Result<GeneratedImage, GenerateError> {
        run_with_rotation(store, Provider::Gemini, rotation, on_log, |key| {
            self.request_image(key, prompt)
        })
        .await
    }

    /// Issue one GenerateContent request with a single credential.
    pub async fn request_image(
        &self,
        api_key: ApiKey,
        prompt: &str,
    ) -> Result<GeneratedImage, AttemptError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = build_request_body(prompt);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key.as_str())
            .header("content-type", "application/json")
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = read_capped_error_body(response).await;
            return Err(AttemptError::Api { status, body });
        }

        let text = response.text().await?;
        let payload: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| AttemptError::MalformedResponse(format!("invalid response JSON: {e}")))?;
        extract_image(payload)
    }
}

/// Build the GenerateContent request body for image output.
///
/// Note: Gemini API uses camelCase for `generationConfig` and
/// `responseModalities`; `contents` and its children are lowercase.
fn build_request_body(prompt: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": prompt }]
        }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"]
        }
    })
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

/// One response part. Image-mode responses interleave text commentary parts
/// with inline image parts; only the inline payload is of interest here.
#[derive(Debug, Deserialize)]
struct Part {
    // The API documents camelCase; some proxies re-serialize as snake_case.
    #[serde(default, rename = "inlineData", alias = "inline_data")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType", alias = "mime_type")]
    mime_type: String,
    /// Base64-encoded (standard alphabet, padded) image bytes.
    data: String,
}

/// Pull the first inline image out of a response; text parts are skipped.
fn extract_image(response: GenerateContentResponse) -> Result<GeneratedImage, AttemptError> {
    for candidate in response.candidates {
        let Some(content) = candidate.content else {
            continue;
        };
        for part in content.parts {
            let Some(inline) = part.inline_data else {
                continue;
            };
            let bytes = STANDARD.decode(inline.data.as_bytes()).map_err(|e| {
                AttemptError::MalformedResponse(format!("image payload is not valid base64: {e}"))
            })?;
            return Ok(GeneratedImage {
                bytes,
                mime_type: inline.mime_type,
            });
        }
    }
    Err(AttemptError::MalformedResponse(
        "no image data in response".to_string(),
    ))
}
