//! Image generation provider clients with API key rotation.
//!
//! # Architecture
//!
//! The crate is organized around a credential rotation pattern:
//!
//! - [`rotation`] - Provider-agnostic dispatch loop that walks a credential
//!   pool in order, spacing attempts so sequential keys do not land in the
//!   same short-window rate limiter bucket
//! - [`gemini`] - Google Gemini image client (GenerateContent API)
//!
//! Credentials come from an injected [`easel_types::KeyStore`], refreshed at
//! the start of every dispatch cycle so keys added while the process runs are
//! picked up without a restart.
//!
//! # Error Handling
//!
//! A single credential's failure is an [`AttemptError`]; a whole dispatch
//! cycle fails with [`GenerateError`], which structurally distinguishes an
//! empty credential pool from exhaustion and keeps the last underlying
//! failure as its source.

pub mod gemini;
pub mod rotation;

use std::sync::OnceLock;
use std::time::Duration;

use easel_types::{KeyStoreError, Provider};
use thiserror::Error;

pub use easel_types;

/// Canonical Gemini API base URL.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default per-request timeout for generation calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const CONNECT_TIMEOUT_SECS: u64 = 30;

// Note: reqwest only exposes tcp_keepalive (idle time); interval/retries use platform defaults.
const TCP_KEEPALIVE_SECS: u64 = 60;

const POOL_MAX_IDLE_PER_HOST: usize = 100;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

pub fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        base_client_builder().build().unwrap_or_else(|e| {
            tracing::error!(
                "Failed to build hardened HTTP client: {e}. Attempting minimal hardened fallback."
            );
            reqwest::Client::builder()
                .https_only(true)
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .expect("Minimal hardened HTTP client must build; cannot proceed without TLS")
        })
    })
}

fn base_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        // Basic settings
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .https_only(true)
        // TCP keepalive
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        // Connection pool
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}

/// Read an error response body, capped at 32 KiB.
pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

// ============================================================================
// Errors
// ============================================================================

/// Failure of a single credential's attempt within a dispatch cycle.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// Transport-level failure, including connect errors and timeouts.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-success HTTP status; the body is capped at 32 KiB.
    #[error("API error {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    /// The response arrived but could not be interpreted.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl AttemptError {
    /// True when the failure was a request timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, AttemptError::Transport(e) if e.is_timeout())
    }
}

/// Outcome of a whole dispatch cycle.
///
/// Callers can tell "nothing to try" from "tried everything" by variant
/// alone; exhaustion carries how many credentials were attempted.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The refreshed credential pool was empty.
    #[error("no {} API keys available", provider.display_name())]
    NoApiKeys { provider: Provider },
    /// The key store could not refresh its backing source.
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),
    /// Every credential failed; carries the last underlying failure.
    #[error("all {attempts} API keys failed; last error: {source}")]
    Exhausted {
        attempts: usize,
        #[source]
        source: AttemptError,
    },
}
