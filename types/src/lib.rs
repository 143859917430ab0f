//! Core domain types for Easel.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod text;
pub use text::{truncate_to_fit, truncate_with_ellipsis};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Provider Types
// ============================================================================

/// Supported generation providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    OpenAI,
}

impl Provider {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenAI => "openai",
        }
    }

    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Gemini => "Gemini",
            Provider::OpenAI => "OpenAI",
        }
    }

    /// Environment variable consulted when no key is configured.
    #[must_use]
    pub fn env_var(&self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
        }
    }

    /// Default image model for this provider.
    #[must_use]
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-2.5-flash-image",
            Provider::OpenAI => "gpt-image-1",
        }
    }

    /// Parse provider from string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Some(Provider::Gemini),
            "openai" | "gpt" | "chatgpt" => Some(Provider::OpenAI),
            _ => None,
        }
    }

    /// Get all available providers.
    #[must_use]
    pub fn all() -> &'static [Provider] {
        &[Provider::Gemini, Provider::OpenAI]
    }
}

// ============================================================================
// API Key Types
// ============================================================================

/// Provider-scoped API key.
///
/// This prevents the invalid state "`OpenAI` key used with Gemini" from being representable.
///
/// Note: `Debug` is manually implemented to redact the key value, preventing accidental
/// credential disclosure in logs or error messages.
#[derive(Clone, PartialEq, Eq)]
pub enum ApiKey {
    Gemini(String),
    OpenAI(String),
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiKey::Gemini(_) => write!(f, "ApiKey::Gemini(<redacted>)"),
            ApiKey::OpenAI(_) => write!(f, "ApiKey::OpenAI(<redacted>)"),
        }
    }
}

impl ApiKey {
    #[must_use]
    pub fn new(provider: Provider, value: impl Into<String>) -> Self {
        match provider {
            Provider::Gemini => ApiKey::Gemini(value.into()),
            Provider::OpenAI => ApiKey::OpenAI(value.into()),
        }
    }

    #[must_use]
    pub fn provider(&self) -> Provider {
        match self {
            ApiKey::Gemini(_) => Provider::Gemini,
            ApiKey::OpenAI(_) => Provider::OpenAI,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ApiKey::Gemini(key) | ApiKey::OpenAI(key) => key,
        }
    }

    /// Redacted rendering for log lines: the last six characters, at most.
    #[must_use]
    pub fn preview(&self) -> String {
        let key = self.as_str();
        let count = key.chars().count();
        let tail: String = key.chars().skip(count.saturating_sub(6)).collect();
        format!("...{tail}")
    }
}

// ============================================================================
// Key Store
// ============================================================================

/// Source of API credentials, injected into the request dispatcher.
///
/// Implementations own where keys come from (config file, environment,
/// in-memory fixtures). `refresh` reloads from the backing source so a
/// dispatch cycle sees keys added since the previous one; `list` returns the
/// keys for one provider in their configured order.
pub trait KeyStore: Send + Sync {
    /// Reload credentials from the backing source.
    fn refresh(&self) -> Result<(), KeyStoreError>;

    /// All keys for `provider`, in configured order. Empty when none are set.
    fn list(&self, provider: Provider) -> Vec<ApiKey>;
}

/// The key store could not reload its backing source.
#[derive(Debug, Clone, Error)]
#[error("key store refresh failed: {reason}")]
pub struct KeyStoreError {
    reason: String,
}

impl KeyStoreError {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

// ============================================================================
// Task Types
// ============================================================================

/// Lifecycle of a background task.
///
/// `Running` is entered on start; exactly one of `Completed`/`Failed` is
/// reached; there is no transition back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

impl TaskState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

/// Notification emitted by a background task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent<T> {
    /// Human-readable progress line.
    Progress(String),
    /// The task finished; carries the result. Terminal.
    Done(T),
    /// The task failed; carries the user-facing message. Terminal.
    Failed(String),
}

impl<T> TaskEvent<T> {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskEvent::Done(_) | TaskEvent::Failed(_))
    }
}

// ============================================================================
// Task Errors
// ============================================================================

/// Failure tags produced by long-running operations.
///
/// The set is closed so the reporting layer classifies by tag rather than by
/// inspecting type names or message content. `Other` carries a short kind
/// label for display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The provider's response could not be parsed into structured data.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// No usable API key is configured.
    #[error("no API key configured")]
    MissingApiKey,
    /// The request ran out of time.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// Anything else.
    #[error("{kind}: {detail}")]
    Other { kind: String, detail: String },
}

impl TaskError {
    #[must_use]
    pub fn other(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        TaskError::Other {
            kind: kind.into(),
            detail: detail.into(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
