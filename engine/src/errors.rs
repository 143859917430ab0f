//! Failure classification and user-facing error messages.
//!
//! Raw provider failures are first collapsed into the closed [`TaskError`]
//! set by [`classify`], then rendered by [`user_message`] as guidance a
//! non-technical user can act on. Detail text is bounded so a single huge
//! response body cannot flood the display.

use easel_providers::{AttemptError, GenerateError};
use easel_types::{TaskError, truncate_with_ellipsis};

/// Prefix that makes failures visually scannable in a log pane.
const ALERT_BADGE: &str = "❌";

/// Bound for detail text in specific failure categories.
const ERROR_DETAIL_MAX_CHARS: usize = 200;
/// Bound for detail text in the generic fallback.
const ERROR_GENERIC_MAX_CHARS: usize = 300;

/// Collapse a dispatch-cycle failure into the closed task error set.
#[must_use]
pub fn classify(error: GenerateError) -> TaskError {
    let text = error.to_string();
    match error {
        GenerateError::NoApiKeys { .. } => TaskError::MissingApiKey,
        GenerateError::KeyStore(_) => TaskError::other("KeyStoreError", text),
        GenerateError::Exhausted { source, .. } => match source {
            AttemptError::MalformedResponse(detail) => TaskError::MalformedResponse(detail),
            AttemptError::Transport(e) if e.is_timeout() => TaskError::Timeout(text),
            AttemptError::Transport(_) => TaskError::other("ConnectionError", text),
            AttemptError::Api { .. } => TaskError::other("ApiError", text),
        },
    }
}

/// Render a task failure as actionable guidance.
///
/// Timeout wording in the detail text wins over the declared kind, so a
/// connection error whose message says "timed out" still gets the
/// connectivity guidance.
#[must_use]
pub fn user_message(error: &TaskError) -> String {
    match error {
        TaskError::MalformedResponse(detail) => format!(
            "{ALERT_BADGE} Failed to parse the model's response\n\n\
             Possible causes:\n\
             - The prompt is too long; try shortening it\n\
             - The prompt contains unusual characters\n\
             - A transient service error; try again\n\n\
             Detail: {}",
            truncate_with_ellipsis(detail, ERROR_DETAIL_MAX_CHARS)
        ),
        TaskError::MissingApiKey => format!(
            "{ALERT_BADGE} API key missing\n\n\
             Add keys under [api_keys] in ~/.easel/config.toml or set the \
             GEMINI_API_KEY environment variable."
        ),
        TaskError::Timeout(detail) => timeout_message(detail),
        TaskError::Other { kind, detail } => {
            let lowered = detail.to_lowercase();
            if lowered.contains("timeout") || lowered.contains("timed out") {
                timeout_message(detail)
            } else {
                format!(
                    "{ALERT_BADGE} Error: {kind}\n\n{}",
                    truncate_with_ellipsis(detail, ERROR_GENERIC_MAX_CHARS)
                )
            }
        }
    }
}

fn timeout_message(detail: &str) -> String {
    format!(
        "{ALERT_BADGE} Request timed out\n\n\
         The service did not respond in time. Check your network connection \
         and try again.\n\n\
         Detail: {}",
        truncate_with_ellipsis(detail, ERROR_DETAIL_MAX_CHARS)
    )
}
