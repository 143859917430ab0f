//! Credential rotation for generation requests.
//!
//! The dispatcher walks a provider's credential pool in order, issuing one
//! request per key. A fixed delay is awaited before every attempt after the
//! first, regardless of why the previous attempt failed, so that sequential
//! keys do not land in the same short-window rate limiter bucket. The first
//! success short-circuits the remaining keys.

use std::future::Future;
use std::time::Duration;

use easel_types::{ApiKey, KeyStore, Provider};

use crate::{AttemptError, GenerateError};

/// Default spacing between credential attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Configuration for credential rotation behavior.
#[derive(Debug, Clone)]
pub struct RotationConfig {
    /// Delay awaited before every attempt after the first.
    pub retry_delay: Duration,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Observational progress callback; receives human-readable lines.
///
/// Lines never contain full key material, only redacted previews.
pub type LogFn<'a> = &'a (dyn Fn(&str) + Send + Sync);

fn emit(on_log: Option<LogFn<'_>>, message: &str) {
    if let Some(callback) = on_log {
        callback(message);
    }
}

/// Walk the credential pool for `provider`, calling `attempt` once per key
/// until one succeeds.
///
/// The store is refreshed first so keys added since the last cycle are seen;
/// an empty pool fails fast with [`GenerateError::NoApiKeys`] before any
/// attempt or delay. Keys are tried in the order the store lists them. When
/// every key fails, the last failure is returned inside
/// [`GenerateError::Exhausted`].
pub async fn run_with_rotation<T, F, Fut>(
    store: &dyn KeyStore,
    provider: Provider,
    config: &RotationConfig,
    on_log: Option<LogFn<'_>>,
    attempt: F,
) -> Result<T, GenerateError>
where
    F: Fn(ApiKey) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    store.refresh()?;
    let keys = store.list(provider);
    let total = keys.len();
    let mut keys = keys.into_iter();

    let Some(first) = keys.next() else {
        return Err(GenerateError::NoApiKeys { provider });
    };

    emit(
        on_log,
        &format!("Found {total} {} API keys", provider.display_name()),
    );

    let mut last_error = match try_key(&attempt, first, 1, total, on_log).await {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    for (offset, key) in keys.enumerate() {
        emit(
            on_log,
            &format!(
                "Waiting {:?} before trying the next key...",
                config.retry_delay
            ),
        );
        tokio::time::sleep(config.retry_delay).await;

        match try_key(&attempt, key, offset + 2, total, on_log).await {
            Ok(value) => return Ok(value),
            Err(err) => last_error = err,
        }
    }

    Err(GenerateError::Exhausted {
        attempts: total,
        source: last_error,
    })
}

async fn try_key<T, F, Fut>(
    attempt: &F,
    key: ApiKey,
    position: usize,
    total: usize,
    on_log: Option<LogFn<'_>>,
) -> Result<T, AttemptError>
where
    F: Fn(ApiKey) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    emit(
        on_log,
        &format!("Trying key {position}/{total} ({})", key.preview()),
    );

    match attempt(key).await {
        Ok(value) => {
            emit(on_log, &format!("Key {position}/{total} succeeded"));
            Ok(value)
        }
        Err(err) => {
            tracing::warn!(position, total, "key attempt failed: {err}");
            emit(on_log, &format!("Key {position}/{total} failed: {err}"));
            Err(err)
        }
    }
}
