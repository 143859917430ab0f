//! Config-to-client wiring for image generation.

use std::sync::Arc;
use std::time::Duration;

use easel_config::EaselConfig;
use easel_providers::DEFAULT_REQUEST_TIMEOUT;
use easel_providers::gemini::{GeneratedImage, ImageClient};
use easel_providers::rotation::{DEFAULT_RETRY_DELAY, LogFn, RotationConfig};
use easel_types::{KeyStore, Provider, TaskError};

use crate::errors::classify;

/// Resolved generation parameters: defaults overlaid with config values.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub timeout: Duration,
    pub retry_delay: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: Provider::Gemini.default_model().to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl GenerationSettings {
    /// Overlay config values on the defaults.
    ///
    /// Non-finite or negative retry delays in the config are ignored.
    #[must_use]
    pub fn from_config(config: &EaselConfig) -> Self {
        let mut settings = Self::default();
        let Some(generation) = &config.generation else {
            return settings;
        };
        if let Some(model) = &generation.model {
            settings.model = model.clone();
        }
        if let Some(secs) = generation.timeout_seconds {
            settings.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = generation.retry_delay_seconds
            && secs.is_finite()
            && secs >= 0.0
        {
            settings.retry_delay = Duration::from_secs_f64(secs);
        }
        settings
    }
}

/// One-shot image generation bound to a key store.
pub struct ImageGeneration {
    client: ImageClient,
    store: Arc<dyn KeyStore>,
    rotation: RotationConfig,
}

impl ImageGeneration {
    #[must_use]
    pub fn new(store: Arc<dyn KeyStore>, settings: &GenerationSettings) -> Self {
        Self {
            client: ImageClient::new(settings.model.clone()).with_timeout(settings.timeout),
            store,
            rotation: RotationConfig {
                retry_delay: settings.retry_delay,
            },
        }
    }

    /// Swap the provider client (tests point it at a mock server).
    #[must_use]
    pub fn with_client(mut self, client: ImageClient) -> Self {
        self.client = client;
        self
    }

    /// Run one dispatch cycle, collapsing failures into the task error set.
    pub async fn run(
        &self,
        prompt: &str,
        on_log: Option<LogFn<'_>>,
    ) -> Result<GeneratedImage, TaskError> {
        self.client
            .generate(self.store.as_ref(), prompt, &self.rotation, on_log)
            .await
            .map_err(classify)
    }
}
