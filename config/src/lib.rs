//! Configuration loading and file-backed key storage for Easel.
//!
//! The config file lives at `~/.easel/config.toml`. A missing file is not an
//! error; defaults apply everywhere. Key entries may reference environment
//! variables with `${VAR}` syntax so the file never has to hold raw secrets.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::{env, fs};
use thiserror::Error;

use easel_types::{ApiKey, KeyStore, KeyStoreError, Provider};

// ============================================================================
// Config Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct EaselConfig {
    pub api_keys: Option<ApiKeysConfig>,
    pub generation: Option<GenerationConfig>,
}

/// Configured API keys per provider, in rotation order.
///
/// Note: `Debug` is manually implemented to show only key counts, preventing
/// accidental credential disclosure in logs or error messages.
#[derive(Default, Deserialize)]
pub struct ApiKeysConfig {
    #[serde(default)]
    pub google: Vec<String>,
    #[serde(default)]
    pub openai: Vec<String>,
}

impl std::fmt::Debug for ApiKeysConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn mask(keys: &[String]) -> String {
            format!("[{} key(s)]", keys.len())
        }
        f.debug_struct("ApiKeysConfig")
            .field("google", &mask(&self.google))
            .field("openai", &mask(&self.openai))
            .finish()
    }
}

impl ApiKeysConfig {
    fn raw_keys(&self, provider: Provider) -> &[String] {
        match provider {
            Provider::Gemini => &self.google,
            Provider::OpenAI => &self.openai,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerationConfig {
    /// Image model name. Defaults to the provider's default model.
    pub model: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_seconds: Option<u64>,
    /// Delay between credential attempts in seconds.
    pub retry_delay_seconds: Option<f64>,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl EaselConfig {
    /// Load from the default path. `Ok(None)` when no config file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        Self::load_from(&path)
    }

    /// Load from an explicit path. `Ok(None)` when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }
}

/// Default config location: `~/.easel/config.toml`.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".easel").join("config.toml"))
}

/// Expand `${VAR}` references from the environment.
///
/// Unset variables expand to empty; an unclosed `${` is preserved literally.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut i = 0;

    while i < value.len() {
        if value[i..].starts_with("${") {
            let start = i + 2;
            if let Some(end_rel) = value[start..].find('}') {
                let end = start + end_rel;
                let var = &value[start..end];
                if !var.is_empty() {
                    let replacement = env::var(var).unwrap_or_default();
                    out.push_str(&replacement);
                }
                i = end + 1;
                continue;
            }
        }

        let ch = value[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}

// ============================================================================
// Key Store
// ============================================================================

/// [`KeyStore`] backed by the Easel config file.
///
/// `refresh` re-reads the file, so keys added between dispatch cycles are
/// picked up without restarting. When the file yields no keys for a provider,
/// that provider's environment variable supplies a single-key pool.
pub struct ConfigKeyStore {
    path: Option<PathBuf>,
    keys: RwLock<HashMap<Provider, Vec<String>>>,
}

impl ConfigKeyStore {
    /// Store reading from the default config path.
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: None,
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Store reading from an explicit path.
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            keys: RwLock::new(HashMap::new()),
        }
    }

    fn read_config(&self) -> Result<Option<EaselConfig>, ConfigError> {
        match &self.path {
            Some(path) => EaselConfig::load_from(path),
            None => EaselConfig::load(),
        }
    }
}

impl Default for ConfigKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore for ConfigKeyStore {
    fn refresh(&self) -> Result<(), KeyStoreError> {
        let config = self
            .read_config()
            .map_err(|err| KeyStoreError::new(err.to_string()))?
            .unwrap_or_default();
        let api_keys = config.api_keys.unwrap_or_default();

        let mut table = HashMap::new();
        for provider in Provider::all() {
            let keys = resolve_keys(&api_keys, *provider);
            tracing::debug!(
                provider = provider.as_str(),
                count = keys.len(),
                "key store refreshed"
            );
            table.insert(*provider, keys);
        }

        let Ok(mut guard) = self.keys.write() else {
            return Err(KeyStoreError::new("key table lock poisoned"));
        };
        *guard = table;
        Ok(())
    }

    fn list(&self, provider: Provider) -> Vec<ApiKey> {
        let Ok(guard) = self.keys.read() else {
            return Vec::new();
        };
        guard
            .get(&provider)
            .map(|keys| {
                keys.iter()
                    .map(|key| ApiKey::new(provider, key.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Expand, trim, and drop empty entries, preserving order; fall back to the
/// provider's environment variable when the config yields nothing.
fn resolve_keys(api_keys: &ApiKeysConfig, provider: Provider) -> Vec<String> {
    let mut keys: Vec<String> = api_keys
        .raw_keys(provider)
        .iter()
        .map(|raw| expand_env_vars(raw).trim().to_string())
        .filter(|key| !key.is_empty())
        .collect();

    if keys.is_empty()
        && let Ok(from_env) = env::var(provider.env_var())
        && !from_env.trim().is_empty()
    {
        keys.push(from_env.trim().to_string());
    }

    keys
}
