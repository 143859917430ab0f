//! Task orchestration for Easel.
//!
//! This crate glues configuration to the provider layer and runs generation
//! as a background task with a typed event stream, without any UI
//! dependencies.

pub mod errors;
pub mod generation;
pub mod task;

pub use errors::{classify, user_message};
pub use generation::{GenerationSettings, ImageGeneration};
pub use task::TaskRunner;

// Re-export from crates for public API
pub use easel_config::{ConfigKeyStore, EaselConfig};
pub use easel_providers::{self, GenerateError, gemini::GeneratedImage, rotation::LogFn};
pub use easel_types::{ApiKey, KeyStore, Provider, TaskError, TaskEvent, TaskState};
