//! Easel CLI - headless image generation entry point.
//!
//! ```text
//! main() -> EaselConfig::load() -> ImageGeneration -> TaskRunner
//!                                                         |
//!                                                         v
//!                                    progress lines on stderr, image on disk
//! ```
//!
//! Progress lines (including per-key rotation logs) go to stderr; stdout
//! carries exactly one line, the path of the written image, so the command
//! composes in scripts.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use uuid::Uuid;

use easel_engine::{
    ConfigKeyStore, EaselConfig, GenerationSettings, ImageGeneration, TaskEvent, TaskRunner,
};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    let (log_file, init_warnings) = open_easel_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::debug!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file available; diagnostics go to stderr, which already carries
    // the progress lines. stdout stays reserved for the output path.
    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).with_writer(std::io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_easel_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let candidates = easel_log_file_candidates();
    let mut warnings = Vec::new();

    for candidate in candidates {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn easel_log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.easel/logs/easel.log
    if let Some(config_path) = EaselConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("easel.log"));
    }

    // Fallback: ./.easel/logs/easel.log (useful in constrained environments)
    candidates.push(PathBuf::from(".easel").join("logs").join("easel.log"));

    candidates
}

/// Generate an image from a text prompt.
#[derive(Parser, Debug)]
#[command(name = "easel", about = "Generate an image from a text prompt")]
struct Cli {
    /// Text prompt describing the image to generate
    prompt: String,

    /// Output file; defaults to easel-<id>.<ext> in the current directory
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Model identifier; overrides the configured model
    #[arg(long, value_name = "MODEL")]
    model: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    timeout_seconds: Option<u64>,

    /// Delay between API key attempts in seconds
    #[arg(long, value_name = "SECONDS")]
    retry_delay_seconds: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let Cli {
        prompt,
        output,
        model,
        timeout_seconds,
        retry_delay_seconds,
    } = Cli::parse();

    if prompt.trim().is_empty() {
        anyhow::bail!("prompt must not be empty");
    }

    let config = EaselConfig::load()
        .context("cannot start: configuration is unreadable")?
        .unwrap_or_default();

    let mut settings = GenerationSettings::from_config(&config);
    if let Some(model) = model {
        settings.model = model;
    }
    if let Some(secs) = timeout_seconds {
        settings.timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = retry_delay_seconds
        && secs.is_finite()
        && secs >= 0.0
    {
        settings.retry_delay = Duration::from_secs_f64(secs);
    }

    let store = Arc::new(ConfigKeyStore::new());
    let generation = ImageGeneration::new(store, &settings);

    let mut runner = TaskRunner::new("Generating image");
    runner.start(async move {
        let on_log = |line: &str| eprintln!("{line}");
        generation.run(&prompt, Some(&on_log)).await
    });

    let mut image = None;
    while let Some(event) = runner.next_event().await {
        match event {
            TaskEvent::Progress(line) => eprintln!("{line}"),
            TaskEvent::Done(result) => image = Some(result),
            TaskEvent::Failed(message) => {
                eprintln!("{message}");
                std::process::exit(1);
            }
        }
    }

    let Some(image) = image else {
        // The task ended without a terminal event (worker panic).
        anyhow::bail!("generation ended without a result");
    };

    let output_path = output.unwrap_or_else(|| default_output_path(&image.mime_type));
    fs::write(&output_path, &image.bytes)
        .with_context(|| format!("failed to write {}", output_path.display()))?;

    println!("{}", output_path.display());
    Ok(())
}

fn default_output_path(mime_type: &str) -> PathBuf {
    PathBuf::from(format!(
        "easel-{}.{}",
        Uuid::new_v4(),
        extension_for_mime(mime_type)
    ))
}

fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "bin",
    }
}
