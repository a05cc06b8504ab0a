use crate::app::PipelineSettings;
use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Base URL of the S3-like store uploads are fetched from.
    pub object_store_url: String,
    pub email_to: String,
    pub email_from: String,
    pub batch_size: usize,
    pub batch_window_secs: u64,
    pub visibility_timeout_secs: u64,
    /// Delivery budget before a message is dead-lettered (1-3 is typical).
    pub max_receive_count: u32,
    /// Separate, lower budget for the caption-update queue.
    pub caption_max_receive_count: u32,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Event-driven image catalog pipeline")]
pub struct Args {
    /// Host to bind to (overrides IMAGE_PIPELINE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides IMAGE_PIPELINE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides IMAGE_PIPELINE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Object store base URL (overrides IMAGE_PIPELINE_OBJECT_STORE_URL)
    #[arg(long)]
    pub object_store_url: Option<String>,

    /// Notification recipient (overrides IMAGE_PIPELINE_EMAIL_TO)
    #[arg(long)]
    pub email_to: Option<String>,

    /// Notification sender (overrides IMAGE_PIPELINE_EMAIL_FROM)
    #[arg(long)]
    pub email_from: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into an AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("IMAGE_PIPELINE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_db = env::var("IMAGE_PIPELINE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/image_pipeline.db".into());
        let env_store = env::var("IMAGE_PIPELINE_OBJECT_STORE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into());
        let env_to =
            env::var("IMAGE_PIPELINE_EMAIL_TO").unwrap_or_else(|_| "uploader@example.com".into());
        let env_from =
            env::var("IMAGE_PIPELINE_EMAIL_FROM").unwrap_or_else(|_| "noreply@example.com".into());

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.map(Ok).unwrap_or_else(|| parsed_env("IMAGE_PIPELINE_PORT", 8080))?,
            database_url: args.database_url.unwrap_or(env_db),
            object_store_url: args.object_store_url.unwrap_or(env_store),
            email_to: args.email_to.unwrap_or(env_to),
            email_from: args.email_from.unwrap_or(env_from),
            batch_size: parsed_env("IMAGE_PIPELINE_BATCH_SIZE", 5)?,
            batch_window_secs: parsed_env("IMAGE_PIPELINE_BATCH_WINDOW_SECS", 10)?,
            visibility_timeout_secs: parsed_env("IMAGE_PIPELINE_VISIBILITY_TIMEOUT_SECS", 30)?,
            max_receive_count: parsed_env("IMAGE_PIPELINE_MAX_RECEIVE_COUNT", 3)?,
            caption_max_receive_count: parsed_env("IMAGE_PIPELINE_CAPTION_MAX_RECEIVE_COUNT", 2)?,
        };

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            batch_size: self.batch_size,
            max_batch_window: Duration::from_secs(self.batch_window_secs),
            visibility_timeout: Duration::from_secs(self.visibility_timeout_secs),
            max_receive_count: self.max_receive_count,
            caption_max_receive_count: self.caption_max_receive_count,
            email_to: self.email_to.clone(),
            email_from: self.email_from.clone(),
        }
    }
}

/// Read and parse an environment variable, falling back to `default` when it
/// is not set.
fn parsed_env<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("{err}"))
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).context(format!("reading {}", name)),
    }
}
