use anyhow::{bail, Context, Result};
use std::time::Duration;

pub const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Clone)]
pub struct Config {
    // OpenAI
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_api_url: String,
    pub openai_timeout: Duration,

    // Batching
    pub max_batch_size: usize,
    pub batch_backoff: Duration,

    // Documents
    pub concurrency: usize,
    pub document_attempts: u32,
    pub document_retry_pause: Duration,
}

impl Config {
    /// Read settings from the environment. Call `validate` once any
    /// command-line overrides have been applied.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            // OpenAI
            openai_api_key: std::env::var("OPENAI_API_KEY")
                .context("OPENAI_API_KEY not set")?,
            openai_model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| "gpt-4".to_string()),
            openai_api_url: std::env::var("OPENAI_API_URL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_API_URL.to_string()),
            openai_timeout: Duration::from_secs(env_or("OPENAI_TIMEOUT_SECS", 300)),

            // Batching
            max_batch_size: env_or("MAX_BATCH_SIZE", 100),
            batch_backoff: Duration::from_secs(env_or("BATCH_BACKOFF_SECS", 60)),

            // Documents
            concurrency: env_or("CONCURRENCY", 3),
            document_attempts: env_or("DOCUMENT_ATTEMPTS", 3),
            document_retry_pause: Duration::from_secs(env_or("DOCUMENT_RETRY_PAUSE_SECS", 120)),
        })
    }

    /// Command-line values win over the environment.
    pub fn apply_overrides(&mut self, max_batch_size: Option<usize>, concurrency: Option<usize>) {
        if let Some(max_batch_size) = max_batch_size {
            self.max_batch_size = max_batch_size;
        }
        if let Some(concurrency) = concurrency {
            self.concurrency = concurrency;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size < 1 {
            bail!("MAX_BATCH_SIZE must be at least 1");
        }
        if self.concurrency < 1 {
            bail!("CONCURRENCY must be at least 1");
        }
        if self.document_attempts < 1 {
            bail!("DOCUMENT_ATTEMPTS must be at least 1");
        }
        Ok(())
    }
}

/// Read a numeric environment variable, falling back to `default` when unset or unparsable.
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
