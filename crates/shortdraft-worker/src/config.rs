//! Application configuration.

use std::path::PathBuf;
use std::time::Duration;

use shortdraft_storage::DriveConfig;

use crate::error::{WorkerError, WorkerResult};
use crate::retry::RetryPolicy;

const SLACK_WEBHOOK_PREFIX: &str = "https://hooks.slack.com/";

/// Settings shared by the chat and transcription clients.
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    /// Base URL without trailing slash
    pub base_url: String,
    pub chat_model: String,
    pub whisper_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl OpenAiSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4o".to_string(),
            whisper_model: "whisper-1".to_string(),
            temperature: 0.7,
            max_tokens: 4000,
            request_timeout: Duration::from_secs(300),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub openai: OpenAiSettings,
    /// Service-account JSON for Drive access
    pub service_account_path: Option<PathBuf>,
    /// Default batch input folder (URL or id)
    pub input_drive_folder: Option<String>,
    /// Default batch output folder (URL or id)
    pub output_drive_folder: Option<String>,
    /// Upload target for local runs
    pub upload_folder_id: Option<String>,
    pub slack_webhook_url: Option<String>,
    /// Attempts per remote call
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    /// Script expansions in flight at once
    pub expansion_concurrency: usize,
    /// Hook candidates requested per run
    pub hook_count: usize,
}

impl AppConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> WorkerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("OPENAI_API_KEY")
            .ok_or_else(|| WorkerError::config_error("OPENAI_API_KEY is not set"))?;

        let mut openai = OpenAiSettings::new(api_key);
        if let Some(base_url) = get("OPENAI_BASE_URL") {
            openai = openai.with_base_url(base_url);
        }
        if let Some(model) = get("CHATGPT_MODEL") {
            openai.chat_model = model;
        }
        if let Some(model) = get("WHISPER_MODEL") {
            openai.whisper_model = model;
        }

        let slack_webhook_url = get("SLACK_WEBHOOK_URL");
        if let Some(url) = &slack_webhook_url {
            if !url.starts_with(SLACK_WEBHOOK_PREFIX) {
                return Err(WorkerError::config_error(format!(
                    "SLACK_WEBHOOK_URL must start with {}",
                    SLACK_WEBHOOK_PREFIX
                )));
            }
        }

        Ok(Self {
            openai,
            service_account_path: get("GOOGLE_SERVICE_ACCOUNT_PATH").map(PathBuf::from),
            input_drive_folder: get("INPUT_DRIVE_FOLDER"),
            output_drive_folder: get("OUTPUT_DRIVE_FOLDER"),
            upload_folder_id: get("GOOGLE_DRIVE_UPLOAD_FOLDER_ID"),
            slack_webhook_url,
            max_attempts: parse_or(get("SHORTDRAFT_MAX_ATTEMPTS"), 3u32).max(1),
            retry_base_delay: Duration::from_millis(parse_or(get("SHORTDRAFT_RETRY_BASE_MS"), 1000)),
            expansion_concurrency: parse_or(get("SHORTDRAFT_EXPANSION_CONCURRENCY"), 5usize).max(1),
            hook_count: parse_or(get("SHORTDRAFT_HOOK_COUNT"), 10usize).max(1),
        })
    }

    /// Retry policy for one named remote operation.
    pub fn retry_policy(&self, operation: &str) -> RetryPolicy {
        RetryPolicy::new(operation)
            .with_max_attempts(self.max_attempts)
            .with_base_delay(self.retry_base_delay)
    }

    /// Drive client settings; fails when no service account is configured.
    pub fn drive_config(&self) -> WorkerResult<DriveConfig> {
        let path = self
            .service_account_path
            .as_ref()
            .ok_or_else(|| WorkerError::config_error("GOOGLE_SERVICE_ACCOUNT_PATH is not set"))?;
        Ok(DriveConfig::new(path))
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|s| s.parse().ok()).unwrap_or(default)
}
