//! Shared components for pipeline and batch runs.

use std::sync::Arc;

use shortdraft_storage::{DriveClient, RemoteStore};
use tracing::info;

use crate::config::AppConfig;
use crate::error::WorkerResult;
use crate::expansion::ScriptExpansionPhase;
use crate::hooks::HookExtractionPhase;
use crate::llm::{LanguageModel, OpenAiChatClient};
use crate::notify::{NoopNotifier, Notifier, SlackNotifier};
use crate::retry::RetryPolicy;
use crate::transcribe::{Transcriber, WhisperTranscriber};

/// Collaborators a run needs, built once at startup.
#[derive(Clone)]
pub struct ProcessingContext {
    pub transcriber: Arc<dyn Transcriber>,
    pub hooks: Arc<HookExtractionPhase>,
    pub expansion: Arc<ScriptExpansionPhase>,
    pub notifier: Arc<dyn Notifier>,
    /// Limits for store calls
    pub retry: RetryPolicy,
}

impl ProcessingContext {
    /// Assemble from explicit collaborators.
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        model: Arc<dyn LanguageModel>,
        notifier: Arc<dyn Notifier>,
        retry: RetryPolicy,
        hook_count: usize,
        expansion_concurrency: usize,
    ) -> Self {
        Self {
            transcriber,
            hooks: Arc::new(HookExtractionPhase::new(model.clone(), retry.clone(), hook_count)),
            expansion: Arc::new(ScriptExpansionPhase::new(model, retry.clone(), expansion_concurrency)),
            notifier,
            retry,
        }
    }

    /// Build the OpenAI-backed context described by `config`.
    pub fn from_config(config: &AppConfig) -> WorkerResult<Self> {
        let retry = config.retry_policy("remote");
        let model: Arc<dyn LanguageModel> = Arc::new(OpenAiChatClient::new(config.openai.clone())?);
        let transcriber: Arc<dyn Transcriber> =
            Arc::new(WhisperTranscriber::new(config.openai.clone(), retry.clone())?);

        let notifier: Arc<dyn Notifier> = match &config.slack_webhook_url {
            Some(url) => Arc::new(SlackNotifier::new(url.clone(), retry.clone())?),
            None => {
                info!("SLACK_WEBHOOK_URL not set, notifications disabled");
                Arc::new(NoopNotifier)
            }
        };

        info!(
            chat_model = %config.openai.chat_model,
            whisper_model = %config.openai.whisper_model,
            hook_count = config.hook_count,
            expansion_concurrency = config.expansion_concurrency,
            "Processing context ready"
        );

        Ok(Self::new(
            transcriber,
            model,
            notifier,
            retry,
            config.hook_count,
            config.expansion_concurrency,
        ))
    }
}

/// Drive store described by `config`.
pub fn drive_store(config: &AppConfig) -> WorkerResult<Arc<dyn RemoteStore>> {
    let client = DriveClient::new(config.drive_config()?)?;
    Ok(Arc::new(client))
}
