//! Hook extraction: one model call that proposes a fixed number of
//! candidate moments for a transcript.

use std::sync::Arc;

use shortdraft_models::{HookCandidate, Transcript, HOOK_FIELDS};
use tracing::{info, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::llm::LanguageModel;
use crate::prompts::build_hooks_prompt;
use crate::response::{parse_items, ItemSchema};
use crate::retry::{invoke, RetryPolicy};

pub struct HookExtractionPhase {
    model: Arc<dyn LanguageModel>,
    policy: RetryPolicy,
    hook_count: usize,
}

impl HookExtractionPhase {
    pub fn new(model: Arc<dyn LanguageModel>, policy: RetryPolicy, hook_count: usize) -> Self {
        Self {
            model,
            policy: policy.named("llm.extract_hooks"),
            hook_count,
        }
    }

    pub fn hook_count(&self) -> usize {
        self.hook_count
    }

    /// Ask for exactly `hook_count` candidates. Any shortfall or excess fails
    /// the whole phase.
    pub async fn extract(&self, transcript: &Transcript) -> WorkerResult<Vec<HookCandidate>> {
        info!(
            segments = transcript.segments.len(),
            requested = self.hook_count,
            "Extracting hooks"
        );

        let hooks = self.request(transcript).await.map_err(|e| {
            if let Some(raw) = e.raw_response() {
                warn!(error = %e, raw_response = %raw, "Hook response could not be parsed");
            } else {
                warn!(error = %e, "Hook extraction failed");
            }
            WorkerError::HooksExtractionFailed(Box::new(e))
        })?;

        info!(count = hooks.len(), "Hooks extracted");
        Ok(hooks)
    }

    async fn request(&self, transcript: &Transcript) -> WorkerResult<Vec<HookCandidate>> {
        let prompt = build_hooks_prompt(transcript, self.hook_count);
        let raw = invoke(&self.policy, || self.model.complete(&prompt)).await?;
        let schema = ItemSchema::items(&HOOK_FIELDS).with_expected_count(self.hook_count);
        parse_items(&raw, &schema)
    }
}
