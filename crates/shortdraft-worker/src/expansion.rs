//! Script expansion: one model call per hook candidate, run under a fixed
//! concurrency limit.
//!
//! Failed candidates are logged and dropped. Results come back in
//! completion order, not candidate order. The phase fails only when no
//! candidate produced a script.

use std::sync::{Arc, OnceLock};

use futures::stream::{FuturesUnordered, StreamExt};
use regex::Regex;
use serde::Deserialize;
use shortdraft_models::{DetailedScript, HookCandidate, TranscriptSegment, DEFAULT_SCRIPT_DURATION_SECS};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::llm::LanguageModel;
use crate::prompts::build_script_prompt;
use crate::response::{parse_items, ItemSchema};
use crate::retry::{invoke, RetryPolicy};

const SCRIPT_FIELDS: &[&str] = &["script"];

#[derive(Debug, Deserialize)]
struct ScriptItem {
    script: String,
}

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\[(\d{1,3}):(\d{2})\s*[–-]\s*(\d{1,3}):(\d{2})\]").expect("marker pattern is valid")
    })
}

/// Clip length read from the last well-formed `[mm:ss–mm:ss]` marker.
///
/// Falls back to 60 seconds when no marker parses or the end is zero.
pub fn estimate_duration_seconds(script: &str) -> u32 {
    marker_pattern()
        .captures_iter(script)
        .filter_map(|caps| {
            let start_secs: u32 = caps[2].parse().ok()?;
            let minutes: u32 = caps[3].parse().ok()?;
            let seconds: u32 = caps[4].parse().ok()?;
            (start_secs < 60 && seconds < 60).then_some(minutes * 60 + seconds)
        })
        .last()
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_SCRIPT_DURATION_SECS)
}

pub struct ScriptExpansionPhase {
    model: Arc<dyn LanguageModel>,
    policy: RetryPolicy,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
}

impl ScriptExpansionPhase {
    pub fn new(model: Arc<dyn LanguageModel>, policy: RetryPolicy, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            model,
            policy: policy.named("llm.expand_script"),
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Expand every candidate. Returns at most `candidates.len()` scripts.
    pub async fn expand(
        &self,
        candidates: &[HookCandidate],
        segments: &[TranscriptSegment],
    ) -> WorkerResult<Vec<DetailedScript>> {
        info!(
            candidates = candidates.len(),
            concurrency = self.concurrency,
            "Expanding scripts"
        );

        let mut in_flight: FuturesUnordered<_> = candidates
            .iter()
            .enumerate()
            .map(|(index, hook)| async move { (index, self.expand_one(hook, segments).await) })
            .collect();

        let mut scripts = Vec::with_capacity(candidates.len());
        let mut failed = 0usize;

        while let Some((index, result)) = in_flight.next().await {
            match result {
                Ok(script) => {
                    debug!(
                        candidate = index,
                        duration_secs = script.estimated_duration_seconds,
                        "Script expanded"
                    );
                    scripts.push(script);
                }
                Err(e) => {
                    failed += 1;
                    warn!(
                        candidate = index,
                        first_hook = %candidates[index].first_hook,
                        error = %e,
                        "Script expansion failed, skipping candidate"
                    );
                }
            }
        }

        if scripts.is_empty() {
            return Err(WorkerError::AllExpansionsFailed {
                attempted: candidates.len(),
            });
        }

        info!(succeeded = scripts.len(), failed = failed, "Script expansion finished");
        Ok(scripts)
    }

    async fn expand_one(&self, hook: &HookCandidate, segments: &[TranscriptSegment]) -> WorkerResult<DetailedScript> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| WorkerError::config_error("expansion semaphore closed"))?;

        let prompt = build_script_prompt(hook, segments);
        let raw = invoke(&self.policy, || self.model.complete(&prompt)).await?;

        let schema = ItemSchema::items(SCRIPT_FIELDS).with_expected_count(1);
        let script_text = parse_items::<ScriptItem>(&raw, &schema)?
            .into_iter()
            .next()
            .map(|item| item.script.trim().to_string())
            .unwrap_or_default();

        if script_text.is_empty() {
            return Err(WorkerError::validation("script is empty"));
        }

        Ok(DetailedScript {
            hook: hook.clone(),
            estimated_duration_seconds: estimate_duration_seconds(&script_text),
            script_text,
            segments_used: segments.to_vec(),
        })
    }
}
