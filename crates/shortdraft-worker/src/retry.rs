//! Retry utilities with exponential backoff.
//!
//! Every remote call (model completions, transcription uploads, store
//! operations, webhooks) goes through [`invoke`]. Behavior:
//! - Delay is `base_delay * 2^attempt`, no jitter
//! - A server-provided retry-after replaces the computed delay
//! - An empty payload counts as a failed attempt
//! - Non-retryable errors return immediately
//!
//! Dropping the returned future cancels both the in-flight call and any
//! pending backoff sleep.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use shortdraft_models::Transcript;
use tracing::{info_span, warn, Instrument};

use crate::error::{WorkerError, WorkerResult};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay after the first failure; doubles on each later one.
    pub base_delay: Duration,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryPolicy {
    /// Create a new policy with the given operation name.
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Same limits, different operation name.
    pub fn named(&self, operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..self.clone()
        }
    }

    /// Delay before the attempt following failed attempt `attempt` (0-based).
    pub fn delay_for_attempt(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(after) = retry_after {
            return after;
        }
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Values that can come back "successfully" yet carry nothing usable.
pub trait Payload {
    fn is_empty_payload(&self) -> bool {
        false
    }
}

impl Payload for String {
    fn is_empty_payload(&self) -> bool {
        self.trim().is_empty()
    }
}

impl<T> Payload for Vec<T> {
    fn is_empty_payload(&self) -> bool {
        self.is_empty()
    }
}

impl Payload for Transcript {
    fn is_empty_payload(&self) -> bool {
        self.segments.is_empty() && self.full_text.trim().is_empty()
    }
}

impl Payload for () {}
impl Payload for bool {}
impl Payload for PathBuf {}

/// Call `action` until it succeeds, fails permanently, or the attempt
/// budget is spent.
///
/// Returns `RemoteCallExhausted` wrapping the last error when every
/// attempt failed with a retryable error.
pub async fn invoke<T, F, Fut>(policy: &RetryPolicy, mut action: F) -> WorkerResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = WorkerResult<T>>,
    T: Payload,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..attempts {
        let span = info_span!(
            "remote_call",
            operation = %policy.operation_name,
            attempt = attempt + 1
        );

        let outcome = match action().instrument(span).await {
            Ok(value) if value.is_empty_payload() => {
                Err(WorkerError::EmptyResponse(policy.operation_name.clone()))
            }
            other => other,
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                if attempt + 1 < attempts {
                    let delay = policy.delay_for_attempt(attempt, e.retry_after());
                    warn!(
                        operation = %policy.operation_name,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Remote call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_error = Some(e);
            }
        }
    }

    let source = last_error.unwrap_or_else(|| WorkerError::EmptyResponse(policy.operation_name.clone()));
    Err(WorkerError::RemoteCallExhausted {
        operation: policy.operation_name.clone(),
        attempts,
        source: Box::new(source),
    })
}
