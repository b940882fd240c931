//! Structured run logging utilities.
//!
//! Gives one orchestrator or pipeline run consistent log lines and a span
//! carrying its run id and item name.

use tracing::{error, info, warn, Span};
use uuid::Uuid;

/// Run logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    item: String,
    operation: String,
}

impl RunLogger {
    /// Create a logger for one item processed by `operation`
    /// (e.g. "drive_batch", "local_video").
    pub fn new(run_id: &Uuid, item: &str, operation: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            item: item.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            item = %self.item,
            operation = %self.operation,
            "Run started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            item = %self.item,
            operation = %self.operation,
            "Run progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            item = %self.item,
            operation = %self.operation,
            "Run warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            item = %self.item,
            operation = %self.operation,
            "Run error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            item = %self.item,
            operation = %self.operation,
            "Run completed: {}", message
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn item(&self) -> &str {
        &self.item
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span the whole run is instrumented with.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "run",
            run_id = %self.run_id,
            item = %self.item,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_logger_creation() {
        let run_id = Uuid::new_v4();
        let logger = RunLogger::new(&run_id, "talk.mp4", "drive_batch");

        assert_eq!(logger.run_id(), run_id.to_string());
        assert_eq!(logger.item(), "talk.mp4");
        assert_eq!(logger.operation(), "drive_batch");
    }
}
