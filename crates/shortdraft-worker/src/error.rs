//! Worker error types.

use std::time::Duration;

use shortdraft_models::TranscriptError;
use shortdraft_storage::StorageError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Audio extraction failed: {0}")]
    AudioExtraction(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("{service} returned {status}: {body}")]
    RemoteStatus {
        service: String,
        status: u16,
        body: String,
    },

    #[error("{service} rate limited the request")]
    RateLimited {
        service: String,
        retry_after: Option<Duration>,
    },

    #[error("Empty response from {0}")]
    EmptyResponse(String),

    #[error("{operation} failed after {attempts} attempts")]
    RemoteCallExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<WorkerError>,
    },

    #[error("Malformed model response: {reason}")]
    MalformedResponse { raw: String, reason: String },

    #[error("Response validation failed: {0}")]
    ResponseValidation(String),

    #[error("Item {index} is missing required field '{field}'")]
    MissingField { index: usize, field: String },

    #[error("Hook extraction failed")]
    HooksExtractionFailed(#[source] Box<WorkerError>),

    #[error("All {attempted} script expansions failed")]
    AllExpansionsFailed { attempted: usize },

    #[error("Failed to write {path}: {reason}")]
    OutputGeneration { path: String, reason: String },

    #[error("Notification failed: {0}")]
    NotificationFailed(String),

    #[error("{context}")]
    Context {
        context: String,
        #[source]
        source: Box<WorkerError>,
    },

    #[error("Invalid transcript: {0}")]
    Transcript(#[from] TranscriptError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn audio_extraction(msg: impl Into<String>) -> Self {
        Self::AudioExtraction(msg.into())
    }

    pub fn transcription_failed(msg: impl Into<String>) -> Self {
        Self::TranscriptionFailed(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ResponseValidation(msg.into())
    }

    pub fn notification_failed(msg: impl Into<String>) -> Self {
        Self::NotificationFailed(msg.into())
    }

    pub fn output_generation(path: impl AsRef<std::path::Path>, reason: impl std::fmt::Display) -> Self {
        Self::OutputGeneration {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Map a non-success HTTP status from one of the remote services.
    pub fn from_status(service: &str, status: u16, body: impl Into<String>, retry_after: Option<Duration>) -> Self {
        if status == 429 {
            Self::RateLimited {
                service: service.to_string(),
                retry_after,
            }
        } else {
            Self::RemoteStatus {
                service: service.to_string(),
                status,
                body: body.into(),
            }
        }
    }

    /// Wrap with a description of what was being done.
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::RateLimited { .. } | WorkerError::EmptyResponse(_) => true,
            WorkerError::RemoteStatus { status, .. } => *status >= 500 || *status == 408,
            WorkerError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            WorkerError::Storage(e) => e.is_retryable(),
            WorkerError::Context { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Server-requested wait before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            WorkerError::RateLimited { retry_after, .. } => *retry_after,
            WorkerError::Storage(e) => e.retry_after(),
            WorkerError::Context { source, .. } => source.retry_after(),
            _ => None,
        }
    }

    /// Raw model output kept for diagnosis, when this error carries one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            WorkerError::MalformedResponse { raw, .. } => Some(raw.as_str()),
            WorkerError::RemoteCallExhausted { source, .. }
            | WorkerError::HooksExtractionFailed(source)
            | WorkerError::Context { source, .. } => source.raw_response(),
            _ => None,
        }
    }
}

/// Adds `.context(..)` to worker results.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> WorkerResult<T>;
}

impl<T, E: Into<WorkerError>> ResultExt<T> for Result<T, E> {
    fn context(self, context: impl Into<String>) -> WorkerResult<T> {
        self.map_err(|e| Into::<WorkerError>::into(e).context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let limited = WorkerError::from_status("openai", 429, "", Some(Duration::from_secs(2)));
        assert!(limited.is_retryable());
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(2)));

        assert!(WorkerError::from_status("openai", 503, "down", None).is_retryable());
        assert!(!WorkerError::from_status("openai", 400, "bad", None).is_retryable());
        assert!(!WorkerError::from_status("openai", 401, "key", None).is_retryable());
    }

    #[test]
    fn test_shape_errors_not_retryable() {
        let malformed = WorkerError::MalformedResponse {
            raw: "oops".into(),
            reason: "eof".into(),
        };
        assert!(!malformed.is_retryable());
        assert!(!WorkerError::validation("count").is_retryable());
        assert!(WorkerError::EmptyResponse("openai".into()).is_retryable());
    }

    #[test]
    fn test_context_keeps_source_and_retryability() {
        let err = WorkerError::from_status("drive", 500, "x", None).context("uploading draft");
        assert_eq!(err.to_string(), "uploading draft");
        assert!(err.is_retryable());
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("500"));
    }

    #[test]
    fn test_raw_response_survives_wrapping() {
        let err = WorkerError::HooksExtractionFailed(Box::new(WorkerError::MalformedResponse {
            raw: "not json".into(),
            reason: "expected value".into(),
        }));
        assert_eq!(err.raw_response(), Some("not json"));
    }

    #[test]
    fn test_result_ext_context() {
        let result: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        let err = result.context("reading transcript").unwrap_err();
        assert!(matches!(err, WorkerError::Context { .. }));
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "IO error: missing");
    }
}
