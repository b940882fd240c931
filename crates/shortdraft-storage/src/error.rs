//! Storage error types.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Reasons Drive gives when it throttles with 403 instead of 429.
const DRIVE_RATE_LIMIT_REASONS: [&str; 2] = ["userRateLimitExceeded", "rateLimitExceeded"];

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to configure storage client: {0}")]
    ConfigError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Invalid folder URL or id: {0}")]
    InvalidFolderReference(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Server error {0}: {1}")]
    ServerError(u16, String),

    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_http_status(status: u16, message: impl Into<String>, retry_after_secs: Option<u64>) -> Self {
        let message = message.into();
        match status {
            401 => Self::AuthError(message),
            403 => Self::PermissionDenied(message),
            404 => Self::NotFound(message),
            429 => Self::RateLimited {
                message,
                retry_after_secs,
            },
            500..=599 => Self::ServerError(status, message),
            _ => Self::RequestFailed(message),
        }
    }

    /// Map a failed Drive response, reading the error reasons in `body`.
    pub fn from_drive_response(status: u16, operation: &str, body: &str, retry_after_secs: Option<u64>) -> Self {
        let message = format!("{} failed: {}", operation, body);
        if status == 403 && is_drive_rate_limit(body) {
            return Self::RateLimited {
                message,
                retry_after_secs,
            };
        }
        Self::from_http_status(status, message, retry_after_secs)
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Network(_)
            | StorageError::RateLimited { .. }
            | StorageError::ServerError(..) => true,
            StorageError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Server-provided wait before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            StorageError::RateLimited {
                retry_after_secs: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

/// True when a Drive error body (`{"error": {"errors": [{"reason": ..}]}}`)
/// names a rate-limit reason.
fn is_drive_rate_limit(body: &str) -> bool {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return false;
    };
    value
        .pointer("/error/errors")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|e| e.get("reason").and_then(Value::as_str))
        .any(|reason| DRIVE_RATE_LIMIT_REASONS.contains(&reason))
}

/// Parse a `Retry-After` header given in seconds.
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    #[test]
    fn test_from_http_status_429_is_retryable() {
        let err = StorageError::from_http_status(429, "slow down", Some(7));
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_from_http_status_500() {
        let err = StorageError::from_http_status(503, "unavailable", None);
        assert!(matches!(err, StorageError::ServerError(503, _)));
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn test_from_http_status_client_errors_not_retryable() {
        assert!(!StorageError::from_http_status(400, "bad", None).is_retryable());
        assert!(matches!(
            StorageError::from_http_status(404, "gone", None),
            StorageError::NotFound(_)
        ));
        assert!(matches!(
            StorageError::from_http_status(403, "nope", None),
            StorageError::PermissionDenied(_)
        ));
    }

    #[test]
    fn test_drive_403_rate_limit_is_retryable() {
        for reason in DRIVE_RATE_LIMIT_REASONS {
            let body = format!(
                r#"{{"error": {{"code": 403, "message": "slow down", "errors": [{{"domain": "usageLimits", "reason": "{reason}"}}]}}}}"#
            );
            let err = StorageError::from_drive_response(403, "list", &body, None);
            assert!(matches!(err, StorageError::RateLimited { .. }), "reason: {reason}");
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn test_drive_403_other_reasons_stay_denied() {
        let body = r#"{"error": {"code": 403, "errors": [{"reason": "insufficientFilePermissions"}]}}"#;
        let err = StorageError::from_drive_response(403, "upload", body, None);
        assert!(matches!(err, StorageError::PermissionDenied(_)));
        assert!(!err.is_retryable());

        let err = StorageError::from_drive_response(403, "upload", "not json", None);
        assert!(matches!(err, StorageError::PermissionDenied(_)));
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(parse_retry_after(&headers), Some(12));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }
}
