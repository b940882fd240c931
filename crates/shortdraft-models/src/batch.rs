//! Batch work items and run results.

use std::error::Error as StdError;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Handle to a remote video awaiting processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub remote_id: String,
    pub display_name: String,
    /// Size in bytes, when the store reports one
    pub size: Option<u64>,
}

impl WorkItem {
    pub fn new(remote_id: impl Into<String>, display_name: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            remote_id: remote_id.into(),
            display_name: display_name.into(),
            size,
        }
    }

    /// Name of the output container for this item: the file name without
    /// its last extension.
    pub fn output_base_name(&self) -> String {
        Path::new(&self.display_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.display_name.clone())
    }
}

/// Where the artifacts of one processed item were published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLocations {
    pub draft: String,
    pub subtitle: String,
    pub video: String,
    pub transcript: String,
}

/// Flattened error for reporting outside the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    /// Pipeline step that failed
    pub kind: String,
    pub message: String,
    /// Messages of the wrapped causes, outermost first
    pub chain: Vec<String>,
}

impl ErrorDescriptor {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            chain: Vec::new(),
        }
    }

    /// Capture an error and its full source chain.
    pub fn from_error(kind: impl Into<String>, err: &(dyn StdError + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        Self {
            kind: kind.into(),
            message: err.to_string(),
            chain,
        }
    }
}

impl std::fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Terminal value of one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub succeeded: bool,
    pub processed_item: Option<WorkItem>,
    pub output_locations: Option<OutputLocations>,
    pub error: Option<ErrorDescriptor>,
}

impl BatchResult {
    /// Nothing was waiting to be processed.
    pub fn idle() -> Self {
        Self {
            succeeded: true,
            processed_item: None,
            output_locations: None,
            error: None,
        }
    }

    pub fn success(item: WorkItem, outputs: OutputLocations) -> Self {
        Self {
            succeeded: true,
            processed_item: Some(item),
            output_locations: Some(outputs),
            error: None,
        }
    }

    pub fn failure(item: Option<WorkItem>, error: ErrorDescriptor) -> Self {
        Self {
            succeeded: false,
            processed_item: item,
            output_locations: None,
            error: Some(error),
        }
    }

    /// True when the run found no work.
    pub fn is_idle(&self) -> bool {
        self.succeeded && self.processed_item.is_none()
    }
}
