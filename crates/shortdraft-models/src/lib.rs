//! Shared data models for the short-form draft pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Transcripts and their timed segments
//! - Hook candidates and the detailed scripts expanded from them
//! - Batch work items and the result of one batch run
//! - Supported video types
//! - Timestamp formatting used by prompts and subtitle files

pub mod batch;
pub mod hook;
pub mod media;
pub mod timestamp;
pub mod transcript;

// Re-export common types
pub use batch::{BatchResult, ErrorDescriptor, OutputLocations, WorkItem};
pub use hook::{DetailedScript, HookCandidate, DEFAULT_SCRIPT_DURATION_SECS, HOOK_FIELDS};
pub use media::{has_video_extension, is_video_mime_type, VIDEO_EXTENSIONS, VIDEO_MIME_TYPES};
pub use timestamp::{format_hms, format_minutes_seconds, format_srt_time};
pub use transcript::{Transcript, TranscriptError, TranscriptSegment};
