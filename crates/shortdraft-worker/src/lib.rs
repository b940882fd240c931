//! Short-form video draft generation.
//!
//! This crate provides:
//! - Retrying invocation of remote services with backoff
//! - Extraction and validation of JSON payloads from model output
//! - Hook extraction and bounded-parallel script expansion
//! - Whisper transcription and OpenAI chat clients
//! - Markdown draft, SRT subtitle and transcript outputs
//! - A batch orchestrator over Drive folders with Slack notifications
//! - The local single-video pipeline

pub mod config;
pub mod context;
pub mod error;
pub mod expansion;
pub mod hooks;
pub mod llm;
pub mod logging;
pub mod notify;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod response;
pub mod retry;
pub mod scanner;
pub mod transcribe;


pub use config::{AppConfig, OpenAiSettings};
pub use context::{drive_store, ProcessingContext};
pub use error::{ResultExt, WorkerError, WorkerResult};
pub use expansion::ScriptExpansionPhase;
pub use hooks::HookExtractionPhase;
pub use llm::{LanguageModel, OpenAiChatClient};
pub use logging::RunLogger;
pub use notify::{NoopNotifier, Notifier, SlackNotifier};
pub use orchestrator::{BatchOrchestrator, BatchStep};
pub use pipeline::{DraftPipeline, LocalRunResult, UploadTarget};
pub use retry::{invoke, RetryPolicy};
pub use scanner::BatchWorkScanner;
pub use transcribe::{Transcriber, WhisperTranscriber};
