//! Batch processing of one remote video per run.
//!
//! A run scans the input folder, claims the first unprocessed video by
//! creating its output folder, then downloads, transcribes, generates and
//! publishes. The output folder is created before any upload so a crash
//! mid-run still marks the video as taken. Nothing is rolled back on
//! failure; operators clear incomplete folders by hand.
//!
//! Claiming is not atomic. Two orchestrators scanning the same folders at
//! the same time can pick the same video, so only one instance may run
//! against a given input folder.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use shortdraft_models::{BatchResult, ErrorDescriptor, OutputLocations, WorkItem};
use shortdraft_storage::{extract_folder_id, RemoteStore};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::context::ProcessingContext;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::RunLogger;
use crate::notify::{failure_message, operator_now, start_message, success_message};
use crate::output::{write_draft, write_subtitle, write_transcript, OutputPaths};
use crate::retry::invoke;
use crate::scanner::BatchWorkScanner;

/// Name of the marker file recording which run claimed an output folder.
pub const CLAIM_MARKER_NAME: &str = ".claim";

/// Steps of a batch run, used as the error kind in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStep {
    ResolveFolders,
    Scan,
    Claim,
    Download,
    Transcribe,
    ExtractHooks,
    ExpandScripts,
    WriteOutputs,
    Publish,
}

impl BatchStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStep::ResolveFolders => "resolve_folders",
            BatchStep::Scan => "scan",
            BatchStep::Claim => "claim",
            BatchStep::Download => "download",
            BatchStep::Transcribe => "transcribe",
            BatchStep::ExtractHooks => "extract_hooks",
            BatchStep::ExpandScripts => "expand_scripts",
            BatchStep::WriteOutputs => "write_outputs",
            BatchStep::Publish => "publish",
        }
    }
}

impl std::fmt::Display for BatchStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct StepFailure {
    step: BatchStep,
    error: WorkerError,
}

impl StepFailure {
    fn describe(&self) -> ErrorDescriptor {
        ErrorDescriptor::from_error(self.step.as_str(), &self.error)
    }
}

trait AtStep<T> {
    fn at(self, step: BatchStep) -> Result<T, StepFailure>;
}

impl<T, E: Into<WorkerError>> AtStep<T> for Result<T, E> {
    fn at(self, step: BatchStep) -> Result<T, StepFailure> {
        self.map_err(|e| StepFailure {
            step,
            error: e.into(),
        })
    }
}

pub struct BatchOrchestrator {
    ctx: ProcessingContext,
    store: Arc<dyn RemoteStore>,
    scanner: BatchWorkScanner,
    work_root: Option<PathBuf>,
}

impl BatchOrchestrator {
    pub fn new(ctx: ProcessingContext, store: Arc<dyn RemoteStore>) -> Self {
        let scanner = BatchWorkScanner::new(store.clone(), ctx.retry.clone());
        Self {
            ctx,
            store,
            scanner,
            work_root: None,
        }
    }

    /// Place scratch directories under `dir` instead of the system temp dir.
    pub fn with_work_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_root = Some(dir.into());
        self
    }

    /// Process at most one unprocessed video. Never returns an error; every
    /// failure is reported in the result.
    pub async fn run_once(&self, input_ref: &str, output_ref: &str) -> BatchResult {
        let folders = extract_folder_id(input_ref)
            .and_then(|input| Ok((input, extract_folder_id(output_ref)?)))
            .at(BatchStep::ResolveFolders);
        let (input, output) = match folders {
            Ok(folders) => folders,
            Err(failure) => {
                warn!(error = %failure.error, "Invalid folder reference");
                return BatchResult::failure(None, failure.describe());
            }
        };

        let item = match self.scanner.find_next(&input, &output).await.at(BatchStep::Scan) {
            Ok(Some(item)) => item,
            Ok(None) => return BatchResult::idle(),
            Err(failure) => {
                warn!(error = %failure.error, "Scan failed");
                return BatchResult::failure(None, failure.describe());
            }
        };

        let run_id = Uuid::new_v4();
        let logger = RunLogger::new(&run_id, &item.display_name, "drive_batch");
        let started = Instant::now();

        self.notify(&start_message(&item.display_name, &operator_now())).await;
        logger.log_start("processing video");

        let outcome = self
            .process(&item, &output, &run_id, &logger)
            .instrument(logger.create_span())
            .await;

        match outcome {
            Ok(outputs) => {
                logger.log_completion(&format!("published to {}", outputs.draft));
                let message = success_message(&item.display_name, started.elapsed(), &outputs, &operator_now());
                self.notify(&message).await;
                BatchResult::success(item, outputs)
            }
            Err(failure) => {
                let descriptor = failure.describe();
                logger.log_error(&descriptor.to_string());
                if let Some(raw) = failure.error.raw_response() {
                    warn!(raw_response = %raw, "Model response kept for diagnosis");
                }
                let message = failure_message(&item.display_name, started.elapsed(), &descriptor, &operator_now());
                self.notify(&message).await;
                BatchResult::failure(Some(item), descriptor)
            }
        }
    }

    async fn process(
        &self,
        item: &WorkItem,
        output_root: &str,
        run_id: &Uuid,
        logger: &RunLogger,
    ) -> Result<OutputLocations, StepFailure> {
        let scratch = self.scratch_dir().at(BatchStep::Download)?;
        let base_name = item.output_base_name();

        let container = self.claim(output_root, &base_name, run_id, scratch.path()).await?;
        logger.log_progress(&format!("claimed output folder {}", container));

        let video = self.download(item, scratch.path()).await.at(BatchStep::Download)?;
        logger.log_progress("downloaded");

        let transcript = self.ctx.transcriber.transcribe(&video).await.at(BatchStep::Transcribe)?;
        transcript.validate().at(BatchStep::Transcribe)?;
        logger.log_progress(&format!("transcribed {} segments", transcript.segments.len()));

        let hooks = self.ctx.hooks.extract(&transcript).await.at(BatchStep::ExtractHooks)?;
        let scripts = self
            .ctx
            .expansion
            .expand(&hooks, &transcript.segments)
            .await
            .at(BatchStep::ExpandScripts)?;
        logger.log_progress(&format!("{} of {} scripts generated", scripts.len(), hooks.len()));

        let paths = OutputPaths::new(&scratch.path().join("out"), &base_name);
        write_transcript(&paths.transcript, &transcript).await.at(BatchStep::WriteOutputs)?;
        write_draft(&paths.draft, &scripts, &transcript, &item.display_name)
            .await
            .at(BatchStep::WriteOutputs)?;
        write_subtitle(&paths.subtitle, &transcript).await.at(BatchStep::WriteOutputs)?;

        let outputs = OutputLocations {
            draft: self.upload(&paths.draft, &container).await.at(BatchStep::Publish)?,
            subtitle: self.upload(&paths.subtitle, &container).await.at(BatchStep::Publish)?,
            transcript: self.upload(&paths.transcript, &container).await.at(BatchStep::Publish)?,
            video: self.upload(&video, &container).await.at(BatchStep::Publish)?,
        };
        info!(container = %container, "Outputs published");
        Ok(outputs)
    }

    /// Create (or reuse) the output folder, then drop a marker naming this run.
    async fn claim(
        &self,
        output_root: &str,
        base_name: &str,
        run_id: &Uuid,
        scratch: &Path,
    ) -> Result<String, StepFailure> {
        let policy = self.ctx.retry.named("store.create_container");
        let container = invoke(&policy, || async move {
            self.store
                .create_container(output_root, base_name)
                .await
                .map_err(WorkerError::from)
        })
        .await
        .at(BatchStep::Claim)?;

        let marker = scratch.join(CLAIM_MARKER_NAME);
        tokio::fs::write(&marker, format!("{}\n", run_id))
            .await
            .at(BatchStep::Claim)?;
        self.upload(&marker, &container).await.at(BatchStep::Claim)?;

        Ok(container)
    }

    async fn download(&self, item: &WorkItem, dir: &Path) -> WorkerResult<PathBuf> {
        let policy = self.ctx.retry.named("store.download");
        invoke(&policy, || async move {
            self.store.download(item, dir).await.map_err(WorkerError::from)
        })
        .await
    }

    async fn upload(&self, path: &Path, container: &str) -> WorkerResult<String> {
        let policy = self.ctx.retry.named("store.upload");
        invoke(&policy, || async move {
            self.store.upload(path, container).await.map_err(WorkerError::from)
        })
        .await
    }

    fn scratch_dir(&self) -> std::io::Result<tempfile::TempDir> {
        match &self.work_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                tempfile::Builder::new().prefix("shortdraft-").tempdir_in(root)
            }
            None => tempfile::Builder::new().prefix("shortdraft-").tempdir(),
        }
    }

    /// Best effort: failures are logged, never propagated.
    async fn notify(&self, message: &str) {
        if let Err(e) = self.ctx.notifier.send(message).await {
            warn!(error = %e, "Failed to send notification");
        }
    }
}
