//! Local draft generation for a single video or a saved transcript.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use shortdraft_models::Transcript;
use shortdraft_storage::RemoteStore;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::context::ProcessingContext;
use crate::error::{ResultExt, WorkerError, WorkerResult};
use crate::logging::RunLogger;
use crate::output::{
    file_stem, load_transcript, stem_from_transcript_path, write_draft, write_subtitle, write_transcript,
    OutputPaths,
};
use crate::retry::invoke;
use crate::transcribe::validate_video_path;

/// Drive folder that receives the draft and subtitle of a local run.
#[derive(Clone)]
pub struct UploadTarget {
    pub store: Arc<dyn RemoteStore>,
    pub folder_id: String,
}

/// Files written by one local run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRunResult {
    pub draft_path: PathBuf,
    pub subtitle_path: PathBuf,
    /// Only set when the transcript was produced by this run
    pub transcript_path: Option<PathBuf>,
    pub script_count: usize,
    /// Links for uploaded files, draft first
    pub uploaded: Vec<String>,
}

pub struct DraftPipeline {
    ctx: ProcessingContext,
    upload: Option<UploadTarget>,
}

impl DraftPipeline {
    pub fn new(ctx: ProcessingContext) -> Self {
        Self { ctx, upload: None }
    }

    pub fn with_upload(mut self, target: UploadTarget) -> Self {
        self.upload = Some(target);
        self
    }

    /// Transcribe a video, save the transcript, then generate outputs.
    pub async fn run_video(&self, video: &Path, output_dir: &Path) -> WorkerResult<LocalRunResult> {
        validate_video_path(video)?;

        let source_name = video
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| video.display().to_string());
        let logger = RunLogger::new(&Uuid::new_v4(), &source_name, "local_video");

        async {
            logger.log_start(&format!("output directory {}", output_dir.display()));

            let transcript = self
                .ctx
                .transcriber
                .transcribe(video)
                .await
                .context(format!("transcribing {}", video.display()))?;
            transcript.validate()?;

            let paths = OutputPaths::new(output_dir, &file_stem(video, "video"));
            write_transcript(&paths.transcript, &transcript).await?;
            logger.log_progress(&format!("transcript saved to {}", paths.transcript.display()));

            let mut result = self.generate(&transcript, &paths, &source_name, &logger).await?;
            result.transcript_path = Some(paths.transcript);
            logger.log_completion(&format!("{} scripts", result.script_count));
            Ok::<_, WorkerError>(result)
        }
        .instrument(logger.create_span())
        .await
    }

    /// Generate outputs from a transcript saved by an earlier run.
    pub async fn run_transcript(&self, transcript_file: &Path, output_dir: &Path) -> WorkerResult<LocalRunResult> {
        let transcript = load_transcript(transcript_file).await?;

        let stem = stem_from_transcript_path(transcript_file);
        let logger = RunLogger::new(&Uuid::new_v4(), &stem, "local_transcript");

        async {
            logger.log_start(&format!("loaded {} segments", transcript.segments.len()));
            let paths = OutputPaths::new(output_dir, &stem);
            let result = self.generate(&transcript, &paths, &stem, &logger).await?;
            logger.log_completion(&format!("{} scripts", result.script_count));
            Ok::<_, WorkerError>(result)
        }
        .instrument(logger.create_span())
        .await
    }

    async fn generate(
        &self,
        transcript: &Transcript,
        paths: &OutputPaths,
        source_name: &str,
        logger: &RunLogger,
    ) -> WorkerResult<LocalRunResult> {
        let hooks = self.ctx.hooks.extract(transcript).await?;
        let scripts = self.ctx.expansion.expand(&hooks, &transcript.segments).await?;
        logger.log_progress(&format!("{} of {} scripts generated", scripts.len(), hooks.len()));

        let draft_path = write_draft(&paths.draft, &scripts, transcript, source_name).await?;
        let subtitle_path = write_subtitle(&paths.subtitle, transcript).await?;

        let uploaded = match &self.upload {
            Some(target) => self.upload_outputs(target, &[draft_path.as_path(), subtitle_path.as_path()], logger).await,
            None => Vec::new(),
        };

        Ok(LocalRunResult {
            draft_path,
            subtitle_path,
            transcript_path: None,
            script_count: scripts.len(),
            uploaded,
        })
    }

    /// Upload failures are warnings; the local files are already written.
    async fn upload_outputs(&self, target: &UploadTarget, files: &[&Path], logger: &RunLogger) -> Vec<String> {
        let policy = self.ctx.retry.named("store.upload");
        let mut links = Vec::with_capacity(files.len());

        for file in files {
            let result = invoke(&policy, || async move {
                target
                    .store
                    .upload(file, &target.folder_id)
                    .await
                    .map_err(WorkerError::from)
            })
            .await;

            match result {
                Ok(link) => {
                    info!(file = %file.display(), link = %link, "Uploaded");
                    links.push(link);
                }
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "Upload failed");
                    logger.log_warning(&format!("upload of {} failed", file.display()));
                }
            }
        }
        links
    }
}
