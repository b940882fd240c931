//! Speech-to-text for source videos.
//!
//! Audio is extracted with FFmpeg into a scratch directory, then uploaded
//! to the Whisper transcription endpoint with segment timestamps.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use shortdraft_models::{has_video_extension, Transcript, TranscriptSegment, VIDEO_EXTENSIONS};
use shortdraft_storage::parse_retry_after;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::OpenAiSettings;
use crate::error::{WorkerError, WorkerResult};
use crate::retry::{invoke, RetryPolicy};

const SERVICE: &str = "whisper";

/// Upload limit of the transcription endpoint.
pub const MAX_AUDIO_BYTES: u64 = 25 * 1024 * 1024;

/// Turns a video file into a timed transcript.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, video: &Path) -> WorkerResult<Transcript>;
}

/// Check that `path` names an existing file with a supported video extension.
pub fn validate_video_path(path: &Path) -> WorkerResult<()> {
    if !path.exists() {
        return Err(WorkerError::invalid_input(format!(
            "File not found: {}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(WorkerError::invalid_input(format!(
            "Not a file: {}",
            path.display()
        )));
    }
    if !has_video_extension(path) {
        return Err(WorkerError::invalid_input(format!(
            "Unsupported video format: {} (expected one of {})",
            path.display(),
            VIDEO_EXTENSIONS.join(", ")
        )));
    }
    Ok(())
}

/// Extract a mono 16 kHz MP3 track from `video` into `out_dir`.
pub async fn extract_audio(video: &Path, out_dir: &Path) -> WorkerResult<PathBuf> {
    let ffmpeg = which::which("ffmpeg")
        .map_err(|_| WorkerError::audio_extraction("ffmpeg not found in PATH"))?;

    let audio_path = out_dir.join("audio.mp3");
    debug!(video = %video.display(), audio = %audio_path.display(), "Extracting audio");

    let output = Command::new(ffmpeg)
        .arg("-i")
        .arg(video)
        .args(["-vn", "-acodec", "libmp3lame", "-ac", "1", "-ar", "16000", "-b:a", "64k", "-y"])
        .arg(&audio_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr.lines().rev().take(5).collect::<Vec<_>>().join(" | ");
        return Err(WorkerError::audio_extraction(format!(
            "ffmpeg exited with {}: {}",
            output.status, tail
        )));
    }

    Ok(audio_path)
}

fn check_audio_size(bytes: u64) -> WorkerResult<()> {
    if bytes > MAX_AUDIO_BYTES {
        return Err(WorkerError::transcription_failed(format!(
            "extracted audio is {:.1} MiB, over the {} MiB upload limit",
            bytes as f64 / (1024.0 * 1024.0),
            MAX_AUDIO_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: Option<String>,
    segments: Option<Vec<WhisperSegment>>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

impl WhisperResponse {
    fn into_transcript(self) -> WorkerResult<Transcript> {
        let text = self
            .text
            .ok_or_else(|| WorkerError::transcription_failed("response has no 'text' field"))?;
        let segments = self
            .segments
            .ok_or_else(|| WorkerError::transcription_failed("response has no 'segments' list"))?;

        let segments = segments
            .into_iter()
            .map(|s| TranscriptSegment::new(s.start, s.end, s.text.trim()))
            .collect();

        Ok(Transcript::new(segments, text.trim()))
    }
}

/// Whisper API transcriber.
pub struct WhisperTranscriber {
    client: Client,
    settings: OpenAiSettings,
    policy: RetryPolicy,
}

impl WhisperTranscriber {
    pub fn new(settings: OpenAiSettings, policy: RetryPolicy) -> WorkerResult<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            settings,
            policy: policy.named("whisper.transcribe"),
        })
    }

    /// Upload one audio file. Single attempt.
    async fn request_transcription(&self, audio: &Path) -> WorkerResult<Transcript> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.mp3".to_string());

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name).mime_str("audio/mpeg")?)
            .text("model", self.settings.whisper_model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment");

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.settings.base_url))
            .bearer_auth(&self.settings.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers()).map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::from_status(SERVICE, status.as_u16(), body, retry_after));
        }

        let body: WhisperResponse = response.json().await?;
        body.into_transcript()
    }

    /// Transcribe an already extracted audio file.
    pub async fn transcribe_audio(&self, audio: &Path) -> WorkerResult<Transcript> {
        let size = tokio::fs::metadata(audio).await?.len();
        check_audio_size(size)?;
        invoke(&self.policy, || self.request_transcription(audio)).await
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, video: &Path) -> WorkerResult<Transcript> {
        validate_video_path(video)?;

        let scratch = tempfile::tempdir()?;
        let audio = extract_audio(video, scratch.path()).await?;
        let transcript = self.transcribe_audio(&audio).await?;

        info!(
            video = %video.display(),
            segments = transcript.segments.len(),
            duration_secs = transcript.duration(),
            "Transcription complete"
        );
        Ok(transcript)
    }
}
