//! Draft, subtitle and transcript files.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use shortdraft_models::{format_hms, format_srt_time, DetailedScript, Transcript};

use crate::error::{WorkerError, WorkerResult};

const TRANSCRIPT_SUFFIX: &str = "_transcription";

/// File names produced for one source video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub draft: PathBuf,
    pub subtitle: PathBuf,
    pub transcript: PathBuf,
}

impl OutputPaths {
    pub fn new(output_dir: &Path, stem: &str) -> Self {
        Self {
            draft: output_dir.join(format!("{stem}_draft.md")),
            subtitle: output_dir.join(format!("{stem}_subtitle.srt")),
            transcript: output_dir.join(format!("{stem}{TRANSCRIPT_SUFFIX}.json")),
        }
    }
}

/// File stem of `path`, or `fallback` when it has none.
pub fn file_stem(path: &Path, fallback: &str) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback.to_string())
}

/// Stem for outputs generated from a saved transcript file.
pub fn stem_from_transcript_path(path: &Path) -> String {
    let stem = file_stem(path, "transcript");
    match stem.strip_suffix(TRANSCRIPT_SUFFIX) {
        Some(base) if !base.is_empty() => base.to_string(),
        _ => stem,
    }
}

/// Render the markdown draft document.
pub fn build_draft_markdown(
    scripts: &[DetailedScript],
    transcript: &Transcript,
    source_name: &str,
    generated_at: DateTime<Local>,
) -> String {
    let mut lines = vec![
        "# Short-form Video Draft".to_string(),
        String::new(),
        format!("**Source video**: {source_name}"),
        format!("**Generated at**: {}", generated_at.format("%Y-%m-%d %H:%M:%S")),
        format!("**Scripts**: {}", scripts.len()),
        String::new(),
        "---".to_string(),
        String::new(),
    ];

    for (i, script) in scripts.iter().enumerate() {
        let hook = &script.hook;
        lines.push(format!("## Script {}: {}", i + 1, hook.first_hook));
        lines.push(String::new());
        if let Some((start, end)) = script.time_range() {
            lines.push(format!("**Source range**: {} - {}", format_hms(start), format_hms(end)));
        }
        lines.push(format!("**Estimated length**: {}s", script.estimated_duration_seconds));
        lines.push(String::new());
        lines.push("**Hooks**:".to_string());
        lines.push(format!("1. {}", hook.first_hook));
        lines.push(format!("2. {}", hook.second_hook));
        lines.push(format!("3. {}", hook.third_hook));
        lines.push(String::new());
        lines.push(format!("**Conclusion**: {}", hook.last_conclusion));
        lines.push(String::new());
        lines.push(format!("**Summary**: {}", hook.summary));
        lines.push(String::new());
        lines.push("**Script**:".to_string());
        lines.push(String::new());
        lines.push(script.script_text.clone());
        lines.push(String::new());
        lines.push("---".to_string());
        lines.push(String::new());
    }

    lines.push("## Original Transcript".to_string());
    lines.push(String::new());
    lines.push("```".to_string());
    lines.push(transcript.full_text.clone());
    lines.push("```".to_string());

    lines.join("\n")
}

/// Render the transcript as SRT cues, one per segment.
pub fn build_srt(transcript: &Transcript) -> String {
    transcript
        .segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            format!(
                "{}\n{} --> {}\n{}\n",
                i + 1,
                format_srt_time(segment.start_time),
                format_srt_time(segment.end_time),
                segment.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

async fn write_file(path: &Path, contents: &[u8]) -> WorkerResult<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| WorkerError::output_generation(parent, e))?;
        }
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| WorkerError::output_generation(path, e))?;
    Ok(path.to_path_buf())
}

pub async fn write_draft(
    path: &Path,
    scripts: &[DetailedScript],
    transcript: &Transcript,
    source_name: &str,
) -> WorkerResult<PathBuf> {
    let markdown = build_draft_markdown(scripts, transcript, source_name, Local::now());
    write_file(path, markdown.as_bytes()).await
}

pub async fn write_subtitle(path: &Path, transcript: &Transcript) -> WorkerResult<PathBuf> {
    write_file(path, build_srt(transcript).as_bytes()).await
}

/// Save the transcript as pretty-printed JSON.
pub async fn write_transcript(path: &Path, transcript: &Transcript) -> WorkerResult<PathBuf> {
    let json = serde_json::to_vec_pretty(transcript).map_err(|e| WorkerError::output_generation(path, e))?;
    write_file(path, &json).await
}

/// Load a transcript saved by [`write_transcript`] and check it is usable.
pub async fn load_transcript(path: &Path) -> WorkerResult<Transcript> {
    if !path.is_file() {
        return Err(WorkerError::invalid_input(format!(
            "Transcript file not found: {}",
            path.display()
        )));
    }
    let bytes = tokio::fs::read(path).await?;
    let transcript: Transcript = serde_json::from_slice(&bytes)
        .map_err(|e| WorkerError::invalid_input(format!("{}: {}", path.display(), e)))?;
    transcript.validate()?;
    Ok(transcript)
}
