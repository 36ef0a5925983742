//! Speech-to-text via the Whisper CLI.
//!
//! Whisper writes `{audio_stem}.json` into an output directory we control
//! (a fresh temp dir), which we parse instead of scraping its console
//! output. The JSON carries the full text, the detected language and
//! per-segment timings; the last segment's end time is the duration.

use super::command::{ToolCommand, ToolFailure};
use crate::discovery::file_stem;
use crate::error::StageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Result of transcribing one audio file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    pub language: Option<String>,
    pub duration_secs: Option<f64>,
}

/// Turns an audio file into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<Transcription, StageError>;
}

/// [`Transcriber`] backed by the `whisper` CLI.
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    program: String,
    model: String,
    language: String,
}

impl WhisperTranscriber {
    pub fn new(program: impl Into<String>, model: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            model: model.into(),
            language: language.into(),
        }
    }

    fn command(&self, audio: &Path, output_dir: &Path) -> ToolCommand {
        ToolCommand::new(&self.program)
            .arg(audio)
            .arg("--model")
            .arg(&self.model)
            .arg("--language")
            .arg(&self.language)
            .args(["--output_format", "json", "--output_dir"])
            .arg(output_dir)
            .args(["--fp16", "False", "--verbose", "False"])
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<Transcription, StageError> {
        let fail = |detail: String| StageError::Transcription {
            path: audio.to_path_buf(),
            detail,
        };

        let out_dir = tempfile::tempdir().map_err(|e| fail(format!("temp dir: {e}")))?;
        self.command(audio, out_dir.path())
            .run()
            .await
            .map_err(|e| match e {
                ToolFailure::Missing { tool, detail } => StageError::ToolUnavailable { tool, detail },
                failed @ ToolFailure::Failed { .. } => fail(super::extract::last_lines(failed.detail(), 5)),
            })?;

        let json_path = out_dir.path().join(format!("{}.json", file_stem(audio)));
        let raw = tokio::fs::read_to_string(&json_path)
            .await
            .map_err(|e| fail(format!("whisper produced no JSON output: {e}")))?;
        let transcription = parse_whisper_json(&raw).map_err(fail)?;

        debug!(
            "Transcribed {} ({} chars, language {:?})",
            audio.display(),
            transcription.text.len(),
            transcription.language
        );
        Ok(transcription)
    }
}

#[derive(Deserialize)]
struct WhisperJson {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Deserialize)]
struct WhisperSegment {
    end: f64,
}

/// Parse Whisper's JSON output. Empty text is an error.
pub fn parse_whisper_json(raw: &str) -> Result<Transcription, String> {
    let parsed: WhisperJson =
        serde_json::from_str(raw).map_err(|e| format!("unreadable whisper JSON: {e}"))?;
    let text = parsed.text.trim().to_string();
    if text.is_empty() {
        return Err("no speech recognised".to_string());
    }
    Ok(Transcription {
        text,
        language: parsed.language,
        duration_secs: parsed.segments.last().map(|s| s.end),
    })
}
