//! Audio extraction: pull the audio track out of a video as MP3.
//!
//! The extractor writes to whatever path it is given; the stage runner hands
//! it a [`PendingArtifact`](super::artifact::PendingArtifact) temp path and
//! commits only after a successful exit. The temp path ends in `.part`, so
//! the output format is forced with `-f mp3` rather than inferred from the
//! extension.

use super::command::{ToolCommand, ToolFailure};
use crate::error::StageError;
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Extracts a video's audio track to an MP3 file.
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    async fn extract(&self, video: &Path, output: &Path) -> Result<(), StageError>;
}

/// [`AudioExtractor`] backed by the `ffmpeg` CLI and libmp3lame.
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    program: String,
    quality: u8,
}

impl FfmpegExtractor {
    /// `quality` is libmp3lame's VBR scale: 0 (best) to 9.
    pub fn new(program: impl Into<String>, quality: u8) -> Self {
        Self {
            program: program.into(),
            quality: quality.min(9),
        }
    }

    fn command(&self, video: &Path, output: &Path) -> ToolCommand {
        ToolCommand::new(&self.program)
            .args(["-hide_banner", "-nostdin", "-y", "-i"])
            .arg(video)
            .args(["-vn", "-c:a", "libmp3lame", "-q:a"])
            .arg(self.quality.to_string())
            .args(["-f", "mp3"])
            .arg(output)
    }
}

#[async_trait]
impl AudioExtractor for FfmpegExtractor {
    async fn extract(&self, video: &Path, output: &Path) -> Result<(), StageError> {
        debug!("Extracting audio from {}", video.display());
        self.command(video, output)
            .run()
            .await
            .map(|_| ())
            .map_err(|e| match e {
                ToolFailure::Missing { tool, detail } => StageError::ToolUnavailable { tool, detail },
                failed @ ToolFailure::Failed { .. } => StageError::Extraction {
                    path: video.to_path_buf(),
                    detail: last_lines(failed.detail(), 5),
                },
            })
    }
}

/// The last `n` non-empty lines of tool output; ffmpeg puts the real error
/// at the bottom of a long banner.
pub(crate) fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
