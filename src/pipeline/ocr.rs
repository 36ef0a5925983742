//! OCR: read the text out of scanned images.
//!
//! Two backends sit behind [`OcrEngine`]:
//!
//! * [`TesseractOcr`] runs the local `tesseract` CLI. Good for printed slides
//!   and typed handouts; no network.
//! * [`VisionOcr`] sends each image to the configured LLM provider. Slower,
//!   but it reads handwriting and whiteboards that Tesseract cannot.
//!
//! [`recognize_batch`] runs an engine over a group's images in order and
//! joins the non-empty results with a blank line. An image that fails or
//! yields no text is logged and skipped; only a batch with no text at all is
//! an error.

use super::command::{ToolCommand, ToolFailure};
use super::encode::{encode_for_vision, load_scan, to_png};
use crate::error::StageError;
use crate::prompts::VISION_OCR_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Extracts text from one image. An image with no text returns `Ok("")`.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &Path) -> Result<String, StageError>;
}

/// Outcome of running OCR over a list of images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrBatch {
    /// Non-empty texts joined with `"\n\n"`, in input order.
    pub text: String,
    /// Images that yielded text.
    pub recognised: usize,
    /// Images that were read but contained no text.
    pub empty: usize,
    /// Images the engine failed on.
    pub failed: usize,
}

/// Run `engine` over `images` in order.
///
/// # Errors
/// [`StageError::Ocr`] if no image yielded any text. A missing engine
/// ([`StageError::ToolUnavailable`]) aborts the batch immediately since
/// every following image would fail the same way.
pub async fn recognize_batch(engine: &dyn OcrEngine, images: &[PathBuf]) -> Result<OcrBatch, StageError> {
    let mut texts = Vec::new();
    let mut empty = 0;
    let mut failed = 0;
    let mut last_error = None;

    for image in images {
        match engine.recognize(image).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    debug!("No text found in {}", image.display());
                    empty += 1;
                } else {
                    texts.push(text.to_string());
                }
            }
            Err(e @ StageError::ToolUnavailable { .. }) => return Err(e),
            Err(e) => {
                warn!("Could not OCR {}: {}", image.display(), e);
                failed += 1;
                last_error = Some(e.to_string());
            }
        }
    }

    if texts.is_empty() {
        return Err(StageError::Ocr {
            images: images.len(),
            detail: last_error.unwrap_or_else(|| "no text found in any image".to_string()),
        });
    }

    Ok(OcrBatch {
        recognised: texts.len(),
        text: texts.join("\n\n"),
        empty,
        failed,
    })
}

// ── Tesseract ────────────────────────────────────────────────────────────

/// [`OcrEngine`] backed by the `tesseract` CLI.
///
/// Each image is decoded and re-encoded as PNG first, so formats Tesseract
/// handles poorly (WebP, 16-bit TIFF) still work.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    program: String,
    language: String,
}

impl TesseractOcr {
    pub fn new(program: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            language: language.into(),
        }
    }

    fn command(&self, png: &Path) -> ToolCommand {
        ToolCommand::new(&self.program)
            .arg(png)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &Path) -> Result<String, StageError> {
        let fail = |detail: String| StageError::Ocr { images: 1, detail };

        let path = image.to_path_buf();
        let png = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, image::ImageError> {
            to_png(&load_scan(&path)?)
        })
        .await
        .map_err(|e| fail(format!("decode task failed: {e}")))?
        .map_err(|e| fail(format!("{}: {e}", image.display())))?;

        let mut tmp = tempfile::Builder::new()
            .prefix("studygen-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| fail(format!("temp file: {e}")))?;
        tmp.write_all(&png)
            .map_err(|e| fail(format!("temp file: {e}")))?;

        let out = self.command(tmp.path()).run().await.map_err(|e| match e {
            ToolFailure::Missing { tool, detail } => StageError::ToolUnavailable { tool, detail },
            failed @ ToolFailure::Failed { .. } => fail(failed.detail().to_string()),
        })?;
        Ok(out.stdout)
    }
}

// ── Vision LLM ───────────────────────────────────────────────────────────

/// [`OcrEngine`] that asks a vision-capable LLM to transcribe each image.
pub struct VisionOcr {
    provider: Arc<dyn LLMProvider>,
    max_tokens: usize,
}

impl VisionOcr {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            max_tokens: 4096,
        }
    }
}

#[async_trait]
impl OcrEngine for VisionOcr {
    async fn recognize(&self, image: &Path) -> Result<String, StageError> {
        let fail = |detail: String| StageError::Ocr { images: 1, detail };

        let path = image.to_path_buf();
        let data = tokio::task::spawn_blocking(move || -> Result<_, image::ImageError> {
            encode_for_vision(&load_scan(&path)?)
        })
        .await
        .map_err(|e| fail(format!("decode task failed: {e}")))?
        .map_err(|e| fail(format!("{}: {e}", image.display())))?;

        let messages = vec![
            ChatMessage::system(VISION_OCR_PROMPT),
            ChatMessage::user_with_images("", vec![data]),
        ];
        let options = CompletionOptions {
            temperature: Some(0.0),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| fail(e.to_string()))?;
        debug!(
            "Vision OCR {}: {} input tokens, {} output tokens",
            image.display(),
            response.prompt_tokens,
            response.completion_tokens
        );
        Ok(response.content)
    }
}
