//! Pipeline stages for media-to-study-guide processing.
//!
//! Each submodule implements exactly one transformation step behind a small
//! trait, so tests can swap any external tool for an in-process fake and
//! the stage runner never knows the difference.
//!
//! ## Data Flow
//!
//! ```text
//! video ──▶ extract ──▶ transcribe ──┐
//!           (ffmpeg)    (whisper)    │
//! audio ───────────────▶ transcribe ─┤
//! text  ──────────────────▶ import ──┼──▶ generate ──▶ postprocess ──▶ render
//! images ──────────────────▶ ocr ────┘      (LLM)       (cleanup)     (pandoc)
//! ```
//!
//! 1. [`extract`]: pull the audio track out of a video as MP3
//! 2. [`transcribe`]: speech-to-text with Whisper
//! 3. [`ocr`]: text from scanned images (Tesseract or a vision LLM)
//! 4. [`import`]: lenient text decoding and PDF-origin detection
//! 5. [`generate`]: the LLM call with retry/backoff; the only stage with
//!    network I/O
//! 6. [`postprocess`]: deterministic cleanup of model output
//! 7. [`render`]: Pandoc/LaTeX with engine fallback and [`marking`]
//!
//! Every file a stage produces goes through [`artifact`] so that a crash
//! never leaves a partial output under its final name.

pub mod artifact;
pub mod command;
pub mod encode;
pub mod extract;
pub mod generate;
pub mod import;
pub mod marking;
pub mod ocr;
pub mod postprocess;
pub mod render;
pub mod transcribe;

use crate::config::{OcrBackend, PipelineConfig};
use crate::error::StudyGenError;
use edgequake_llm::{LLMProvider, ProviderFactory};
use extract::{AudioExtractor, FfmpegExtractor};
use generate::{LlmGenerator, TextGenerator};
use ocr::{OcrEngine, TesseractOcr, VisionOcr};
use render::{DocumentRenderer, PandocRenderer};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use transcribe::{Transcriber, WhisperTranscriber};

/// The five external collaborators a run depends on.
///
/// [`Toolchain::from_config`] wires up the real tools. Tests and embedders
/// replace individual collaborators with the `with_*` methods.
#[derive(Clone)]
pub struct Toolchain {
    pub extractor: Arc<dyn AudioExtractor>,
    pub transcriber: Arc<dyn Transcriber>,
    pub ocr: Arc<dyn OcrEngine>,
    pub generator: Arc<dyn TextGenerator>,
    pub renderer: Arc<dyn DocumentRenderer>,
}

impl fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toolchain").finish_non_exhaustive()
    }
}

impl Toolchain {
    /// Build the default toolchain: ffmpeg, whisper, tesseract or vision OCR,
    /// an `edgequake_llm` provider, and pandoc.
    ///
    /// # Errors
    /// [`StudyGenError::ProviderNotConfigured`] if the LLM provider cannot be
    /// created.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, StudyGenError> {
        let provider = resolve_provider(config)?;
        Ok(Self::with_provider(config, provider))
    }

    /// Build the default toolchain around an already-constructed provider.
    pub fn with_provider(config: &PipelineConfig, provider: Arc<dyn LLMProvider>) -> Self {
        let tools = &config.tools;
        let ocr: Arc<dyn OcrEngine> = match config.ocr_backend {
            OcrBackend::Tesseract => Arc::new(TesseractOcr::new(&tools.tesseract, &config.ocr_language)),
            OcrBackend::Vision => Arc::new(VisionOcr::new(Arc::clone(&provider))),
        };
        Self {
            extractor: Arc::new(FfmpegExtractor::new(&tools.ffmpeg, config.ffmpeg_audio_quality)),
            transcriber: Arc::new(WhisperTranscriber::new(
                &tools.whisper,
                &config.whisper_model,
                &config.transcription_language,
            )),
            ocr,
            generator: Arc::new(LlmGenerator::new(provider, config)),
            renderer: Arc::new(PandocRenderer::new(&tools.pandoc)),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn AudioExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = transcriber;
        self
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = ocr;
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn DocumentRenderer>) -> Self {
        self.renderer = renderer;
        self
    }
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`): the caller constructed
///    and configured the provider entirely; we use it as-is.
///
/// 2. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`):
///    both set means the execution environment (Makefile, CI, a shared
///    lab machine) chose the model, which overrides the defaults.
///
/// 3. **Configured name + model** (`config.llm_provider`, `config.llm_model`),
///    "ollama" / "gemma3" unless changed. API keys for hosted providers are
///    read from the environment by [`ProviderFactory::create_llm_provider`].
pub fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, StudyGenError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            debug!("Using provider from environment: {}/{}", prov, model);
            return create_provider(&prov, &model);
        }
    }

    create_provider(&config.llm_provider, &config.llm_model)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, StudyGenError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        StudyGenError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!(
                "{e}\nFor local models start Ollama and pull the model (ollama pull {model}); \
                 for hosted providers set the matching API key."
            ),
        }
    })
}
