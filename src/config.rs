//! Configuration types for a study-material run.
//!
//! All run behaviour is controlled through [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to log a run's settings and diff two runs to understand why their
//! outputs differ.
//!
//! The defaults target a fully local setup: Whisper `medium` for speech,
//! Tesseract for scans, `gemma3` on Ollama for writing, and Pandoc with
//! XeLaTeX for the handout.

use crate::classify::ExtensionSets;
use crate::error::StudyGenError;
use crate::pipeline::marking::AiMarking;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a directory run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_studygen::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .llm_model("llama3.1")
///     .whisper_model("small")
///     .generate_pdf(false)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// LLM provider name passed to `ProviderFactory` (e.g. "ollama", "openai"). Default: "ollama".
    pub llm_provider: String,

    /// LLM model identifier. Default: "gemma3".
    pub llm_model: String,

    /// Pre-constructed LLM provider. Takes precedence over `llm_provider`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for study generation. Default: 0.3.
    ///
    /// Study guides are expository writing, not transcription, so a little
    /// variety is welcome; much above 0.7 and models start inventing facts.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per study guide. Default: 8192.
    ///
    /// A full guide with glossary and assessment routinely runs past 4 000
    /// tokens. Setting this too low truncates the Knowledge Assessment.
    pub max_tokens: usize,

    /// Retries per study-generation request after the first attempt. Default: 3.
    pub max_retries: u32,

    /// Base backoff between retries in milliseconds, doubled each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Whisper model size: tiny, base, small, medium, large. Default: "medium".
    pub whisper_model: String,

    /// Spoken language passed to Whisper. Default: "en".
    pub transcription_language: String,

    /// libmp3lame VBR quality for extracted audio, 0 (best) – 9. Default: 2.
    pub ffmpeg_audio_quality: u8,

    /// Tesseract language code. Default: "eng".
    pub ocr_language: String,

    /// Which engine reads scanned images. Default: [`OcrBackend::Tesseract`].
    pub ocr_backend: OcrBackend,

    /// Render the study guide to PDF. Default: true.
    pub generate_pdf: bool,

    /// Full-featured typesetting engines, tried in order. Default: xelatex, pdflatex.
    pub pdf_engines: Vec<String>,

    /// Engine for the last-resort minimal render. Default: "pdflatex".
    pub fallback_engine: String,

    /// Suffix lists that decide which files are picked up and how.
    pub extensions: ExtensionSets,

    /// Custom study prompt template (must contain `{transcript}`). If None, uses the built-in prompt.
    pub prompt_file: Option<PathBuf>,

    /// Custom LaTeX header for the PDF. If None, uses the built-in header.
    pub header_file: Option<PathBuf>,

    /// Executables for the external tools.
    pub tools: ToolPaths,

    /// Optional AI-content marking (watermark, attribution, acknowledgment page).
    pub marking: Option<AiMarking>,

    /// Receives per-group and per-stage events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            llm_provider: "ollama".to_string(),
            llm_model: "gemma3".to_string(),
            provider: None,
            temperature: 0.3,
            max_tokens: 8192,
            max_retries: 3,
            retry_backoff_ms: 500,
            whisper_model: "medium".to_string(),
            transcription_language: "en".to_string(),
            ffmpeg_audio_quality: 2,
            ocr_language: "eng".to_string(),
            ocr_backend: OcrBackend::default(),
            generate_pdf: true,
            pdf_engines: vec!["xelatex".to_string(), "pdflatex".to_string()],
            fallback_engine: "pdflatex".to_string(),
            extensions: ExtensionSets::default(),
            prompt_file: None,
            header_file: None,
            tools: ToolPaths::default(),
            marking: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("llm_provider", &self.llm_provider)
            .field("llm_model", &self.llm_model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("whisper_model", &self.whisper_model)
            .field("transcription_language", &self.transcription_language)
            .field("ffmpeg_audio_quality", &self.ffmpeg_audio_quality)
            .field("ocr_language", &self.ocr_language)
            .field("ocr_backend", &self.ocr_backend)
            .field("generate_pdf", &self.generate_pdf)
            .field("pdf_engines", &self.pdf_engines)
            .field("fallback_engine", &self.fallback_engine)
            .field("prompt_file", &self.prompt_file)
            .field("header_file", &self.header_file)
            .field("tools", &self.tools)
            .field("marking", &self.marking)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn llm_provider(mut self, name: impl Into<String>) -> Self {
        self.config.llm_provider = name.into();
        self
    }

    pub fn llm_model(mut self, model: impl Into<String>) -> Self {
        self.config.llm_model = model.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n.max(256);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn whisper_model(mut self, model: impl Into<String>) -> Self {
        self.config.whisper_model = model.into();
        self
    }

    pub fn transcription_language(mut self, lang: impl Into<String>) -> Self {
        self.config.transcription_language = lang.into();
        self
    }

    pub fn ffmpeg_audio_quality(mut self, q: u8) -> Self {
        self.config.ffmpeg_audio_quality = q.min(9);
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn ocr_backend(mut self, backend: OcrBackend) -> Self {
        self.config.ocr_backend = backend;
        self
    }

    pub fn generate_pdf(mut self, v: bool) -> Self {
        self.config.generate_pdf = v;
        self
    }

    pub fn pdf_engines<I, S>(mut self, engines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.pdf_engines = engines.into_iter().map(Into::into).collect();
        self
    }

    pub fn fallback_engine(mut self, engine: impl Into<String>) -> Self {
        self.config.fallback_engine = engine.into();
        self
    }

    pub fn extensions(mut self, sets: ExtensionSets) -> Self {
        self.config.extensions = sets.normalised();
        self
    }

    pub fn prompt_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.prompt_file = Some(path.into());
        self
    }

    pub fn header_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.header_file = Some(path.into());
        self
    }

    pub fn tools(mut self, tools: ToolPaths) -> Self {
        self.config.tools = tools;
        self
    }

    pub fn marking(mut self, marking: AiMarking) -> Self {
        self.config.marking = Some(marking);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, StudyGenError> {
        let c = &self.config;
        if c.llm_model.trim().is_empty() && c.provider.is_none() {
            return Err(StudyGenError::InvalidConfig(
                "LLM model must not be empty".into(),
            ));
        }
        if c.whisper_model.trim().is_empty() {
            return Err(StudyGenError::InvalidConfig(
                "Whisper model must not be empty".into(),
            ));
        }
        if c.generate_pdf && c.pdf_engines.is_empty() {
            return Err(StudyGenError::InvalidConfig(
                "At least one PDF engine is required when PDF generation is enabled".into(),
            ));
        }
        if let Some(ext) = c.extensions.first_overlap() {
            return Err(StudyGenError::InvalidConfig(format!(
                "Extension '{ext}' is assigned to more than one media class"
            )));
        }
        if let Some(ref path) = c.header_file {
            if !path.is_file() {
                return Err(StudyGenError::InvalidConfig(format!(
                    "Header file not found: {}",
                    path.display()
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums & helpers ──────────────────────────────────────────────────────

/// OCR engine for scanned images.
///
/// | Backend | Use case |
/// |---------|----------|
/// | Tesseract | Printed slides, typed handouts; fully local (default) |
/// | Vision | Handwriting and whiteboards; sends each image to the configured LLM provider, which must be vision-capable |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrBackend {
    #[default]
    Tesseract,
    Vision,
}

/// Executable names (or absolute paths) of the external tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    pub ffmpeg: String,
    pub whisper: String,
    pub tesseract: String,
    pub pandoc: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            whisper: "whisper".to_string(),
            tesseract: "tesseract".to_string(),
            pandoc: "pandoc".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_local_setup() {
        let c = PipelineConfig::default();
        assert_eq!(c.llm_provider, "ollama");
        assert_eq!(c.llm_model, "gemma3");
        assert_eq!(c.whisper_model, "medium");
        assert_eq!(c.ffmpeg_audio_quality, 2);
        assert_eq!(c.ocr_language, "eng");
        assert!(c.generate_pdf);
        assert_eq!(c.pdf_engines, vec!["xelatex", "pdflatex"]);
        assert_eq!(c.ocr_backend, OcrBackend::Tesseract);
    }

    #[test]
    fn builder_clamps() {
        let c = PipelineConfig::builder()
            .temperature(5.0)
            .ffmpeg_audio_quality(42)
            .max_tokens(10)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.ffmpeg_audio_quality, 9);
        assert_eq!(c.max_tokens, 256);
    }

    #[test]
    fn empty_engines_rejected_only_with_pdf() {
        let err = PipelineConfig::builder()
            .pdf_engines(Vec::<String>::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, StudyGenError::InvalidConfig(_)));

        assert!(PipelineConfig::builder()
            .pdf_engines(Vec::<String>::new())
            .generate_pdf(false)
            .build()
            .is_ok());
    }

    #[test]
    fn overlapping_extensions_rejected() {
        let mut sets = ExtensionSets::default();
        sets.image.push("MP4".into());
        let err = PipelineConfig::builder().extensions(sets).build().unwrap_err();
        assert!(err.to_string().contains(".mp4"), "got: {err}");
    }

    #[test]
    fn missing_header_file_rejected() {
        let err = PipelineConfig::builder()
            .header_file("/definitely/not/here.tex")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Header file not found"));
    }

    #[test]
    fn debug_hides_provider() {
        let s = format!("{:?}", PipelineConfig::default());
        assert!(s.contains("gemma3"));
        assert!(s.contains("provider: None"));
    }
}
