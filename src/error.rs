//! Error types for the edgequake-studygen library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`StudyGenError`] (**fatal**): the run cannot proceed at all (root
//!   directory missing, invalid configuration, no LLM provider). Returned as
//!   `Err(StudyGenError)` from the top-level `process_*` functions.
//!
//! * [`StageError`] (**per group**): one stage of one file group failed
//!   (ffmpeg crashed, the transcript was empty, the LLM was unreachable).
//!   It is converted into a failed [`crate::output::ProcessResult`] at the
//!   group boundary and never aborts the directory walk.
//!
//! * [`RenderError`] (**per engine attempt**): a single typesetting engine
//!   failed. The renderer falls back to the next engine; only when every
//!   engine and the minimal fallback fail does it surface, and even then
//!   only as a warning on an otherwise successful group.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-studygen library.
#[derive(Debug, Error)]
pub enum StudyGenError {
    // ── Discovery errors ──────────────────────────────────────────────────
    /// The root directory is missing, not a directory, or not traversable.
    #[error("Cannot scan '{path}': {reason}")]
    Discovery { path: PathBuf, reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The study prompt template could not be loaded or is malformed.
    #[error("Prompt template '{path}' is unusable: {reason}")]
    PromptTemplate { path: PathBuf, reason: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider could not be created.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Run outcome ───────────────────────────────────────────────────────
    /// Some groups succeeded but at least one failed.
    ///
    /// Returned by [`crate::output::DirectorySummary::into_result`] when the
    /// caller wants to treat any group failure as an error.
    #[error("{failed}/{total} file groups failed")]
    PartialFailure {
        succeeded: usize,
        failed: usize,
        total: usize,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure of one pipeline stage for one file group.
#[derive(Debug, Error)]
pub enum StageError {
    /// Audio extraction from a video failed.
    #[error("Audio extraction failed for '{path}': {detail}")]
    Extraction { path: PathBuf, detail: String },

    /// Speech-to-text failed.
    #[error("Transcription failed for '{path}': {detail}")]
    Transcription { path: PathBuf, detail: String },

    /// Every image in an OCR batch failed or produced no text.
    #[error("OCR produced no text from {images} image(s): {detail}")]
    Ocr { images: usize, detail: String },

    /// The text-generation backend was unreachable or returned nothing usable.
    #[error("Study material generation failed for '{path}': {detail}")]
    Generation { path: PathBuf, detail: String },

    /// All typesetting engines and the minimal fallback failed.
    #[error("PDF rendering failed for '{path}': {detail}")]
    Render { path: PathBuf, detail: String },

    /// A stage input disappeared between discovery and processing.
    #[error("Input file not found: '{path}'")]
    MissingInput { path: PathBuf },

    /// An external executable could not be started.
    #[error("'{tool}' could not be started: {detail}\nIs it installed and on PATH?")]
    ToolUnavailable { tool: String, detail: String },

    /// Could not create, write, or commit an artifact.
    #[error("Failed to write artifact '{path}': {source}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A failure of a single typesetting attempt.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum RenderError {
    /// The engine ran and reported an error.
    #[error("PDF generation failed with {engine}: {detail}")]
    EngineFailed { engine: String, detail: String },

    /// The typesetter itself could not be started.
    #[error("'{tool}' could not be started: {detail}")]
    ToolUnavailable { tool: String, detail: String },

    /// Preparing inputs (marked markdown, header) failed.
    #[error("Could not prepare render inputs: {0}")]
    Io(String),
}
