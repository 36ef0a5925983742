//! # edgequake-studygen
//!
//! Turn a folder of lecture recordings, notes and scans into LLM-written
//! study guides and PDF handouts.
//!
//! ## Why this crate?
//!
//! Course material arrives in every shape: screen recordings, voice memos,
//! typed notes, phone photos of a whiteboard. Each needs a different tool
//! before a language model can do anything with it. This crate walks a
//! directory tree, groups files that belong together by name, picks the best
//! source in each group, and drives it through the tools it needs. Every
//! intermediate is kept on disk, so an interrupted run resumes where it
//! stopped and a finished folder costs nothing to re-run.
//!
//! ## Pipeline Overview
//!
//! ```text
//! directory
//!  │
//!  ├─ 1. Discover  walk the tree, classify by extension, group by stem
//!  ├─ 2. Select    video > audio > text > images, per group
//!  ├─ 3. Extract   video → {stem}.mp3                     (ffmpeg)
//!  ├─ 4. Text      audio → {stem}.txt                     (whisper)
//!  │               images → {stem}_images.txt             (tesseract / vision LLM)
//!  ├─ 5. Study     transcript → {base}_study.md           (LLM, ollama by default)
//!  └─ 6. PDF       study → {base}.pdf                     (pandoc + LaTeX)
//! ```
//!
//! Each step is skipped when its output already exists, and every output is
//! written to a temp file and renamed into place, so an existing artifact is
//! always a complete one.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_studygen::{process_directory, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // ollama / gemma3 unless EDGEQUAKE_LLM_PROVIDER + EDGEQUAKE_MODEL are set
//!     let config = PipelineConfig::default();
//!     let summary = process_directory("course/", &config).await?;
//!     eprintln!("{} new, {} up to date, {} failed",
//!         summary.newly_processed, summary.up_to_date, summary.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `studygen` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-studygen = { version = "0.1", default-features = false }
//! ```
//!
//! ## External Tools
//!
//! | Tool | Needed for |
//! |------|-----------|
//! | `ffmpeg` | video sources |
//! | `whisper` (openai-whisper) | video and audio sources |
//! | `tesseract` | images, unless the vision OCR backend is selected |
//! | `pandoc` + `xelatex`/`pdflatex` | PDF output (`generate_pdf`) |
//!
//! Run [`check_prerequisites`] (or `studygen check`) to see what is available.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod check;
pub mod classify;
pub mod config;
pub mod discovery;
pub mod error;
pub mod orchestrate;
pub mod output;
pub mod paths;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod runner;
pub mod select;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use check::{check_prerequisites, Prerequisites, ToolStatus};
pub use classify::{ExtensionSets, MediaKind};
pub use config::{OcrBackend, PipelineConfig, PipelineConfigBuilder, ToolPaths};
pub use discovery::{discover, group_by_stem, FileGroup, FileGroups, GroupKey, MediaFile};
pub use error::{RenderError, StageError, StudyGenError};
pub use orchestrate::{process_directory, process_directory_sync, process_directory_with, RunContext};
pub use output::{DirectorySummary, GroupOutcome, Pass, ProcessResult};
pub use paths::{ArtifactPaths, Naming};
pub use pipeline::marking::{AiMarking, AuthorInfo, WatermarkConfig};
pub use pipeline::Toolchain;
pub use progress::{NoopProgressCallback, ProgressCallback, RunProgressCallback};
pub use runner::{ImageGroupSource, Source, Stage, StageRunner};
pub use select::{select_primary, PrimarySource, StartMode};
