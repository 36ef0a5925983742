//! PDF rendering: typeset the study Markdown with Pandoc and LaTeX.
//!
//! ## Engine fallback
//!
//! LaTeX installations differ wildly between machines. XeLaTeX handles the
//! Unicode that LLMs love (arrows, em-dashes, Greek letters) but is not
//! always installed; pdfLaTeX is nearly everywhere but chokes on that same
//! Unicode. [`render_pdf`] therefore tries each configured engine with the
//! full feature set (header, table of contents, numbered sections) and, if
//! all fail, one last minimal render with no header and no extras.
//!
//! Each attempt writes to its own [`PendingArtifact`], so a LaTeX run that
//! dies half-way never leaves a truncated PDF behind for the next run to
//! mistake for a finished one.

use super::artifact::{PendingArtifact, TEMP_PREFIX};
use super::command::{ToolCommand, ToolFailure};
use super::marking::AiMarking;
use crate::error::{RenderError, StageError};
use async_trait::async_trait;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// One Pandoc invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub markdown: PathBuf,
    pub output: PathBuf,
    pub engine: String,
    /// LaTeX file passed via `--include-in-header`.
    pub header: Option<PathBuf>,
    /// Table of contents and numbered sections.
    pub full_features: bool,
}

/// Turns a Markdown file into a PDF.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, job: &RenderJob) -> Result<(), RenderError>;
}

/// [`DocumentRenderer`] backed by the `pandoc` CLI.
#[derive(Debug, Clone)]
pub struct PandocRenderer {
    program: String,
}

impl PandocRenderer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, job: &RenderJob) -> ToolCommand {
        let mut cmd = ToolCommand::new(&self.program)
            .arg(&job.markdown)
            .arg("-o")
            .arg(&job.output)
            .arg(format!("--pdf-engine={}", job.engine));
        if let Some(dir) = job.markdown.parent().filter(|d| !d.as_os_str().is_empty()) {
            cmd = cmd.arg("--resource-path").arg(dir);
        }
        if let Some(ref header) = job.header {
            let mut flag = std::ffi::OsString::from("--include-in-header=");
            flag.push(header);
            cmd = cmd.arg(flag);
        }
        if job.full_features {
            cmd = cmd.args(["--toc", "--toc-depth=3", "--number-sections"]);
        }
        cmd.args([
            "--variable",
            "fontsize=12pt",
            "--pdf-engine-opt=-interaction=nonstopmode",
        ])
    }
}

#[async_trait]
impl DocumentRenderer for PandocRenderer {
    async fn render(&self, job: &RenderJob) -> Result<(), RenderError> {
        debug!("Rendering {} with {}", job.markdown.display(), job.engine);
        self.command(job).run().await.map(|_| ()).map_err(|e| match e {
            ToolFailure::Missing { tool, detail } => RenderError::ToolUnavailable { tool, detail },
            failed @ ToolFailure::Failed { .. } => RenderError::EngineFailed {
                engine: job.engine.clone(),
                detail: summarize_failure(failed.detail()),
            },
        })
    }
}

/// Everything [`render_pdf`] needs besides the file paths.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    pub engines: Vec<String>,
    pub fallback_engine: String,
    /// LaTeX header contents for full-featured attempts.
    pub header: String,
    pub marking: Option<AiMarking>,
}

/// Which attempt produced the PDF, and what failed before it.
#[derive(Debug, Clone, Serialize)]
pub struct RenderOutcome {
    pub engine: String,
    /// `true` if only the minimal render succeeded.
    pub minimal: bool,
    pub failed_attempts: Vec<RenderError>,
}

/// Render `markdown` to `pdf`, trying each engine then the minimal fallback.
///
/// # Errors
/// * [`StageError::ToolUnavailable`] if Pandoc itself cannot be started.
/// * [`StageError::Render`] if every attempt failed.
/// * [`StageError::ArtifactWrite`] if temp inputs cannot be prepared.
pub async fn render_pdf(
    renderer: &dyn DocumentRenderer,
    study: &Path,
    markdown: &str,
    pdf: &Path,
    plan: &RenderPlan,
) -> Result<RenderOutcome, StageError> {
    let marking = plan.marking.clone().unwrap_or_default();

    // The marked copy sits beside the study file so relative paths resolve
    // the same way; its temp prefix keeps discovery away from it.
    let input = temp_input(study, ".md", &marking.apply_to_markdown(markdown))?;
    let header = temp_input(study, ".tex", &marking.apply_to_header(&plan.header))?;
    let minimal_header = match marking.minimal_header() {
        Some(h) => Some(temp_input(study, ".tex", &h)?),
        None => None,
    };

    let mut failed = Vec::new();
    let full = plan.engines.iter().map(|e| (e.as_str(), true, Some(header.path())));
    let minimal = std::iter::once((
        plan.fallback_engine.as_str(),
        false,
        minimal_header.as_ref().map(|h| h.path()),
    ));

    for (engine, full_features, header_path) in full.chain(minimal) {
        let pending = PendingArtifact::with_suffix(pdf, ".pdf")?;
        let job = RenderJob {
            markdown: input.path().to_path_buf(),
            output: pending.path().to_path_buf(),
            engine: engine.to_string(),
            header: header_path.map(Path::to_path_buf),
            full_features,
        };

        match renderer.render(&job).await {
            Ok(()) => {
                pending.commit()?;
                info!(
                    "Rendered {} with {}{}",
                    pdf.display(),
                    engine,
                    if full_features { "" } else { " (minimal)" }
                );
                return Ok(RenderOutcome {
                    engine: engine.to_string(),
                    minimal: !full_features,
                    failed_attempts: failed,
                });
            }
            Err(RenderError::ToolUnavailable { tool, detail }) => {
                return Err(StageError::ToolUnavailable { tool, detail });
            }
            Err(e) => {
                warn!("{}", e);
                failed.push(e);
            }
        }
    }

    let detail = failed
        .last()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no engine configured".to_string());
    Err(StageError::Render {
        path: pdf.to_path_buf(),
        detail,
    })
}

fn temp_input(beside: &Path, suffix: &str, contents: &str) -> Result<NamedTempFile, StageError> {
    let dir = match beside.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let wrap = |e: std::io::Error| StageError::ArtifactWrite {
        path: beside.to_path_buf(),
        source: e,
    };
    let mut file = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(suffix)
        .tempfile_in(dir)
        .map_err(wrap)?;
    file.write_all(contents.as_bytes()).map_err(wrap)?;
    file.flush().map_err(wrap)?;
    Ok(file)
}

/// Reduce Pandoc/LaTeX output to something a user can act on.
pub fn summarize_failure(output: &str) -> String {
    if output.contains("Permission denied") {
        "Permission denied - check write permissions".to_string()
    } else if output.contains("No such file") || output.to_lowercase().contains("cannot find") {
        "Missing file or directory".to_string()
    } else if output.contains("Undefined control sequence") {
        "LaTeX syntax error in markdown file".to_string()
    } else if output.contains("LaTeX Error") || output.contains("Unicode character") {
        "LaTeX compilation error".to_string()
    } else {
        tail_chars(output, 500)
    }
}

fn tail_chars(s: &str, n: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(n)).collect()
}
