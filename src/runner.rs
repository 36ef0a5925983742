//! Stage runner: drive one source through its stage sequence.
//!
//! ## Stages
//!
//! | # | Stage | Output | Runs for |
//! |---|-------|--------|----------|
//! | 1 | [`Stage::ExtractAudio`] | `{stem}.mp3` | video |
//! | 2 | [`Stage::Transcribe`] / [`Stage::Ocr`] / [`Stage::ImportText`] | transcript | all |
//! | 3 | [`Stage::GenerateStudy`] | `{base}_study.md` | all |
//! | 4 | [`Stage::RenderPdf`] | `{base}.pdf` | when PDF output is enabled |
//!
//! Every stage is gated on its output file: if the file exists the stage is
//! skipped. Re-running a directory therefore resumes at the first missing
//! artifact, and because every artifact is written atomically, "exists"
//! always means "complete".
//!
//! A failure in stages 1–3 stops the sequence and fails the source. A
//! failure in stage 4 does not: the study document is the primary
//! deliverable, so a render failure is recorded as a warning in the
//! result's metadata and `success` stays `true`.

use crate::config::PipelineConfig;
use crate::error::{StageError, StudyGenError};
use crate::output::ProcessResult;
use crate::paths::{ArtifactPaths, Naming};
use crate::pipeline::artifact::{write_atomic, PendingArtifact};
use crate::pipeline::generate::StudyRequest;
use crate::pipeline::import::{has_pdf_marker, read_text};
use crate::pipeline::ocr::recognize_batch;
use crate::pipeline::postprocess::{clean_markdown, missing_sections};
use crate::pipeline::render::{render_pdf, RenderPlan};
use crate::pipeline::Toolchain;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::prompts::{self, DEFAULT_LATEX_HEADER, DEFAULT_STUDY_TEMPLATE, STUDY_SYSTEM_PROMPT};
use crate::select::{PrimarySource, StartMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ── Sources ──────────────────────────────────────────────────────────────

/// Images processed together into one transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageGroupSource {
    /// Directory that receives the artifacts.
    pub dir: PathBuf,
    /// Stem of the artifacts: the shared file stem, or the directory name
    /// for loose images.
    pub stem: String,
    /// Images in OCR order.
    pub images: Vec<PathBuf>,
    /// Append `_images` to the stem so the artifacts cannot collide with
    /// another source's.
    pub suffixed: bool,
}

/// One logical input to the stage sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Video(PathBuf),
    Audio(PathBuf),
    Text(PathBuf),
    Images(ImageGroupSource),
}

impl Source {
    /// Convert a selected primary source. Image primaries return `None`:
    /// an image source needs the whole image set, not one file.
    pub fn from_primary(primary: &PrimarySource) -> Option<Self> {
        match primary.mode {
            StartMode::Video => Some(Source::Video(primary.path.clone())),
            StartMode::Audio => Some(Source::Audio(primary.path.clone())),
            StartMode::Text => Some(Source::Text(primary.path.clone())),
            StartMode::Images => None,
        }
    }

    pub fn mode(&self) -> StartMode {
        match self {
            Source::Video(_) => StartMode::Video,
            Source::Audio(_) => StartMode::Audio,
            Source::Text(_) => StartMode::Text,
            Source::Images(_) => StartMode::Images,
        }
    }

    /// Artifact paths for this source.
    pub fn artifact_paths(&self, source_was_pdf: bool) -> ArtifactPaths {
        match self {
            Source::Video(p) | Source::Audio(p) | Source::Text(p) => ArtifactPaths::derive(
                p,
                self.mode(),
                Naming {
                    images_suffix: false,
                    source_was_pdf,
                },
            ),
            Source::Images(g) => ArtifactPaths::for_stem(
                &g.dir,
                &g.stem,
                StartMode::Images,
                Naming {
                    images_suffix: g.suffixed,
                    source_was_pdf,
                },
            ),
        }
    }
}

// ── Stages ───────────────────────────────────────────────────────────────

/// One step of the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ExtractAudio,
    Transcribe,
    Ocr,
    ImportText,
    GenerateStudy,
    RenderPdf,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::ExtractAudio => "extract audio",
            Stage::Transcribe => "transcribe",
            Stage::Ocr => "ocr",
            Stage::ImportText => "import text",
            Stage::GenerateStudy => "study material",
            Stage::RenderPdf => "pdf",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stages considered for a start mode, in order.
pub fn steps_for(mode: StartMode, generate_pdf: bool) -> Vec<Stage> {
    let mut steps = match mode {
        StartMode::Video => vec![Stage::ExtractAudio, Stage::Transcribe],
        StartMode::Audio => vec![Stage::Transcribe],
        StartMode::Text => vec![Stage::ImportText],
        StartMode::Images => vec![Stage::Ocr],
    };
    steps.push(Stage::GenerateStudy);
    if generate_pdf {
        steps.push(Stage::RenderPdf);
    }
    steps
}

// ── Runner ───────────────────────────────────────────────────────────────

type Tagged = (Stage, StageError);

fn at(stage: Stage) -> impl Fn(StageError) -> Tagged {
    move |e| (stage, e)
}

/// Runs sources through their stages with one configuration and toolchain.
///
/// Construct once per directory run; the prompt template and LaTeX header
/// are loaded and validated up front.
pub struct StageRunner<'a> {
    config: &'a PipelineConfig,
    tools: &'a Toolchain,
    template: String,
    header: String,
    progress: ProgressCallback,
}

impl<'a> StageRunner<'a> {
    /// # Errors
    /// [`StudyGenError::PromptTemplate`] for an unusable prompt file and
    /// [`StudyGenError::InvalidConfig`] for an unreadable header file.
    pub fn new(config: &'a PipelineConfig, tools: &'a Toolchain) -> Result<Self, StudyGenError> {
        let template = match config.prompt_file {
            Some(ref path) => prompts::load_template(path)?,
            None => DEFAULT_STUDY_TEMPLATE.to_string(),
        };
        let header = match config.header_file {
            Some(ref path) => std::fs::read_to_string(path).map_err(|e| {
                StudyGenError::InvalidConfig(format!("Cannot read header file {}: {e}", path.display()))
            })?,
            None => DEFAULT_LATEX_HEADER.to_string(),
        };
        let progress = config
            .progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressCallback));

        Ok(Self {
            config,
            tools,
            template,
            header,
            progress,
        })
    }

    /// Run every stage `source` still needs. Never fails: stage errors are
    /// converted into a failed [`ProcessResult`].
    pub async fn run(&self, source: &Source, label: &str) -> ProcessResult {
        let steps = steps_for(source.mode(), self.config.generate_pdf);
        self.progress.on_group_start(label, steps.len());

        let mut ran = Vec::new();
        let mut result = match self.run_stages(source, label, &mut ran).await {
            Ok(r) => r,
            Err((stage, e)) => {
                warn!("{}: {} failed: {}", label, stage, e);
                ProcessResult::failed(e.to_string())
                    .with_meta("mode", source.mode().as_str())
                    .with_meta("failed_stage", stage.as_str())
            }
        };
        result.stages_run = ran;

        if result.success {
            info!("{}: {}", label, result.message);
        }
        self.progress.on_group_complete(label, result.success, &result.message);
        result
    }

    async fn run_stages(
        &self,
        source: &Source,
        label: &str,
        ran: &mut Vec<Stage>,
    ) -> Result<ProcessResult, Tagged> {
        let paths = source.artifact_paths(false);
        let mut result = ProcessResult {
            success: true,
            ..ProcessResult::default()
        }
        .with_meta("mode", source.mode().as_str());

        // ── Stage 1: extract audio ───────────────────────────────────────
        if let Source::Video(video) = source {
            let stage = Stage::ExtractAudio;
            // The audio only feeds transcription.
            let gate = if paths.transcript.exists() {
                &paths.transcript
            } else {
                &paths.audio
            };
            if self.begin(label, stage, gate) {
                require_input(video).map_err(at(stage))?;
                self.extract_audio(video, &paths.audio).await.map_err(at(stage))?;
                self.finish(label, stage, ran);
            }
        }

        // ── Stage 2: transcript ──────────────────────────────────────────
        match source {
            Source::Video(_) | Source::Audio(_) => {
                let stage = Stage::Transcribe;
                if self.begin(label, stage, &paths.transcript) {
                    let audio = match source {
                        Source::Audio(p) => p.as_path(),
                        _ => paths.audio.as_path(),
                    };
                    require_input(audio).map_err(at(stage))?;
                    let t = self.tools.transcriber.transcribe(audio).await.map_err(at(stage))?;
                    write_atomic(&paths.transcript, t.text.as_bytes()).map_err(at(stage))?;
                    if let Some(lang) = t.language {
                        result.set_meta("language", lang);
                    }
                    if let Some(secs) = t.duration_secs {
                        result.set_meta("duration_secs", secs);
                    }
                    self.finish(label, stage, ran);
                }
            }
            Source::Text(text) => {
                let stage = Stage::ImportText;
                if text == &paths.transcript {
                    require_input(text).map_err(at(stage))?;
                    self.progress.on_stage_complete(label, stage, true);
                } else if self.begin(label, stage, &paths.transcript) {
                    let content = read_text(text).await.map_err(at(stage))?;
                    write_atomic(&paths.transcript, content.as_bytes()).map_err(at(stage))?;
                    self.finish(label, stage, ran);
                }
            }
            Source::Images(group) => {
                let stage = Stage::Ocr;
                if self.begin(label, stage, &paths.transcript) {
                    let batch = recognize_batch(self.tools.ocr.as_ref(), &group.images)
                        .await
                        .map_err(at(stage))?;
                    write_atomic(&paths.transcript, batch.text.as_bytes()).map_err(at(stage))?;
                    result.set_meta("images", group.images.len());
                    result.set_meta("images_recognised", batch.recognised);
                    result.set_meta("images_without_text", batch.empty);
                    result.set_meta("images_failed", batch.failed);
                    self.finish(label, stage, ran);
                }
            }
        }

        // Study and PDF naming depend on what the transcript is.
        let needs_text = !paths.study.exists() || self.config.generate_pdf;
        let transcript = if needs_text {
            read_text(&paths.transcript).await.map_err(at(Stage::GenerateStudy))?
        } else {
            String::new()
        };
        let source_was_pdf = has_pdf_marker(&transcript)
            || paths.clone().with_source_was_pdf(true).pdf.exists()
            || is_user_pdf(&paths.pdf, &paths.study);
        let paths = paths.with_source_was_pdf(source_was_pdf);
        result.set_meta("transcript", paths.transcript.display().to_string());
        result.set_meta("source_was_pdf", source_was_pdf);

        // ── Stage 3: study material ──────────────────────────────────────
        let stage = Stage::GenerateStudy;
        if self.begin(label, stage, &paths.study) {
            self.generate_study(&paths.transcript, &transcript, &paths.study, &mut result)
                .await
                .map_err(at(stage))?;
            self.finish(label, stage, ran);
        }
        result.set_meta("study", paths.study.display().to_string());
        result.output_path = Some(paths.study.clone());

        // ── Stage 4: PDF ─────────────────────────────────────────────────
        if !self.config.generate_pdf {
            result.set_meta("pdf_status", "disabled");
            result.message = format!("Study material ready: {}", file_name(&paths.study));
            return Ok(result);
        }

        let stage = Stage::RenderPdf;
        if self.begin(label, stage, &paths.pdf) {
            match self.render(&paths.study, &paths.pdf).await {
                Ok(outcome) => {
                    result.set_meta("pdf_status", "created");
                    result.set_meta("pdf_engine", outcome.engine);
                    if outcome.minimal {
                        result.set_meta("pdf_minimal", true);
                    }
                    result.output_path = Some(paths.pdf.clone());
                    result.message = format!("Study guide ready: {}", file_name(&paths.pdf));
                }
                Err(e) => {
                    warn!("{}: PDF not generated: {}", label, e);
                    result.set_meta("pdf_status", "failed");
                    result.set_meta("pdf_error", e.to_string());
                    result.message = format!(
                        "Study material ready: {} (PDF failed: {e})",
                        file_name(&paths.study)
                    );
                }
            }
            self.finish(label, stage, ran);
        } else {
            result.set_meta("pdf_status", "exists");
            result.output_path = Some(paths.pdf.clone());
            result.message = format!("Study guide ready: {}", file_name(&paths.pdf));
        }

        Ok(result)
    }

    async fn extract_audio(&self, video: &Path, audio: &Path) -> Result<(), StageError> {
        let pending = PendingArtifact::new(audio)?;
        self.tools.extractor.extract(video, pending.path()).await?;
        pending.commit()?;
        Ok(())
    }

    async fn generate_study(
        &self,
        transcript_path: &Path,
        transcript: &str,
        study: &Path,
        result: &mut ProcessResult,
    ) -> Result<(), StageError> {
        if transcript.trim().is_empty() {
            return Err(StageError::Generation {
                path: transcript_path.to_path_buf(),
                detail: "transcript is empty".to_string(),
            });
        }

        let prompt = prompts::render_study_prompt(&self.template, transcript);
        let generation = self
            .tools
            .generator
            .generate(StudyRequest {
                transcript: transcript_path,
                system: STUDY_SYSTEM_PROMPT,
                prompt: &prompt,
            })
            .await?;

        let markdown = clean_markdown(&generation.content);
        if markdown.trim().is_empty() {
            return Err(StageError::Generation {
                path: transcript_path.to_path_buf(),
                detail: "model returned no content".to_string(),
            });
        }

        let missing = missing_sections(&markdown);
        if !missing.is_empty() {
            warn!("{}: study material lacks sections: {}", study.display(), missing.join(", "));
            result.set_meta("missing_sections", missing);
        }
        result.set_meta("input_tokens", generation.input_tokens);
        result.set_meta("output_tokens", generation.output_tokens);
        if generation.retries > 0 {
            result.set_meta("llm_retries", generation.retries);
        }

        write_atomic(study, markdown.as_bytes())
    }

    async fn render(
        &self,
        study: &Path,
        pdf: &Path,
    ) -> Result<crate::pipeline::render::RenderOutcome, StageError> {
        let markdown = read_text(study).await?;
        let plan = RenderPlan {
            engines: self.config.pdf_engines.clone(),
            fallback_engine: self.config.fallback_engine.clone(),
            header: self.header.clone(),
            marking: self.config.marking.clone(),
        };
        render_pdf(self.tools.renderer.as_ref(), study, &markdown, pdf, &plan).await
    }

    /// `true` if the stage must run. Skips are reported immediately.
    fn begin(&self, label: &str, stage: Stage, output: &Path) -> bool {
        if output.exists() {
            info!("{}: {} skipped, {} exists", label, stage, output.display());
            self.progress.on_stage_complete(label, stage, true);
            false
        } else {
            debug!("{}: {} starting", label, stage);
            self.progress.on_stage_start(label, stage);
            true
        }
    }

    fn finish(&self, label: &str, stage: Stage, ran: &mut Vec<Stage>) {
        ran.push(stage);
        self.progress.on_stage_complete(label, stage, false);
    }
}

fn require_input(path: &Path) -> Result<(), StageError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(StageError::MissingInput {
            path: path.to_path_buf(),
        })
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `true` if `pdf` was not rendered from `study`: it exists and is older
/// than the study document, or there is no study document yet. A rendered
/// PDF is always written after its study document, so the answer does not
/// change between runs.
fn is_user_pdf(pdf: &Path, study: &Path) -> bool {
    let Ok(pdf_modified) = std::fs::metadata(pdf).and_then(|m| m.modified()) else {
        return false;
    };
    match std::fs::metadata(study).and_then(|m| m.modified()) {
        Ok(study_modified) => pdf_modified < study_modified,
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_per_mode() {
        assert_eq!(
            steps_for(StartMode::Video, true),
            vec![
                Stage::ExtractAudio,
                Stage::Transcribe,
                Stage::GenerateStudy,
                Stage::RenderPdf
            ]
        );
        assert_eq!(
            steps_for(StartMode::Images, false),
            vec![Stage::Ocr, Stage::GenerateStudy]
        );
        assert_eq!(steps_for(StartMode::Text, true)[0], Stage::ImportText);
    }

    #[test]
    fn image_primary_is_not_a_source() {
        let p = PrimarySource {
            path: PathBuf::from("/c/a.png"),
            mode: StartMode::Images,
        };
        assert_eq!(Source::from_primary(&p), None);
        let v = PrimarySource {
            path: PathBuf::from("/c/a.mp4"),
            mode: StartMode::Video,
        };
        assert_eq!(Source::from_primary(&v), Some(Source::Video(PathBuf::from("/c/a.mp4"))));
    }

    #[test]
    fn image_source_paths_use_suffix_flag() {
        let src = Source::Images(ImageGroupSource {
            dir: PathBuf::from("/c"),
            stem: "lecture1".into(),
            images: vec![PathBuf::from("/c/lecture1.png")],
            suffixed: true,
        });
        let p = src.artifact_paths(false);
        assert_eq!(p.transcript, PathBuf::from("/c/lecture1_images.txt"));
        assert_eq!(p.study, PathBuf::from("/c/lecture1_images_study.md"));
    }

    fn write_aged(path: &Path, age_secs: u64) {
        std::fs::write(path, b"x").unwrap();
        let when = std::time::SystemTime::now() - std::time::Duration::from_secs(age_secs);
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(when)
            .unwrap();
    }

    #[test]
    fn user_pdf_is_one_older_than_the_study_document() {
        let dir = tempfile::TempDir::new().unwrap();
        let pdf = dir.path().join("paper.pdf");
        let study = dir.path().join("paper_study.md");

        assert!(!is_user_pdf(&pdf, &study), "no pdf at all");

        write_aged(&pdf, 3600);
        assert!(is_user_pdf(&pdf, &study), "pdf without a study document");

        write_aged(&study, 60);
        assert!(is_user_pdf(&pdf, &study), "pdf older than the study document");

        write_aged(&pdf, 0);
        assert!(!is_user_pdf(&pdf, &study), "pdf rendered after the study document");
    }
}
