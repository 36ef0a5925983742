//! Orchestrator integration tests with in-process collaborators.
//!
//! Every external tool is replaced by a mock that writes plausible output and
//! counts its invocations, so these tests need no ffmpeg, whisper, tesseract,
//! pandoc or LLM.
//!
//! Run with:
//!   cargo test --test orchestrator

use async_trait::async_trait;
use edgequake_studygen::pipeline::extract::AudioExtractor;
use edgequake_studygen::pipeline::generate::{Generation, StudyRequest, TextGenerator};
use edgequake_studygen::pipeline::ocr::OcrEngine;
use edgequake_studygen::pipeline::render::{DocumentRenderer, RenderJob};
use edgequake_studygen::pipeline::transcribe::{Transcriber, Transcription};
use edgequake_studygen::{
    process_directory_with, DirectorySummary, PipelineConfig, RenderError, RunProgressCallback,
    Stage, StageError, StudyGenError, Toolchain,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

// ── Mock collaborators ───────────────────────────────────────────────────────

#[derive(Default)]
struct MockExtractor {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl AudioExtractor for MockExtractor {
    async fn extract(&self, video: &Path, output: &Path) -> Result<(), StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // A real encoder writes as it goes; simulate a crash mid-file.
        fs::write(output, b"ID3 partial").unwrap();
        if self.fail {
            return Err(StageError::Extraction {
                path: video.to_path_buf(),
                detail: "simulated ffmpeg crash".into(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
struct MockTranscriber {
    calls: AtomicUsize,
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<Transcription, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let stem = audio.file_stem().unwrap().to_string_lossy();
        Ok(Transcription {
            text: format!("Spoken lecture about {stem}."),
            language: Some("en".into()),
            duration_secs: Some(12.5),
        })
    }
}

#[derive(Default)]
struct MockOcr {
    calls: AtomicUsize,
    blank: bool,
}

#[async_trait]
impl OcrEngine for MockOcr {
    async fn recognize(&self, image: &Path) -> Result<String, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.blank {
            return Ok(String::new());
        }
        let name = image.file_name().unwrap().to_string_lossy();
        Ok(format!("text from {name}"))
    }
}

const STUDY_DOC: &str = "# Photosynthesis\n\n\
## Learning Objectives\n\n- Explain light reactions\n\n\
## Executive Overview\n\nPlants make sugar.\n\n\
## Core Concepts\n\nChlorophyll.\n\n\
## In-Depth\n\nCalvin cycle.\n\n\
## Summary\n\nSunlight to sugar.\n\n\
## Glossary\n\n**ATP**: energy carrier.\n\n\
## Knowledge Assessment\n\n1. What is ATP?\n";

#[derive(Default)]
struct MockGenerator {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    /// Fail when the transcript file name contains this.
    fail_on: Option<&'static str>,
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, request: StudyRequest<'_>) -> Result<Generation, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.to_string());
        let name = request.transcript.file_name().unwrap().to_string_lossy();
        if let Some(marker) = self.fail_on {
            if name.contains(marker) {
                return Err(StageError::Generation {
                    path: request.transcript.to_path_buf(),
                    detail: "model unavailable".into(),
                });
            }
        }
        Ok(Generation {
            content: format!("```markdown\n{STUDY_DOC}```\n"),
            input_tokens: 100,
            output_tokens: 200,
            retries: 0,
        })
    }
}

#[derive(Default)]
struct MockRenderer {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl DocumentRenderer for MockRenderer {
    async fn render(&self, job: &RenderJob) -> Result<(), RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RenderError::EngineFailed {
                engine: job.engine.clone(),
                detail: "LaTeX compilation error".into(),
            });
        }
        fs::write(&job.output, b"%PDF-1.7 mock").unwrap();
        Ok(())
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Mocks {
    extractor: Arc<MockExtractor>,
    transcriber: Arc<MockTranscriber>,
    ocr: Arc<MockOcr>,
    generator: Arc<MockGenerator>,
    renderer: Arc<MockRenderer>,
}

impl Mocks {
    fn toolchain(&self) -> Toolchain {
        Toolchain {
            extractor: self.extractor.clone(),
            transcriber: self.transcriber.clone(),
            ocr: self.ocr.clone(),
            generator: self.generator.clone(),
            renderer: self.renderer.clone(),
        }
    }

    fn counts(&self) -> [usize; 5] {
        [
            self.extractor.calls.load(Ordering::SeqCst),
            self.transcriber.calls.load(Ordering::SeqCst),
            self.ocr.calls.load(Ordering::SeqCst),
            self.generator.calls.load(Ordering::SeqCst),
            self.renderer.calls.load(Ordering::SeqCst),
        ]
    }
}

fn config() -> PipelineConfig {
    PipelineConfig::builder().build().unwrap()
}

async fn run(root: &Path, mocks: &Mocks) -> DirectorySummary {
    process_directory_with(root, &config(), &mocks.toolchain())
        .await
        .unwrap()
}

/// Backdate a file so it is clearly older than anything a run writes.
fn age(path: &Path) {
    let an_hour_ago = SystemTime::now() - Duration::from_secs(3600);
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(an_hour_ago)
        .unwrap();
}

fn touch(root: &Path, rel: &str, contents: &str) -> PathBuf {
    let p = root.join(rel);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    fs::write(&p, contents).unwrap();
    p
}

fn leftover_temp_files(root: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with(".studygen-"))
        .map(|e| e.into_path())
        .collect()
}

// ── Stage sequence ───────────────────────────────────────────────────────────

#[tokio::test]
async fn video_produces_every_artifact() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "lecture1.mp4", "video");
    let mocks = Mocks::default();

    let summary = run(dir.path(), &mocks).await;

    assert!(summary.is_success());
    assert_eq!(summary.newly_processed, 1);
    for name in ["lecture1.mp3", "lecture1.txt", "lecture1_study.md", "lecture1.pdf"] {
        assert!(dir.path().join(name).exists(), "{name} missing");
    }
    assert_eq!(mocks.counts(), [1, 1, 0, 1, 1]);

    let result = &summary.outcomes[0].result;
    assert_eq!(
        result.stages_run,
        vec![
            Stage::ExtractAudio,
            Stage::Transcribe,
            Stage::GenerateStudy,
            Stage::RenderPdf
        ]
    );
    assert_eq!(result.output_path.as_deref(), Some(dir.path().join("lecture1.pdf").as_path()));
    assert_eq!(result.metadata["pdf_status"], "created");

    let study = fs::read_to_string(dir.path().join("lecture1_study.md")).unwrap();
    assert!(study.starts_with("# Photosynthesis"), "fence not stripped: {study:?}");
    let prompt = &mocks.generator.prompts.lock().unwrap()[0];
    assert!(prompt.contains("Spoken lecture about lecture1."));
}

#[tokio::test]
async fn second_run_does_nothing() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "lecture1.mp4", "video");
    touch(dir.path(), "lecture1.png", "img");
    touch(dir.path(), "notes.txt", "typed notes");
    touch(dir.path(), "scans/a.png", "img");
    let mocks = Mocks::default();

    let first = run(dir.path(), &mocks).await;
    assert!(first.is_success());
    let after_first = mocks.counts();

    let second = run(dir.path(), &mocks).await;
    assert!(second.is_success());
    assert_eq!(second.newly_processed, 0);
    assert_eq!(second.failed, 0);
    assert_eq!(second.groups_found, first.groups_found);
    assert_eq!(second.outcomes.len(), first.outcomes.len());
    assert_eq!(mocks.counts(), after_first);
    assert!(second.outcomes.iter().all(|o| o.result.stages_run.is_empty()));
}

#[tokio::test]
async fn image_transcript_is_retried_with_its_images_only() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("scans");
    touch(&root, "a.jpg", "img");
    touch(&root, "b.jpg", "img");
    let mocks = Mocks {
        generator: Arc::new(MockGenerator {
            fail_on: Some("_images"),
            ..MockGenerator::default()
        }),
        ..Mocks::default()
    };

    let first = run(&root, &mocks).await;
    assert_eq!(first.groups_found, 2);
    assert_eq!(first.outcomes.len(), 1);
    assert_eq!(first.failed, 1);
    assert!(root.join("scans_images.txt").exists());

    let second = run(&root, &mocks).await;
    assert_eq!(second.groups_found, 2);
    let labels: Vec<&str> = second.outcomes.iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, vec!["./ (2 images)"]);
    assert_eq!(second.failed, 1);
    // OCR is not repeated; generation is retried once per run.
    assert_eq!(mocks.counts(), [0, 0, 2, 2, 0]);
}

#[tokio::test]
async fn resumes_from_existing_transcript() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "lecture1.mp4", "video");
    touch(dir.path(), "lecture1.txt", "Already transcribed.");
    let mocks = Mocks::default();

    let summary = run(dir.path(), &mocks).await;

    assert!(summary.is_success());
    assert_eq!(mocks.counts(), [0, 0, 0, 1, 1]);
    assert!(!dir.path().join("lecture1.mp3").exists());
    let prompt = &mocks.generator.prompts.lock().unwrap()[0];
    assert!(prompt.contains("Already transcribed."));
}

#[tokio::test]
async fn resumes_at_study_generation_when_audio_and_transcript_exist() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "lecture1.mp4", "video");
    touch(dir.path(), "lecture1.mp3", "audio");
    touch(dir.path(), "lecture1.txt", "Already transcribed.");
    let mocks = Mocks::default();

    let summary = run(dir.path(), &mocks).await;

    assert!(summary.is_success());
    assert_eq!(summary.groups_found, 1);
    assert_eq!(mocks.counts(), [0, 0, 0, 1, 1]);
    assert_eq!(fs::read_to_string(dir.path().join("lecture1.mp3")).unwrap(), "audio");
    assert!(dir.path().join("lecture1_study.md").exists());
}

#[tokio::test]
async fn audio_is_transcribed_in_place() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "memo.wav", "wave");
    let mocks = Mocks::default();

    let summary = run(dir.path(), &mocks).await;

    assert!(summary.is_success());
    assert_eq!(mocks.counts(), [0, 1, 0, 1, 1]);
    assert!(!dir.path().join("memo.mp3").exists());
    assert!(dir.path().join("memo.txt").exists());
    assert_eq!(summary.outcomes[0].result.metadata["language"], "en");
}

// ── Naming ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn images_beside_media_get_their_own_suffixed_document() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "lecture1.mp4", "video");
    touch(dir.path(), "lecture1.png", "img");
    let mocks = Mocks::default();

    let summary = run(dir.path(), &mocks).await;

    assert!(summary.is_success());
    assert_eq!(summary.outcomes.len(), 2);
    assert_eq!(
        fs::read_to_string(dir.path().join("lecture1.txt")).unwrap(),
        "Spoken lecture about lecture1."
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("lecture1_images.txt")).unwrap(),
        "text from lecture1.png"
    );
    assert!(dir.path().join("lecture1_images_study.md").exists());
    assert!(dir.path().join("lecture1_images.pdf").exists());
    assert_eq!(mocks.counts(), [1, 1, 1, 2, 2]);
}

#[tokio::test]
async fn loose_images_become_one_document_per_directory() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("biology");
    touch(&root, "b_diagram.jpg", "img");
    touch(&root, "A_board.png", "img");
    touch(&root, "week2/slide.png", "img");
    let mocks = Mocks::default();

    let summary = run(&root, &mocks).await;

    assert!(summary.is_success());
    assert_eq!(summary.outcomes.len(), 2);
    assert_eq!(
        fs::read_to_string(root.join("biology_images.txt")).unwrap(),
        "text from A_board.png\n\ntext from b_diagram.jpg"
    );
    assert!(root.join("biology_images_study.md").exists());
    assert!(root.join("biology_images.pdf").exists());
    assert!(root.join("week2/week2_images.txt").exists());
    assert!(root.join("week2/week2_images.pdf").exists());
    assert_eq!(mocks.counts(), [0, 0, 3, 2, 2]);
}

#[tokio::test]
async fn loose_images_do_not_reuse_a_stem_groups_name() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("week2");
    touch(&root, "week2.mp4", "video");
    touch(&root, "week2.png", "img");
    touch(&root, "whiteboard.png", "img");
    let mocks = Mocks::default();

    let summary = run(&root, &mocks).await;

    assert!(summary.is_success());
    assert_eq!(
        fs::read_to_string(root.join("week2_images.txt")).unwrap(),
        "text from week2.png"
    );
    assert_eq!(
        fs::read_to_string(root.join("week2_loose_images.txt")).unwrap(),
        "text from whiteboard.png"
    );
}

#[tokio::test]
async fn text_source_is_used_without_copying() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "notes.txt", "My typed notes on mitosis.");
    let mocks = Mocks::default();

    let summary = run(dir.path(), &mocks).await;

    assert!(summary.is_success());
    assert_eq!(mocks.counts(), [0, 0, 0, 1, 1]);
    assert_eq!(
        fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
        "My typed notes on mitosis."
    );
    assert!(dir.path().join("notes_study.md").exists());
    assert!(dir.path().join("notes.pdf").exists());
    assert_eq!(summary.outcomes[0].result.stages_run, vec![Stage::GenerateStudy, Stage::RenderPdf]);
}

#[tokio::test]
async fn pdf_derived_text_gets_distinct_pdf_name() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "paper.txt", "Extracted from the original paper.");
    age(&touch(dir.path(), "paper.pdf", "%PDF original"));
    let mocks = Mocks::default();

    let first = run(dir.path(), &mocks).await;
    assert!(first.is_success());
    assert!(dir.path().join("paper - AI study guide.pdf").exists());
    assert_eq!(
        fs::read_to_string(dir.path().join("paper.pdf")).unwrap(),
        "%PDF original"
    );
    assert_eq!(first.outcomes[0].result.metadata["source_was_pdf"], true);

    let second = run(dir.path(), &mocks).await;
    assert_eq!(second.newly_processed, 0);
    assert_eq!(mocks.counts(), [0, 0, 0, 1, 1]);
}

#[tokio::test]
async fn pdf_derived_naming_survives_a_failed_render() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "paper.txt", "Extracted from the original paper.");
    age(&touch(dir.path(), "paper.pdf", "%PDF original"));
    let guide = dir.path().join("paper - AI study guide.pdf");

    let broken = Mocks {
        renderer: Arc::new(MockRenderer {
            fail: true,
            ..MockRenderer::default()
        }),
        ..Mocks::default()
    };
    let first = run(dir.path(), &broken).await;
    let result = &first.outcomes[0].result;
    assert_eq!(result.metadata["pdf_status"], "failed");
    assert_eq!(result.metadata["source_was_pdf"], true);
    assert!(dir.path().join("paper_study.md").exists());
    assert!(!guide.exists());

    let mocks = Mocks::default();
    let second = run(dir.path(), &mocks).await;
    let result = &second.outcomes[0].result;
    assert_eq!(result.metadata["source_was_pdf"], true);
    assert_eq!(result.metadata["pdf_status"], "created");
    assert_eq!(result.output_path.as_deref(), Some(guide.as_path()));
    assert_eq!(mocks.counts(), [0, 0, 0, 0, 1]);
    assert!(guide.exists());
    assert_eq!(
        fs::read_to_string(dir.path().join("paper.pdf")).unwrap(),
        "%PDF original"
    );
}

#[tokio::test]
async fn equal_stems_in_sibling_directories_are_independent() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "week1/intro.txt", "week one");
    touch(dir.path(), "week2/intro.txt", "week two");
    let mocks = Mocks::default();

    let summary = run(dir.path(), &mocks).await;

    assert_eq!(summary.succeeded, 2);
    assert!(dir.path().join("week1/intro_study.md").exists());
    assert!(dir.path().join("week2/intro_study.md").exists());
    let labels: Vec<&str> = summary.outcomes.iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, vec!["week1/intro.txt", "week2/intro.txt"]);
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn failing_group_does_not_stop_the_run() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "bad.txt", "this one fails");
    touch(dir.path(), "good.txt", "this one works");
    let mocks = Mocks {
        generator: Arc::new(MockGenerator {
            fail_on: Some("bad"),
            ..MockGenerator::default()
        }),
        ..Mocks::default()
    };

    let summary = run(dir.path(), &mocks).await;

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert!(!dir.path().join("bad_study.md").exists());
    assert!(dir.path().join("good_study.md").exists());

    let failure = summary.failures().next().unwrap();
    assert_eq!(failure.label, "bad.txt");
    assert_eq!(failure.result.metadata["failed_stage"], "study material");

    match summary.into_result() {
        Err(StudyGenError::PartialFailure { succeeded, failed, total }) => {
            assert_eq!((succeeded, failed, total), (1, 1, 2));
        }
        other => panic!("expected PartialFailure, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_extraction_leaves_no_partial_audio() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "lecture1.mp4", "video");
    let mocks = Mocks {
        extractor: Arc::new(MockExtractor {
            fail: true,
            ..MockExtractor::default()
        }),
        ..Mocks::default()
    };

    let summary = run(dir.path(), &mocks).await;

    assert_eq!(summary.failed, 1);
    assert!(!dir.path().join("lecture1.mp3").exists());
    assert!(leftover_temp_files(dir.path()).is_empty());
    assert_eq!(mocks.counts(), [1, 0, 0, 0, 0]);
}

#[tokio::test]
async fn images_without_text_fail_without_a_transcript() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("scans");
    touch(&root, "blank1.png", "img");
    touch(&root, "blank2.png", "img");
    let mocks = Mocks {
        ocr: Arc::new(MockOcr {
            blank: true,
            ..MockOcr::default()
        }),
        ..Mocks::default()
    };

    let summary = run(&root, &mocks).await;

    assert_eq!(summary.failed, 1);
    assert!(!root.join("scans_images.txt").exists());
    assert_eq!(mocks.counts(), [0, 0, 2, 0, 0]);
    assert_eq!(summary.outcomes[0].result.metadata["failed_stage"], "ocr");
}

#[tokio::test]
async fn pdf_failure_is_a_warning() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "notes.txt", "notes");
    let mocks = Mocks {
        renderer: Arc::new(MockRenderer {
            fail: true,
            ..MockRenderer::default()
        }),
        ..Mocks::default()
    };

    let summary = run(dir.path(), &mocks).await;

    assert!(summary.is_success());
    assert_eq!(summary.pdf_warnings, 1);
    let result = &summary.outcomes[0].result;
    assert_eq!(result.metadata["pdf_status"], "failed");
    assert!(result.metadata["pdf_error"].as_str().unwrap().contains("LaTeX"));
    assert_eq!(
        result.output_path.as_deref(),
        Some(dir.path().join("notes_study.md").as_path())
    );
    assert!(dir.path().join("notes_study.md").exists());
    assert!(!dir.path().join("notes.pdf").exists());
    assert!(leftover_temp_files(dir.path()).is_empty());
    // xelatex, pdflatex, then the minimal fallback
    assert_eq!(mocks.renderer.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn pdf_can_be_disabled() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "notes.txt", "notes");
    let mocks = Mocks::default();
    let config = PipelineConfig::builder().generate_pdf(false).build().unwrap();

    let summary = assert_ok!(process_directory_with(dir.path(), &config, &mocks.toolchain()).await);

    assert!(summary.is_success());
    assert_eq!(mocks.counts(), [0, 0, 0, 1, 0]);
    assert!(!dir.path().join("notes.pdf").exists());
    assert_eq!(summary.outcomes[0].result.metadata["pdf_status"], "disabled");
}

// ── Directory-level ──────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_root_is_a_discovery_error() {
    let dir = TempDir::new().unwrap();
    let mocks = Mocks::default();
    let err = assert_err!(
        process_directory_with(dir.path().join("nope"), &config(), &mocks.toolchain()).await
    );
    assert!(matches!(err, StudyGenError::Discovery { .. }));
}

#[tokio::test]
async fn empty_directory_succeeds_with_nothing_to_do() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "readme.md", "not supported");
    let mocks = Mocks::default();

    let summary = run(dir.path(), &mocks).await;

    assert!(summary.is_success());
    assert_eq!(summary.groups_found, 0);
    assert!(summary.outcomes.is_empty());
    assert_eq!(mocks.counts(), [0; 5]);
}

#[tokio::test]
async fn prompt_file_without_placeholder_is_rejected() {
    let dir = TempDir::new().unwrap();
    let prompt = touch(dir.path(), "prompt.tmpl", "no placeholder here");
    let config = PipelineConfig::builder().prompt_file(&prompt).build().unwrap();
    let mocks = Mocks::default();

    let err = assert_err!(process_directory_with(dir.path(), &config, &mocks.toolchain()).await);
    assert!(matches!(err, StudyGenError::PromptTemplate { .. }));
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl RunProgressCallback for Recorder {
    fn on_run_start(&self, total_groups: usize) {
        self.events.lock().unwrap().push(format!("run {total_groups}"));
    }
    fn on_group_start(&self, label: &str, total_steps: usize) {
        self.events.lock().unwrap().push(format!("start {label} {total_steps}"));
    }
    fn on_stage_complete(&self, _label: &str, stage: Stage, skipped: bool) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{stage}{}", if skipped { " (skipped)" } else { "" }));
    }
    fn on_group_complete(&self, label: &str, success: bool, _message: &str) {
        self.events.lock().unwrap().push(format!("done {label} {success}"));
    }
    fn on_run_complete(&self, succeeded: usize, failed: usize) {
        self.events.lock().unwrap().push(format!("end {succeeded}/{failed}"));
    }
}

#[tokio::test]
async fn progress_events_arrive_in_order() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "talk.mp3", "audio");
    touch(dir.path(), "talk.txt", "already transcribed");
    let recorder = Arc::new(Recorder::default());
    let config = PipelineConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let mocks = Mocks::default();

    assert_ok!(process_directory_with(dir.path(), &config, &mocks.toolchain()).await);

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "run 1",
            "start talk.mp3 3",
            "transcribe (skipped)",
            "study material",
            "pdf",
            "done talk.mp3 true",
            "end 1/0",
        ]
    );
}
