//! CLI binary for edgequake-studygen.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_studygen::{
    check_prerequisites, process_directory, AiMarking, AuthorInfo, DirectorySummary, OcrBackend,
    PipelineConfig, ProgressCallback, RunProgressCallback, Stage, WatermarkConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// One spinner per group. The spinner ticks on indicatif's own thread, so it
/// keeps moving while a transcription or LaTeX run blocks for minutes.
struct CliProgressCallback {
    current: Mutex<Option<GroupSpinner>>,
    started: Mutex<usize>,
}

struct GroupSpinner {
    bar: ProgressBar,
    steps: Vec<&'static str>,
    started_at: Instant,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(None),
            started: Mutex::new(0),
        })
    }

    fn update(&self, label: &str, active: Option<Stage>) {
        if let Ok(guard) = self.current.lock() {
            if let Some(ref spinner) = *guard {
                let mut trail: Vec<&str> = spinner.steps.clone();
                if let Some(stage) = active {
                    trail.push(step_name(stage));
                }
                spinner
                    .bar
                    .set_message(format!("{label}  {}", dim(&trail.join(" > "))));
            }
        }
    }
}

/// Short artifact-oriented name for the spinner trail.
fn step_name(stage: Stage) -> &'static str {
    match stage {
        Stage::ExtractAudio => "audio",
        Stage::Transcribe | Stage::Ocr | Stage::ImportText => "transcript",
        Stage::GenerateStudy => "study",
        Stage::RenderPdf => "pdf",
    }
}

impl RunProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_groups: usize) {
        eprintln!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Found {total_groups} file group(s)"))
        );
    }

    fn on_group_start(&self, label: &str, _total_steps: usize) {
        let n = self
            .started
            .lock()
            .map(|mut s| {
                *s += 1;
                *s
            })
            .unwrap_or(0);

        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix(format!("#{n}"));
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut guard) = self.current.lock() {
            *guard = Some(GroupSpinner {
                bar,
                steps: Vec::new(),
                started_at: Instant::now(),
            });
        }
    }

    fn on_stage_start(&self, label: &str, stage: Stage) {
        self.update(label, Some(stage));
    }

    fn on_stage_complete(&self, label: &str, stage: Stage, skipped: bool) {
        if let Ok(mut guard) = self.current.lock() {
            if let Some(ref mut spinner) = *guard {
                if !skipped {
                    spinner.steps.push(step_name(stage));
                }
            }
        }
        self.update(label, None);
    }

    fn on_group_complete(&self, label: &str, success: bool, message: &str) {
        let spinner = self.current.lock().ok().and_then(|mut g| g.take());
        let (elapsed, trail) = match spinner {
            Some(s) => {
                s.bar.finish_and_clear();
                (s.started_at.elapsed(), s.steps.join(" > "))
            }
            None => (Duration::ZERO, String::new()),
        };
        let trail = if trail.is_empty() {
            "up to date".to_string()
        } else {
            trail
        };

        if success {
            eprintln!(
                "  {} {}  {}  {}",
                green("✓"),
                label,
                dim(&trail),
                dim(&format!("{:.1}s", elapsed.as_secs_f64()))
            );
            if message.contains("PDF failed") {
                eprintln!("    {} {}", yellow("⚠"), yellow(message));
            }
        } else {
            eprintln!("  {} {}  {}", red("✗"), label, red(&truncate(message, 160)));
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        s.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process a course folder with the local model (ollama / gemma3)
  studygen run ~/courses/biology

  # Study documents only, no PDF
  studygen run --no-pdf lectures/

  # Hosted model, vision OCR for handwritten notes
  studygen run --llm-provider openai --llm-model gpt-4.1-mini --ocr-backend vision notes/

  # Mark handouts as AI-generated
  studygen run --watermark --author-name "Dr. Ada Lovelace" --author-email ada@uni.edu --acknowledgment course/

  # Machine-readable summary
  studygen run --json course/ > summary.json

  # What is installed?
  studygen check

FILES PRODUCED (per source, next to the source):
  lecture1.mp4      → lecture1.mp3 → lecture1.txt → lecture1_study.md → lecture1.pdf
  lecture1.png      → lecture1_images.txt → lecture1_images_study.md → lecture1_images.pdf
  week2/*.jpg       → week2/week2_images.txt → … → week2/week2_images.pdf
  paper.txt (+ paper.pdf already present) → paper_study.md → paper - AI study guide.pdf

  Existing files are never regenerated: delete one to redo that step.

EXTERNAL TOOLS:
  ffmpeg            audio extraction from video
  whisper           speech-to-text (pip install openai-whisper)
  tesseract         OCR (not needed with --ocr-backend vision)
  pandoc + LaTeX    PDF output (xelatex or pdflatex)

ENVIRONMENT VARIABLES:
  EDGEQUAKE_LLM_PROVIDER  Override provider (ollama, openai, anthropic, gemini)
  EDGEQUAKE_MODEL         Override model ID (both must be set)
  OLLAMA_HOST             Ollama server (default http://localhost:11434)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  RUST_LOG                Log filter, overrides -v / -q
"#;

/// Turn folders of lectures, recordings, notes and scans into study guides.
#[derive(Parser, Debug)]
#[command(
    name = "studygen",
    version,
    about = "Turn folders of lectures, recordings, notes and scans into study guides",
    long_about = "Walks a directory tree, groups related files by name, and turns each group \
into an LLM-written study document and PDF handout. Video is transcribed with ffmpeg and \
whisper, scans are read with tesseract or a vision model, and PDFs are typeset with pandoc. \
Every intermediate file is kept, so interrupted runs resume where they stopped.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "STUDYGEN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "STUDYGEN_QUIET")]
    quiet: bool,

    /// Output a JSON report instead of text.
    #[arg(long, global = true, env = "STUDYGEN_JSON")]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process every group under a directory.
    Run(RunArgs),
    /// Report which external tools and services are available.
    Check(ConfigArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Directory to process (recursively).
    directory: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,

    /// Disable the progress spinner.
    #[arg(long, env = "STUDYGEN_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Stop after the study document; do not typeset a PDF.
    #[arg(long, env = "STUDYGEN_NO_PDF")]
    no_pdf: bool,

    /// LLM provider: ollama, openai, anthropic, gemini, …
    #[arg(long, env = "STUDYGEN_LLM_PROVIDER", default_value = "ollama")]
    llm_provider: String,

    /// LLM model ID.
    #[arg(long, env = "STUDYGEN_LLM_MODEL", default_value = "gemma3")]
    llm_model: String,

    /// Whisper model: tiny, base, small, medium, large.
    #[arg(long, env = "STUDYGEN_WHISPER_MODEL", default_value = "medium")]
    whisper_model: String,

    /// Spoken language passed to whisper.
    #[arg(long, env = "STUDYGEN_LANGUAGE", default_value = "en")]
    language: String,

    /// Tesseract language code(s), e.g. eng or eng+deu.
    #[arg(long, env = "STUDYGEN_OCR_LANGUAGE", default_value = "eng")]
    ocr_language: String,

    /// OCR engine for images.
    #[arg(long, env = "STUDYGEN_OCR_BACKEND", value_enum, default_value = "tesseract")]
    ocr_backend: OcrBackendArg,

    /// Custom study prompt; must contain {transcript} exactly once.
    #[arg(long, env = "STUDYGEN_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Custom LaTeX header included by pandoc.
    #[arg(long, env = "STUDYGEN_HEADER_FILE")]
    header_file: Option<PathBuf>,

    /// LaTeX engine to try, in order (repeatable). Default: xelatex, pdflatex.
    #[arg(long = "pdf-engine", env = "STUDYGEN_PDF_ENGINES", value_delimiter = ',')]
    pdf_engines: Vec<String>,

    /// Diagonal watermark on every PDF page.
    #[arg(
        long,
        env = "STUDYGEN_WATERMARK",
        num_args = 0..=1,
        default_missing_value = "AI Generated Content"
    )]
    watermark: Option<String>,

    /// Name credited in the PDF footer.
    #[arg(long, env = "STUDYGEN_AUTHOR_NAME")]
    author_name: Option<String>,

    /// Email credited in the PDF footer.
    #[arg(long, env = "STUDYGEN_AUTHOR_EMAIL", requires = "author_name")]
    author_email: Option<String>,

    /// Append an acknowledgment page naming the author.
    #[arg(long, env = "STUDYGEN_ACKNOWLEDGMENT", requires = "author_name")]
    acknowledgment: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OcrBackendArg {
    Tesseract,
    Vision,
}

impl From<OcrBackendArg> for OcrBackend {
    fn from(v: OcrBackendArg) -> Self {
        match v {
            OcrBackendArg::Tesseract => OcrBackend::Tesseract,
            OcrBackendArg::Vision => OcrBackend::Vision,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active; the
    // per-group lines provide the feedback that matters to the user.
    let show_progress = match cli.command {
        Command::Run(ref args) => !cli.quiet && !args.no_progress && !cli.json,
        Command::Check(_) => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Run(ref args) => run(&cli, args, show_progress).await,
        Command::Check(ref args) => check(&cli, args).await,
    }
}

async fn run(cli: &Cli, args: &RunArgs, show_progress: bool) -> Result<ExitCode> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn RunProgressCallback>)
    } else {
        None
    };
    let config = build_config(&args.config, progress_cb)?;

    let summary = process_directory(&args.directory, &config)
        .await
        .with_context(|| format!("Failed to process {}", args.directory.display()))?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        print_summary(&summary, show_progress);
    }

    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_summary(summary: &DirectorySummary, show_progress: bool) {
    // Without the spinner nothing has been printed per group yet.
    if !show_progress {
        for outcome in &summary.outcomes {
            let mark = if outcome.result.success {
                green("✓")
            } else {
                red("✗")
            };
            eprintln!("  {} {}  {}", mark, outcome.label, dim(&outcome.result.message));
        }
    }

    let total = summary.succeeded + summary.failed;
    eprintln!(
        "{} {}/{} succeeded  {}  {}",
        if summary.failed == 0 {
            green("✔")
        } else if summary.succeeded == 0 {
            red("✘")
        } else {
            cyan("⚠")
        },
        bold(&summary.succeeded.to_string()),
        total,
        dim(&format!(
            "{} new, {} up to date",
            summary.newly_processed, summary.up_to_date
        )),
        if summary.failed > 0 {
            red(&format!("{} failed", summary.failed))
        } else {
            String::new()
        },
    );
    if summary.pdf_warnings > 0 {
        eprintln!(
            "   {} study document(s) written without a PDF",
            yellow(&summary.pdf_warnings.to_string())
        );
    }
    for failure in summary.failures() {
        eprintln!("   {} {}: {}", red("✗"), failure.label, failure.result.message);
    }
}

async fn check(cli: &Cli, args: &ConfigArgs) -> Result<ExitCode> {
    let config = build_config(args, None)?;
    let report = check_prerequisites(&config).await;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else {
        for status in report.statuses() {
            println!(
                "  {}  {:<10} {}",
                if status.available {
                    green("✓")
                } else {
                    red("✗")
                },
                status.name,
                dim(&status.detail)
            );
        }
        println!();
        if report.overall_ready {
            println!("{} {}", green("✔"), bold("Ready"));
        } else {
            println!("{} {}", red("✘"), bold("Not ready"));
        }
    }

    Ok(if report.overall_ready {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Map CLI args to `PipelineConfig`.
fn build_config(args: &ConfigArgs, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .llm_provider(&args.llm_provider)
        .llm_model(&args.llm_model)
        .whisper_model(&args.whisper_model)
        .transcription_language(&args.language)
        .ocr_language(&args.ocr_language)
        .ocr_backend(args.ocr_backend.into())
        .generate_pdf(!args.no_pdf);

    if !args.pdf_engines.is_empty() {
        builder = builder.pdf_engines(args.pdf_engines.iter().cloned());
    }
    if let Some(ref path) = args.prompt_file {
        builder = builder.prompt_file(path);
    }
    if let Some(ref path) = args.header_file {
        builder = builder.header_file(path);
    }
    if let Some(marking) = build_marking(args) {
        builder = builder.marking(marking);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn build_marking(args: &ConfigArgs) -> Option<AiMarking> {
    let marking = AiMarking {
        author: args.author_name.as_ref().map(|name| {
            AuthorInfo::new(name.as_str(), args.author_email.clone().unwrap_or_default())
        }),
        watermark: args.watermark.as_ref().map(WatermarkConfig::with_text),
        acknowledgment: args.acknowledgment,
    };
    (!marking.is_empty()).then_some(marking)
}
