//! Prerequisite check: which external tools and services a run can use.
//!
//! Nothing here is required before [`crate::process_directory`]; a missing
//! tool simply fails the groups that need it. The check exists so users can
//! find out up front, with one command, why a run would fail.

use crate::config::{OcrBackend, PipelineConfig};
use crate::pipeline::command::{probe, ToolFailure};
use crate::pipeline::resolve_provider;
use crate::prompts;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
const LLM_PROBE_TIMEOUT_SECS: u64 = 5;

/// Availability of one tool or service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub available: bool,
    /// First line of the tool's version output, or a short description.
    pub detail: String,
}

impl ToolStatus {
    fn ok(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            available: true,
            detail: detail.into(),
        }
    }

    fn missing(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            available: false,
            detail: detail.into(),
        }
    }
}

/// Result of [`check_prerequisites`].
#[derive(Debug, Clone, Serialize)]
pub struct Prerequisites {
    pub ffmpeg: ToolStatus,
    pub whisper: ToolStatus,
    pub tesseract: ToolStatus,
    pub pandoc: ToolStatus,
    pub engines: Vec<ToolStatus>,
    pub llm: ToolStatus,
    pub prompt: ToolStatus,
    pub ocr_backend: OcrBackend,
    pub generate_pdf: bool,
    pub overall_ready: bool,
}

impl Prerequisites {
    /// Every status, in display order.
    pub fn statuses(&self) -> Vec<&ToolStatus> {
        let mut all = vec![&self.ffmpeg, &self.whisper, &self.tesseract, &self.pandoc];
        all.extend(self.engines.iter());
        all.push(&self.llm);
        all.push(&self.prompt);
        all
    }

    fn readiness(&self) -> bool {
        let ocr_ready = match self.ocr_backend {
            OcrBackend::Tesseract => self.tesseract.available,
            OcrBackend::Vision => self.llm.available,
        };
        let pdf_ready =
            !self.generate_pdf || (self.pandoc.available && self.engines.iter().any(|e| e.available));

        self.llm.available
            && self.prompt.available
            && pdf_ready
            && self.ffmpeg.available
            && self.whisper.available
            && ocr_ready
    }
}

/// Probe every external dependency named in `config`.
pub async fn check_prerequisites(config: &PipelineConfig) -> Prerequisites {
    let tools = &config.tools;

    let ffmpeg = probe_tool("ffmpeg", &tools.ffmpeg, "-version").await;
    let whisper = probe_tool("whisper", &tools.whisper, "--help").await;
    let tesseract = probe_tool("tesseract", &tools.tesseract, "--version").await;
    let pandoc = probe_tool("pandoc", &tools.pandoc, "--version").await;

    let mut engines = Vec::with_capacity(config.pdf_engines.len());
    for engine in &config.pdf_engines {
        engines.push(probe_tool(engine, engine, "--version").await);
    }

    let llm = check_llm(config).await;
    let prompt = check_prompt(config);

    let mut prereqs = Prerequisites {
        ffmpeg,
        whisper,
        tesseract,
        pandoc,
        engines,
        llm,
        prompt,
        ocr_backend: config.ocr_backend,
        generate_pdf: config.generate_pdf,
        overall_ready: false,
    };
    prereqs.overall_ready = prereqs.readiness();
    prereqs
}

async fn probe_tool(name: &str, program: &str, arg: &str) -> ToolStatus {
    match probe(program, arg).await {
        Ok(line) => {
            debug!("{} available: {}", name, line);
            ToolStatus::ok(name, line)
        }
        // `whisper --help` exits non-zero on some versions; it still ran.
        Err(ToolFailure::Failed { .. }) if arg == "--help" => {
            ToolStatus::ok(name, "installed")
        }
        Err(e) => ToolStatus::missing(name, e.detail()),
    }
}

fn check_prompt(config: &PipelineConfig) -> ToolStatus {
    match config.prompt_file {
        Some(ref path) => match prompts::load_template(path) {
            Ok(_) => ToolStatus::ok("prompt", path.display().to_string()),
            Err(e) => ToolStatus::missing("prompt", e.to_string()),
        },
        None => ToolStatus::ok("prompt", "built-in template"),
    }
}

async fn check_llm(config: &PipelineConfig) -> ToolStatus {
    if config.provider.is_none() && config.llm_provider.eq_ignore_ascii_case("ollama") {
        return check_ollama(&config.llm_model).await;
    }
    let described = match config.provider {
        Some(_) => "pre-built provider".to_string(),
        None => format!("{} / {}", config.llm_provider, config.llm_model),
    };
    match resolve_provider(config) {
        Ok(_) => ToolStatus::ok("llm", described),
        Err(e) => ToolStatus::missing("llm", e.to_string()),
    }
}

async fn check_ollama(model: &str) -> ToolStatus {
    let url = format!("{}/api/tags", ollama_host(std::env::var("OLLAMA_HOST").ok()));

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(LLM_PROBE_TIMEOUT_SECS))
        .build()
    {
        Ok(c) => c,
        Err(e) => return ToolStatus::missing("llm", e.to_string()),
    };

    let response = match client.get(&url).send().await {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => return ToolStatus::missing("llm", format!("{url}: HTTP {}", r.status())),
        Err(e) => return ToolStatus::missing("llm", format!("Ollama not reachable at {url}: {e}")),
    };

    match response.json::<serde_json::Value>().await {
        Ok(tags) if has_model(&tags, model) => ToolStatus::ok("llm", format!("ollama / {model}")),
        Ok(_) => ToolStatus::missing(
            "llm",
            format!("Ollama is running but model '{model}' is not pulled (ollama pull {model})"),
        ),
        Err(e) => ToolStatus::missing("llm", format!("{url}: unexpected response: {e}")),
    }
}

/// Base URL of the Ollama server. `OLLAMA_HOST` may omit the scheme.
fn ollama_host(env: Option<String>) -> String {
    match env.map(|h| h.trim().trim_end_matches('/').to_string()) {
        Some(h) if h.starts_with("http://") || h.starts_with("https://") => h,
        Some(h) if !h.is_empty() => format!("http://{h}"),
        _ => DEFAULT_OLLAMA_HOST.to_string(),
    }
}

/// `true` if the `/api/tags` listing includes `model` (`gemma3` matches
/// `gemma3:latest`).
fn has_model(tags: &serde_json::Value, model: &str) -> bool {
    tags.get("models")
        .and_then(|m| m.as_array())
        .map(|models| {
            models.iter().filter_map(|m| m.get("name")?.as_str()).any(|name| {
                name == model || name.split(':').next() == Some(model)
            })
        })
        .unwrap_or(false)
}
