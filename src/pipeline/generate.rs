//! Study-material generation: send the prompt to an LLM and collect Markdown.
//!
//! This module is intentionally thin. All prompt engineering lives in
//! [`crate::prompts`] and all cleanup in [`super::postprocess`], so the retry
//! and error handling here can change without touching either.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient, and a local Ollama
//! server may still be loading the model on the first request. Exponential
//! backoff (`retry_backoff_ms * 2^attempt`) gives 500 ms → 1 s → 2 s with the
//! defaults before the group is marked failed.

use crate::config::PipelineConfig;
use crate::error::StageError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// One study-generation request.
#[derive(Debug, Clone, Copy)]
pub struct StudyRequest<'a> {
    /// Transcript the prompt was built from; used in error messages.
    pub transcript: &'a Path,
    pub system: &'a str,
    pub prompt: &'a str,
}

/// Raw generator output, before postprocessing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Generation {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub retries: u32,
}

/// Produces study material from a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: StudyRequest<'_>) -> Result<Generation, StageError>;
}

/// [`TextGenerator`] backed by any `edgequake_llm` provider.
pub struct LlmGenerator {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl LlmGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    /// The provider requests are sent to.
    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }
}

#[async_trait]
impl TextGenerator for LlmGenerator {
    async fn generate(&self, request: StudyRequest<'_>) -> Result<Generation, StageError> {
        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(request.system),
            ChatMessage::user(request.prompt),
        ];

        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    request.transcript.display(),
                    attempt,
                    self.max_retries,
                    backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&self.options)).await {
                Ok(response) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        request.transcript.display(),
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(Generation {
                        content: response.content,
                        input_tokens: response.prompt_tokens,
                        output_tokens: response.completion_tokens,
                        retries: attempt,
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    warn!(
                        "{}: attempt {} failed: {}",
                        request.transcript.display(),
                        attempt + 1,
                        err_msg
                    );
                    last_err = Some(err_msg);
                }
            }
        }

        Err(StageError::Generation {
            path: request.transcript.to_path_buf(),
            detail: format!(
                "{} (after {} retries)",
                last_err.unwrap_or_else(|| "Unknown error".to_string()),
                self.max_retries
            ),
        })
    }
}

/// Build `CompletionOptions` from the run config.
fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
