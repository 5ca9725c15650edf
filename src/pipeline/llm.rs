//! VLM interaction: the chunk extractor seam and its provider-backed impl.
//!
//! The pipeline only needs "image + prompt → text". [`ChunkExtractor`] is that
//! contract; [`VisionExtractor`] fulfils it with an `edgequake_llm` provider,
//! and tests fulfil it with scripted stubs.
//!
//! ## Retry Strategy
//!
//! Each attempt is bounded by `api_timeout_secs`. Failed attempts back off
//! exponentially (`retry_backoff_ms * 2^attempt`): with 500 ms base and 2
//! retries the wait sequence is 500 ms → 1 s.

use crate::config::ExtractionConfig;
use crate::error::{ChunkError, Pdf2TableError};
use crate::pipeline::encode;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Model used when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// A successful VLM answer for one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkResponse {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub retries: u32,
}

impl ChunkResponse {
    /// A response carrying only text, no token accounting.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Turns one chunk image into raw delimiter-separated text.
///
/// Implementations report failure as a [`ChunkError`]; the pipeline fills in
/// the page/chunk position and keeps going.
pub trait ChunkExtractor: Send + Sync {
    fn extract<'a>(
        &'a self,
        image: &'a DynamicImage,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<ChunkResponse, ChunkError>>;
}

/// [`ChunkExtractor`] backed by an `edgequake_llm` vision provider.
pub struct VisionExtractor {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout: Duration,
}

impl VisionExtractor {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    /// Resolve the provider from `config` and wrap it.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, Pdf2TableError> {
        Ok(Self::new(resolve_provider(config)?, config))
    }

    /// Send one chunk with retry/backoff.
    ///
    /// ## Message Layout
    ///
    /// A single user message: the extraction prompt as text plus the chunk
    /// PNG as a base64 image attachment.
    async fn call(&self, image: &DynamicImage, prompt: &str) -> Result<ChunkResponse, ChunkError> {
        let image_data = encode::encode_chunk(image).map_err(|e| ChunkError::EncodeFailed {
            page: 0,
            chunk: 0,
            detail: e.to_string(),
        })?;
        let messages = vec![ChatMessage::user_with_images(prompt, vec![image_data])];

        let start = Instant::now();
        let mut last_err: Option<String> = None;
        let mut all_timeouts = true;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Chunk retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match timeout(self.api_timeout, self.provider.chat(&messages, Some(&self.options))).await {
                Ok(Ok(response)) => {
                    debug!(
                        "Chunk: {} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(ChunkResponse {
                        text: response.content,
                        input_tokens: response.prompt_tokens,
                        output_tokens: response.completion_tokens,
                        retries: attempt,
                    });
                }
                Ok(Err(e)) => {
                    let err_msg = format!("{}", e);
                    warn!("Chunk: attempt {} failed — {}", attempt + 1, err_msg);
                    all_timeouts = false;
                    last_err = Some(err_msg);
                }
                Err(_) => {
                    warn!(
                        "Chunk: attempt {} timed out after {}s",
                        attempt + 1,
                        self.api_timeout.as_secs()
                    );
                    last_err = Some("timed out".to_string());
                }
            }
        }

        if all_timeouts {
            return Err(ChunkError::Timeout {
                page: 0,
                chunk: 0,
                secs: self.api_timeout.as_secs(),
            });
        }

        Err(ChunkError::LlmFailed {
            page: 0,
            chunk: 0,
            retries: self.max_retries,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

impl ChunkExtractor for VisionExtractor {
    fn extract<'a>(
        &'a self,
        image: &'a DynamicImage,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<ChunkResponse, ChunkError>> {
        Box::pin(self.call(image, prompt))
    }
}

/// Build `CompletionOptions` from the extraction config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Pdf2TableError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Pdf2TableError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — used as-is.
/// 2. **Named provider + model** (`config.provider_name`) — the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI key present** — OpenAI with the configured or default model.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, Pdf2TableError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2TableError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, GEMINI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
