//! Chat completion: turn extracted PDF text into Markdown via an LLM.
//!
//! The request is a single user message holding the filled prompt template
//! from [`crate::prompts`]. The reply content is returned verbatim; cleanup
//! happens later in [`crate::pipeline::postprocess`].
//!
//! ## Retry Strategy
//!
//! Exponential backoff (`retry_backoff_ms * 2^(attempt-1)`, capped at one
//! minute), same schedule as the OCR client: with 500 ms base and 3 retries
//! the waits are 500 ms → 1 s → 2 s.

use crate::config::{ConversionConfig, DEFAULT_LLM_MODEL, DEFAULT_LLM_PROVIDER};
use crate::error::Ocr2MdError;
use crate::pipeline::backoff_ms;
use crate::prompts::markdown_prompt;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Reply from one completion call.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    pub retries: u32,
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — used as-is.
/// 2. **Named provider + model** — `config.provider_name` / `config.model`,
///    defaulting to `openrouter` / `mistralai/mistral-large`. The factory
///    reads the matching API key (`OPENROUTER_API_KEY`, …) from the
///    environment.
pub fn resolve_provider(config: &ConversionConfig) -> Result<Arc<dyn LLMProvider>, Ocr2MdError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let name = config.provider_name.as_deref().unwrap_or(DEFAULT_LLM_PROVIDER);
    let model = config.model.as_deref().unwrap_or(DEFAULT_LLM_MODEL);
    debug!("Creating LLM provider {} with model {}", name, model);

    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        Ocr2MdError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!(
                "Set the API key for '{name}' (e.g. OPENROUTER_API_KEY) in the environment \
                 or .env file.\nError: {e}"
            ),
        }
    })
}

/// Ask the LLM to reformat `text` (extracted from `file_name`) as Markdown.
pub async fn format_as_markdown(
    provider: &Arc<dyn LLMProvider>,
    file_name: &str,
    text: &str,
    config: &ConversionConfig,
) -> Result<Completion, Ocr2MdError> {
    let prompt = markdown_prompt(config.system_prompt.as_deref(), file_name, text);
    debug!("Prompt: {} chars for {}", prompt.len(), file_name);
    complete(provider, &prompt, config).await
}

/// Send `prompt` as a single user message and return the reply.
pub async fn complete(
    provider: &Arc<dyn LLMProvider>,
    prompt: &str,
    config: &ConversionConfig,
) -> Result<Completion, Ocr2MdError> {
    let start = Instant::now();
    let messages = vec![ChatMessage::user(prompt)];
    let options = build_options(config);
    let call_timeout = Duration::from_secs(config.api_timeout_secs);

    let mut last_err: Option<String> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!(
                "Completion: retry {}/{} after {}ms",
                attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        info!("Sending completion request (attempt {})", attempt + 1);
        match timeout(call_timeout, provider.chat(&messages, Some(&options))).await {
            Ok(Ok(response)) => {
                let duration = start.elapsed();
                info!(
                    "Token usage: {} (prompt: {}, completion: {}) in {:?}",
                    response.prompt_tokens + response.completion_tokens,
                    response.prompt_tokens,
                    response.completion_tokens,
                    duration
                );
                return Ok(Completion {
                    content: response.content,
                    input_tokens: response.prompt_tokens,
                    output_tokens: response.completion_tokens,
                    duration_ms: duration.as_millis() as u64,
                    retries: attempt,
                });
            }
            Ok(Err(e)) => {
                let err_msg = format!("{}", e);
                warn!("Completion: attempt {} failed — {}", attempt + 1, err_msg);
                last_err = Some(err_msg);
            }
            Err(_) => {
                warn!(
                    "Completion: attempt {} timed out after {}s",
                    attempt + 1,
                    config.api_timeout_secs
                );
                last_err = Some(format!("timed out after {}s", config.api_timeout_secs));
            }
        }
    }

    Err(Ocr2MdError::LlmApiError {
        message: format!(
            "failed after {} attempt(s): {}",
            config.max_retries + 1,
            last_err.unwrap_or_else(|| "Unknown error".to_string())
        ),
    })
}

/// Build `CompletionOptions` from the conversion config.
fn build_options(config: &ConversionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults_leave_provider_defaults() {
        let config = ConversionConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, None);
        assert_eq!(opts.max_tokens, None);
    }

    #[test]
    fn build_options_forwards_overrides() {
        let config = ConversionConfig::builder()
            .temperature(0.2)
            .max_tokens(2048)
            .build()
            .unwrap();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(2048));
    }
}
