//! VLM interaction: provider resolution and one transcription call per page.
//!
//! Prompt text lives in [`crate::prompts`]. Pages are sent one at a time and
//! never retried; a failed call fails the whole document and the batch loop
//! moves on to the next file.

use crate::config::ConversionConfig;
use crate::error::Paper2MdError;
use crate::output::PageResult;
use crate::prompts::{maintain_format_context, DEFAULT_SYSTEM_PROMPT, PAGE_INSTRUCTION};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Transcribe a single rendered page.
///
/// ## Message Layout
///
/// 1. **System message**: the transcription prompt (or the configured override)
/// 2. **Format-continuity message** *(maintain_format only)*: previous page
///    Markdown, so heading levels and equation numbering carry over
/// 3. **User message**: [`PAGE_INSTRUCTION`] plus the page PNG
///
/// The returned Markdown is raw model output; callers run
/// [`clean_markdown`](crate::pipeline::postprocess::clean_markdown) on it.
pub async fn process_page(
    provider: &Arc<dyn LLMProvider>,
    page_num: usize,
    image_data: ImageData,
    prior_page: Option<&str>,
    config: &ConversionConfig,
) -> Result<PageResult, Paper2MdError> {
    let start = Instant::now();
    let messages = build_messages(image_data, prior_page, config);
    let options = build_options(config);

    let response = provider
        .chat(&messages, Some(&options))
        .await
        .map_err(|e| Paper2MdError::LlmApiError {
            page: page_num,
            message: e.to_string(),
        })?;

    let duration = start.elapsed();
    debug!(
        "Page {}: {} input tokens, {} output tokens, {:?}",
        page_num, response.prompt_tokens, response.completion_tokens, duration
    );

    Ok(PageResult {
        page_num,
        markdown: response.content,
        input_tokens: response.prompt_tokens,
        output_tokens: response.completion_tokens,
        duration_ms: duration.as_millis() as u64,
        has_figure: false,
    })
}

fn build_messages(
    image_data: ImageData,
    prior_page: Option<&str>,
    config: &ConversionConfig,
) -> Vec<ChatMessage> {
    let system_prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);
    let mut messages = vec![ChatMessage::system(system_prompt)];

    if config.maintain_format {
        if let Some(prior) = prior_page.filter(|p| !p.is_empty()) {
            messages.push(ChatMessage::system(maintain_format_context(prior)));
        }
    }

    messages.push(ChatMessage::user_with_images(
        PAGE_INSTRUCTION,
        vec![image_data],
    ));
    messages
}

fn build_options(config: &ConversionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Resolve the VLM provider, from most to least specific:
///
/// 1. `config.provider`, used as-is
/// 2. `config.provider_name` with `config.model` (default [`DEFAULT_MODEL`])
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
/// 4. OpenAI, when `OPENAI_API_KEY` is set
/// 5. [`ProviderFactory::from_env`] auto-detection
///
/// The batch loop resolves once per run; a failure here aborts the run.
pub fn resolve_provider(config: &ConversionConfig) -> Result<Arc<dyn LLMProvider>, Paper2MdError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Paper2MdError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision model provider could be detected.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY or GEMINI_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Paper2MdError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Paper2MdError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> ImageData {
        ImageData::new("aGVsbG8=", "image/png")
    }

    #[test]
    fn build_options_defaults() {
        let config = ConversionConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn messages_without_context() {
        let config = ConversionConfig::default();
        let msgs = build_messages(image(), Some("previous"), &config);
        assert_eq!(msgs.len(), 2);
    }

    #[test]
    fn maintain_format_adds_context_message() {
        let config = ConversionConfig::builder()
            .maintain_format(true)
            .build()
            .unwrap();
        assert_eq!(build_messages(image(), Some("## 2 Method"), &config).len(), 3);
        assert_eq!(build_messages(image(), Some(""), &config).len(), 2);
        assert_eq!(build_messages(image(), None, &config).len(), 2);
    }
}
