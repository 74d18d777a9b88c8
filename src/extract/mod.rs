//! Optional LLM extraction stage: a provider-agnostic
//! `(content, query) → text` transformation. Providers run at temperature
//! zero with one fixed system prompt so identical inputs stay stable
//! enough for the cache to be useful.

pub mod providers;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::config::{LlmConfig, LlmProvider};

pub use providers::{AnthropicExtractor, OpenAiExtractor};

/// Content beyond this many characters is truncated before the provider
/// call to stay inside typical context windows.
pub const MAX_EXTRACT_CONTENT_CHARS: usize = 48_000;

pub const SYSTEM_PROMPT: &str = "You are a precise extraction engine. You are given page content and a \
query. Answer the query using only that content, as plain text with no \
preamble. If the content does not contain the answer, say exactly what is \
missing in one short sentence.";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("provider returned HTTP {status}: {detail}")]
    Api { status: u16, detail: String },
    #[error("provider returned an empty completion")]
    Empty,
}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, content: &str, query: &str) -> Result<String, ExtractError>;

    /// Provider/model label for logs and response annotations.
    fn describe(&self) -> String;
}

/// Build the configured extractor. `openai-compatible` endpoints have no
/// usable defaults, so both model and base URL must be explicit there;
/// the config layer enforces that before this runs.
pub fn build_extractor(
    config: &LlmConfig,
    client: reqwest::Client,
) -> std::sync::Arc<dyn Extractor> {
    match config.provider {
        LlmProvider::Anthropic => std::sync::Arc::new(AnthropicExtractor::new(
            client,
            config.api_key.clone(),
            config
                .api_base_url
                .clone()
                .unwrap_or_else(|| providers::ANTHROPIC_DEFAULT_BASE.to_string()),
            config
                .model
                .clone()
                .unwrap_or_else(|| providers::ANTHROPIC_DEFAULT_MODEL.to_string()),
        )),
        LlmProvider::OpenAi => std::sync::Arc::new(OpenAiExtractor::new(
            client,
            config.api_key.clone(),
            config
                .api_base_url
                .clone()
                .unwrap_or_else(|| providers::OPENAI_DEFAULT_BASE.to_string()),
            config
                .model
                .clone()
                .unwrap_or_else(|| providers::OPENAI_DEFAULT_MODEL.to_string()),
        )),
        // Same wire shape as OpenAI; model and base URL are validated as
        // present at config time.
        LlmProvider::OpenAiCompatible => std::sync::Arc::new(OpenAiExtractor::new(
            client,
            config.api_key.clone(),
            config.api_base_url.clone().unwrap_or_default(),
            config.model.clone().unwrap_or_default(),
        )),
    }
}

pub(crate) fn bounded_content(content: &str) -> String {
    if content.chars().count() <= MAX_EXTRACT_CONTENT_CHARS {
        content.to_string()
    } else {
        content.chars().take(MAX_EXTRACT_CONTENT_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_content_respects_char_budget() {
        let long = "x".repeat(MAX_EXTRACT_CONTENT_CHARS + 10);
        assert_eq!(bounded_content(&long).chars().count(), MAX_EXTRACT_CONTENT_CHARS);
        assert_eq!(bounded_content("short"), "short");
    }
}
