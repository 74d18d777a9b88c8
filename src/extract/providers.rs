use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{bounded_content, ExtractError, Extractor, SYSTEM_PROMPT};

pub const ANTHROPIC_DEFAULT_BASE: &str = "https://api.anthropic.com";
pub const ANTHROPIC_DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const OPENAI_DEFAULT_BASE: &str = "https://api.openai.com/v1";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

const MAX_OUTPUT_TOKENS: u32 = 1024;

fn user_prompt(content: &str, query: &str) -> String {
    format!("Query: {}\n\nContent:\n{}", query, bounded_content(content))
}

// ---------------------------------------------------------------------------
// Anthropic Messages API
// ---------------------------------------------------------------------------

pub struct AnthropicExtractor {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicExtractor {
    pub fn new(client: reqwest::Client, api_key: String, base_url: String, model: String) -> Self {
        Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), model }
    }
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl Extractor for AnthropicExtractor {
    async fn extract(&self, content: &str, query: &str) -> Result<String, ExtractError> {
        debug!("anthropic extraction with {}", self.model);
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&json!({
                "model": self.model,
                "max_tokens": MAX_OUTPUT_TOKENS,
                "temperature": 0,
                "system": SYSTEM_PROMPT,
                "messages": [{ "role": "user", "content": user_prompt(content, query) }],
            }))
            .send()
            .await
            .map_err(|e| ExtractError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ExtractError::Api { status, detail });
        }

        let body: AnthropicResponse =
            response.json().await.map_err(|e| ExtractError::Request(e.to_string()))?;
        let text = body
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(text)
    }

    fn describe(&self) -> String {
        format!("anthropic/{}", self.model)
    }
}

// ---------------------------------------------------------------------------
// OpenAI chat-completions API (also serves openai-compatible endpoints)
// ---------------------------------------------------------------------------

pub struct OpenAiExtractor {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiExtractor {
    pub fn new(client: reqwest::Client, api_key: String, base_url: String, model: String) -> Self {
        Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), model }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl Extractor for OpenAiExtractor {
    async fn extract(&self, content: &str, query: &str) -> Result<String, ExtractError> {
        debug!("openai-style extraction with {}", self.model);
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "temperature": 0,
                "max_tokens": MAX_OUTPUT_TOKENS,
                "messages": [
                    { "role": "system", "content": SYSTEM_PROMPT },
                    { "role": "user", "content": user_prompt(content, query) },
                ],
            }))
            .send()
            .await
            .map_err(|e| ExtractError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ExtractError::Api { status, detail });
        }

        let body: ChatResponse =
            response.json().await.map_err(|e| ExtractError::Request(e.to_string()))?;
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
            .trim()
            .to_string();
        if text.is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(text)
    }

    fn describe(&self) -> String {
        format!("openai/{}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn openai_extractor_parses_the_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer key")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"The title is T"}}]}"#)
            .create_async()
            .await;

        let extractor =
            OpenAiExtractor::new(reqwest::Client::new(), "key".into(), server.url(), "gpt-4o-mini".into());
        let out = extractor.extract("# T\nbody", "title").await.unwrap();
        assert_eq!(out, "The title is T");
    }

    #[tokio::test]
    async fn anthropic_extractor_joins_text_blocks() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "key")
            .with_status(200)
            .with_body(r#"{"content":[{"type":"text","text":"Answer part 1"},{"type":"text","text":"part 2"}]}"#)
            .create_async()
            .await;

        let extractor =
            AnthropicExtractor::new(reqwest::Client::new(), "key".into(), server.url(), "claude".into());
        let out = extractor.extract("content", "query").await.unwrap();
        assert!(out.contains("Answer part 1"));
        assert!(out.contains("part 2"));
    }

    #[tokio::test]
    async fn provider_errors_surface_status_and_detail() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let extractor =
            OpenAiExtractor::new(reqwest::Client::new(), "key".into(), server.url(), "gpt-4o-mini".into());
        let err = extractor.extract("c", "q").await.unwrap_err();
        match err {
            ExtractError::Api { status, detail } => {
                assert_eq!(status, 429);
                assert_eq!(detail, "slow down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_completions_are_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"  "}}]}"#)
            .create_async()
            .await;

        let extractor =
            OpenAiExtractor::new(reqwest::Client::new(), "key".into(), server.url(), "gpt-4o-mini".into());
        assert!(matches!(extractor.extract("c", "q").await, Err(ExtractError::Empty)));
    }
}
