//! Text provider client: narration splitting and prompt optimization.
//!
//! Drives an OpenAI-compatible chat-completions endpoint. Splitting asks the
//! model for a JSON array of narration chunks; optimization turns one chunk
//! into a visual-scene prompt for the video model.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};

const SPLIT_SYSTEM_PROMPT: &str = "You are a video script expert. Split the user's narration \
into chunks suitable for roughly 15 seconds of speech each. Each chunk must be one or more \
complete sentences, keep the original order and wording, and add or remove nothing. Reply \
with a JSON array of strings and nothing else.";

const OPTIMIZE_SYSTEM_PROMPT: &str = "You are a video generation expert. Convert the user's \
narration chunk into a prompt for an AI video model. Describe the visual scene, subject \
motion, and atmosphere rather than the spoken words; concrete visual vocabulary and camera \
language are welcome. Keep it under 80 words. Reply with the prompt text only.";

/// How prompts are produced from narration chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptMode {
    /// Ask the text model to rewrite the chunk as a visual prompt.
    Model,
    /// Wrap the chunk in a fixed prefix/suffix template (no model call).
    Template { prefix: String, suffix: String },
}

/// Configuration for the text provider client.
#[derive(Debug, Clone)]
pub struct TextConfig {
    /// Chat-completions base URL (e.g. `https://host/compatible-mode/v1`)
    pub base_url: String,
    /// API key
    pub api_key: String,
    /// Model name
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
    /// Prompt production mode
    pub prompt_mode: PromptMode,
}

impl TextConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        let prompt_mode = match std::env::var("PROMPT_TEMPLATE_PREFIX") {
            Ok(prefix) => PromptMode::Template {
                prefix,
                suffix: std::env::var("PROMPT_TEMPLATE_SUFFIX").unwrap_or_default(),
            },
            Err(_) => PromptMode::Model,
        };

        Ok(Self {
            base_url: std::env::var("TEXT_API_BASE")
                .map_err(|_| ProviderError::failed("TEXT_API_BASE not set"))?,
            api_key: std::env::var("TEXT_API_KEY")
                .map_err(|_| ProviderError::failed("TEXT_API_KEY not set"))?,
            model: std::env::var("TEXT_MODEL").unwrap_or_else(|_| "qwen-max".to_string()),
            timeout: Duration::from_secs(
                std::env::var("TEXT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            prompt_mode,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Text provider client.
pub struct TextClient {
    http: Client,
    config: TextConfig,
}

impl TextClient {
    /// Create a new client.
    pub fn new(config: TextConfig) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("reel-providers/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::failed(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Self::new(TextConfig::from_env()?)
    }

    /// Split narration text into ordered chunks.
    pub async fn split_text(&self, text: &str) -> ProviderResult<Vec<String>> {
        let content = self
            .chat(SPLIT_SYSTEM_PROMPT, text, 0.7, 2000)
            .await?;

        let chunks = parse_chunk_array(&content).unwrap_or_else(|| {
            // Model wrapped or mangled the JSON; fall back to paragraph splits
            // of the source text so the operation still yields a usable draft.
            warn!("Split response was not a JSON array, falling back to paragraphs");
            text.split("\n\n")
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        });

        if chunks.is_empty() {
            return Err(ProviderError::invalid_response(
                "split produced no segments",
            ));
        }

        info!("Split narration into {} segments", chunks.len());
        Ok(chunks)
    }

    /// Produce a generation prompt for one narration chunk.
    pub async fn optimize_prompt(&self, segment_text: &str) -> ProviderResult<String> {
        match &self.config.prompt_mode {
            PromptMode::Template { prefix, suffix } => {
                Ok(format!("{prefix}{segment_text}{suffix}"))
            }
            PromptMode::Model => {
                let user = format!(
                    "Convert this narration chunk into a video generation prompt:\n{segment_text}"
                );
                let prompt = self.chat(OPTIMIZE_SYSTEM_PROMPT, &user, 0.8, 200).await?;
                if prompt.is_empty() {
                    return Err(ProviderError::invalid_response("empty prompt"));
                }
                Ok(prompt)
            }
        }
    }

    async fn chat(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> ProviderResult<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            max_tokens,
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        debug!("Text provider request: {}", url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::invalid_response("no choices in response"))?;

        Ok(content.trim().to_string())
    }
}

/// Extract a JSON string array from model output, tolerating surrounding prose.
fn parse_chunk_array(content: &str) -> Option<Vec<String>> {
    if let Ok(chunks) = serde_json::from_str::<Vec<String>>(content) {
        return Some(chunks);
    }

    // The model sometimes wraps the array in commentary or a code fence.
    let start = content.find('[')?;
    let end = content.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&content[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> TextConfig {
        TextConfig {
            base_url,
            api_key: "test-key".to_string(),
            model: "qwen-max".to_string(),
            timeout: Duration::from_secs(5),
            prompt_mode: PromptMode::Model,
        }
    }

    fn chat_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    #[test]
    fn test_parse_chunk_array_plain() {
        let chunks = parse_chunk_array(r#"["one", "two"]"#).unwrap();
        assert_eq!(chunks, vec!["one", "two"]);
    }

    #[test]
    fn test_parse_chunk_array_with_prose() {
        let chunks =
            parse_chunk_array("Here you go:\n[\"first part\", \"second part\"]\nDone.").unwrap();
        assert_eq!(chunks, vec!["first part", "second part"]);
    }

    #[test]
    fn test_parse_chunk_array_rejects_garbage() {
        assert!(parse_chunk_array("no brackets here").is_none());
    }

    #[tokio::test]
    async fn test_split_text_parses_segments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({"model": "qwen-max"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_body(r#"["Hello world.", "Buy now."]"#)),
            )
            .mount(&server)
            .await;

        let client = TextClient::new(test_config(server.uri())).unwrap();
        let chunks = client.split_text("Hello world. Buy now.").await.unwrap();
        assert_eq!(chunks, vec!["Hello world.", "Buy now."]);
    }

    #[tokio::test]
    async fn test_split_text_falls_back_to_paragraphs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(chat_body("I cannot answer that")),
            )
            .mount(&server)
            .await;

        let client = TextClient::new(test_config(server.uri())).unwrap();
        let chunks = client
            .split_text("First paragraph.\n\nSecond paragraph.")
            .await
            .unwrap();
        assert_eq!(chunks, vec!["First paragraph.", "Second paragraph."]);
    }

    #[tokio::test]
    async fn test_optimize_prompt_returns_trimmed_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_body("  A sunrise over a quiet harbor.  ")),
            )
            .mount(&server)
            .await;

        let client = TextClient::new(test_config(server.uri())).unwrap();
        let prompt = client.optimize_prompt("Good morning, viewers").await.unwrap();
        assert_eq!(prompt, "A sunrise over a quiet harbor.");
    }

    #[tokio::test]
    async fn test_template_mode_skips_the_model() {
        // No mock server mounted: a model call would fail loudly.
        let config = TextConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            api_key: "unused".to_string(),
            model: "unused".to_string(),
            timeout: Duration::from_secs(1),
            prompt_mode: PromptMode::Template {
                prefix: "A speaker says: ".to_string(),
                suffix: " Soft lighting.".to_string(),
            },
        };
        let client = TextClient::new(config).unwrap();
        let prompt = client.optimize_prompt("hello").await.unwrap();
        assert_eq!(prompt, "A speaker says: hello Soft lighting.");
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = TextClient::new(test_config(server.uri())).unwrap();
        let err = client.split_text("text").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
