// Anthropic Messages API client used to rewrite prompts into shorter versions
// and judge whether the original was efficient or wasteful.
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::config::settings::RewriteConfig;
use crate::error::{AppError, AppResult};
use crate::models::analysis::PromptVerdict;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const REWRITE_MAX_TOKENS: u32 = 400;

const REWRITE_SYSTEM_PROMPT: &str = "You are an assistant that helps people write efficient prompts for large language models. \
Given a user's prompt, rewrite it to be as short as possible while keeping its intent, and judge whether the original was efficient or wasteful. \
Respond with a single JSON object and nothing else, shaped like: \
{\"rewrite\": \"<shorter prompt>\", \"verdict\": \"efficient\" | \"wasteful\", \"reason\": \"<one sentence>\"}";

static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid JSON object regex"));

/// Shorter paraphrase of a prompt plus a verdict on the original
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteSuggestion {
    pub rewrite: String,
    pub verdict: PromptVerdict,
    pub reason: String,
}

/// External service that rewrites prompts
#[async_trait]
pub trait PromptRewriter: Send + Sync {
    async fn rewrite(&self, prompt: &str) -> AppResult<RewriteSuggestion>;
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: Option<&'a str>,
    temperature: Option<f32>,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

pub struct AnthropicClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicClient {
    /// Returns `Ok(None)` when no API key is configured
    pub fn from_config(config: &RewriteConfig) -> AppResult<Option<Self>> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };

        let client = crate::utils::http_client::new_api_client(Duration::from_secs(config.timeout_secs))?;
        Ok(Some(Self {
            client,
            api_key,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        }))
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

/// Pull the suggestion out of the model's text reply, tolerating code fences
/// or chatter around the JSON object.
pub fn parse_suggestion(text: &str) -> AppResult<RewriteSuggestion> {
    let object = JSON_OBJECT
        .find(text)
        .ok_or_else(|| AppError::External("Rewrite response did not contain a JSON object".to_string()))?;

    let suggestion: RewriteSuggestion = serde_json::from_str(object.as_str())
        .map_err(|e| AppError::External(format!("Failed to parse rewrite response: {}", e)))?;

    if suggestion.rewrite.trim().is_empty() {
        return Err(AppError::External("Rewrite response contained an empty rewrite".to_string()));
    }

    Ok(RewriteSuggestion {
        rewrite: suggestion.rewrite.trim().to_string(),
        verdict: suggestion.verdict,
        reason: suggestion.reason.trim().to_string(),
    })
}

#[async_trait]
impl PromptRewriter for AnthropicClient {
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_chars = prompt.chars().count()))]
    async fn rewrite(&self, prompt: &str) -> AppResult<RewriteSuggestion> {
        let url = format!("{}/messages", self.base_url);
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: REWRITE_MAX_TOKENS,
            system: Some(REWRITE_SYSTEM_PROMPT),
            temperature: Some(0.2),
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            warn!("Anthropic rewrite request failed with status {}", status);
            return Err(AppError::External(format!(
                "Anthropic API error ({}): {}",
                status, error_text
            )));
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AppError::External(format!("Failed to parse Anthropic response: {}", e)))?;

        let text = body
            .content
            .iter()
            .filter(|part| part.content_type == "text")
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        debug!("Anthropic rewrite reply: {} characters", text.len());
        parse_suggestion(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_config(base_url: String) -> RewriteConfig {
        RewriteConfig {
            api_key: Some("test-key".to_string()),
            base_url,
            model: "claude-3-5-haiku-latest".to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_no_api_key_disables_client() {
        let mut config = test_config("http://localhost".to_string());
        config.api_key = None;
        assert!(AnthropicClient::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_parse_suggestion_with_code_fence() {
        let text = "Sure!\n```json\n{\"rewrite\": \" Summarize this email. \", \"verdict\": \"wasteful\", \"reason\": \"Too many pleasantries.\"}\n```";
        let suggestion = parse_suggestion(text).unwrap();
        assert_eq!(
            suggestion,
            RewriteSuggestion {
                rewrite: "Summarize this email.".to_string(),
                verdict: PromptVerdict::Wasteful,
                reason: "Too many pleasantries.".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_suggestion_rejects_garbage() {
        assert!(matches!(parse_suggestion("no json here"), Err(AppError::External(_))));
        assert!(matches!(
            parse_suggestion("{\"rewrite\": \"\", \"verdict\": \"efficient\", \"reason\": \"\"}"),
            Err(AppError::External(_))
        ));
    }

    #[tokio::test]
    async fn test_rewrite_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let reply = serde_json::json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-5-haiku-latest",
            "content": [{
                "type": "text",
                "text": "{\"rewrite\": \"Write a short status email.\", \"verdict\": \"wasteful\", \"reason\": \"Filler words.\"}"
            }],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 20}
        });
        let mock = server
            .mock("POST", "/messages")
            .match_header("x-api-key", "test-key")
            .match_header("anthropic-version", ANTHROPIC_VERSION)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(reply.to_string())
            .create_async()
            .await;

        let client = AnthropicClient::from_config(&test_config(server.url()))
            .unwrap()
            .unwrap();
        let suggestion = client.rewrite("Hello there, could you please write me an email").await.unwrap();

        mock.assert_async().await;
        assert_eq!(suggestion.rewrite, "Write a short status email.");
        assert_eq!(suggestion.verdict, PromptVerdict::Wasteful);
    }

    #[tokio::test]
    async fn test_rewrite_upstream_error_is_external() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/messages")
            .with_status(429)
            .with_body("{\"error\": {\"type\": \"rate_limit_error\"}}")
            .create_async()
            .await;

        let client = AnthropicClient::from_config(&test_config(server.url()))
            .unwrap()
            .unwrap();
        let result = client.rewrite("anything").await;
        assert!(matches!(result, Err(AppError::External(_))));
    }
}
