// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Model client abstraction for the judge and embedding metrics

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const JUDGE_SYSTEM_PROMPT: &str = "You are an expert evaluator. Respond only with valid JSON.";

/// Trait for LLM clients used by the semantic fidelity judge
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Send a prompt and get a structured JSON response
    async fn evaluate(&self, prompt: String) -> Result<LLMResponse, LLMError>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Response from LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub model: String,
}

impl LLMResponse {
    /// Parse response as JSON
    ///
    /// Models occasionally wrap the object in a markdown fence or a sentence
    /// of prose; the outermost `{...}` span is parsed in that case.
    pub fn as_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match serde_json::from_str(&self.content) {
            Ok(value) => Ok(value),
            Err(err) => match (self.content.find('{'), self.content.rfind('}')) {
                (Some(start), Some(end)) if start < end => {
                    serde_json::from_str(&self.content[start..=end])
                }
                _ => Err(err),
            },
        }
    }

    /// Get a specific field from JSON response
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.as_json().ok()?.get(key).cloned()
    }
}

/// Token usage information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Errors from LLM clients
#[derive(Debug, Error)]
pub enum LLMError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from embedding clients
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Trait for embedding clients used by the drift metric
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed a single text string
    async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbedError>;

    /// Embed a batch of texts, one vector per input in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, EmbedError>;
}

/// Map a non-success HTTP status to an error message, keeping 429 distinct
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, (bool, String)> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let rate_limited = status == reqwest::StatusCode::TOO_MANY_REQUESTS;
    let body = response.text().await.unwrap_or_default();
    Err((rate_limited, format!("{}: {}", status, body)))
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct EmbeddingList {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

/// OpenAI-compatible client (chat completions and embeddings)
///
/// `with_base_url` points it at any server speaking the same protocol
/// (Azure deployments, vLLM, Ollama, a local proxy).
pub struct OpenAIClient {
    api_key: String,
    model: String,
    embedding_model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            embedding_model: "text-embedding-3-small".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_embedding_model(mut self, model: String) -> Self {
        self.embedding_model = model;
        self
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
    }
}

#[async_trait]
impl EmbeddingClient for OpenAIClient {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbedError> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| EmbedError::ApiError("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, EmbedError> {
        let body = serde_json::json!({ "model": self.embedding_model, "input": texts });
        let response = check_status(self.post("embeddings", &body).await?)
            .await
            .map_err(|(rate_limited, message)| {
                if rate_limited {
                    EmbedError::RateLimitExceeded
                } else {
                    EmbedError::ApiError(message)
                }
            })?;

        let mut list: EmbeddingList = response.json().await?;
        if list.data.len() != texts.len() {
            return Err(EmbedError::ApiError(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                list.data.len()
            )));
        }
        list.data.sort_by_key(|item| item.index);
        Ok(list.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn evaluate(&self, prompt: String) -> Result<LLMResponse, LLMError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": JUDGE_SYSTEM_PROMPT },
                { "role": "user", "content": prompt }
            ],
            "temperature": 0.0,
            "response_format": { "type": "json_object" }
        });
        let response = check_status(self.post("chat/completions", &body).await?)
            .await
            .map_err(llm_status_error)?;

        let completion: ChatCompletion = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LLMError::InvalidResponse("Missing content".to_string()))?;
        let usage = completion
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(LLMResponse {
            content,
            usage,
            model: self.model.clone(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn llm_status_error((rate_limited, message): (bool, String)) -> LLMError {
    if rate_limited {
        LLMError::RateLimitExceeded
    } else {
        LLMError::ApiError(message)
    }
}

/// Anthropic Messages API client
pub struct AnthropicClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            base_url: "https://api.anthropic.com/v1".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl LLMClient for AnthropicClient {
    async fn evaluate(&self, prompt: String) -> Result<LLMResponse, LLMError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 512,
            "system": JUDGE_SYSTEM_PROMPT,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.0
        });
        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await.map_err(llm_status_error)?;

        let reply: MessagesReply = response.json().await?;
        let content = reply
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| LLMError::InvalidResponse("Missing content".to_string()))?;
        let usage = reply
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.input_tokens + u.output_tokens,
            })
            .unwrap_or_default();

        Ok(LLMResponse {
            content,
            usage,
            model: self.model.clone(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(content: &str) -> LLMResponse {
        LLMResponse {
            content: content.to_string(),
            usage: TokenUsage::default(),
            model: "test".to_string(),
        }
    }

    #[test]
    fn test_as_json_plain() {
        let resp = response(r#"{"score": 0.8, "reason": "ok"}"#);
        assert_eq!(resp.get("score").and_then(|v| v.as_f64()), Some(0.8));
    }

    #[test]
    fn test_as_json_fenced() {
        let resp = response("```json\n{\"score\": 0.25}\n```");
        assert_eq!(resp.get("score").and_then(|v| v.as_f64()), Some(0.25));
    }

    #[test]
    fn test_as_json_garbage() {
        let resp = response("no json here");
        assert!(resp.as_json().is_err());
        assert!(resp.get("score").is_none());
    }

    #[test]
    fn test_chat_completion_decoding() {
        let completion: ChatCompletion = serde_json::from_value(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "{}" } }]
        }))
        .unwrap();
        assert_eq!(completion.choices[0].message.content.as_deref(), Some("{}"));
        assert!(completion.usage.is_none());
    }

    #[test]
    fn test_embedding_list_decoding() {
        let list: EmbeddingList = serde_json::from_value(serde_json::json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        }))
        .unwrap();
        assert_eq!(list.data.len(), 2);
        assert_eq!(list.data[0].index, 1);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = OpenAIClient::new("k".to_string(), "m".to_string())
            .with_base_url("http://localhost:8080/v1/".to_string());
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_model_names() {
        let openai = OpenAIClient::new("k".to_string(), "gpt-4o-mini".to_string());
        assert_eq!(LLMClient::model_name(&openai), "gpt-4o-mini");
        let anthropic = AnthropicClient::new("k".to_string(), "claude-3-5-haiku".to_string());
        assert_eq!(anthropic.model_name(), "claude-3-5-haiku");
    }
}
