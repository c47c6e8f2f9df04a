// Copyright 2025 Judgeflow Contributors
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

//! Judge (chat) and embedding client transport.
//!
//! Wire parsing happens inside each client's own request method against
//! `#[derive(Deserialize)]` schema structs; callers above this layer only
//! ever see typed `JudgeCompletion`/`Vec<f32>` values.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::JudgeError;

#[derive(Debug, Clone)]
pub struct JudgeCompletion {
    pub content: String,
}

impl JudgeCompletion {
    /// Parses the completion's content as JSON into the caller's schema
    /// type. Judge prompts always request `response_format: json_object`
    /// equivalents, so this is the only parsing path callers need.
    pub fn parse<T: for<'de> Deserialize<'de>>(&self) -> std::result::Result<T, JudgeError> {
        serde_json::from_str(&self.content).map_err(|e| JudgeError::Parse(e.to_string()))
    }
}

#[async_trait]
pub trait ChatJudgeClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> std::result::Result<JudgeCompletion, JudgeError>;

    fn model_name(&self) -> &str;
}

#[async_trait]
pub trait EmbeddingJudgeClient: Send + Sync {
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, JudgeError>;

    async fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, JudgeError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn model_name(&self) -> &str;
}

/// Works against any OpenAI-compatible `/chat/completions` + `/embeddings`
/// surface (OpenAI itself, Azure OpenAI, local vLLM/Ollama gateways, etc.)
/// — the "OpenAI-compatible base URLs" provider shape.
pub struct OpenAiCompatibleJudge {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleJudge {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[async_trait]
impl ChatJudgeClient for OpenAiCompatibleJudge {
    async fn complete(&self, prompt: &str) -> std::result::Result<JudgeCompletion, JudgeError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "response_format": {"type": "json_object"},
            "temperature": 0.0,
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| JudgeError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(JudgeError::Transport(format!(
                "chat completion returned {}",
                resp.status()
            )));
        }

        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| JudgeError::Parse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| JudgeError::Parse("empty choices array".into()))?;

        Ok(JudgeCompletion { content })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingJudgeClient for OpenAiCompatibleJudge {
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, JudgeError> {
        let model = if self.model.contains("embedding") {
            self.model.clone()
        } else {
            "text-embedding-3-small".to_string()
        };

        let body = serde_json::json!({ "model": model, "input": text });

        let resp = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| JudgeError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(JudgeError::Transport(format!(
                "embeddings returned {}",
                resp.status()
            )));
        }

        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| JudgeError::Parse(e.to_string()))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| JudgeError::Parse("empty embeddings data array".into()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Anthropic's `/messages` surface. Chat-only: Anthropic has no embeddings
/// endpoint, matching the teacher's `AnthropicClient`.
pub struct AnthropicJudge {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicJudge {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://api.anthropic.com/v1".to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    text: String,
}

#[async_trait]
impl ChatJudgeClient for AnthropicJudge {
    async fn complete(&self, prompt: &str) -> std::result::Result<JudgeCompletion, JudgeError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 1024,
            "messages": [{"role": "user", "content": prompt}],
        });

        let resp = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| JudgeError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(JudgeError::Transport(format!(
                "anthropic messages returned {}",
                resp.status()
            )));
        }

        let parsed: AnthropicResponse = resp
            .json()
            .await
            .map_err(|e| JudgeError::Parse(e.to_string()))?;

        let content = parsed
            .content
            .into_iter()
            .next()
            .map(|b| b.text)
            .ok_or_else(|| JudgeError::Parse("empty content blocks".into()))?;

        Ok(JudgeCompletion { content })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
