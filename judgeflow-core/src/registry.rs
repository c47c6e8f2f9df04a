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

//! Read-only registry of chat and embedding judge clients, keyed by model id.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::judge_client::{ChatJudgeClient, EmbeddingJudgeClient};

pub struct ModelRegistry {
    chat: HashMap<String, Arc<dyn ChatJudgeClient>>,
    embedding: HashMap<String, Arc<dyn EmbeddingJudgeClient>>,
    default_chat: Option<String>,
}

impl ModelRegistry {
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::default()
    }

    pub fn chat_ids(&self) -> Vec<String> {
        self.chat.keys().cloned().collect()
    }

    pub fn embedding_ids(&self) -> Vec<String> {
        self.embedding.keys().cloned().collect()
    }

    pub fn has_chat(&self, id: &str) -> bool {
        self.chat.contains_key(id)
    }

    pub fn get_chat(&self, id: &str) -> Result<&Arc<dyn ChatJudgeClient>> {
        self.chat
            .get(id)
            .ok_or_else(|| CoreError::Configuration(format!("unknown chat model id: {id}")))
    }

    pub fn get_embedding(&self, id: &str) -> Result<&Arc<dyn EmbeddingJudgeClient>> {
        self.embedding
            .get(id)
            .ok_or_else(|| CoreError::Configuration(format!("unknown embedding model id: {id}")))
    }

    pub fn get_chat_or_default(&self, id: Option<&str>) -> Result<&Arc<dyn ChatJudgeClient>> {
        match id {
            Some(id) => self.get_chat(id),
            None => {
                let default = self
                    .default_chat
                    .as_deref()
                    .ok_or_else(|| CoreError::Configuration("no default chat model configured".into()))?;
                self.get_chat(default)
            }
        }
    }
}

#[derive(Default)]
pub struct ModelRegistryBuilder {
    chat: HashMap<String, Arc<dyn ChatJudgeClient>>,
    embedding: HashMap<String, Arc<dyn EmbeddingJudgeClient>>,
    default_chat: Option<String>,
}

impl ModelRegistryBuilder {
    pub fn with_chat(mut self, id: impl Into<String>, client: Arc<dyn ChatJudgeClient>) -> Self {
        let id = id.into();
        if self.default_chat.is_none() {
            self.default_chat = Some(id.clone());
        }
        self.chat.insert(id, client);
        self
    }

    pub fn with_embedding(mut self, id: impl Into<String>, client: Arc<dyn EmbeddingJudgeClient>) -> Self {
        self.embedding.insert(id.into(), client);
        self
    }

    pub fn with_default_chat(mut self, id: impl Into<String>) -> Self {
        self.default_chat = Some(id.into());
        self
    }

    pub fn build(self) -> ModelRegistry {
        ModelRegistry {
            chat: self.chat,
            embedding: self.embedding,
            default_chat: self.default_chat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JudgeError;
    use async_trait::async_trait;
    use crate::judge_client::JudgeCompletion;

    struct StubJudge(&'static str);

    #[async_trait]
    impl ChatJudgeClient for StubJudge {
        async fn complete(&self, _prompt: &str) -> std::result::Result<JudgeCompletion, JudgeError> {
            Ok(JudgeCompletion { content: "{}".into() })
        }
        fn model_name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn unknown_model_id_is_configuration_error() {
        let registry = ModelRegistry::builder().build();
        let err = registry.get_chat("missing").unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }

    #[test]
    fn first_registered_chat_model_becomes_default() {
        let registry = ModelRegistry::builder()
            .with_chat("gpt-4o", Arc::new(StubJudge("gpt-4o")))
            .build();
        assert!(registry.get_chat_or_default(None).is_ok());
    }
}
