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

//! Fans an LLM/embedding call out across one or all registered models.
//!
//! Two bounded pools: a small metric-coordination pool and a larger HTTP
//! pool. A metric task may block on an HTTP task but never the reverse,
//! which is what rules out the deadlock a single shared pool would risk
//! once fan-out saturates it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::ModelProviderMap;
use crate::error::JudgeError;
use crate::model_result::ModelResult;
use crate::rate_limit::{RateLimitConfig, RateLimiterRegistry};
use crate::registry::ModelRegistry;

pub struct ExecutorConfig {
    pub metric_pool_size: usize,
    pub http_pool_size: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            metric_pool_size: 8,
            http_pool_size: 64,
        }
    }
}

pub struct MultiModelExecutor {
    registry: Arc<ModelRegistry>,
    rate_limiters: Arc<RateLimiterRegistry>,
    providers: ModelProviderMap,
    rate_limits: HashMap<String, RateLimitConfig>,
    metric_pool: Arc<Semaphore>,
    http_pool: Arc<Semaphore>,
}

impl MultiModelExecutor {
    pub fn new(
        registry: Arc<ModelRegistry>,
        rate_limiters: Arc<RateLimiterRegistry>,
        providers: ModelProviderMap,
        rate_limits: HashMap<String, RateLimitConfig>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            registry,
            rate_limiters,
            providers,
            rate_limits,
            metric_pool: Arc::new(Semaphore::new(config.metric_pool_size)),
            http_pool: Arc::new(Semaphore::new(config.http_pool_size)),
        }
    }

    pub fn model_ids(&self) -> Vec<String> {
        self.registry.chat_ids()
    }

    pub fn embedding_model_ids(&self) -> Vec<String> {
        self.registry.embedding_ids()
    }

    /// Acquires a metric-pool permit for coordination work that must not
    /// itself be starved behind HTTP traffic. Exposed so the pipeline
    /// runner can gate step coordination the same way.
    pub async fn acquire_metric_permit(&self) -> tokio::sync::OwnedSemaphorePermit {
        self.metric_pool
            .clone()
            .acquire_owned()
            .await
            .expect("metric pool semaphore never closes")
    }

    fn provider_for(&self, model_id: &str) -> String {
        self.providers
            .chat
            .get(model_id)
            .cloned()
            .unwrap_or_else(|| model_id.to_string())
    }

    fn provider_for_embedding(&self, model_id: &str) -> String {
        self.providers
            .embedding
            .get(model_id)
            .cloned()
            .unwrap_or_else(|| model_id.to_string())
    }

    fn rate_limit_for(&self, provider: &str) -> RateLimitConfig {
        self.rate_limits.get(provider).cloned().unwrap_or(RateLimitConfig {
            rps: f64::MAX,
            strategy: crate::rate_limit::RateLimitStrategy::Wait,
            timeout: Duration::from_secs(30),
        })
    }

    pub async fn execute_llm_on_model(
        &self,
        model_id: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> ModelResult<serde_json::Value> {
        let start = Instant::now();
        let provider = self.provider_for(model_id);
        let rate_limit = self.rate_limit_for(&provider);

        if cancel.is_cancelled() {
            return ModelResult::failure(model_id, start.elapsed(), Some(prompt.to_string()), JudgeError::Cancelled);
        }

        let permit_result = tokio::select! {
            res = self.rate_limiters.acquire(&provider, &rate_limit) => res,
            _ = cancel.cancelled() => {
                return ModelResult::failure(model_id, start.elapsed(), Some(prompt.to_string()), JudgeError::Cancelled);
            }
        };

        if let Err(err) = permit_result {
            return ModelResult::failure(model_id, start.elapsed(), Some(prompt.to_string()), JudgeError::RateLimit(err));
        }

        let _http_permit = tokio::select! {
            p = self.http_pool.acquire() => p.expect("http pool semaphore never closes"),
            _ = cancel.cancelled() => {
                return ModelResult::failure(model_id, start.elapsed(), Some(prompt.to_string()), JudgeError::Cancelled);
            }
        };

        let client = match self.registry.get_chat(model_id) {
            Ok(client) => client.clone(),
            Err(_) => {
                return ModelResult::failure(
                    model_id,
                    start.elapsed(),
                    Some(prompt.to_string()),
                    JudgeError::Internal(format!("model {model_id} not registered")),
                )
            }
        };

        let call = client.complete(prompt);
        let outcome = tokio::select! {
            res = call => res,
            _ = cancel.cancelled() => {
                return ModelResult::failure(model_id, start.elapsed(), Some(prompt.to_string()), JudgeError::Cancelled);
            }
        };

        match outcome {
            Ok(completion) => {
                let value = serde_json::Value::String(completion.content);
                ModelResult::success(model_id, start.elapsed(), Some(prompt.to_string()), value)
            }
            Err(err) => ModelResult::failure(model_id, start.elapsed(), Some(prompt.to_string()), err),
        }
    }

    pub async fn execute_llm_on_all(
        &self,
        models: &[String],
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Vec<ModelResult<serde_json::Value>> {
        let futures = models
            .iter()
            .map(|model_id| self.execute_llm_on_model(model_id, prompt, cancel));
        join_all(futures).await
    }

    pub async fn execute_embedding_on_model(
        &self,
        model_id: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> ModelResult<Vec<f32>> {
        let start = Instant::now();
        let provider = self.provider_for_embedding(model_id);
        let rate_limit = self.rate_limit_for(&provider);

        if cancel.is_cancelled() {
            return ModelResult::failure(model_id, start.elapsed(), None, JudgeError::Cancelled);
        }

        let permit_result = tokio::select! {
            res = self.rate_limiters.acquire(&provider, &rate_limit) => res,
            _ = cancel.cancelled() => {
                return ModelResult::failure(model_id, start.elapsed(), None, JudgeError::Cancelled);
            }
        };
        if let Err(err) = permit_result {
            return ModelResult::failure(model_id, start.elapsed(), None, JudgeError::RateLimit(err));
        }

        let _http_permit = tokio::select! {
            p = self.http_pool.acquire() => p.expect("http pool semaphore never closes"),
            _ = cancel.cancelled() => {
                return ModelResult::failure(model_id, start.elapsed(), None, JudgeError::Cancelled);
            }
        };

        let client = match self.registry.get_embedding(model_id) {
            Ok(client) => client.clone(),
            Err(_) => {
                return ModelResult::failure(
                    model_id,
                    start.elapsed(),
                    None,
                    JudgeError::Internal(format!("embedding model {model_id} not registered")),
                )
            }
        };

        let call = client.embed(text);
        let outcome = tokio::select! {
            res = call => res,
            _ = cancel.cancelled() => {
                return ModelResult::failure(model_id, start.elapsed(), None, JudgeError::Cancelled);
            }
        };

        match outcome {
            Ok(vector) => ModelResult::success(model_id, start.elapsed(), None, vector),
            Err(err) => ModelResult::failure(model_id, start.elapsed(), None, err),
        }
    }

    pub async fn execute_embedding_on_all(
        &self,
        models: &[String],
        text: &str,
        cancel: &CancellationToken,
    ) -> Vec<ModelResult<Vec<f32>>> {
        let futures = models
            .iter()
            .map(|model_id| self.execute_embedding_on_model(model_id, text, cancel));
        join_all(futures).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::judge_client::JudgeCompletion;
    use crate::rate_limit::RateLimitStrategy;
    use crate::registry::ModelRegistry;

    struct StubChat {
        calls: AtomicUsize,
        outcome: std::result::Result<&'static str, JudgeError>,
    }

    impl StubChat {
        fn ok(content: &'static str) -> Self {
            Self { calls: AtomicUsize::new(0), outcome: Ok(content) }
        }

        fn failing(error: JudgeError) -> Self {
            Self { calls: AtomicUsize::new(0), outcome: Err(error) }
        }
    }

    #[async_trait]
    impl ChatJudgeClient for StubChat {
        async fn complete(&self, _prompt: &str) -> std::result::Result<JudgeCompletion, JudgeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome
                .clone()
                .map(|content| JudgeCompletion { content: content.to_string() })
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    fn executor_for(model_id: &str, client: StubChat) -> (Arc<MultiModelExecutor>, Arc<StubChat>) {
        let client = Arc::new(client);
        let registry = ModelRegistry::builder().with_chat(model_id, client.clone()).build();
        let executor = Arc::new(MultiModelExecutor::new(
            Arc::new(registry),
            Arc::new(RateLimiterRegistry::default()),
            ModelProviderMap::default(),
            HashMap::new(),
            ExecutorConfig::default(),
        ));
        (executor, client)
    }

    #[tokio::test]
    async fn successful_call_returns_the_completion_content() {
        let (executor, client) = executor_for("model-a", StubChat::ok("hello"));
        let result = executor.execute_llm_on_model("model-a", "prompt", &CancellationToken::new()).await;
        assert_eq!(result.value(), Some(&serde_json::Value::String("hello".to_string())));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transport_failure_is_reported_as_a_judge_error_not_a_panic() {
        let (executor, _client) =
            executor_for("model-a", StubChat::failing(JudgeError::Transport("connection reset".into())));
        let result = executor.execute_llm_on_model("model-a", "prompt", &CancellationToken::new()).await;
        assert!(matches!(result.error(), Some(JudgeError::Transport(_))));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_before_the_client_is_called() {
        let (executor, client) = executor_for("model-a", StubChat::ok("hello"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = executor.execute_llm_on_model("model-a", "prompt", &cancel).await;
        assert!(matches!(result.error(), Some(JudgeError::Cancelled)));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unregistered_model_fails_without_touching_rate_limiter_or_client() {
        let registry = ModelRegistry::builder().build();
        let executor = MultiModelExecutor::new(
            Arc::new(registry),
            Arc::new(RateLimiterRegistry::default()),
            ModelProviderMap::default(),
            HashMap::new(),
            ExecutorConfig::default(),
        );
        let result = executor.execute_llm_on_model("ghost", "prompt", &CancellationToken::new()).await;
        assert!(matches!(result.error(), Some(JudgeError::Internal(_))));
    }

    #[tokio::test]
    async fn exhausted_rate_limit_bucket_denies_the_call_as_rate_limit_error() {
        let client = Arc::new(StubChat::ok("hello"));
        let registry = ModelRegistry::builder().with_chat("model-a", client.clone()).build();
        let rate_limiters = Arc::new(RateLimiterRegistry::default());
        let fail_fast = RateLimitConfig::per_second(1.0, RateLimitStrategy::FailFast);
        rate_limiters.acquire("model-a", &fail_fast).await.unwrap();

        let mut rate_limits = HashMap::new();
        rate_limits.insert("model-a".to_string(), fail_fast);
        let executor = MultiModelExecutor::new(
            Arc::new(registry),
            rate_limiters,
            ModelProviderMap::default(),
            rate_limits,
            ExecutorConfig::default(),
        );

        let result = executor.execute_llm_on_model("model-a", "prompt", &CancellationToken::new()).await;
        assert!(matches!(result.error(), Some(JudgeError::RateLimit(_))));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn execute_llm_on_all_lets_every_model_succeed_independently() {
        let client_a = Arc::new(StubChat::ok("a"));
        let client_b = Arc::new(StubChat::ok("b"));
        let registry = ModelRegistry::builder()
            .with_chat("model-a", client_a)
            .with_chat("model-b", client_b)
            .build();
        let executor = MultiModelExecutor::new(
            Arc::new(registry),
            Arc::new(RateLimiterRegistry::default()),
            ModelProviderMap::default(),
            HashMap::new(),
            ExecutorConfig::default(),
        );

        let results = executor
            .execute_llm_on_all(&["model-a".to_string(), "model-b".to_string()], "prompt", &CancellationToken::new())
            .await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.value().is_some()));
    }
}
