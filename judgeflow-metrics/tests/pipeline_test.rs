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

//! End-to-end pipeline scenarios driven through real `OpenAiCompatibleJudge`
//! clients against mocked HTTP servers, rather than calling metric internals
//! directly — these exercise the full executor/runner/listener wiring the
//! same way the CLI binary does.

use std::collections::HashMap;
use std::sync::Arc;

use judgeflow_core::{
    ExecutorConfig, ListenerBus, ModelProviderMap, ModelRegistry, MultiModelExecutor, OpenAiCompatibleJudge, Sample,
    ScoreAggregator,
};
use mockito::Matcher;
use tokio_util::sync::CancellationToken;

fn chat_body(content: &str) -> String {
    serde_json::json!({
        "choices": [{"message": {"content": content}}]
    })
    .to_string()
}

#[tokio::test]
async fn faithfulness_two_models_diverge_on_shared_statements() {
    let mut server_a = mockito::Server::new_async().await;
    let mut server_b = mockito::Server::new_async().await;

    let extraction_body = chat_body(
        &serde_json::json!({"statements": ["Paris is the capital of France.", "Paris has 10 million residents."]})
            .to_string(),
    );
    let _extract_mock = server_a
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("Extract every distinct".into()))
        .with_status(200)
        .with_body(&extraction_body)
        .create_async()
        .await;

    let verdicts_a = chat_body(
        &serde_json::json!({"verdicts": [
            {"statement": "Paris is the capital of France.", "verdict": 1, "reason": "stated in context"},
            {"statement": "Paris has 10 million residents.", "verdict": 0, "reason": "not mentioned"}
        ]})
        .to_string(),
    );
    let _verdict_mock_a = server_a
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("classify each numbered".into()))
        .with_status(200)
        .with_body(&verdicts_a)
        .create_async()
        .await;

    let verdicts_b = chat_body(
        &serde_json::json!({"verdicts": [
            {"statement": "Paris is the capital of France.", "verdict": 1, "reason": "stated in context"},
            {"statement": "Paris has 10 million residents.", "verdict": 1, "reason": "inferred"}
        ]})
        .to_string(),
    );
    let _verdict_mock_b = server_b
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("classify each numbered".into()))
        .with_status(200)
        .with_body(&verdicts_b)
        .create_async()
        .await;

    let registry = ModelRegistry::builder()
        .with_chat(
            "model-a",
            Arc::new(OpenAiCompatibleJudge::new("key", "model-a", server_a.url())),
        )
        .with_chat(
            "model-b",
            Arc::new(OpenAiCompatibleJudge::new("key", "model-b", server_b.url())),
        )
        .build();

    let executor = Arc::new(MultiModelExecutor::new(
        Arc::new(registry),
        Arc::new(judgeflow_core::RateLimiterRegistry::default()),
        ModelProviderMap::default(),
        HashMap::new(),
        ExecutorConfig::default(),
    ));

    let sample = Sample::new("Paris is the capital of France. Paris has 10 million residents.")
        .with_retrieved_contexts(vec!["Paris is the capital of France.".to_string()]);

    let listener_bus = ListenerBus::new();
    let result = judgeflow_metrics::faithfulness::evaluate(
        sample,
        vec!["model-a".to_string(), "model-b".to_string()],
        executor,
        &listener_bus,
        CancellationToken::new(),
        ScoreAggregator::Average,
        Default::default(),
    )
    .await;

    assert_eq!(result.model_scores.get("model-a"), Some(&0.5));
    assert_eq!(result.model_scores.get("model-b"), Some(&1.0));
    assert!(result.excluded_models.is_empty());
    assert!(!result.cancelled);
}

#[tokio::test]
async fn failing_model_is_excluded_but_survivors_still_score() {
    let mut server_good = mockito::Server::new_async().await;
    let mut server_bad = mockito::Server::new_async().await;

    let extraction_body = chat_body(&serde_json::json!({"statements": ["The sky is blue."]}).to_string());
    let _extract_mock = server_good
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("Extract every distinct".into()))
        .with_status(200)
        .with_body(&extraction_body)
        .create_async()
        .await;

    let verdicts_good = chat_body(
        &serde_json::json!({"verdicts": [{"statement": "The sky is blue.", "verdict": 1, "reason": "ok"}]})
            .to_string(),
    );
    let _verdict_mock_good = server_good
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("classify each numbered".into()))
        .with_status(200)
        .with_body(&verdicts_good)
        .create_async()
        .await;

    let _bad_mock = server_bad
        .mock("POST", "/chat/completions")
        .with_status(500)
        .create_async()
        .await;

    let registry = ModelRegistry::builder()
        .with_chat(
            "good-model",
            Arc::new(OpenAiCompatibleJudge::new("key", "good-model", server_good.url())),
        )
        .with_chat(
            "bad-model",
            Arc::new(OpenAiCompatibleJudge::new("key", "bad-model", server_bad.url())),
        )
        .build();

    let executor = Arc::new(MultiModelExecutor::new(
        Arc::new(registry),
        Arc::new(judgeflow_core::RateLimiterRegistry::default()),
        ModelProviderMap::default(),
        HashMap::new(),
        ExecutorConfig::default(),
    ));

    let sample = Sample::new("The sky is blue.").with_retrieved_contexts(vec!["The sky is blue.".to_string()]);

    let listener_bus = ListenerBus::new();
    let result = judgeflow_metrics::faithfulness::evaluate(
        sample,
        vec!["good-model".to_string(), "bad-model".to_string()],
        executor,
        &listener_bus,
        CancellationToken::new(),
        ScoreAggregator::Average,
        Default::default(),
    )
    .await;

    assert_eq!(result.model_scores.get("good-model"), Some(&1.0));
    assert!(result.model_scores.get("bad-model").is_none());
    assert_eq!(result.excluded_models, vec!["bad-model".to_string()]);
}

#[tokio::test]
async fn cancelled_token_short_circuits_every_model() {
    let server = mockito::Server::new_async().await;

    let registry = ModelRegistry::builder()
        .with_chat(
            "model-a",
            Arc::new(OpenAiCompatibleJudge::new("key", "model-a", server.url())),
        )
        .build();

    let executor = Arc::new(MultiModelExecutor::new(
        Arc::new(registry),
        Arc::new(judgeflow_core::RateLimiterRegistry::default()),
        ModelProviderMap::default(),
        HashMap::new(),
        ExecutorConfig::default(),
    ));

    let sample = Sample::new("The sky is blue.").with_retrieved_contexts(vec!["The sky is blue.".to_string()]);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let listener_bus = ListenerBus::new();
    let result = judgeflow_metrics::faithfulness::evaluate(
        sample,
        vec!["model-a".to_string()],
        executor,
        &listener_bus,
        cancel,
        ScoreAggregator::Average,
        Default::default(),
    )
    .await;

    // The extraction step's single executor call checks cancellation before
    // doing anything else, so no mock is ever hit and the metric comes back
    // with no scores at all.
    assert!(result.model_scores.is_empty());
    assert!(result.aggregated_score.is_none());
}

#[tokio::test]
async fn answer_correctness_combines_factual_and_semantic_scores_by_configured_weight() {
    let mut server = mockito::Server::new_async().await;

    let claims_response = chat_body(&serde_json::json!({"statements": ["Paris is the capital of France."]}).to_string());
    let _claims_mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("distinct factual claim".into()))
        .with_status(200)
        .with_body(&claims_response)
        .expect_at_least(1)
        .create_async()
        .await;

    let nli_response = chat_body(
        &serde_json::json!({"verdicts": [
            {"claim": "Paris is the capital of France.", "verdict": "SUPPORTED", "reason": "matches"}
        ]})
        .to_string(),
    );
    let _nli_mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("Classify each claim".into()))
        .with_status(200)
        .with_body(&nli_response)
        .create_async()
        .await;

    let embedding_response = serde_json::json!({"data": [{"embedding": [1.0, 0.0, 0.0]}]}).to_string();
    let _embed_mock = server
        .mock("POST", "/embeddings")
        .with_status(200)
        .with_body(&embedding_response)
        .expect_at_least(1)
        .create_async()
        .await;

    let client = Arc::new(OpenAiCompatibleJudge::new("key", "judge-model", server.url()));
    let registry = ModelRegistry::builder()
        .with_chat("judge-model", client.clone())
        .with_embedding("judge-model", client)
        .build();

    let executor = Arc::new(MultiModelExecutor::new(
        Arc::new(registry),
        Arc::new(judgeflow_core::RateLimiterRegistry::default()),
        ModelProviderMap::default(),
        HashMap::new(),
        ExecutorConfig::default(),
    ));

    let sample = Sample::new("Paris is the capital of France.").with_reference("Paris is the capital of France.");

    let listener_bus = ListenerBus::new();
    let result = judgeflow_metrics::answer_correctness::evaluate(
        sample,
        vec!["judge-model".to_string()],
        executor,
        &listener_bus,
        CancellationToken::new(),
        ScoreAggregator::Average,
        Default::default(),
    )
    .await;

    // Identical embeddings give semantic similarity 1.0 and a fully
    // SUPPORTED claim gives factual correctness 1.0, so the weighted
    // combination collapses to 1.0 regardless of the 0.75/0.25 split.
    assert_eq!(result.model_scores.get("judge-model"), Some(&1.0));
}
