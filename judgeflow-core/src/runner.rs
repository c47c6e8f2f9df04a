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

//! Drives one metric evaluation as a sequence of steps over a shrinking
//! "surviving model" set.
//!
//! Metrics call the `run_*_step` methods directly in the order their
//! algorithm requires (mirroring how the teacher's RAGAS evaluator inlines
//! its own prompt-building and fan-out per metric, rather than interpreting
//! a declarative step list). The runner owns bookkeeping: sticky exclusions,
//! listener notification, and result assembly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::aggregator::ScoreAggregator;
use crate::context::{
    MetricEvaluationContext, MetricEvaluationResult, MetricMetadata, ModelExclusionEvent, StepContext,
    StepKind, StepModelOutcome, StepResults,
};
use crate::error::JudgeError;
use crate::executor::MultiModelExecutor;
use crate::listener::{EvaluationListeners, ListenerBus};
use crate::model_result::ModelResult;
use crate::sample::Sample;

pub struct MetricPipelineRunner {
    metric_name: String,
    sample: Sample,
    executor: Arc<MultiModelExecutor>,
    listeners: EvaluationListeners,
    cancel: CancellationToken,
    surviving: Vec<String>,
    step_index: usize,
    total_steps: usize,
    exclusions: Vec<ModelExclusionEvent>,
    step_results: Vec<StepResults>,
    started_at: Instant,
    cancelled: bool,
}

impl MetricPipelineRunner {
    pub async fn start(
        metric_name: impl Into<String>,
        sample: Sample,
        initial_models: Vec<String>,
        executor: Arc<MultiModelExecutor>,
        listener_bus: &ListenerBus,
        total_steps: usize,
        cancel: CancellationToken,
    ) -> Self {
        let listeners = listener_bus.for_evaluation();
        let metric_name = metric_name.into();

        let ctx = MetricEvaluationContext {
            metric_name: metric_name.clone(),
            sample: sample.clone(),
            initial_models: initial_models.clone(),
            total_steps,
        };
        listeners.before_metric_evaluation(&ctx).await;

        Self {
            metric_name,
            sample,
            executor,
            listeners,
            cancel,
            surviving: initial_models,
            step_index: 0,
            total_steps,
            exclusions: Vec::new(),
            step_results: Vec::new(),
            started_at: Instant::now(),
            cancelled: false,
        }
    }

    pub fn sample(&self) -> &Sample {
        &self.sample
    }

    pub fn surviving(&self) -> &[String] {
        &self.surviving
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled || self.cancel.is_cancelled()
    }

    async fn emit_before_step(&self, step_name: &str, kind: StepKind, request: Option<String>) {
        let ctx = StepContext {
            metric_name: self.metric_name.clone(),
            step_name: step_name.to_string(),
            step_index: self.step_index,
            total_steps: self.total_steps,
            kind,
            request,
        };
        self.listeners.before_step(&ctx).await;
    }

    async fn finish_step(&mut self, step_name: &str, kind: StepKind, results: Vec<StepModelOutcome>, embedding: Vec<(String, Vec<Vec<f32>>)>) -> StepResults {
        let step_results = StepResults {
            step_index: self.step_index,
            step_name: step_name.to_string(),
            kind,
            results,
            embedding_model_results: embedding,
        };
        self.listeners.after_step(&step_results).await;
        self.step_results.push(step_results.clone());
        self.step_index += 1;
        step_results
    }

    /// Broadcasts `prompt` to every surviving model. Models that fail are
    /// excluded for the rest of this evaluation; `onModelExcluded` fires
    /// once per exclusion, between `beforeStep` and `afterStep`.
    pub async fn run_llm_step(&mut self, step_name: &str, prompt: &str) -> StepResults {
        self.emit_before_step(step_name, StepKind::Llm, Some(prompt.to_string())).await;

        if self.cancel.is_cancelled() {
            self.cancelled = true;
        }

        let models = self.surviving.clone();
        let raw = self
            .executor
            .execute_llm_on_all(&models, prompt, &self.cancel)
            .await;

        self.apply_exclusions(self.step_index, &raw).await;

        let outcomes = raw.into_iter().map(to_step_outcome).collect();
        self.finish_step(step_name, StepKind::Llm, outcomes, Vec::new()).await
    }

    /// Runs `prompt` against exactly one model rather than the whole
    /// surviving set — used for extraction-style steps where every
    /// surviving model must subsequently judge the same shared output.
    /// Still participates in the listener timeline and sticky-exclusion
    /// bookkeeping like any other step; a failure excludes `model_id` the
    /// same way a broadcast failure would.
    pub async fn run_designated_llm_step(&mut self, step_name: &str, model_id: &str, prompt: &str) -> StepResults {
        self.emit_before_step(step_name, StepKind::Llm, Some(prompt.to_string())).await;

        if self.cancel.is_cancelled() {
            self.cancelled = true;
        }

        let result = self.executor.execute_llm_on_model(model_id, prompt, &self.cancel).await;
        self.apply_exclusions(self.step_index, std::slice::from_ref(&result)).await;

        let outcomes = vec![to_step_outcome(result)];
        self.finish_step(step_name, StepKind::Llm, outcomes, Vec::new()).await
    }

    /// Embeds `text` for every surviving embedding model.
    pub async fn run_embedding_step(&mut self, step_name: &str, texts: &[String]) -> StepResults {
        self.emit_before_step(step_name, StepKind::Embedding, None).await;

        let models = self.executor.embedding_model_ids();
        let mut all_results = Vec::new();
        let mut embedding_results = Vec::new();

        for model_id in &models {
            let mut vectors = Vec::with_capacity(texts.len());
            let mut failed = false;
            let mut last: Option<ModelResult<Vec<f32>>> = None;
            for text in texts {
                let result = self.executor.execute_embedding_on_model(model_id, text, &self.cancel).await;
                if !result.is_success() {
                    failed = true;
                    last = Some(result);
                    break;
                }
                vectors.push(result.value().cloned().unwrap_or_default());
                last = Some(result);
            }

            let result = last.expect("at least one text was embedded");
            if !failed {
                embedding_results.push((model_id.clone(), vectors));
            }
            all_results.push(result);
        }

        self.apply_exclusions(self.step_index, &all_results).await;

        let outcomes = all_results
            .into_iter()
            .map(|r| to_step_outcome(r.map(|v| serde_json::to_value(v).unwrap_or_default())))
            .collect();
        self.finish_step(step_name, StepKind::Embedding, outcomes, embedding_results).await
    }

    /// A pure, non-fan-out step (e.g. scoring verdicts already collected).
    /// Still participates in the listener timeline for consistent ordering.
    pub async fn run_compute_step(&mut self, step_name: &str) -> StepResults {
        self.emit_before_step(step_name, StepKind::Compute, None).await;
        self.finish_step(step_name, StepKind::Compute, Vec::new(), Vec::new()).await
    }

    /// `step_index` is passed explicitly rather than read from `self`
    /// because callers that exclude after the fact (schema-mismatch
    /// exclusions raised from `parse_step_results`, which runs once the
    /// step that produced the bad JSON has already been finished and
    /// `self.step_index` has moved on) need to attribute the exclusion to
    /// the step that actually failed, not the next one.
    async fn apply_exclusions<T>(&mut self, step_index: usize, results: &[ModelResult<T>]) {
        for result in results {
            if let Some(error) = result.error() {
                self.surviving.retain(|m| m != &result.model_id);
                let event = ModelExclusionEvent {
                    model_id: result.model_id.clone(),
                    failed_step_index: step_index,
                    error: error.clone(),
                };
                self.listeners.on_model_excluded(&event).await;
                self.exclusions.push(event);
            }
        }
    }

    /// Parses every surviving model's raw JSON output from `step` into `T`.
    /// A model whose response doesn't match the schema is excluded on the
    /// spot — the same sticky-exclusion path a transport failure takes —
    /// rather than aborting the whole step for every other model. Call
    /// this once per step, immediately after the `run_*_step` that
    /// produced `step`, so the exclusion is attributed to that step.
    pub async fn parse_step_results<T: for<'de> serde::Deserialize<'de>>(
        &mut self,
        step: &StepResults,
    ) -> HashMap<String, T> {
        let mut out = HashMap::new();
        let mut newly_failed = Vec::new();

        for outcome in &step.results {
            let value = match &outcome.outcome {
                Ok(value) => value,
                // Already excluded upstream (transport failure); nothing
                // further to do for this model.
                Err(_) => continue,
            };

            // LLM steps carry the judge's raw text as a `Value::String`;
            // that text itself is the JSON payload to parse. Any other
            // shape (e.g. an already-structured value) is parsed directly.
            let parsed: std::result::Result<T, JudgeError> = match value {
                serde_json::Value::String(text) => serde_json::from_str(text)
                    .map_err(|e| JudgeError::Parse(format!("step {} schema mismatch: {e}", step.step_name))),
                other => serde_json::from_value(other.clone())
                    .map_err(|e| JudgeError::Parse(format!("step {} schema mismatch: {e}", step.step_name))),
            };

            match parsed {
                Ok(parsed) => {
                    out.insert(outcome.model_id.clone(), parsed);
                }
                Err(error) => newly_failed.push(ModelResult::<()>::failure(
                    outcome.model_id.clone(),
                    outcome.duration,
                    outcome.prompt.clone(),
                    error,
                )),
            }
        }

        if !newly_failed.is_empty() {
            self.apply_exclusions(step.step_index, &newly_failed).await;
        }

        out
    }

    /// Applies `aggregator` over `model_scores` (which must be a subset of
    /// the surviving set) and assembles the final result.
    pub async fn finish(
        mut self,
        model_scores: HashMap<String, f64>,
        aggregator: &ScoreAggregator,
        metadata: Option<MetricMetadata>,
    ) -> MetricEvaluationResult {
        if self.cancel.is_cancelled() {
            self.cancelled = true;
        }

        let aggregated_score = if model_scores.is_empty() {
            None
        } else {
            aggregator.aggregate(&model_scores).ok()
        };

        let excluded_models: Vec<String> = self.exclusions.iter().map(|e| e.model_id.clone()).collect();

        let result = MetricEvaluationResult {
            metric_name: self.metric_name.clone(),
            aggregated_score,
            model_scores,
            excluded_models,
            exclusions: self.exclusions.clone(),
            duration: self.started_at.elapsed(),
            step_results: self.step_results.clone(),
            metadata,
            cancelled: self.cancelled,
        };

        self.listeners.after_metric_evaluation(&result).await;
        result
    }
}

fn to_step_outcome<T: serde::Serialize>(result: ModelResult<T>) -> StepModelOutcome {
    StepModelOutcome {
        model_id: result.model_id,
        duration: result.duration,
        prompt: result.prompt,
        outcome: result
            .outcome
            .map(|v| serde_json::to_value(v).unwrap_or(serde_json::Value::Null)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::ScoreAggregator;
    use crate::executor::{ExecutorConfig, MultiModelExecutor};
    use crate::judge_client::{ChatJudgeClient, JudgeCompletion};
    use crate::rate_limit::RateLimiterRegistry;
    use crate::registry::ModelRegistry;
    use serde::Deserialize;

    pub(super) struct ScriptedJudge {
        pub(super) name: &'static str,
        pub(super) response: std::result::Result<&'static str, &'static str>,
    }

    #[async_trait::async_trait]
    impl ChatJudgeClient for ScriptedJudge {
        async fn complete(&self, _prompt: &str) -> std::result::Result<JudgeCompletion, JudgeError> {
            match self.response {
                Ok(content) => Ok(JudgeCompletion { content: content.to_string() }),
                Err(msg) => Err(JudgeError::Transport(msg.to_string())),
            }
        }

        fn model_name(&self) -> &str {
            self.name
        }
    }

    pub(super) fn executor(judges: Vec<ScriptedJudge>) -> Arc<MultiModelExecutor> {
        let mut builder = ModelRegistry::builder();
        for judge in judges {
            let name = judge.name;
            builder = builder.with_chat(name, Arc::new(judge));
        }
        Arc::new(MultiModelExecutor::new(
            Arc::new(builder.build()),
            Arc::new(RateLimiterRegistry::default()),
            crate::config::ModelProviderMap::default(),
            HashMap::new(),
            ExecutorConfig::default(),
        ))
    }

    pub(super) async fn runner_with(executor: Arc<MultiModelExecutor>, models: Vec<String>, total_steps: usize) -> MetricPipelineRunner {
        MetricPipelineRunner::start(
            "test_metric",
            Sample::new("r"),
            models,
            executor,
            &ListenerBus::new(),
            total_steps,
            CancellationToken::new(),
        )
        .await
    }

    #[derive(Deserialize)]
    struct Verdict {
        #[allow(dead_code)]
        ok: bool,
    }

    #[tokio::test]
    async fn run_llm_step_excludes_only_the_failing_model() {
        let executor = executor(vec![
            ScriptedJudge { name: "good", response: Ok("{\"ok\": true}") },
            ScriptedJudge { name: "bad", response: Err("connection reset") },
        ]);
        let mut runner = runner_with(executor, vec!["good".into(), "bad".into()], 1).await;

        runner.run_llm_step("judge", "prompt").await;

        assert_eq!(runner.surviving(), &["good".to_string()]);

        let result = runner.finish(HashMap::new(), &ScoreAggregator::Average, None).await;
        assert_eq!(result.excluded_models, vec!["bad".to_string()]);
        assert_eq!(result.exclusions[0].failed_step_index, 0);
    }

    #[tokio::test]
    async fn schema_mismatch_excludes_only_that_model_not_the_whole_step() {
        let executor = executor(vec![
            ScriptedJudge { name: "good", response: Ok("{\"ok\": true}") },
            ScriptedJudge { name: "malformed", response: Ok("not json at all") },
        ]);
        let mut runner = runner_with(executor, vec!["good".into(), "malformed".into()], 1).await;

        let step = runner.run_llm_step("judge", "prompt").await;
        // Neither model failed at the transport level yet.
        assert_eq!(runner.surviving().len(), 2);

        let parsed = runner.parse_step_results::<Verdict>(&step).await;

        assert!(parsed.contains_key("good"));
        assert!(!parsed.contains_key("malformed"));
        assert_eq!(runner.surviving(), &["good".to_string()]);

        let result = runner.finish(HashMap::new(), &ScoreAggregator::Average, None).await;
        assert_eq!(result.excluded_models, vec!["malformed".to_string()]);
        // The exclusion is attributed to the step that produced the bad
        // JSON, not to whatever step index the runner has since moved to.
        assert_eq!(result.exclusions[0].failed_step_index, step.step_index);
    }

    #[tokio::test]
    async fn designated_step_failure_excludes_the_extractor_and_fires_listener_event() {
        let executor = executor(vec![ScriptedJudge { name: "extractor", response: Err("timed out") }]);
        let mut runner = runner_with(executor, vec!["extractor".into()], 1).await;

        runner.run_designated_llm_step("extract", "extractor", "prompt").await;

        assert!(runner.surviving().is_empty());
        let result = runner.finish(HashMap::new(), &ScoreAggregator::Average, None).await;
        assert_eq!(result.excluded_models, vec!["extractor".to_string()]);
    }

    #[tokio::test]
    async fn every_model_succeeding_excludes_nobody() {
        let executor = executor(vec![
            ScriptedJudge { name: "a", response: Ok("{\"ok\": true}") },
            ScriptedJudge { name: "b", response: Ok("{\"ok\": true}") },
        ]);
        let mut runner = runner_with(executor, vec!["a".into(), "b".into()], 1).await;

        let step = runner.run_llm_step("judge", "prompt").await;
        let parsed = runner.parse_step_results::<Verdict>(&step).await;

        assert_eq!(parsed.len(), 2);
        let result = runner.finish(HashMap::new(), &ScoreAggregator::Average, None).await;
        assert!(result.excluded_models.is_empty());
    }
}

#[cfg(test)]
mod properties {
    use super::tests::*;
    use super::*;
    use crate::aggregator::ScoreAggregator;
    use proptest::prelude::*;

    /// If model `m` fails at step 0, it lands in `excludedModels`, is absent
    /// from `modelScores`, and appears in exactly one `onModelExcluded` event
    /// whose step index is 0 — regardless of how many other models ran
    /// alongside it or in what order.
    proptest! {
        #[test]
        fn failing_model_is_excluded_exactly_once_regardless_of_peer_count(
            peer_count in 0usize..5,
            fail_index in 0usize..6,
        ) {
            let fail_index = fail_index.min(peer_count);
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async move {
                let mut models = Vec::new();
                let mut judges = Vec::new();
                let names: Vec<String> = (0..=peer_count).map(|i| format!("m{i}")).collect();
                for (i, name) in names.iter().enumerate() {
                    models.push(name.clone());
                    let leaked: &'static str = Box::leak(name.clone().into_boxed_str());
                    if i == fail_index {
                        judges.push(ScriptedJudge { name: leaked, response: Err("boom") });
                    } else {
                        judges.push(ScriptedJudge { name: leaked, response: Ok("{\"ok\": true}") });
                    }
                }
                let failing_model = models[fail_index].clone();

                let executor = executor(judges);
                let mut runner = runner_with(executor, models, 1).await;
                runner.run_llm_step("judge", "prompt").await;
                let result = runner.finish(HashMap::new(), &ScoreAggregator::Average, None).await;

                prop_assert_eq!(result.excluded_models, vec![failing_model.clone()]);
                prop_assert!(!result.model_scores.contains_key(&failing_model));
                let matching: Vec<_> = result.exclusions.iter().filter(|e| e.model_id == failing_model).collect();
                prop_assert_eq!(matching.len(), 1);
                prop_assert_eq!(matching[0].failed_step_index, 0);
                Ok(())
            })?;
        }
    }
}
