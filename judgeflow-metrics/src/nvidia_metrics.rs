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

//! NVIDIA-style three-point judgments (0/1/2), normalized to [0,1]. Both
//! metrics run the judgment step twice under different prompts and average
//! the two as a dual-judge pass, matching the teacher's self-consistency
//! pattern for noisy single-call LLM grading.

use std::collections::HashMap;
use std::sync::Arc;

use judgeflow_core::{ListenerBus, MetricEvaluationResult, MultiModelExecutor, Sample, ScoreAggregator};
use tokio_util::sync::CancellationToken;

use crate::schemas::NvidiaJudgment;

async fn dual_judge_score(
    runner: &mut judgeflow_core::MetricPipelineRunner,
    prompt_a: &str,
    prompt_b: &str,
) -> HashMap<String, f64> {
    let step_a = runner.run_llm_step("judge_pass_1", prompt_a).await;
    let step_b = runner.run_llm_step("judge_pass_2", prompt_b).await;

    let a = runner.parse_step_results::<NvidiaJudgment>(&step_a).await;
    let b = runner.parse_step_results::<NvidiaJudgment>(&step_b).await;

    let mut scores = HashMap::new();
    for (model_id, judgment_a) in &a {
        let score_a = judgment_a.judgment as f64 / 2.0;
        let score = match b.get(model_id) {
            Some(judgment_b) => (score_a + judgment_b.judgment as f64 / 2.0) / 2.0,
            None => score_a,
        };
        scores.insert(model_id.clone(), score);
    }
    scores
}

pub async fn answer_accuracy(
    sample: Sample,
    models: Vec<String>,
    executor: Arc<MultiModelExecutor>,
    listener_bus: &ListenerBus,
    cancel: CancellationToken,
    aggregator: ScoreAggregator,
) -> MetricEvaluationResult {
    let mut runner = judgeflow_core::MetricPipelineRunner::start(
        "answer_accuracy",
        sample.clone(),
        models,
        executor,
        listener_bus,
        2,
        cancel,
    )
    .await;

    let reference = sample.reference.clone().unwrap_or_default();
    let prompt_a = format!(
        "Rate how well the response matches the reference answer on a scale of 0 (wrong), \
         1 (partially correct), 2 (fully correct). Return strict JSON: \
         {{\"judgment\": 0|1|2, \"reason\": string}}.\n\nReference:\n{reference}\n\nResponse:\n{}",
        sample.response
    );
    let prompt_b = format!(
        "Independently rate the accuracy of the response against the reference answer, scale \
         0/1/2 as before, considering factual precision rather than phrasing. Return strict \
         JSON: {{\"judgment\": 0|1|2, \"reason\": string}}.\n\nReference:\n{reference}\n\nResponse:\n{}",
        sample.response
    );

    let scores = dual_judge_score(&mut runner, &prompt_a, &prompt_b).await;
    runner.finish(scores, &aggregator, None).await
}

pub async fn response_groundedness(
    sample: Sample,
    models: Vec<String>,
    executor: Arc<MultiModelExecutor>,
    listener_bus: &ListenerBus,
    cancel: CancellationToken,
    aggregator: ScoreAggregator,
) -> MetricEvaluationResult {
    let mut runner = judgeflow_core::MetricPipelineRunner::start(
        "response_groundedness",
        sample.clone(),
        models,
        executor,
        listener_bus,
        2,
        cancel,
    )
    .await;

    let contexts = sample.retrieved_contexts.join("\n");
    let prompt_a = format!(
        "Rate how grounded the response is in the retrieved context on a scale of 0 (not \
         grounded), 1 (partially grounded), 2 (fully grounded). Return strict JSON: \
         {{\"judgment\": 0|1|2, \"reason\": string}}.\n\nContext:\n{contexts}\n\nResponse:\n{}",
        sample.response
    );
    let prompt_b = format!(
        "Independently rate whether every claim in the response traces back to the context, \
         scale 0/1/2 as before. Return strict JSON: {{\"judgment\": 0|1|2, \"reason\": string}}.\n\n\
         Context:\n{contexts}\n\nResponse:\n{}",
        sample.response
    );

    let scores = dual_judge_score(&mut runner, &prompt_a, &prompt_b).await;
    runner.finish(scores, &aggregator, None).await
}
