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

//! Composite of Factual Correctness (F1 over claims) and Semantic
//! Similarity, combined by a caller-supplied weight pair defaulting to
//! `(0.75, 0.25)` — the ratio documented by the upstream RAGAS answer
//! correctness metric.

use std::collections::HashMap;
use std::sync::Arc;

use judgeflow_core::{ListenerBus, MetricEvaluationResult, MultiModelExecutor, Sample, ScoreAggregator};
use tokio_util::sync::CancellationToken;

use crate::config::{AnswerCorrectnessConfig, FactualCorrectnessConfig, OverlapMode};
use crate::{factual_correctness, semantic_similarity};

pub async fn evaluate(
    sample: Sample,
    models: Vec<String>,
    executor: Arc<MultiModelExecutor>,
    listener_bus: &ListenerBus,
    cancel: CancellationToken,
    aggregator: ScoreAggregator,
    config: AnswerCorrectnessConfig,
) -> MetricEvaluationResult {
    let factual = factual_correctness::evaluate(
        sample.clone(),
        models.clone(),
        executor.clone(),
        listener_bus,
        cancel.clone(),
        aggregator.clone(),
        FactualCorrectnessConfig { mode: OverlapMode::Fmeasure },
    )
    .await;

    let semantic = semantic_similarity::evaluate(
        sample.clone(),
        models.clone(),
        executor.clone(),
        listener_bus,
        cancel.clone(),
        aggregator.clone(),
    )
    .await;

    let mut runner = judgeflow_core::MetricPipelineRunner::start(
        "answer_correctness",
        sample,
        models,
        executor,
        listener_bus,
        1,
        cancel,
    )
    .await;

    let mut scores = HashMap::new();
    for (model_id, factual_score) in &factual.model_scores {
        if let Some(semantic_score) = semantic.model_scores.get(model_id) {
            let combined = config.weight_factual * factual_score + config.weight_semantic * semantic_score;
            scores.insert(model_id.clone(), combined);
        }
    }
    runner.run_compute_step("combine_factual_and_semantic").await;

    runner.finish(scores, &aggregator, None).await
}
