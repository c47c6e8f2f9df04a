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

//! Cosine similarity between response and reference embeddings.

use std::collections::HashMap;
use std::sync::Arc;

use judgeflow_core::{ListenerBus, MetricEvaluationResult, MultiModelExecutor, Sample, ScoreAggregator};
use tokio_util::sync::CancellationToken;

use crate::common::cosine_similarity;

pub async fn evaluate(
    sample: Sample,
    models: Vec<String>,
    executor: Arc<MultiModelExecutor>,
    listener_bus: &ListenerBus,
    cancel: CancellationToken,
    aggregator: ScoreAggregator,
) -> MetricEvaluationResult {
    let mut runner = judgeflow_core::MetricPipelineRunner::start(
        "semantic_similarity",
        sample.clone(),
        models,
        executor,
        listener_bus,
        1,
        cancel,
    )
    .await;

    let Some(reference) = sample.reference.clone() else {
        tracing::warn!("semantic_similarity requires Sample.reference");
        return runner.finish(HashMap::new(), &aggregator, None).await;
    };

    let step = runner
        .run_embedding_step("embed_response_and_reference", &[sample.response.clone(), reference])
        .await;

    let mut scores = HashMap::new();
    for (model_id, vectors) in &step.embedding_model_results {
        if vectors.len() == 2 {
            scores.insert(model_id.clone(), cosine_similarity(&vectors[0], &vectors[1]));
        }
    }

    runner.finish(scores, &aggregator, None).await
}
