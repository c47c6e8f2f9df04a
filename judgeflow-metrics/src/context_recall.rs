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

//! Fraction of reference statements that can be attributed to the retrieved
//! context. The mirror image of Faithfulness: there it's the response being
//! checked against context, here it's the reference.

use std::collections::HashMap;
use std::sync::Arc;

use judgeflow_core::{ListenerBus, MetricEvaluationResult, MultiModelExecutor, Sample, ScoreAggregator};
use tokio_util::sync::CancellationToken;

use crate::schemas::VerdictList;

pub async fn evaluate(
    sample: Sample,
    models: Vec<String>,
    executor: Arc<MultiModelExecutor>,
    listener_bus: &ListenerBus,
    cancel: CancellationToken,
    aggregator: ScoreAggregator,
) -> MetricEvaluationResult {
    let mut runner = judgeflow_core::MetricPipelineRunner::start(
        "context_recall",
        sample.clone(),
        models,
        executor,
        listener_bus,
        1,
        cancel,
    )
    .await;

    let Some(reference) = sample.reference.clone() else {
        tracing::warn!("context_recall requires a reference; sample has none");
        return runner.finish(HashMap::new(), &aggregator, None).await;
    };

    let contexts = sample.retrieved_contexts.join("\n");
    let prompt = format!(
        "Break the reference answer below into individual statements. For each statement, \
         judge whether it can be attributed to (supported by) the retrieved context. Return \
         strict JSON: {{\"verdicts\": [{{\"statement\": string, \"verdict\": 0|1, \"reason\": string}}...]}}.\n\n\
         Reference:\n{reference}\n\nContext:\n{contexts}"
    );

    let step = runner.run_llm_step("classify_attribution", &prompt).await;
    let per_model = runner.parse_step_results::<VerdictList>(&step).await;

    let mut scores = HashMap::new();
    for (model_id, verdicts) in &per_model {
        let total = verdicts.verdicts.len().max(1);
        let attributed = verdicts.verdicts.iter().filter(|v| v.verdict == 1).count();
        scores.insert(model_id.clone(), attributed as f64 / total as f64);
    }
    runner.run_compute_step("score").await;

    runner.finish(scores, &aggregator, None).await
}
