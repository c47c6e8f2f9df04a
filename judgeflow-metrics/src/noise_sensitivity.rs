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

//! How much a response's incorrect statements trace back to noisy
//! (irrelevant) retrieved context rather than relevant context — reuses
//! Faithfulness's statement extraction, then reclassifies each statement
//! against the reference instead of scoring support.

use std::collections::HashMap;
use std::sync::Arc;

use judgeflow_core::{ListenerBus, MetricEvaluationResult, MultiModelExecutor, Sample, ScoreAggregator};
use tokio_util::sync::CancellationToken;

use crate::extraction::{designated_model, extract};
use crate::schemas::{StatementExtraction, VerdictList};

pub async fn evaluate(
    sample: Sample,
    models: Vec<String>,
    executor: Arc<MultiModelExecutor>,
    listener_bus: &ListenerBus,
    cancel: CancellationToken,
    aggregator: ScoreAggregator,
) -> MetricEvaluationResult {
    let mut runner = judgeflow_core::MetricPipelineRunner::start(
        "noise_sensitivity",
        sample.clone(),
        models.clone(),
        executor,
        listener_bus,
        3,
        cancel,
    )
    .await;

    if sample.noisy_contexts.is_empty() {
        tracing::warn!("noise_sensitivity requires Sample.noisy_contexts to be non-empty");
    }

    let Some(extractor) = designated_model(&models).map(|m| m.to_string()) else {
        return runner.finish(HashMap::new(), &aggregator, None).await;
    };

    let extraction_prompt = format!(
        "Extract every distinct factual statement made in the response below. Return strict \
         JSON: {{\"statements\": [string...]}}.\n\nResponse:\n{}",
        sample.response
    );
    let Some(extraction): Option<StatementExtraction> =
        extract(&mut runner, "extract_statements", &extractor, &extraction_prompt).await
    else {
        return runner.finish(HashMap::new(), &aggregator, None).await;
    };

    if extraction.statements.is_empty() {
        return runner.finish(HashMap::new(), &aggregator, None).await;
    }

    let reference = sample.reference.clone().unwrap_or_default();
    let statements_block = extraction
        .statements
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n");
    let noisy_block = sample.noisy_contexts.join("\n");
    let verdict_prompt = format!(
        "Given the reference answer and the noisy (known-irrelevant) context below, classify \
         each numbered statement as incorrect-and-traceable-to-the-noisy-context (1) or \
         otherwise (0). Return strict JSON: \
         {{\"verdicts\": [{{\"statement\": string, \"verdict\": 0|1, \"reason\": string}}...]}}.\n\n\
         Reference:\n{reference}\n\nNoisy context:\n{noisy_block}\n\nStatements:\n{statements_block}"
    );
    let step = runner.run_llm_step("classify_noise_attribution", &verdict_prompt).await;
    let per_model = runner.parse_step_results::<VerdictList>(&step).await;

    let mut scores = HashMap::new();
    let total = extraction.statements.len().max(1);
    for (model_id, verdicts) in &per_model {
        let noisy_incorrect = verdicts.verdicts.iter().filter(|v| v.verdict == 1).count();
        scores.insert(model_id.clone(), noisy_incorrect as f64 / total as f64);
    }
    runner.run_compute_step("score").await;

    runner.finish(scores, &aggregator, None).await
}
