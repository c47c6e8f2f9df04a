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

//! Precision/recall/F1 over response claims NLI-classified against
//! reference claims. Shares its claim-extraction shape with Faithfulness
//! but extracts from both response and reference, then classifies with
//! the three-way NLI schema instead of a binary one.

use std::collections::HashMap;
use std::sync::Arc;

use judgeflow_core::{
    ListenerBus, MetricEvaluationResult, MetricMetadata, MultiModelExecutor, Sample, ScoreAggregator,
};
use tokio_util::sync::CancellationToken;

use crate::config::{FactualCorrectnessConfig, OverlapMode};
use crate::extraction::{designated_model, extract};
use crate::schemas::{NliVerdict, NliVerdictList, StatementExtraction};

fn extraction_prompt(label: &str, text: &str) -> String {
    format!(
        "Extract every distinct factual claim made in the {label} below. Return strict JSON: \
         {{\"statements\": [string...]}}.\n\n{text}"
    )
}

pub async fn evaluate(
    sample: Sample,
    models: Vec<String>,
    executor: Arc<MultiModelExecutor>,
    listener_bus: &ListenerBus,
    cancel: CancellationToken,
    aggregator: ScoreAggregator,
    config: FactualCorrectnessConfig,
) -> MetricEvaluationResult {
    let mut runner = judgeflow_core::MetricPipelineRunner::start(
        "factual_correctness",
        sample.clone(),
        models.clone(),
        executor,
        listener_bus,
        4,
        cancel,
    )
    .await;

    let Some(reference) = sample.reference.clone() else {
        tracing::warn!("factual_correctness requires Sample.reference");
        return runner.finish(HashMap::new(), &aggregator, None).await;
    };

    let Some(extractor) = designated_model(&models).map(|m| m.to_string()) else {
        return runner.finish(HashMap::new(), &aggregator, None).await;
    };

    let Some(response_claims): Option<StatementExtraction> = extract(
        &mut runner,
        "extract_response_claims",
        &extractor,
        &extraction_prompt("response", &sample.response),
    )
    .await
    else {
        return runner.finish(HashMap::new(), &aggregator, None).await;
    };
    let Some(reference_claims): Option<StatementExtraction> = extract(
        &mut runner,
        "extract_reference_claims",
        &extractor,
        &extraction_prompt("reference", &reference),
    )
    .await
    else {
        return runner.finish(HashMap::new(), &aggregator, None).await;
    };

    if response_claims.statements.is_empty() {
        return runner.finish(HashMap::new(), &aggregator, None).await;
    }

    let response_block = response_claims
        .statements
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n");
    let reference_block = reference_claims.statements.join("\n");
    let prompt = format!(
        "Given the reference claims below, classify each numbered response claim as \
         SUPPORTED, REFUTED, or NOT_INFERRABLE. Return strict JSON: \
         {{\"verdicts\": [{{\"claim\": string, \"verdict\": \"SUPPORTED\"|\"REFUTED\"|\"NOT_INFERRABLE\", \"reason\": string}}...]}}.\n\n\
         Reference claims:\n{reference_block}\n\nResponse claims:\n{response_block}"
    );

    let step = runner.run_llm_step("nli_classify", &prompt).await;
    let per_model = runner.parse_step_results::<NliVerdictList>(&step).await;

    let mode = config.mode;
    let reference_count = reference_claims.statements.len();
    let mut scores = HashMap::new();
    let mut last = None;
    for (model_id, verdicts) in &per_model {
        let actual_count = verdicts.verdicts.len();
        let supported = verdicts.verdicts.iter().filter(|v| v.verdict == NliVerdict::Supported).count();
        let precision = if actual_count == 0 { 0.0 } else { supported as f64 / actual_count as f64 };
        let recall = if reference_count == 0 { 0.0 } else { supported as f64 / reference_count as f64 };
        let f1 = if precision + recall == 0.0 { 0.0 } else { 2.0 * precision * recall / (precision + recall) };
        let score = match mode {
            OverlapMode::Precision => precision,
            OverlapMode::Recall => recall,
            OverlapMode::Fmeasure => f1,
        };
        scores.insert(model_id.clone(), score);
        last = Some((precision, recall, f1));
    }
    runner.run_compute_step("score").await;

    let metadata = last.map(|(precision, recall, f1)| MetricMetadata::FactualCorrectness { precision, recall, f1 });

    runner.finish(scores, &aggregator, metadata).await
}
