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

//! Fraction of a response's statements that are supported by its retrieved
//! contexts. Three steps: extract statements, verify each against context,
//! reduce to a ratio.

use std::collections::HashMap;
use std::sync::Arc;

use judgeflow_core::{
    ListenerBus, MetricEvaluationResult, MetricMetadata, MultiModelExecutor, Sample, ScoreAggregator,
};
use tokio_util::sync::CancellationToken;

use crate::config::FaithfulnessConfig;
use crate::extraction::{designated_model, extract};
use crate::schemas::{StatementExtraction, VerdictList};

pub async fn evaluate(
    sample: Sample,
    models: Vec<String>,
    executor: Arc<MultiModelExecutor>,
    listener_bus: &ListenerBus,
    cancel: CancellationToken,
    aggregator: ScoreAggregator,
    _config: FaithfulnessConfig,
) -> MetricEvaluationResult {
    let mut runner = judgeflow_core::MetricPipelineRunner::start(
        "faithfulness",
        sample.clone(),
        models.clone(),
        executor,
        listener_bus,
        3,
        cancel,
    )
    .await;

    let Some(extractor) = designated_model(&models).map(|m| m.to_string()) else {
        return runner.finish(HashMap::new(), &aggregator, None).await;
    };

    let extraction_prompt = format!(
        "Extract every distinct factual statement made in the response below. \
         Return strict JSON: {{\"statements\": [string...]}}.\n\nResponse:\n{}",
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

    let contexts = sample.retrieved_contexts.join("\n");
    let statements_block = extraction
        .statements
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n");
    let verdict_prompt = format!(
        "Given the retrieved context, classify each numbered statement as supported (1) or \
         unsupported (0) by the context. Return strict JSON: \
         {{\"verdicts\": [{{\"statement\": string, \"verdict\": 0|1, \"reason\": string}}...]}}.\n\n\
         Context:\n{contexts}\n\nStatements:\n{statements_block}"
    );
    let step = runner.run_llm_step("verify_statements", &verdict_prompt).await;
    let per_model = runner.parse_step_results::<VerdictList>(&step).await;

    let mut scores = HashMap::new();
    let mut last_verdicts: Option<Vec<bool>> = None;
    for (model_id, verdicts) in &per_model {
        let total = verdicts.verdicts.len().max(1);
        let supported = verdicts.verdicts.iter().filter(|v| v.verdict == 1).count();
        scores.insert(model_id.clone(), supported as f64 / total as f64);
        last_verdicts = Some(verdicts.verdicts.iter().map(|v| v.verdict == 1).collect());
    }
    runner.run_compute_step("score").await;

    let metadata = last_verdicts.map(|verdicts| MetricMetadata::Faithfulness {
        statements: extraction.statements,
        verdicts,
    });

    runner.finish(scores, &aggregator, metadata).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_prompt_includes_response_text() {
        let sample = Sample::new("Paris is the capital of France.");
        let prompt = format!(
            "Extract every distinct factual statement made in the response below. \
             Return strict JSON: {{\"statements\": [string...]}}.\n\nResponse:\n{}",
            sample.response
        );
        assert!(prompt.contains("Paris is the capital of France."));
    }
}
