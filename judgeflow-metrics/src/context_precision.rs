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

//! Precision@k over retrieved contexts, weighted by rank so relevant
//! contexts near the top count more than ones buried at the end.

use std::collections::HashMap;
use std::sync::Arc;

use judgeflow_core::{
    ListenerBus, MetricEvaluationResult, MetricMetadata, MultiModelExecutor, Sample, ScoreAggregator,
};
use tokio_util::sync::CancellationToken;

use crate::config::{ContextPrecisionConfig, ContextPrecisionStrategy};
use crate::schemas::ContextVerdictList;

fn judged_against<'a>(sample: &'a Sample, strategy: ContextPrecisionStrategy) -> &'a str {
    match strategy {
        ContextPrecisionStrategy::ResponseBased => &sample.response,
        ContextPrecisionStrategy::ReferenceBased => sample.reference.as_deref().unwrap_or(&sample.response),
        ContextPrecisionStrategy::Auto => sample.reference.as_deref().unwrap_or(&sample.response),
    }
}

pub async fn evaluate(
    sample: Sample,
    models: Vec<String>,
    executor: Arc<MultiModelExecutor>,
    listener_bus: &ListenerBus,
    cancel: CancellationToken,
    aggregator: ScoreAggregator,
    config: ContextPrecisionConfig,
) -> MetricEvaluationResult {
    let mut runner = judgeflow_core::MetricPipelineRunner::start(
        "context_precision",
        sample.clone(),
        models,
        executor,
        listener_bus,
        1,
        cancel,
    )
    .await;

    let target = judged_against(&sample, config.strategy);
    let contexts_block = sample
        .retrieved_contexts
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i + 1, c))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = format!(
        "For each numbered retrieved context, judge whether it is relevant to the following \
         text. Return strict JSON: \
         {{\"verdicts\": [{{\"context\": string, \"verdict\": 0|1, \"reason\": string}}...]}}, \
         one entry per context in order.\n\nText:\n{target}\n\nContexts:\n{contexts_block}"
    );

    let step = runner.run_llm_step("judge_contexts", &prompt).await;
    let per_model = runner.parse_step_results::<ContextVerdictList>(&step).await;

    let mut scores = HashMap::new();
    let mut last_relevance: Option<Vec<bool>> = None;
    for (model_id, verdicts) in &per_model {
        scores.insert(model_id.clone(), precision_at_k(&verdicts.verdicts));
        last_relevance = Some(verdicts.verdicts.iter().map(|v| v.verdict == 1).collect());
    }
    runner.run_compute_step("score").await;

    let metadata = last_relevance.map(|relevance| MetricMetadata::ContextPrecision { relevance });

    runner.finish(scores, &aggregator, metadata).await
}

fn precision_at_k(verdicts: &[crate::schemas::ContextVerdict]) -> f64 {
    let mut relevance_sum = 0.0;
    let mut weighted_sum = 0.0;
    let mut relevant_so_far = 0usize;

    for (i, v) in verdicts.iter().enumerate() {
        if v.verdict == 1 {
            relevant_so_far += 1;
            let precision_at_i = relevant_so_far as f64 / (i + 1) as f64;
            weighted_sum += precision_at_i;
            relevance_sum += 1.0;
        }
    }

    if relevance_sum == 0.0 {
        0.0
    } else {
        weighted_sum / relevance_sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::ContextVerdict;

    fn verdict(v: u8) -> ContextVerdict {
        ContextVerdict { context: String::new(), verdict: v, reason: String::new() }
    }

    #[test]
    fn irrelevant_first_ordering_matches_worked_example() {
        let verdicts = vec![verdict(0), verdict(1), verdict(1)];
        let score = precision_at_k(&verdicts);
        assert!((score - 0.5833333333333334).abs() < 1e-9);
    }

    #[test]
    fn no_relevant_contexts_scores_zero() {
        let verdicts = vec![verdict(0), verdict(0)];
        assert_eq!(precision_at_k(&verdicts), 0.0);
    }
}
