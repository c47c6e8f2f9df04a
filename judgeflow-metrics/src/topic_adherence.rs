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

//! Classifies each conversation turn's topic against an allowed-topics list
//! and reports precision/recall/F1 over in-scope vs. out-of-scope turns —
//! Tool-Call Accuracy's F1 shape, applied to turns instead of tool calls.

use std::collections::HashMap;
use std::sync::Arc;

use judgeflow_core::{
    ListenerBus, MetricEvaluationResult, MetricMetadata, MultiModelExecutor, Sample, ScoreAggregator,
};
use tokio_util::sync::CancellationToken;

use crate::common::precision_recall_f1;
use crate::schemas::TurnVerdictList;

pub async fn evaluate(
    sample: Sample,
    models: Vec<String>,
    executor: Arc<MultiModelExecutor>,
    listener_bus: &ListenerBus,
    cancel: CancellationToken,
    aggregator: ScoreAggregator,
    allowed_topics: &[String],
) -> MetricEvaluationResult {
    let mut runner = judgeflow_core::MetricPipelineRunner::start(
        "topic_adherence",
        sample.clone(),
        models,
        executor,
        listener_bus,
        1,
        cancel,
    )
    .await;

    if sample.conversation.is_empty() {
        return runner.finish(HashMap::new(), &aggregator, None).await;
    }

    let topics = allowed_topics.join(", ");
    let turns_block = sample
        .conversation
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{i}. [{}] {}", t.role, t.content))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = format!(
        "Allowed topics: {topics}.\n\nFor each numbered conversation turn below, judge whether \
         it stays within the allowed topics. Return strict JSON: \
         {{\"verdicts\": [{{\"turn_index\": int, \"in_scope\": bool, \"reason\": string}}...]}}.\n\n\
         Turns:\n{turns_block}"
    );

    let step = runner.run_llm_step("classify_turns", &prompt).await;
    let per_model = runner.parse_step_results::<TurnVerdictList>(&step).await;

    let mut scores = HashMap::new();
    let mut last: Option<(usize, usize, usize)> = None;
    for (model_id, verdicts) in &per_model {
        let total = verdicts.verdicts.len();
        let in_scope = verdicts.verdicts.iter().filter(|v| v.in_scope).count();
        // Treat "in scope" turns as correctly-retained and the full turn
        // count as both the actual and reference set size, matching
        // Tool-Call Accuracy's precision/recall framing over matched items.
        let result = precision_recall_f1(in_scope, total, total);
        scores.insert(model_id.clone(), result.f1);
        last = Some((in_scope, total, total));
    }
    runner.run_compute_step("score").await;

    let metadata = last.map(|(matched, actual, reference)| {
        let result = precision_recall_f1(matched, actual, reference);
        MetricMetadata::ToolCallAccuracy { precision: result.precision, recall: result.recall, f1: result.f1 }
    });

    runner.finish(scores, &aggregator, metadata).await
}
