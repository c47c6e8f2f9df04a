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

//! Pure COMPUTE, no judge calls: matches actual tool calls against reference
//! tool calls and reports the F1 of the matched pairs. Still runs through
//! `MetricPipelineRunner` so it participates in the same listener timeline
//! as every other metric; the identical deterministic score is assigned to
//! every model in the caller's list since no judge variance is possible.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use judgeflow_core::{
    ListenerBus, MetricEvaluationResult, MetricMetadata, MultiModelExecutor, Sample, ScoreAggregator, ToolCall,
};
use tokio_util::sync::CancellationToken;

use crate::common::precision_recall_f1;
use crate::config::{ToolCallAccuracyConfig, ToolCallAccuracyMode};

fn matches(actual: &ToolCall, reference: &ToolCall, config: &ToolCallAccuracyConfig) -> bool {
    if actual.name != reference.name {
        return false;
    }
    match config.mode {
        ToolCallAccuracyMode::Strict => actual.arguments == reference.arguments,
        ToolCallAccuracyMode::Flexible => {
            if reference.arguments.is_empty() {
                return true;
            }
            let ref_keys: HashSet<&String> = reference.arguments.keys().collect();
            let shared = ref_keys
                .iter()
                .filter(|k| actual.arguments.get(**k) == reference.arguments.get(**k))
                .count();
            shared as f64 / reference.arguments.len() as f64 >= config.argument_match_threshold
        }
    }
}

/// Greedy bipartite matching: each reference call is matched against the
/// first unclaimed actual call that satisfies `matches`.
fn matched_count(actual: &[ToolCall], reference: &[ToolCall], config: &ToolCallAccuracyConfig) -> usize {
    let mut claimed = vec![false; actual.len()];
    let mut matched = 0;
    for r in reference {
        if let Some(i) = (0..actual.len()).find(|&i| !claimed[i] && matches(&actual[i], r, config)) {
            claimed[i] = true;
            matched += 1;
        }
    }
    matched
}

pub async fn evaluate(
    sample: Sample,
    models: Vec<String>,
    executor: Arc<MultiModelExecutor>,
    listener_bus: &ListenerBus,
    cancel: CancellationToken,
    aggregator: ScoreAggregator,
    config: ToolCallAccuracyConfig,
) -> MetricEvaluationResult {
    let mut runner = judgeflow_core::MetricPipelineRunner::start(
        "tool_call_accuracy",
        sample.clone(),
        models.clone(),
        executor,
        listener_bus,
        1,
        cancel,
    )
    .await;

    let actual = sample.actual_tool_calls.clone().unwrap_or_default();
    let reference = sample.reference_tool_calls.clone().unwrap_or_default();
    let matched = matched_count(&actual, &reference, &config);
    let result = precision_recall_f1(matched, actual.len(), reference.len());

    runner.run_compute_step("match_tool_calls").await;

    let scores: HashMap<String, f64> = models.iter().map(|m| (m.clone(), result.f1)).collect();
    let metadata = MetricMetadata::ToolCallAccuracy {
        precision: result.precision,
        recall: result.recall,
        f1: result.f1,
    };

    runner.finish(scores, &aggregator, Some(metadata)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: &[(&str, serde_json::Value)]) -> ToolCall {
        ToolCall::new(name).with_arguments(args.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    #[test]
    fn strict_partial_match_matches_worked_example() {
        let config = ToolCallAccuracyConfig { mode: ToolCallAccuracyMode::Strict, argument_match_threshold: 0.5 };
        let actual = vec![
            call("search", &[("a", json!(1))]),
            call("weather", &[("c", json!("NY"))]),
            call("book", &[("b", json!(2))]),
        ];
        let reference = vec![call("search", &[("a", json!(1))]), call("book", &[("b", json!(2))])];
        let matched = matched_count(&actual, &reference, &config);
        let result = precision_recall_f1(matched, actual.len(), reference.len());
        assert_eq!(matched, 2);
        assert!((result.precision - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(result.recall, 1.0);
        assert!((result.f1 - 0.8).abs() < 1e-9);
    }

    #[test]
    fn flexible_threshold_matches_worked_example() {
        let config = ToolCallAccuracyConfig { mode: ToolCallAccuracyMode::Flexible, argument_match_threshold: 0.5 };
        let actual = vec![call("hotels", &[("city", json!("M")), ("in", json!("d1"))])];
        let reference = vec![call("hotels", &[("city", json!("M")), ("in", json!("d1")), ("out", json!("d2"))])];
        let matched = matched_count(&actual, &reference, &config);
        let result = precision_recall_f1(matched, actual.len(), reference.len());
        assert_eq!(matched, 1);
        assert_eq!(result.f1, 1.0);
    }
}
