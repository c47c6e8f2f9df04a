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

//! Did the agent's final state satisfy the user's goal. Switches between a
//! reference-goal and no-reference prompt depending on whether
//! `Sample.reference` is present, the same `AUTO`-selection shape Context
//! Precision uses for its strategy.

use std::collections::HashMap;
use std::sync::Arc;

use judgeflow_core::{ListenerBus, MetricEvaluationResult, MultiModelExecutor, Sample, ScoreAggregator};
use tokio_util::sync::CancellationToken;

use crate::schemas::BoolVerdict;

pub async fn evaluate(
    sample: Sample,
    models: Vec<String>,
    executor: Arc<MultiModelExecutor>,
    listener_bus: &ListenerBus,
    cancel: CancellationToken,
    aggregator: ScoreAggregator,
) -> MetricEvaluationResult {
    let mut runner = judgeflow_core::MetricPipelineRunner::start(
        "agent_goal_accuracy",
        sample.clone(),
        models,
        executor,
        listener_bus,
        1,
        cancel,
    )
    .await;

    let user_input = sample.user_input.clone().unwrap_or_default();
    let prompt = match &sample.reference {
        Some(reference) => format!(
            "The user's goal was:\n{user_input}\n\nThe declared successful outcome is:\n{reference}\n\n\
             Given the agent's final response below, did the agent achieve that outcome? Return \
             strict JSON: {{\"verdict\": true|false, \"reason\": string}}.\n\nResponse:\n{}",
            sample.response
        ),
        None => format!(
            "The user's goal was:\n{user_input}\n\nGiven the agent's final response below, did \
             the agent satisfy the user's goal? Return strict JSON: \
             {{\"verdict\": true|false, \"reason\": string}}.\n\nResponse:\n{}",
            sample.response
        ),
    };

    let step = runner.run_llm_step("judge_goal_satisfaction", &prompt).await;
    let per_model = runner.parse_step_results::<BoolVerdict>(&step).await;

    let scores: HashMap<String, f64> = per_model
        .into_iter()
        .map(|(model_id, v)| (model_id, if v.verdict { 1.0 } else { 0.0 }))
        .collect();

    runner.finish(scores, &aggregator, None).await
}
