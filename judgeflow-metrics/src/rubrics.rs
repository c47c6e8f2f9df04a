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

//! Rubrics Score, Simple Criteria and Aspect Critic: three judge-against-a-
//! caller-supplied-yardstick metrics that differ only in prompt shape and
//! in how the raw judge output is normalized into `[0,1]`.

use std::collections::HashMap;
use std::sync::Arc;

use judgeflow_core::{
    ListenerBus, MetricEvaluationResult, MetricMetadata, MultiModelExecutor, Sample, ScoreAggregator,
};
use tokio_util::sync::CancellationToken;

use crate::config::{AspectCriticConfig, RubricsConfig, SimpleCriteriaConfig};
use crate::schemas::{BoolVerdict, ScoreVerdict};

fn normalize(raw: f64, min: f64, max: f64) -> f64 {
    if max <= min {
        return 0.0;
    }
    ((raw - min) / (max - min)).clamp(0.0, 1.0)
}

pub async fn rubrics_score(
    sample: Sample,
    models: Vec<String>,
    executor: Arc<MultiModelExecutor>,
    listener_bus: &ListenerBus,
    cancel: CancellationToken,
    aggregator: ScoreAggregator,
    config: RubricsConfig,
) -> MetricEvaluationResult {
    let mut runner = judgeflow_core::MetricPipelineRunner::start(
        "rubrics_score",
        sample.clone(),
        models,
        executor,
        listener_bus,
        1,
        cancel,
    )
    .await;

    let mut scale_points: Vec<(&String, &String)> = config.rubrics.iter().collect();
    scale_points.sort_by_key(|(k, _)| k.clone());
    let rubric_block = scale_points
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "Score the response against this rubric on a scale of {}–{}. Rubric:\n{rubric_block}\n\n\
         Response:\n{}\n\nReturn strict JSON: {{\"score\": number, \"reason\": string}}.",
        config.scale_min, config.scale_max, sample.response
    );

    let step = runner.run_llm_step("judge_rubric", &prompt).await;
    let per_model = runner.parse_step_results::<ScoreVerdict>(&step).await;

    let scores: HashMap<String, f64> = per_model
        .into_iter()
        .map(|(model_id, v)| (model_id, normalize(v.score, config.scale_min, config.scale_max)))
        .collect();

    runner.finish(scores, &aggregator, None).await
}

pub async fn simple_criteria(
    sample: Sample,
    models: Vec<String>,
    executor: Arc<MultiModelExecutor>,
    listener_bus: &ListenerBus,
    cancel: CancellationToken,
    aggregator: ScoreAggregator,
    config: SimpleCriteriaConfig,
) -> MetricEvaluationResult {
    let mut runner = judgeflow_core::MetricPipelineRunner::start(
        "simple_criteria",
        sample.clone(),
        models,
        executor,
        listener_bus,
        1,
        cancel,
    )
    .await;

    let prompt = format!(
        "Score the response on a scale of {}–{} against this criteria: {}\n\nResponse:\n{}\n\n\
         Return strict JSON: {{\"score\": number, \"reason\": string}}.",
        config.scale_min, config.scale_max, config.criteria, sample.response
    );

    let step = runner.run_llm_step("judge_criteria", &prompt).await;
    let per_model = runner.parse_step_results::<ScoreVerdict>(&step).await;

    let scores: HashMap<String, f64> = per_model
        .into_iter()
        .map(|(model_id, v)| (model_id, normalize(v.score, config.scale_min, config.scale_max)))
        .collect();

    runner.finish(scores, &aggregator, None).await
}

/// `strictness` (1..5) issues that many independent judge calls per model
/// and collapses them by majority vote, mirroring the self-consistency
/// pattern Answer Accuracy uses across two differently-worded prompts.
pub async fn aspect_critic(
    sample: Sample,
    models: Vec<String>,
    executor: Arc<MultiModelExecutor>,
    listener_bus: &ListenerBus,
    cancel: CancellationToken,
    aggregator: ScoreAggregator,
    config: AspectCriticConfig,
) -> MetricEvaluationResult {
    let votes = config.strictness.clamp(1, 5) as usize;
    let mut runner = judgeflow_core::MetricPipelineRunner::start(
        "aspect_critic",
        sample.clone(),
        models,
        executor,
        listener_bus,
        votes,
        cancel,
    )
    .await;

    let prompt = format!(
        "Aspect: {}\n\nDoes the response satisfy this aspect? Return strict JSON: \
         {{\"verdict\": true|false, \"reason\": string}}.\n\nResponse:\n{}",
        config.definition, sample.response
    );

    let mut tallies: HashMap<String, (usize, usize)> = HashMap::new();
    for i in 0..votes {
        let step = runner.run_llm_step(&format!("judge_aspect_vote_{i}"), &prompt).await;
        let per_model = runner.parse_step_results::<BoolVerdict>(&step).await;
        for (model_id, v) in per_model {
            let entry = tallies.entry(model_id).or_insert((0, 0));
            entry.0 += 1;
            if v.verdict {
                entry.1 += 1;
            }
        }
    }

    let mut scores = HashMap::new();
    let mut judge_votes = Vec::new();
    for (model_id, (total, yes)) in &tallies {
        let passed = *yes * 2 >= *total;
        scores.insert(model_id.clone(), if passed { 1.0 } else { 0.0 });
        judge_votes.push(judgeflow_core::JudgeVote {
            judge_id: model_id.clone(),
            passed,
            score: Some(*yes as f64 / *total as f64),
            rationale: None,
        });
    }

    let metadata = if judge_votes.is_empty() { None } else { Some(MetricMetadata::JudgeVotes(judge_votes)) };

    runner.finish(scores, &aggregator, metadata).await
}
