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

//! Per-evaluation and per-step bookkeeping types.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::JudgeError;
use crate::sample::Sample;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Llm,
    Embedding,
    Compute,
}

/// State published to listeners before a step runs.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub metric_name: String,
    pub step_name: String,
    pub step_index: usize,
    pub total_steps: usize,
    pub kind: StepKind,
    pub request: Option<String>,
}

/// One model's outcome for a single step, type-erased to a raw JSON value
/// so heterogeneous step outputs can share one results list.
#[derive(Debug, Clone)]
pub struct StepModelOutcome {
    pub model_id: String,
    pub duration: Duration,
    pub prompt: Option<String>,
    pub outcome: std::result::Result<serde_json::Value, JudgeError>,
}

#[derive(Debug, Clone)]
pub struct StepResults {
    pub step_index: usize,
    pub step_name: String,
    pub kind: StepKind,
    pub results: Vec<StepModelOutcome>,
    /// Populated only for `StepKind::Embedding` steps: one embedding vector
    /// list per surviving model.
    pub embedding_model_results: Vec<(String, Vec<Vec<f32>>)>,
}

impl StepResults {
    pub fn duration(&self) -> Duration {
        self.results.iter().map(|r| r.duration).max().unwrap_or_default()
    }
}

/// Emitted exactly once per excluded model, the step it failed at never
/// revisited for the rest of the evaluation.
#[derive(Debug, Clone)]
pub struct ModelExclusionEvent {
    pub model_id: String,
    pub failed_step_index: usize,
    pub error: JudgeError,
}

#[derive(Debug, Clone)]
pub struct MetricEvaluationContext {
    pub metric_name: String,
    pub sample: Sample,
    pub initial_models: Vec<String>,
    pub total_steps: usize,
}

#[derive(Debug, Clone)]
pub struct MetricEvaluationResult {
    pub metric_name: String,
    pub aggregated_score: Option<f64>,
    pub model_scores: HashMap<String, f64>,
    pub excluded_models: Vec<String>,
    pub exclusions: Vec<ModelExclusionEvent>,
    pub duration: Duration,
    pub step_results: Vec<StepResults>,
    /// Closed tagged union of metric-specific explanation data, used by
    /// external renderers. `None` when a metric has nothing further to
    /// report than its score.
    pub metadata: Option<MetricMetadata>,
    pub cancelled: bool,
}

/// Tagged union instead of open dynamic dispatch: renderers match on the
/// variant rather than downcasting a trait object.
#[derive(Debug, Clone)]
pub enum MetricMetadata {
    Faithfulness { statements: Vec<String>, verdicts: Vec<bool> },
    ContextPrecision { relevance: Vec<bool> },
    ToolCallAccuracy { precision: f64, recall: f64, f1: f64 },
    FactualCorrectness { precision: f64, recall: f64, f1: f64 },
    JudgeVotes(Vec<crate::model_result::JudgeVote>),
}
