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

//! Several metrics (Faithfulness, Noise Sensitivity, Factual Correctness,
//! Answer Correctness) open with a statement/claim extraction call that
//! defines the shared ground truth the rest of the pipeline then votes on.
//! That call is issued once, against a single designated model, rather than
//! fanned out with `run_llm_step` across every surviving model — fanning it
//! out would give each model its own statement list, which breaks the
//! "models vote on the same statements" shape the worked examples assume.
//! It still runs as a real step on the runner so a bad extractor response
//! excludes that model through the same sticky-exclusion path as any other
//! step, instead of silently zeroing the whole evaluation.

use judgeflow_core::MetricPipelineRunner;

pub async fn extract<T: for<'de> serde::Deserialize<'de>>(
    runner: &mut MetricPipelineRunner,
    step_name: &str,
    model_id: &str,
    prompt: &str,
) -> Option<T> {
    let step = runner.run_designated_llm_step(step_name, model_id, prompt).await;
    runner.parse_step_results::<T>(&step).await.remove(model_id)
}

/// The model whose output seeds a shared extraction step: the first of the
/// initial survivor list, matching the runner's own "first of the initial
/// set" convention for single-model coordination calls.
pub fn designated_model(models: &[String]) -> Option<&str> {
    models.first().map(|s| s.as_str())
}
