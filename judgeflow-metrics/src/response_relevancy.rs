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

//! How relevant a response is to the user's input, estimated by generating
//! hypothetical questions the response would answer and comparing their
//! embeddings against the embedded user input.

use std::collections::HashMap;
use std::sync::Arc;

use judgeflow_core::{ListenerBus, MetricEvaluationResult, MultiModelExecutor, Sample, ScoreAggregator};
use tokio_util::sync::CancellationToken;

use crate::common::cosine_similarity;
use crate::extraction::{designated_model, extract};
use crate::schemas::RelevancyQuestions;

const NUM_QUESTIONS: usize = 3;

pub async fn evaluate(
    sample: Sample,
    models: Vec<String>,
    executor: Arc<MultiModelExecutor>,
    listener_bus: &ListenerBus,
    cancel: CancellationToken,
    aggregator: ScoreAggregator,
) -> MetricEvaluationResult {
    let mut runner = judgeflow_core::MetricPipelineRunner::start(
        "response_relevancy",
        sample.clone(),
        models.clone(),
        executor.clone(),
        listener_bus,
        2,
        cancel.clone(),
    )
    .await;

    let Some(user_input) = sample.user_input.clone() else {
        tracing::warn!("response_relevancy requires Sample.user_input");
        return runner.finish(HashMap::new(), &aggregator, None).await;
    };

    let generator = match designated_model(&models) {
        Ok(m) => m.to_string(),
        Err(_) => return runner.finish(HashMap::new(), &aggregator, None).await,
    };

    let question_prompt = format!(
        "Generate {NUM_QUESTIONS} questions that the response below would be a good answer to. \
         Also judge, per question, whether the response is noncommittal (evasive/vague) rather \
         than a real answer. Return strict JSON: \
         {{\"questions\": [string...], \"noncommittal\": [bool...]}}.\n\nResponse:\n{}",
        sample.response
    );
    let generated: RelevancyQuestions = match extract(&executor, &generator, &question_prompt, &cancel).await {
        Ok(g) => g,
        Err(_) => return runner.finish(HashMap::new(), &aggregator, None).await,
    };
    runner.run_compute_step("generate_questions").await;

    if generated.questions.is_empty() {
        return runner.finish(HashMap::new(), &aggregator, None).await;
    }

    let mut texts = vec![user_input];
    texts.extend(generated.questions.iter().cloned());
    let step = runner.run_embedding_step("embed_questions", &texts).await;

    let mut scores = HashMap::new();
    for (model_id, vectors) in &step.embedding_model_results {
        if vectors.len() < 2 {
            continue;
        }
        let input_vec = &vectors[0];
        let similarities: Vec<f64> = vectors[1..].iter().map(|q| cosine_similarity(input_vec, q)).collect();
        let mean = similarities.iter().sum::<f64>() / similarities.len() as f64;
        scores.insert(model_id.clone(), mean);
    }

    runner.finish(scores, &aggregator, None).await
}
