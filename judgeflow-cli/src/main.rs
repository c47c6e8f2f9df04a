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

//! Command-line front end: loads a provider config and a sample, runs one
//! metric against every configured chat model, and prints the result.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use judgeflow_core::{
    AnthropicJudge, ExecutorConfig, ListenerBus, ModelRegistry, MultiModelExecutor, OpenAiCompatibleJudge,
    ProvidersConfig, Sample, ScoreAggregator,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "judgeflow", version, about = "Multi-model LLM evaluation engine")]
struct Cli {
    /// Path to a TOML providers configuration file.
    #[arg(long, global = true)]
    providers: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single metric against a sample file and print the result as JSON.
    Run {
        /// Metric name: faithfulness, context_precision, context_recall,
        /// response_relevancy, semantic_similarity, tool_call_accuracy,
        /// bleu_score, rouge_score, chrf_score, string_similarity.
        metric: String,
        /// Path to a JSON-encoded Sample.
        sample: PathBuf,
    },
    /// List the metrics this binary knows how to run.
    ListMetrics,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

fn load_providers(path: Option<&PathBuf>) -> anyhow::Result<ProvidersConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&text)?)
        }
        None => Ok(ProvidersConfig::default()),
    }
}

fn build_registry(providers: &ProvidersConfig) -> anyhow::Result<(ModelRegistry, Vec<String>)> {
    let mut builder = ModelRegistry::builder();
    let mut chat_ids = Vec::new();

    for provider in &providers.providers {
        for model in &provider.chat_models {
            let client: Arc<dyn judgeflow_core::ChatJudgeClient> = if provider.base_url.contains("anthropic") {
                Arc::new(AnthropicJudge::new(provider.api_key.clone(), model.clone()))
            } else {
                Arc::new(OpenAiCompatibleJudge::new(
                    provider.api_key.clone(),
                    model.clone(),
                    provider.base_url.clone(),
                ))
            };
            builder = builder.with_chat(model.clone(), client);
            chat_ids.push(model.clone());
        }
        for model in &provider.embedding_models {
            let client = Arc::new(OpenAiCompatibleJudge::new(
                provider.api_key.clone(),
                model.clone(),
                provider.base_url.clone(),
            ));
            builder = builder.with_embedding(model.clone(), client);
        }
    }

    Ok((builder.build(), chat_ids))
}

const METRIC_NAMES: &[&str] = &[
    "faithfulness",
    "context_precision",
    "context_recall",
    "response_relevancy",
    "semantic_similarity",
    "tool_call_accuracy",
    "agent_goal_accuracy",
    "answer_accuracy",
    "response_groundedness",
    "noise_sensitivity",
    "factual_correctness",
    "answer_correctness",
    "bleu_score",
    "rouge_score",
    "chrf_score",
    "string_similarity",
];

// rubrics_score / simple_criteria / aspect_critic and topic_adherence each
// need judge text (a rubric map, free-form criteria, an allowed-topics list)
// that a bare Sample file doesn't carry, so they aren't wired into this
// generic `run <metric> <sample>` dispatch.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::ListMetrics => {
            for name in METRIC_NAMES {
                println!("{name}");
            }
            Ok(())
        }
        Command::Run { metric, sample } => run(&metric, &sample, cli.providers.as_ref()).await,
    }
}

async fn run(metric: &str, sample_path: &PathBuf, providers_path: Option<&PathBuf>) -> anyhow::Result<()> {
    let providers = load_providers(providers_path)?;
    let (registry, chat_ids) = build_registry(&providers)?;
    if chat_ids.is_empty() {
        anyhow::bail!("no chat models configured; pass --providers pointing at a providers.toml");
    }

    let sample_text = std::fs::read_to_string(sample_path)?;
    let sample: Sample = serde_json::from_str(&sample_text)?;

    let mut rate_limits = HashMap::new();
    for provider in &providers.providers {
        if let Some(rl) = &provider.rate_limit {
            rate_limits.insert(provider.name.clone(), rl.clone());
        }
    }

    let executor = Arc::new(MultiModelExecutor::new(
        Arc::new(registry),
        Arc::new(judgeflow_core::RateLimiterRegistry::default()),
        judgeflow_core::ModelProviderMap::default(),
        rate_limits,
        ExecutorConfig::default(),
    ));
    let listener_bus = ListenerBus::new();
    let cancel = CancellationToken::new();
    let aggregator = ScoreAggregator::Average;

    let result = match metric {
        "faithfulness" => {
            judgeflow_metrics::faithfulness::evaluate(
                sample,
                chat_ids,
                executor,
                &listener_bus,
                cancel,
                aggregator,
                Default::default(),
            )
            .await
        }
        "context_recall" => {
            judgeflow_metrics::context_recall::evaluate(sample, chat_ids, executor, &listener_bus, cancel, aggregator)
                .await
        }
        "response_relevancy" => {
            judgeflow_metrics::response_relevancy::evaluate(
                sample,
                chat_ids,
                executor,
                &listener_bus,
                cancel,
                aggregator,
            )
            .await
        }
        "semantic_similarity" => {
            judgeflow_metrics::semantic_similarity::evaluate(
                sample,
                chat_ids,
                executor,
                &listener_bus,
                cancel,
                aggregator,
            )
            .await
        }
        "tool_call_accuracy" => {
            judgeflow_metrics::tool_call_accuracy::evaluate(
                sample,
                chat_ids,
                executor,
                &listener_bus,
                cancel,
                aggregator,
                Default::default(),
            )
            .await
        }
        "agent_goal_accuracy" => {
            judgeflow_metrics::agent_goal_accuracy::evaluate(
                sample,
                chat_ids,
                executor,
                &listener_bus,
                cancel,
                aggregator,
            )
            .await
        }
        "answer_accuracy" => {
            judgeflow_metrics::nvidia_metrics::answer_accuracy(
                sample,
                chat_ids,
                executor,
                &listener_bus,
                cancel,
                aggregator,
            )
            .await
        }
        "response_groundedness" => {
            judgeflow_metrics::nvidia_metrics::response_groundedness(
                sample,
                chat_ids,
                executor,
                &listener_bus,
                cancel,
                aggregator,
            )
            .await
        }
        "context_precision" => {
            judgeflow_metrics::context_precision::evaluate(
                sample,
                chat_ids,
                executor,
                &listener_bus,
                cancel,
                aggregator,
                Default::default(),
            )
            .await
        }
        "noise_sensitivity" => {
            judgeflow_metrics::noise_sensitivity::evaluate(
                sample,
                chat_ids,
                executor,
                &listener_bus,
                cancel,
                aggregator,
            )
            .await
        }
        "factual_correctness" => {
            judgeflow_metrics::factual_correctness::evaluate(
                sample,
                chat_ids,
                executor,
                &listener_bus,
                cancel,
                aggregator,
                Default::default(),
            )
            .await
        }
        "answer_correctness" => {
            judgeflow_metrics::answer_correctness::evaluate(
                sample,
                chat_ids,
                executor,
                &listener_bus,
                cancel,
                aggregator,
                Default::default(),
            )
            .await
        }
        "bleu_score" => {
            judgeflow_metrics::text_overlap::bleu(
                sample,
                chat_ids,
                executor,
                &listener_bus,
                cancel,
                aggregator,
                Default::default(),
            )
            .await
        }
        "rouge_score" => {
            judgeflow_metrics::text_overlap::rouge(
                sample,
                chat_ids,
                executor,
                &listener_bus,
                cancel,
                aggregator,
                Default::default(),
            )
            .await
        }
        "chrf_score" => {
            judgeflow_metrics::text_overlap::chrf(
                sample,
                chat_ids,
                executor,
                &listener_bus,
                cancel,
                aggregator,
                Default::default(),
            )
            .await
        }
        "string_similarity" => {
            judgeflow_metrics::text_overlap::string_distance(
                sample,
                chat_ids,
                executor,
                &listener_bus,
                cancel,
                aggregator,
                Default::default(),
            )
            .await
        }
        other => anyhow::bail!("unknown metric: {other}"),
    };

    println!(
        "{}",
        serde_json::json!({
            "metric": result.metric_name,
            "aggregatedScore": result.aggregated_score,
            "modelScores": result.model_scores,
            "excludedModels": result.excluded_models,
            "cancelled": result.cancelled,
            "durationMs": result.duration.as_millis(),
        })
    );

    Ok(())
}
