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

//! BLEU, ROUGE, chrF and string-distance similarity against a reference
//! response. The scoring itself is pure COMPUTE with no judge calls, but
//! each metric still runs through `MetricPipelineRunner` so it shows up in
//! the same listener timeline as every judge-backed metric, and the
//! identical deterministic score is assigned to every model in the
//! caller's list.

use std::collections::HashMap;
use std::sync::Arc;

use judgeflow_core::{ListenerBus, MetricEvaluationResult, MultiModelExecutor, Sample, ScoreAggregator};
use tokio_util::sync::CancellationToken;

use crate::config::{
    BleuScoreConfig, ChrfScoreConfig, DistanceAlgorithm, OverlapMode, RougeScoreConfig, RougeType,
    StringSimilarityConfig,
};

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(|w| w.to_lowercase()).collect()
}

fn ngrams(tokens: &[String], n: usize) -> HashMap<Vec<String>, usize> {
    let mut counts = HashMap::new();
    if tokens.len() < n || n == 0 {
        return counts;
    }
    for window in tokens.windows(n) {
        *counts.entry(window.to_vec()).or_insert(0) += 1;
    }
    counts
}

pub fn bleu_score(candidate: &str, reference: &str, config: &BleuScoreConfig) -> f64 {
    let cand_tokens = tokenize(candidate);
    let ref_tokens = tokenize(reference);
    if cand_tokens.is_empty() {
        return 0.0;
    }

    let mut log_precision_sum = 0.0;
    let mut used_orders = 0;
    for n in 1..=config.max_ngram {
        let cand_grams = ngrams(&cand_tokens, n);
        let ref_grams = ngrams(&ref_tokens, n);
        if cand_grams.is_empty() {
            continue;
        }
        let mut overlap = 0usize;
        let mut total = 0usize;
        for (gram, count) in &cand_grams {
            total += count;
            overlap += (*count).min(*ref_grams.get(gram).unwrap_or(&0));
        }
        let precision = if total == 0 {
            0.0
        } else if overlap == 0 {
            if config.smoothing { 1.0 / (2.0 * total as f64) } else { 0.0 }
        } else {
            overlap as f64 / total as f64
        };
        if precision > 0.0 {
            log_precision_sum += precision.ln();
            used_orders += 1;
        } else {
            return 0.0;
        }
    }
    if used_orders == 0 {
        return 0.0;
    }
    let geo_mean = (log_precision_sum / used_orders as f64).exp();

    let brevity_penalty = if cand_tokens.len() >= ref_tokens.len() || ref_tokens.is_empty() {
        1.0
    } else {
        (1.0 - ref_tokens.len() as f64 / cand_tokens.len() as f64).exp()
    };

    geo_mean * brevity_penalty
}

fn rouge_n(candidate: &[String], reference: &[String], n: usize, mode: OverlapMode) -> f64 {
    let cand_grams = ngrams(candidate, n);
    let ref_grams = ngrams(reference, n);
    let cand_total: usize = cand_grams.values().sum();
    let ref_total: usize = ref_grams.values().sum();
    let overlap: usize = ref_grams
        .iter()
        .map(|(gram, count)| (*count).min(*cand_grams.get(gram).unwrap_or(&0)))
        .sum();

    score_from_overlap(overlap, cand_total, ref_total, mode)
}

fn lcs_len(a: &[String], b: &[String]) -> usize {
    let mut dp = vec![0usize; b.len() + 1];
    for x in a {
        let mut prev_diag = 0;
        for (j, y) in b.iter().enumerate() {
            let temp = dp[j + 1];
            dp[j + 1] = if x == y { prev_diag + 1 } else { dp[j + 1].max(dp[j]) };
            prev_diag = temp;
        }
    }
    dp[b.len()]
}

fn score_from_overlap(overlap: usize, candidate_total: usize, reference_total: usize, mode: OverlapMode) -> f64 {
    let precision = if candidate_total == 0 { 0.0 } else { overlap as f64 / candidate_total as f64 };
    let recall = if reference_total == 0 { 0.0 } else { overlap as f64 / reference_total as f64 };
    match mode {
        OverlapMode::Precision => precision,
        OverlapMode::Recall => recall,
        OverlapMode::Fmeasure => {
            if precision + recall == 0.0 { 0.0 } else { 2.0 * precision * recall / (precision + recall) }
        }
    }
}

pub fn rouge_score(candidate: &str, reference: &str, config: &RougeScoreConfig) -> f64 {
    let cand_tokens = tokenize(candidate);
    let ref_tokens = tokenize(reference);
    match config.rouge_type {
        RougeType::Rouge1 => rouge_n(&cand_tokens, &ref_tokens, 1, config.mode),
        RougeType::Rouge2 => rouge_n(&cand_tokens, &ref_tokens, 2, config.mode),
        RougeType::RougeL => {
            let lcs = lcs_len(&cand_tokens, &ref_tokens);
            score_from_overlap(lcs, cand_tokens.len(), ref_tokens.len(), config.mode)
        }
    }
}

fn char_ngrams(text: &str, n: usize) -> HashMap<String, usize> {
    let chars: Vec<char> = text.chars().collect();
    let mut counts = HashMap::new();
    if chars.len() < n || n == 0 {
        return counts;
    }
    for window in chars.windows(n) {
        *counts.entry(window.iter().collect()).or_insert(0) += 1;
    }
    counts
}

/// chrF: F-beta over the union of character n-gram precision/recall across
/// every order up to `char_ngram_order`, averaged with the word n-gram
/// orders up to `word_ngram_order` (the chrF++ extension).
pub fn chrf_score(candidate: &str, reference: &str, config: &ChrfScoreConfig) -> f64 {
    let mut precisions = Vec::new();
    let mut recalls = Vec::new();

    for n in 1..=config.char_ngram_order {
        let cand_grams = char_ngrams(candidate, n);
        let ref_grams = char_ngrams(reference, n);
        let cand_total: usize = cand_grams.values().sum();
        let ref_total: usize = ref_grams.values().sum();
        let overlap: usize = cand_grams
            .iter()
            .map(|(g, c)| (*c).min(*ref_grams.get(g).unwrap_or(&0)))
            .sum();
        if cand_total > 0 {
            precisions.push(overlap as f64 / cand_total as f64);
        }
        if ref_total > 0 {
            recalls.push(overlap as f64 / ref_total as f64);
        }
    }

    let cand_tokens = tokenize(candidate);
    let ref_tokens = tokenize(reference);
    for n in 1..=config.word_ngram_order {
        let cand_grams = ngrams(&cand_tokens, n);
        let ref_grams = ngrams(&ref_tokens, n);
        let cand_total: usize = cand_grams.values().sum();
        let ref_total: usize = ref_grams.values().sum();
        let overlap: usize = cand_grams
            .iter()
            .map(|(g, c)| (*c).min(*ref_grams.get(g).unwrap_or(&0)))
            .sum();
        if cand_total > 0 {
            precisions.push(overlap as f64 / cand_total as f64);
        }
        if ref_total > 0 {
            recalls.push(overlap as f64 / ref_total as f64);
        }
    }

    if precisions.is_empty() || recalls.is_empty() {
        return 0.0;
    }
    let precision = precisions.iter().sum::<f64>() / precisions.len() as f64;
    let recall = recalls.iter().sum::<f64>() / recalls.len() as f64;
    if precision == 0.0 && recall == 0.0 {
        return 0.0;
    }
    let beta2 = config.beta * config.beta;
    (1.0 + beta2) * precision * recall / (beta2 * precision + recall)
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut dp: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut prev = dp[0];
        dp[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let temp = dp[j + 1];
            dp[j + 1] = if ca == cb {
                prev
            } else {
                1 + prev.min(dp[j]).min(dp[j + 1])
            };
            prev = temp;
        }
    }
    dp[b.len()]
}

fn jaro_winkler(a: &[char], b: &[char]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let match_distance = (a.len().max(b.len()) / 2).saturating_sub(1);
    let mut a_matches = vec![false; a.len()];
    let mut b_matches = vec![false; b.len()];
    let mut matches = 0usize;

    for i in 0..a.len() {
        let lo = i.saturating_sub(match_distance);
        let hi = (i + match_distance + 1).min(b.len());
        for j in lo..hi {
            if b_matches[j] || a[i] != b[j] {
                continue;
            }
            a_matches[i] = true;
            b_matches[j] = true;
            matches += 1;
            break;
        }
    }
    if matches == 0 {
        return 0.0;
    }

    let mut transpositions = 0usize;
    let mut k = 0;
    for i in 0..a.len() {
        if !a_matches[i] {
            continue;
        }
        while !b_matches[k] {
            k += 1;
        }
        if a[i] != b[k] {
            transpositions += 1;
        }
        k += 1;
    }
    let transpositions = transpositions / 2;

    let m = matches as f64;
    let jaro = (m / a.len() as f64 + m / b.len() as f64 + (m - transpositions as f64) / m) / 3.0;

    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).take(4).count();
    jaro + prefix as f64 * 0.1 * (1.0 - jaro)
}

pub fn string_similarity(candidate: &str, reference: &str, config: &StringSimilarityConfig) -> f64 {
    let (cand, reff) = if config.case_sensitive {
        (candidate.to_string(), reference.to_string())
    } else {
        (candidate.to_lowercase(), reference.to_lowercase())
    };
    let cand_chars: Vec<char> = cand.chars().collect();
    let ref_chars: Vec<char> = reff.chars().collect();

    match config.distance {
        DistanceAlgorithm::Levenshtein => {
            let dist = levenshtein(&cand_chars, &ref_chars);
            let max_len = cand_chars.len().max(ref_chars.len());
            if max_len == 0 { 1.0 } else { 1.0 - dist as f64 / max_len as f64 }
        }
        DistanceAlgorithm::JaroWinkler => jaro_winkler(&cand_chars, &ref_chars),
        DistanceAlgorithm::Hamming => {
            if cand_chars.len() != ref_chars.len() {
                return 0.0;
            }
            if cand_chars.is_empty() {
                return 1.0;
            }
            let mismatches = cand_chars.iter().zip(&ref_chars).filter(|(a, b)| a != b).count();
            1.0 - mismatches as f64 / cand_chars.len() as f64
        }
    }
}

async fn run_against_reference<F>(
    metric_name: &'static str,
    step_name: &'static str,
    sample: Sample,
    models: Vec<String>,
    executor: Arc<MultiModelExecutor>,
    listener_bus: &ListenerBus,
    cancel: CancellationToken,
    aggregator: ScoreAggregator,
    score_fn: F,
) -> MetricEvaluationResult
where
    F: FnOnce(&str, &str) -> f64,
{
    let mut runner =
        judgeflow_core::MetricPipelineRunner::start(metric_name, sample.clone(), models.clone(), executor, listener_bus, 1, cancel)
            .await;

    let Some(reference) = sample.reference.clone() else {
        tracing::warn!("{metric_name} requires Sample.reference");
        return runner.finish(HashMap::new(), &aggregator, None).await;
    };

    let score = score_fn(&sample.response, &reference);
    runner.run_compute_step(step_name).await;

    let scores: HashMap<String, f64> = models.iter().map(|m| (m.clone(), score)).collect();
    runner.finish(scores, &aggregator, None).await
}

pub async fn bleu(
    sample: Sample,
    models: Vec<String>,
    executor: Arc<MultiModelExecutor>,
    listener_bus: &ListenerBus,
    cancel: CancellationToken,
    aggregator: ScoreAggregator,
    config: BleuScoreConfig,
) -> MetricEvaluationResult {
    run_against_reference("bleu_score", "score_bleu", sample, models, executor, listener_bus, cancel, aggregator, |cand, reff| {
        bleu_score(cand, reff, &config)
    })
    .await
}

pub async fn rouge(
    sample: Sample,
    models: Vec<String>,
    executor: Arc<MultiModelExecutor>,
    listener_bus: &ListenerBus,
    cancel: CancellationToken,
    aggregator: ScoreAggregator,
    config: RougeScoreConfig,
) -> MetricEvaluationResult {
    run_against_reference("rouge_score", "score_rouge", sample, models, executor, listener_bus, cancel, aggregator, |cand, reff| {
        rouge_score(cand, reff, &config)
    })
    .await
}

pub async fn chrf(
    sample: Sample,
    models: Vec<String>,
    executor: Arc<MultiModelExecutor>,
    listener_bus: &ListenerBus,
    cancel: CancellationToken,
    aggregator: ScoreAggregator,
    config: ChrfScoreConfig,
) -> MetricEvaluationResult {
    run_against_reference("chrf_score", "score_chrf", sample, models, executor, listener_bus, cancel, aggregator, |cand, reff| {
        chrf_score(cand, reff, &config)
    })
    .await
}

pub async fn string_distance(
    sample: Sample,
    models: Vec<String>,
    executor: Arc<MultiModelExecutor>,
    listener_bus: &ListenerBus,
    cancel: CancellationToken,
    aggregator: ScoreAggregator,
    config: StringSimilarityConfig,
) -> MetricEvaluationResult {
    run_against_reference(
        "string_similarity",
        "score_string_similarity",
        sample,
        models,
        executor,
        listener_bus,
        cancel,
        aggregator,
        |cand, reff| string_similarity(cand, reff, &config),
    )
    .await
}
