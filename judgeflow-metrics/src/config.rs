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

//! Per-metric option bundles. Plain structs with explicit `Default` impls —
//! the builder pattern the teacher uses for its config types is a language
//! convenience, not a semantic requirement, so it isn't reproduced here.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct FaithfulnessConfig {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextPrecisionStrategy {
    ReferenceBased,
    ResponseBased,
    Auto,
}

#[derive(Debug, Clone)]
pub struct ContextPrecisionConfig {
    pub strategy: ContextPrecisionStrategy,
}

impl Default for ContextPrecisionConfig {
    fn default() -> Self {
        Self { strategy: ContextPrecisionStrategy::Auto }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallAccuracyMode {
    Strict,
    Flexible,
}

#[derive(Debug, Clone)]
pub struct ToolCallAccuracyConfig {
    pub mode: ToolCallAccuracyMode,
    pub argument_match_threshold: f64,
}

impl Default for ToolCallAccuracyConfig {
    fn default() -> Self {
        Self { mode: ToolCallAccuracyMode::Strict, argument_match_threshold: 0.5 }
    }
}

#[derive(Debug, Clone)]
pub struct AspectCriticConfig {
    pub definition: String,
    /// Self-consistency vote count, 1..5. Higher values issue more
    /// independent judge calls per model before majority-vote collapse.
    pub strictness: u8,
    pub model: Option<String>,
}

impl Default for AspectCriticConfig {
    fn default() -> Self {
        Self { definition: String::new(), strictness: 1, model: None }
    }
}

#[derive(Debug, Clone)]
pub struct RubricsConfig {
    /// Keys like "score3_description" mapping a scale point to its rubric
    /// text, matching the upstream RAGAS rubric dictionary shape.
    pub rubrics: HashMap<String, String>,
    pub scale_min: f64,
    pub scale_max: f64,
}

impl RubricsConfig {
    pub fn new(rubrics: HashMap<String, String>) -> Self {
        Self { rubrics, scale_min: 1.0, scale_max: 5.0 }
    }
}

impl Default for RubricsConfig {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

#[derive(Debug, Clone)]
pub struct SimpleCriteriaConfig {
    pub criteria: String,
    pub scale_min: f64,
    pub scale_max: f64,
}

impl Default for SimpleCriteriaConfig {
    fn default() -> Self {
        Self { criteria: String::new(), scale_min: 1.0, scale_max: 5.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapMode {
    Precision,
    Recall,
    Fmeasure,
}

#[derive(Debug, Clone)]
pub struct BleuScoreConfig {
    pub max_ngram: usize,
    pub smoothing: bool,
}

impl Default for BleuScoreConfig {
    fn default() -> Self {
        Self { max_ngram: 4, smoothing: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RougeType {
    Rouge1,
    Rouge2,
    RougeL,
}

#[derive(Debug, Clone)]
pub struct RougeScoreConfig {
    pub rouge_type: RougeType,
    pub mode: OverlapMode,
}

impl Default for RougeScoreConfig {
    fn default() -> Self {
        Self { rouge_type: RougeType::RougeL, mode: OverlapMode::Fmeasure }
    }
}

#[derive(Debug, Clone)]
pub struct ChrfScoreConfig {
    pub char_ngram_order: usize,
    pub word_ngram_order: usize,
    pub beta: f64,
}

impl Default for ChrfScoreConfig {
    fn default() -> Self {
        Self { char_ngram_order: 6, word_ngram_order: 2, beta: 2.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceAlgorithm {
    Levenshtein,
    JaroWinkler,
    Hamming,
}

#[derive(Debug, Clone)]
pub struct StringSimilarityConfig {
    pub distance: DistanceAlgorithm,
    pub case_sensitive: bool,
}

impl Default for StringSimilarityConfig {
    fn default() -> Self {
        Self { distance: DistanceAlgorithm::Levenshtein, case_sensitive: false }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AnswerCorrectnessConfig {
    pub weight_factual: f64,
    pub weight_semantic: f64,
}

impl Default for AnswerCorrectnessConfig {
    fn default() -> Self {
        // Matches the ratio documented in the upstream RAGAS answer
        // correctness metric.
        Self { weight_factual: 0.75, weight_semantic: 0.25 }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FactualCorrectnessConfig {
    pub mode: OverlapMode,
}

impl Default for FactualCorrectnessConfig {
    fn default() -> Self {
        Self { mode: OverlapMode::Fmeasure }
    }
}
