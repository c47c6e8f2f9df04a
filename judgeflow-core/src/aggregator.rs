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

//! Reduces a per-model score map to a single scalar.

use std::collections::HashMap;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone)]
pub enum ScoreAggregator {
    Average,
    Median,
    Min,
    Max,
    Percentile(f64),
    WeightedAverage(HashMap<String, f64>),
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        ScoreAggregator::Average
    }
}

impl ScoreAggregator {
    /// Aggregates a non-empty map of model-id -> score. An empty map is the
    /// runner's "no surviving models" case and is rejected here rather than
    /// silently returning 0.
    pub fn aggregate(&self, scores: &HashMap<String, f64>) -> Result<f64> {
        if scores.is_empty() {
            return Err(CoreError::Internal("cannot aggregate an empty score map".into()));
        }

        match self {
            ScoreAggregator::Average => {
                let sum: f64 = scores.values().sum();
                Ok(sum / scores.len() as f64)
            }
            ScoreAggregator::Median => {
                let mut values: Vec<f64> = scores.values().copied().collect();
                values.sort_by(|a, b| a.partial_cmp(b).unwrap());
                Ok(percentile_of_sorted(&values, 0.5))
            }
            ScoreAggregator::Min => Ok(scores.values().cloned().fold(f64::INFINITY, f64::min)),
            ScoreAggregator::Max => Ok(scores.values().cloned().fold(f64::NEG_INFINITY, f64::max)),
            ScoreAggregator::Percentile(p) => {
                let mut values: Vec<f64> = scores.values().copied().collect();
                values.sort_by(|a, b| a.partial_cmp(b).unwrap());
                Ok(percentile_of_sorted(&values, *p))
            }
            ScoreAggregator::WeightedAverage(weights) => {
                for key in scores.keys() {
                    if !weights.contains_key(key) {
                        return Err(CoreError::Configuration(format!(
                            "weighted average is missing a weight for model {key}"
                        )));
                    }
                }
                let weight_sum: f64 = scores.keys().map(|k| weights[k]).sum();
                if weight_sum == 0.0 {
                    return Err(CoreError::Configuration("weighted average weights sum to zero".into()));
                }
                let weighted_sum: f64 = scores.iter().map(|(k, v)| v * weights[k]).sum();
                Ok(weighted_sum / weight_sum)
            }
        }
    }
}

/// Linear-interpolation percentile over an already-sorted slice, `p` in [0,1].
fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let p = p.clamp(0.0, 1.0);
    let rank = p * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn average_of_single_element_is_idempotent() {
        let s = scores(&[("a", 0.42)]);
        assert_eq!(ScoreAggregator::Average.aggregate(&s).unwrap(), 0.42);
    }

    #[test]
    fn empty_map_is_rejected() {
        assert!(ScoreAggregator::Average.aggregate(&HashMap::new()).is_err());
    }

    #[test]
    fn median_min_max_percentile_on_five_elements() {
        let s = scores(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0), ("e", 5.0)]);
        assert_eq!(ScoreAggregator::Median.aggregate(&s).unwrap(), 3.0);
        assert_eq!(ScoreAggregator::Min.aggregate(&s).unwrap(), 1.0);
        assert_eq!(ScoreAggregator::Max.aggregate(&s).unwrap(), 5.0);
        assert_eq!(ScoreAggregator::Percentile(0.0).aggregate(&s).unwrap(), 1.0);
        assert_eq!(ScoreAggregator::Percentile(1.0).aggregate(&s).unwrap(), 5.0);
    }

    #[test]
    fn weighted_average_rejects_missing_weight() {
        let s = scores(&[("a", 1.0), ("b", 2.0)]);
        let mut weights = HashMap::new();
        weights.insert("a".to_string(), 1.0);
        let err = ScoreAggregator::WeightedAverage(weights).aggregate(&s).unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }

    #[test]
    fn weighted_average_weights_the_mean() {
        let s = scores(&[("a", 0.0), ("b", 1.0)]);
        let mut weights = HashMap::new();
        weights.insert("a".to_string(), 1.0);
        weights.insert("b".to_string(), 3.0);
        let result = ScoreAggregator::WeightedAverage(weights).aggregate(&s).unwrap();
        assert!((result - 0.75).abs() < 1e-9);
    }
}

#[cfg(test)]
mod properties {
    use super::*;
    use proptest::prelude::*;

    fn score_map() -> impl Strategy<Value = HashMap<String, f64>> {
        proptest::collection::vec((0u32..20, 0.0f64..=1.0), 1..8).prop_map(|pairs| {
            pairs.into_iter().map(|(id, score)| (format!("model-{id}"), score)).collect()
        })
    }

    proptest! {
        /// `aggregate({m: s}) = s` for any single-element map, for every
        /// aggregator kind — `aggregate` never distorts a singleton.
        #[test]
        fn single_element_map_is_idempotent(score in 0.0f64..=1.0) {
            let mut s = HashMap::new();
            s.insert("only".to_string(), score);
            for aggregator in [
                ScoreAggregator::Average,
                ScoreAggregator::Median,
                ScoreAggregator::Min,
                ScoreAggregator::Max,
                ScoreAggregator::Percentile(0.3),
            ] {
                let out = aggregator.aggregate(&s).unwrap();
                prop_assert!((out - score).abs() < 1e-9);
            }
        }

        /// Average/median/min/max/percentile never produce a value outside
        /// the range of their inputs.
        #[test]
        fn aggregate_output_stays_within_input_bounds(scores in score_map()) {
            let lo = scores.values().cloned().fold(f64::INFINITY, f64::min);
            let hi = scores.values().cloned().fold(f64::NEG_INFINITY, f64::max);
            for aggregator in [
                ScoreAggregator::Average,
                ScoreAggregator::Median,
                ScoreAggregator::Min,
                ScoreAggregator::Max,
                ScoreAggregator::Percentile(0.5),
            ] {
                let out = aggregator.aggregate(&scores).unwrap();
                prop_assert!(out >= lo - 1e-9 && out <= hi + 1e-9);
            }
        }
    }
}
