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

//! Small helpers shared across metric modules: cosine similarity and the
//! precision/recall/F1 triple used by every matching-based metric.

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[derive(Debug, Clone, Copy)]
pub struct PrecisionRecallF1 {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// `matched` pairs out of `actual_count` actual and `reference_count`
/// reference items. Both-empty is a vacuous match (1.0); one-sided-empty
/// is a total miss (0.0).
pub fn precision_recall_f1(matched: usize, actual_count: usize, reference_count: usize) -> PrecisionRecallF1 {
    if actual_count == 0 && reference_count == 0 {
        return PrecisionRecallF1 { precision: 1.0, recall: 1.0, f1: 1.0 };
    }
    if actual_count == 0 || reference_count == 0 {
        return PrecisionRecallF1 { precision: 0.0, recall: 0.0, f1: 0.0 };
    }
    let precision = matched as f64 / actual_count as f64;
    let recall = matched as f64 / reference_count as f64;
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };
    PrecisionRecallF1 { precision, recall, f1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn precision_recall_f1_both_empty_is_vacuous_match() {
        let r = precision_recall_f1(0, 0, 0);
        assert_eq!(r.f1, 1.0);
    }

    #[test]
    fn precision_recall_f1_one_sided_empty_is_zero() {
        let r = precision_recall_f1(0, 2, 0);
        assert_eq!(r.f1, 0.0);
    }

    #[test]
    fn precision_recall_f1_partial_match() {
        // scenario 3 from the catalog's worked examples: matched=2, actual=3, reference=2
        let r = precision_recall_f1(2, 3, 2);
        assert!((r.precision - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(r.recall, 1.0);
        assert!((r.f1 - 0.8).abs() < 1e-9);
    }
}
