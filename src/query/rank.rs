// SPDX-License-Identifier: MIT OR Apache-2.0

//! Top-k selection over similarity scores

use std::cmp::Ordering;

/// A scored matrix row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked {
    pub row: usize,
    pub score: f32,
}

/// Select the `k` highest scores, best first.
///
/// Equal scores are ordered by ascending row, so results are deterministic
/// for a given matrix. NaN scores rank below everything else.
pub fn top_k(scores: &[f32], k: usize) -> Vec<Ranked> {
    let k = k.min(scores.len());
    if k == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<Ranked> = scores
        .iter()
        .enumerate()
        .map(|(row, &score)| Ranked { row, score })
        .collect();

    if k < ranked.len() {
        ranked.select_nth_unstable_by(k - 1, compare);
        ranked.truncate(k);
    }
    ranked.sort_unstable_by(compare);
    ranked
}

fn compare(a: &Ranked, b: &Ranked) -> Ordering {
    rank_key(b.score)
        .total_cmp(&rank_key(a.score))
        .then(a.row.cmp(&b.row))
}

fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else if score == 0.0 {
        // fold -0.0 into 0.0
        0.0
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(ranked: &[Ranked]) -> Vec<usize> {
        ranked.iter().map(|r| r.row).collect()
    }

    #[test]
    fn orders_descending() {
        let ranked = top_k(&[0.1, 0.9, -0.5, 0.4], 4);
        assert_eq!(rows(&ranked), vec![1, 3, 0, 2]);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn truncates_to_k() {
        assert_eq!(rows(&top_k(&[0.1, 0.9, -0.5, 0.4], 2)), vec![1, 3]);
        assert_eq!(top_k(&[0.1, 0.9], 10).len(), 2);
        assert!(top_k(&[0.1, 0.9], 0).is_empty());
        assert!(top_k(&[], 3).is_empty());
    }

    #[test]
    fn ties_break_by_row() {
        let scores = [0.5, 0.7, 0.5, 0.7, 0.5];
        assert_eq!(rows(&top_k(&scores, 5)), vec![1, 3, 0, 2, 4]);
        assert_eq!(rows(&top_k(&scores, 3)), vec![1, 3, 0]);
        assert_eq!(rows(&top_k(&[0.0, -0.0, 0.0], 3)), vec![0, 1, 2]);
    }

    #[test]
    fn nan_ranks_last() {
        assert_eq!(rows(&top_k(&[f32::NAN, -1.0, 0.2], 3)), vec![2, 1, 0]);
    }

    #[test]
    fn partial_selection_matches_full_sort() {
        let scores: Vec<f32> = (0..50).map(|i| ((i * 37) % 17) as f32 / 17.0).collect();
        let full = top_k(&scores, scores.len());
        for k in 0..=scores.len() {
            assert_eq!(top_k(&scores, k), full[..k].to_vec());
        }
    }
}
