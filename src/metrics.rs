//! Clustering evaluation metrics.
//!
//! Measures for assessing a classification against ground-truth labels, used
//! by the acceptance tests and the demos (synthetic cohorts come with known
//! regime labels; real Argo cohorts sometimes carry expert annotations).
//!
//! | Metric | Range | Best | Notes |
//! |--------|-------|------|-------|
//! | [`ari`] | [-1, 1] | 1 | Adjusted for chance |
//! | [`nmi`] | [0, 1] | 1 | Information-theoretic |
//! | [`purity`] | [0, 1] | 1 | Simple; biased toward many clusters |
//!
//! Density-based output carries noise labels; [`strip_noise`] drops noise
//! samples so the clustered remainder can be scored.
//!
//! # References
//!
//! - Hubert & Arabie (1985). "Comparing partitions" (ARI)
//! - Strehl & Ghosh (2002). "Cluster ensembles" (NMI)

use std::collections::HashMap;

/// Contingency counts between two labelings over the same samples.
struct Contingency {
    cells: HashMap<(usize, usize), f64>,
    row_sums: HashMap<usize, f64>,
    col_sums: HashMap<usize, f64>,
    n: f64,
}

impl Contingency {
    fn build(pred: &[usize], truth: &[usize]) -> Self {
        let mut cells: HashMap<(usize, usize), f64> = HashMap::new();
        let mut row_sums: HashMap<usize, f64> = HashMap::new();
        let mut col_sums: HashMap<usize, f64> = HashMap::new();
        for (&p, &t) in pred.iter().zip(truth.iter()) {
            *cells.entry((p, t)).or_default() += 1.0;
            *row_sums.entry(p).or_default() += 1.0;
            *col_sums.entry(t).or_default() += 1.0;
        }
        Self {
            cells,
            row_sums,
            col_sums,
            n: pred.len() as f64,
        }
    }
}

fn comb2(x: f64) -> f64 {
    x * (x - 1.0) / 2.0
}

/// Adjusted Rand Index between a predicted and a ground-truth labeling.
///
/// Chance-corrected pair-counting agreement: 1 for identical partitions,
/// ~0 for random assignment. Empty or mismatched inputs score 0.
pub fn ari(pred: &[usize], truth: &[usize]) -> f64 {
    if pred.is_empty() || pred.len() != truth.len() {
        return 0.0;
    }
    let c = Contingency::build(pred, truth);

    let sum_cells: f64 = c.cells.values().map(|&v| comb2(v)).sum();
    let sum_rows: f64 = c.row_sums.values().map(|&v| comb2(v)).sum();
    let sum_cols: f64 = c.col_sums.values().map(|&v| comb2(v)).sum();
    let pairs = comb2(c.n);

    if pairs == 0.0 {
        return 1.0;
    }
    let expected = sum_rows * sum_cols / pairs;
    let max_index = 0.5 * (sum_rows + sum_cols);
    if (max_index - expected).abs() < f64::EPSILON {
        return 1.0;
    }
    (sum_cells - expected) / (max_index - expected)
}

/// Normalized Mutual Information between two labelings.
///
/// `2 I(U; V) / (H(U) + H(V))`, in [0, 1]; 1 means the partitions carry the
/// same information.
pub fn nmi(pred: &[usize], truth: &[usize]) -> f64 {
    if pred.is_empty() || pred.len() != truth.len() {
        return 0.0;
    }
    let c = Contingency::build(pred, truth);

    let h_pred = entropy(c.row_sums.values(), c.n);
    let h_truth = entropy(c.col_sums.values(), c.n);
    if h_pred + h_truth == 0.0 {
        return 1.0;
    }

    let mut mi = 0.0;
    for (&(p, t), &count) in &c.cells {
        let p_joint = count / c.n;
        let p_pred = c.row_sums[&p] / c.n;
        let p_truth = c.col_sums[&t] / c.n;
        if p_joint > 0.0 {
            mi += p_joint * (p_joint / (p_pred * p_truth)).ln();
        }
    }

    (2.0 * mi / (h_pred + h_truth)).clamp(0.0, 1.0)
}

fn entropy<'a>(counts: impl Iterator<Item = &'a f64>, n: f64) -> f64 {
    counts
        .map(|&c| {
            let p = c / n;
            if p > 0.0 {
                -p * p.ln()
            } else {
                0.0
            }
        })
        .sum()
}

/// Purity: fraction of samples lying in the majority ground-truth class of
/// their predicted cluster.
pub fn purity(pred: &[usize], truth: &[usize]) -> f64 {
    if pred.is_empty() || pred.len() != truth.len() {
        return 0.0;
    }
    let c = Contingency::build(pred, truth);

    let mut majority: HashMap<usize, f64> = HashMap::new();
    for (&(p, _), &count) in &c.cells {
        let best = majority.entry(p).or_default();
        if count > *best {
            *best = count;
        }
    }
    majority.values().sum::<f64>() / c.n
}

/// Drop noise samples from a density-clustering labeling, returning the
/// clustered labels with their matching ground-truth entries.
pub fn strip_noise(pred: &[Option<usize>], truth: &[usize]) -> (Vec<usize>, Vec<usize>) {
    pred.iter()
        .zip(truth.iter())
        .filter_map(|(p, &t)| p.map(|p| (p, t)))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn perfect_agreement_scores_one() {
        let labels = [0, 0, 1, 1, 2, 2];
        assert_abs_diff_eq!(ari(&labels, &labels), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(nmi(&labels, &labels), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(purity(&labels, &labels), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn permuted_labels_still_score_one() {
        let pred = [1, 1, 0, 0];
        let truth = [0, 0, 1, 1];
        assert_abs_diff_eq!(ari(&pred, &truth), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(purity(&pred, &truth), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn partial_agreement_is_between_zero_and_one() {
        let pred = [0, 0, 1, 1, 2, 2];
        let truth = [0, 0, 0, 1, 1, 1];
        let score = ari(&pred, &truth);
        assert!(score > 0.0 && score < 1.0);
        let score = nmi(&pred, &truth);
        assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn single_cluster_against_itself_is_one() {
        let labels = [0, 0, 0];
        assert_abs_diff_eq!(nmi(&labels, &labels), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ari(&labels, &labels), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn mismatched_lengths_score_zero() {
        assert_eq!(ari(&[0, 1], &[0]), 0.0);
        assert_eq!(nmi(&[], &[]), 0.0);
        assert_eq!(purity(&[0], &[0, 1]), 0.0);
    }

    #[test]
    fn strip_noise_drops_unlabeled() {
        let pred = [Some(0), None, Some(1), None];
        let truth = [5, 6, 7, 8];
        let (p, t) = strip_noise(&pred, &truth);
        assert_eq!(p, vec![0, 1]);
        assert_eq!(t, vec![5, 7]);
    }
}
