//! Clustering traits.

use ndarray::Array2;

use crate::error::Result;

/// Trait for clustering algorithms over an N × C sample matrix.
pub trait Clustering {
    /// Fit the model to `data` and return one cluster label per row.
    fn fit_predict(&self, data: &Array2<f64>) -> Result<Vec<usize>>;

    /// Number of clusters the algorithm is configured to produce.
    fn n_clusters(&self) -> usize;
}

/// Trait for soft clustering algorithms that return posterior probabilities.
pub trait SoftClustering: Clustering {
    /// Fit and return soft assignments: entry `[i, k]` is the probability
    /// that row `i` belongs to cluster `k`. Rows sum to 1.
    fn fit_predict_proba(&self, data: &Array2<f64>) -> Result<Array2<f64>>;
}
