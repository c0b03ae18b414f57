//! K-means clustering.
//!
//! Partitions reduced profiles into k clusters by minimizing within-cluster
//! sum of squares (Lloyd's algorithm with k-means++ initialization). Serves
//! two roles in the pipeline: a hard-clustering method in its own right, and
//! the seeding step for the Gaussian mixture fit.
//!
//! # Lloyd's Algorithm
//!
//! 1. Initialize k centroids via k-means++
//! 2. **Assign**: each sample to its nearest centroid
//! 3. **Update**: each centroid to the mean of its samples
//! 4. Repeat until the centroid shift falls below tolerance
//!
//! WCSS decreases monotonically and is bounded below by zero, so the loop
//! always terminates. The solution is a local minimum only; pass an explicit
//! seed to make runs reproducible.

use ndarray::{Array2, ArrayView1};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use super::traits::Clustering;
use crate::error::{Error, Result};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// K-means clustering configuration.
#[derive(Debug, Clone)]
pub struct Kmeans {
    /// Number of clusters.
    k: usize,
    /// Maximum iterations.
    max_iter: usize,
    /// Convergence tolerance on the squared centroid shift.
    tol: f64,
    /// Random seed.
    seed: Option<u64>,
}

/// Fitted K-means state: centroids and training assignments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KmeansModel {
    centroids: Array2<f64>,
    labels: Vec<usize>,
    inertia: f64,
    n_iter: usize,
}

impl Kmeans {
    /// Create a new K-means clusterer with `k` clusters.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iter: 100,
            tol: 1e-4,
            seed: None,
        }
    }

    /// Set maximum iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set convergence tolerance.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Fit centroids to `data` (N × C) and return the fitted model.
    pub fn fit(&self, data: &Array2<f64>) -> Result<KmeansModel> {
        let n = data.nrows();
        if n == 0 || data.ncols() == 0 {
            return Err(Error::EmptyInput);
        }
        if self.k == 0 {
            return Err(Error::InvalidParameter {
                name: "k",
                message: "must be > 0",
            });
        }
        if self.k > n {
            return Err(Error::InvalidClusterCount {
                requested: self.k,
                n_items: n,
            });
        }
        if self.max_iter == 0 {
            return Err(Error::InvalidParameter {
                name: "max_iter",
                message: "must be at least 1",
            });
        }

        let d = data.ncols();
        let mut rng: Box<dyn RngCore> = match self.seed {
            Some(s) => Box::new(StdRng::seed_from_u64(s)),
            None => Box::new(rand::rng()),
        };

        let mut centroids = self.init_centroids(data, &mut rng);
        let mut labels = vec![0usize; n];
        let mut n_iter = 0;

        for iter in 0..self.max_iter {
            n_iter = iter + 1;

            assign_labels(data, &centroids, &mut labels);

            // Update step
            let mut new_centroids = Array2::zeros((self.k, d));
            let mut counts = vec![0usize; self.k];

            for i in 0..n {
                let k = labels[i];
                for j in 0..d {
                    new_centroids[[k, j]] += data[[i, j]];
                }
                counts[k] += 1;
            }

            for k in 0..self.k {
                if counts[k] > 0 {
                    for j in 0..d {
                        new_centroids[[k, j]] /= counts[k] as f64;
                    }
                } else {
                    // Empty cluster: reinitialize from a random sample
                    let idx = rng.random_range(0..n);
                    new_centroids.row_mut(k).assign(&data.row(idx));
                }
            }

            let shift: f64 = centroids
                .iter()
                .zip(new_centroids.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();

            centroids = new_centroids;

            if shift < self.tol {
                break;
            }
        }

        assign_labels(data, &centroids, &mut labels);

        let inertia = labels
            .iter()
            .enumerate()
            .map(|(i, &k)| squared_distance(&data.row(i), &centroids.row(k)))
            .sum();

        log::debug!(
            "kmeans: k={} converged after {} iterations, inertia={:.4}",
            self.k,
            n_iter,
            inertia
        );

        Ok(KmeansModel {
            centroids,
            labels,
            inertia,
            n_iter,
        })
    }

    /// Initialize centroids using the k-means++ selection.
    fn init_centroids(&self, data: &Array2<f64>, rng: &mut impl Rng) -> Array2<f64> {
        let n = data.nrows();
        let d = data.ncols();
        let mut centroids = Array2::zeros((self.k, d));

        // First centroid: random point
        let first = rng.random_range(0..n);
        centroids.row_mut(0).assign(&data.row(first));

        // Remaining centroids: sample proportional to squared distance
        for i in 1..self.k {
            let mut distances: Vec<f64> = Vec::with_capacity(n);

            for j in 0..n {
                let point = data.row(j);
                let min_dist = (0..i)
                    .map(|c| squared_distance(&point, &centroids.row(c)))
                    .fold(f64::MAX, f64::min);
                distances.push(min_dist);
            }

            let total: f64 = distances.iter().sum();
            if total == 0.0 {
                let idx = rng.random_range(0..n);
                centroids.row_mut(i).assign(&data.row(idx));
                continue;
            }

            let threshold = rng.random::<f64>() * total;
            let mut cumsum = 0.0;
            let mut selected = 0;

            for (j, &dist) in distances.iter().enumerate() {
                cumsum += dist;
                if cumsum >= threshold {
                    selected = j;
                    break;
                }
            }

            centroids.row_mut(i).assign(&data.row(selected));
        }

        centroids
    }
}

impl KmeansModel {
    /// Fitted centroids (k × C).
    pub fn centroids(&self) -> &Array2<f64> {
        &self.centroids
    }

    /// Training-cohort labels.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Final within-cluster sum of squares.
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    /// Iterations run before convergence or cap.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Number of clusters.
    pub fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    /// Assign each row of `data` to its nearest fitted centroid.
    pub fn predict(&self, data: &Array2<f64>) -> Result<Vec<usize>> {
        if data.ncols() != self.centroids.ncols() {
            return Err(Error::DimensionMismatch {
                expected: self.centroids.ncols(),
                found: data.ncols(),
            });
        }
        let mut labels = vec![0usize; data.nrows()];
        assign_labels(data, &self.centroids, &mut labels);
        Ok(labels)
    }
}

/// Nearest-centroid assignment; rows are independent, so the assignment is
/// row-parallel when the `parallel` feature is enabled.
fn assign_labels(data: &Array2<f64>, centroids: &Array2<f64>, labels: &mut [usize]) {
    #[cfg(feature = "parallel")]
    {
        labels.par_iter_mut().enumerate().for_each(|(i, label)| {
            *label = nearest_centroid(&data.row(i), centroids);
        });
    }

    #[cfg(not(feature = "parallel"))]
    for (i, label) in labels.iter_mut().enumerate() {
        *label = nearest_centroid(&data.row(i), centroids);
    }
}

pub(crate) fn nearest_centroid(point: &ArrayView1<'_, f64>, centroids: &Array2<f64>) -> usize {
    let mut best_cluster = 0;
    let mut best_dist = f64::MAX;
    for k in 0..centroids.nrows() {
        let dist = squared_distance(point, &centroids.row(k));
        if dist < best_dist {
            best_dist = dist;
            best_cluster = k;
        }
    }
    best_cluster
}

fn squared_distance(a: &ArrayView1<'_, f64>, b: &ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

impl Clustering for Kmeans {
    fn fit_predict(&self, data: &Array2<f64>) -> Result<Vec<usize>> {
        Ok(self.fit(data)?.labels)
    }

    fn n_clusters(&self) -> usize {
        self.k
    }
}
