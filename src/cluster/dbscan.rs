//! DBSCAN: Density-Based Spatial Clustering of Applications with Noise.
//!
//! # The Algorithm (Ester et al., 1996)
//!
//! DBSCAN groups samples by neighborhood density. Unlike k-means or the
//! mixture fit, it:
//!
//! - Discovers clusters of arbitrary shape
//! - Determines the number of clusters itself
//! - Labels outliers as noise instead of forcing an assignment
//!
//! ## Core Concepts
//!
//! - **Epsilon (ε)**: maximum distance between two points to be neighbors.
//! - **min_samples**: neighborhood size (the point itself included) required
//!   for a point to be "core".
//! - **Core point**: ε-neighborhood of at least `min_samples` members.
//! - **Border point**: within ε of a core point but not core itself.
//! - **Noise point**: neither core nor border.
//!
//! Clusters propagate transitively through chains of core points; border
//! points join the first cluster that reaches them. Cluster IDs are assigned
//! in discovery (row) order, so labeling is deterministic for a fixed sample
//! order.
//!
//! ## Complexity
//!
//! Time is O(n²) with the exhaustive neighbor scan used here; space is O(n).
//! Fine for profile cohorts in reduced space, where n is tens of thousands
//! at most.
//!
//! ## Limitations
//!
//! - Struggles when cluster densities differ widely
//! - ε is dataset-dependent; a k-distance plot on the reduced scores is the
//!   usual way to choose it

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// DBSCAN clustering configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dbscan {
    /// Neighborhood radius.
    eps: f64,
    /// Minimum neighborhood size (self included) for a core point.
    min_samples: usize,
}

/// Labels and core flags produced by a density pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbscanResult {
    /// Per-sample cluster label; `None` marks noise.
    labels: Vec<Option<usize>>,
    /// Per-sample core-point flag.
    is_core: Vec<bool>,
    n_clusters: usize,
}

impl Dbscan {
    /// Create a new DBSCAN clusterer.
    ///
    /// # Arguments
    ///
    /// * `eps` - Maximum distance between two points to be neighbors.
    /// * `min_samples` - Neighborhood size (self included) for a core point.
    ///
    /// # Typical Values
    ///
    /// - `eps`: read off a k-distance plot (k = `min_samples` - 1).
    /// - `min_samples`: twice the reduced dimensionality is a common start.
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self { eps, min_samples }
    }

    /// Set the neighborhood radius.
    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    /// Set the core-point neighborhood size.
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    /// Run the density pass over `data` (N × C).
    pub fn fit(&self, data: &Array2<f64>) -> Result<DbscanResult> {
        let n = data.nrows();
        if n == 0 || data.ncols() == 0 {
            return Err(Error::EmptyInput);
        }
        if !(self.eps > 0.0) {
            return Err(Error::InvalidParameter {
                name: "eps",
                message: "must be positive",
            });
        }
        if self.min_samples == 0 {
            return Err(Error::InvalidParameter {
                name: "min_samples",
                message: "must be at least 1",
            });
        }

        let mut labels: Vec<Option<usize>> = vec![None; n];
        let mut is_core = vec![false; n];
        let mut visited = vec![false; n];
        let mut cluster_id = 0;

        for point_idx in 0..n {
            if visited[point_idx] {
                continue;
            }
            visited[point_idx] = true;

            let neighbors = self.region_query(data, point_idx);

            // The neighborhood count includes the point itself.
            if neighbors.len() + 1 < self.min_samples {
                // Stays noise unless a core point later absorbs it as border.
                continue;
            }
            is_core[point_idx] = true;

            labels[point_idx] = Some(cluster_id);
            self.expand_cluster(
                data,
                &neighbors,
                cluster_id,
                &mut labels,
                &mut is_core,
                &mut visited,
            );
            cluster_id += 1;
        }

        Ok(DbscanResult {
            labels,
            is_core,
            n_clusters: cluster_id,
        })
    }

    /// Grow a cluster outward from a core point's neighborhood.
    fn expand_cluster(
        &self,
        data: &Array2<f64>,
        seeds: &[usize],
        cluster_id: usize,
        labels: &mut [Option<usize>],
        is_core: &mut [bool],
        visited: &mut [bool],
    ) {
        // Iterative expansion; recursion depth would otherwise track chain
        // length.
        let mut to_process: Vec<usize> = seeds.to_vec();

        while let Some(idx) = to_process.pop() {
            // Reached from a core point: joins this cluster unless an
            // earlier cluster claimed it first.
            if labels[idx].is_none() {
                labels[idx] = Some(cluster_id);
            }

            if visited[idx] {
                continue;
            }
            visited[idx] = true;

            let neighbors = self.region_query(data, idx);
            if neighbors.len() + 1 >= self.min_samples {
                is_core[idx] = true;
                for nn in neighbors {
                    if !visited[nn] || labels[nn].is_none() {
                        to_process.push(nn);
                    }
                }
            }
        }
    }

    /// Indices of all points within `eps` of `point_idx` (itself excluded).
    fn region_query(&self, data: &Array2<f64>, point_idx: usize) -> Vec<usize> {
        let point = data.row(point_idx);
        let eps_sq = self.eps * self.eps;
        (0..data.nrows())
            .filter(|&idx| {
                idx != point_idx && {
                    let other = data.row(idx);
                    point
                        .iter()
                        .zip(other.iter())
                        .map(|(a, b)| (a - b).powi(2))
                        .sum::<f64>()
                        <= eps_sq
                }
            })
            .collect()
    }
}

impl Default for Dbscan {
    fn default() -> Self {
        Self::new(0.5, 5)
    }
}

impl DbscanResult {
    /// Per-sample labels; `None` marks noise.
    pub fn labels(&self) -> &[Option<usize>] {
        &self.labels
    }

    /// Per-sample core-point flags.
    pub fn is_core(&self) -> &[bool] {
        &self.is_core
    }

    /// Number of clusters discovered.
    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Number of samples labeled noise.
    pub fn noise_count(&self) -> usize {
        self.labels.iter().filter(|l| l.is_none()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn two_separated_clusters() {
        let data = array![
            // Cluster around (0, 0)
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [0.1, 0.1],
            [0.05, 0.05],
            // Cluster around (5, 5)
            [5.0, 5.0],
            [5.1, 5.0],
            [5.0, 5.1],
            [5.1, 5.1],
            [5.05, 5.05],
        ];

        let result = Dbscan::new(0.3, 3).fit(&data).unwrap();

        assert_eq!(result.n_clusters(), 2);
        assert_eq!(result.noise_count(), 0);

        let first = result.labels()[0];
        for label in &result.labels()[1..5] {
            assert_eq!(*label, first);
        }
        let second = result.labels()[5];
        for label in &result.labels()[6..10] {
            assert_eq!(*label, second);
        }
        assert_ne!(first, second);
    }

    #[test]
    fn outlier_is_noise() {
        let data = array![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [0.1, 0.1],
            [100.0, 100.0], // outlier
            [5.0, 5.0],
            [5.1, 5.0],
            [5.0, 5.1],
            [5.1, 5.1],
        ];

        let result = Dbscan::new(0.3, 3).fit(&data).unwrap();

        assert!(result.labels()[4].is_none());
        assert!(!result.is_core()[4]);
        assert_eq!(result.noise_count(), 1);
        for (i, label) in result.labels().iter().enumerate() {
            if i != 4 {
                assert!(label.is_some());
            }
        }
    }

    #[test]
    fn sparse_points_are_all_noise() {
        let data = array![[0.0, 0.0], [10.0, 0.0], [0.0, 10.0], [10.0, 10.0]];

        let result = Dbscan::new(0.5, 3).fit(&data).unwrap();

        assert_eq!(result.n_clusters(), 0);
        assert_eq!(result.noise_count(), 4);
        assert!(result.is_core().iter().all(|&c| !c));
    }

    #[test]
    fn chain_of_core_points_connects() {
        // Chain spacing below eps: transitive connectivity joins everything.
        let data = Array2::from_shape_fn((10, 2), |(i, j)| {
            if j == 0 {
                i as f64 * 0.3
            } else {
                0.0
            }
        });

        let result = Dbscan::new(0.5, 2).fit(&data).unwrap();

        assert_eq!(result.n_clusters(), 1);
        let first = result.labels()[0];
        for label in result.labels() {
            assert_eq!(*label, first);
        }
    }

    #[test]
    fn border_point_joins_but_is_not_core() {
        // Dense triple plus one point reachable from a single core point.
        let data = array![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [0.35, 0.0], // border: one neighbor only
        ];

        let result = Dbscan::new(0.3, 3).fit(&data).unwrap();

        assert_eq!(result.n_clusters(), 1);
        assert_eq!(result.labels()[3], result.labels()[0]);
        assert!(!result.is_core()[3]);
        assert!(result.is_core()[0]);
    }

    #[test]
    fn deterministic_for_fixed_order() {
        let data = array![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [5.0, 5.0],
            [5.1, 5.0],
            [5.0, 5.1],
        ];
        let a = Dbscan::new(0.3, 2).fit(&data).unwrap();
        let b = Dbscan::new(0.3, 2).fit(&data).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_input_is_rejected() {
        let data = Array2::<f64>::zeros((0, 2));
        assert!(Dbscan::new(0.5, 3).fit(&data).is_err());
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let data = array![[0.0, 0.0]];
        assert!(Dbscan::new(0.0, 3).fit(&data).is_err());
        assert!(Dbscan::new(-1.0, 3).fit(&data).is_err());
        assert!(Dbscan::new(0.5, 0).fit(&data).is_err());
    }
}
