//! Dimensionality reduction over standardized profiles.
//!
//! A vertical profile sampled on `M` depth levels is highly redundant: nearby
//! levels co-vary, and a handful of principal components usually captures
//! almost all of the variance. [`Pca`] fits an orthonormal basis from the
//! sample covariance of a standardized training matrix and retains the
//! smallest prefix of components whose cumulative explained-variance fraction
//! reaches a caller-chosen threshold.
//!
//! Reconstruction through [`Pca::inverse_transform`] is approximate whenever
//! fewer components than features are retained; the per-feature RMS error is
//! exposed as a diagnostic, not an invariant.

use ndarray::{Array1, Array2, Axis};
use ndarray_linalg::{Eigh, UPLO};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Principal component basis fit to a variance-retention threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pca {
    /// Column mean of the training matrix (length M).
    mean: Array1<f64>,
    /// Retained components as rows (C × M, orthonormal).
    components: Array2<f64>,
    /// Eigenvalue (variance) of each retained component.
    explained_variance: Array1<f64>,
    /// Fraction of total variance per retained component.
    explained_variance_ratio: Array1<f64>,
}

impl Pca {
    /// Fit an orthonormal basis from the sample covariance of `data`,
    /// retaining the smallest component prefix whose cumulative
    /// explained-variance fraction is at least `variance_threshold`.
    ///
    /// Components are ranked by descending variance; exactly equal variances
    /// keep their ascending eigen-index order, so the fit is deterministic
    /// for identical input. Fails with [`Error::InsufficientRank`] when the
    /// matrix has fewer samples than the retention would need.
    pub fn fit(data: &Array2<f64>, variance_threshold: f64) -> Result<Self> {
        if !(variance_threshold > 0.0 && variance_threshold <= 1.0) {
            return Err(Error::InvalidParameter {
                name: "variance_threshold",
                message: "must be in (0, 1]",
            });
        }

        let n = data.nrows();
        let m = data.ncols();
        if n == 0 || m == 0 {
            return Err(Error::EmptyInput);
        }
        if n < 2 {
            return Err(Error::InsufficientRank {
                requested: 2,
                n_samples: n,
            });
        }

        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::Decomposition("column mean failed".to_string()))?;
        let centered = data - &mean.view().insert_axis(Axis(0));

        let cov = centered.t().dot(&centered) / (n as f64 - 1.0);
        let (vals, vecs) = cov
            .eigh(UPLO::Lower)
            .map_err(|e| Error::Decomposition(format!("covariance eigendecomposition: {e}")))?;

        // Eigenvalues arrive in ascending order; rank them by descending
        // variance, ties broken by ascending eigen index.
        let mut order: Vec<usize> = (0..m).collect();
        order.sort_by(|&a, &b| {
            vals[b]
                .partial_cmp(&vals[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        let clamped: Vec<f64> = order.iter().map(|&i| vals[i].max(0.0)).collect();
        let total: f64 = clamped.iter().sum();
        if total <= 0.0 {
            return Err(Error::Decomposition(
                "covariance has zero total variance".to_string(),
            ));
        }

        let mut retained = m;
        let mut cumulative = 0.0;
        for (c, &v) in clamped.iter().enumerate() {
            cumulative += v / total;
            if cumulative >= variance_threshold - 1e-12 {
                retained = c + 1;
                break;
            }
        }

        if retained > n {
            return Err(Error::InsufficientRank {
                requested: retained,
                n_samples: n,
            });
        }

        let mut components = Array2::zeros((retained, m));
        for (row, &i) in order.iter().take(retained).enumerate() {
            components.row_mut(row).assign(&vecs.column(i));
        }

        let explained_variance = Array1::from_vec(clamped[..retained].to_vec());
        let explained_variance_ratio = &explained_variance / total;

        Ok(Self {
            mean,
            components,
            explained_variance,
            explained_variance_ratio,
        })
    }

    /// Number of retained components.
    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    /// Number of input features the basis was fit on.
    pub fn n_features(&self) -> usize {
        self.components.ncols()
    }

    /// Retained components as rows (C × M).
    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    /// Variance captured by each retained component.
    pub fn explained_variance(&self) -> &Array1<f64> {
        &self.explained_variance
    }

    /// Fraction of total variance captured by each retained component.
    pub fn explained_variance_ratio(&self) -> &Array1<f64> {
        &self.explained_variance_ratio
    }

    /// Cumulative explained-variance fraction of the retained basis.
    pub fn cumulative_explained_variance(&self) -> f64 {
        self.explained_variance_ratio.sum()
    }

    /// Components rescaled by the square root of their variance.
    ///
    /// A diagnostic view of the basis in which each row carries the amplitude
    /// of its mode; cluster structure in original units goes through
    /// [`inverse_transform`](Self::inverse_transform) instead.
    pub fn loadings(&self) -> Array2<f64> {
        let mut out = self.components.clone();
        for (mut row, &var) in out.axis_iter_mut(Axis(0)).zip(self.explained_variance.iter()) {
            row *= var.sqrt();
        }
        out
    }

    /// Project a matrix onto the retained basis, producing N × C scores.
    pub fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        if data.ncols() != self.n_features() {
            return Err(Error::DimensionMismatch {
                expected: self.n_features(),
                found: data.ncols(),
            });
        }
        let centered = data - &self.mean.view().insert_axis(Axis(0));
        Ok(centered.dot(&self.components.t()))
    }

    /// Reconstruct an approximate N × M matrix from reduced scores.
    pub fn inverse_transform(&self, reduced: &Array2<f64>) -> Result<Array2<f64>> {
        if reduced.ncols() != self.n_components() {
            return Err(Error::DimensionMismatch {
                expected: self.n_components(),
                found: reduced.ncols(),
            });
        }
        Ok(reduced.dot(&self.components) + &self.mean.view().insert_axis(Axis(0)))
    }

    /// Per-feature root-mean-square reconstruction error of `data` through
    /// the retained basis. Nonzero whenever C < M; diagnostic only.
    pub fn reconstruction_rmse(&self, data: &Array2<f64>) -> Result<Array1<f64>> {
        let reconstructed = self.inverse_transform(&self.transform(data)?)?;
        let sq = (data - &reconstructed).mapv(|d| d * d);
        let mse = sq
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::Decomposition("column mean failed".to_string()))?;
        Ok(mse.mapv(f64::sqrt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn anisotropic_sample() -> Array2<f64> {
        // Variance concentrated along the first axis.
        array![
            [2.0, 0.1, 0.0],
            [-2.0, -0.1, 0.0],
            [4.0, 0.2, 0.1],
            [-4.0, -0.2, -0.1],
            [1.0, 0.05, 0.02],
            [-1.0, -0.05, -0.02],
        ]
    }

    #[test]
    fn threshold_one_keeps_reconstruction_exact() {
        let data = anisotropic_sample();
        let pca = Pca::fit(&data, 1.0).unwrap();

        let rmse = pca.reconstruction_rmse(&data).unwrap();
        for &e in rmse.iter() {
            assert_abs_diff_eq!(e, 0.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn ratios_are_descending_and_bounded() {
        let data = anisotropic_sample();
        let pca = Pca::fit(&data, 1.0).unwrap();
        let ratio = pca.explained_variance_ratio();

        let mut cumulative = 0.0;
        let mut prev = f64::INFINITY;
        for &r in ratio.iter() {
            assert!((0.0..=1.0).contains(&r));
            assert!(r <= prev);
            prev = r;
            cumulative += r;
            assert!(cumulative <= 1.0 + 1e-12);
        }
        assert_abs_diff_eq!(pca.cumulative_explained_variance(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn tight_threshold_truncates_basis() {
        let data = anisotropic_sample();
        let pca = Pca::fit(&data, 0.9).unwrap();

        // Nearly all variance lives on the first axis.
        assert_eq!(pca.n_components(), 1);
        let reduced = pca.transform(&data).unwrap();
        assert_eq!(reduced.shape(), &[6, 1]);

        // Truncated reconstruction is lossy but close.
        let rmse = pca.reconstruction_rmse(&data).unwrap();
        assert!(rmse.iter().any(|&e| e > 0.0));
    }

    #[test]
    fn components_are_orthonormal() {
        let data = anisotropic_sample();
        let pca = Pca::fit(&data, 1.0).unwrap();

        let gram = pca.components().dot(&pca.components().t());
        for i in 0..gram.nrows() {
            for j in 0..gram.ncols() {
                let expect = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(gram[[i, j]], expect, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn fit_is_deterministic() {
        let data = anisotropic_sample();
        let a = Pca::fit(&data, 0.999).unwrap();
        let b = Pca::fit(&data, 0.999).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        let data = anisotropic_sample();
        assert!(matches!(
            Pca::fit(&data, 0.0),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            Pca::fit(&data, 1.5),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn single_sample_is_rejected() {
        let data = array![[1.0, 2.0, 3.0]];
        assert!(matches!(
            Pca::fit(&data, 0.9),
            Err(Error::InsufficientRank { .. })
        ));
    }

    #[test]
    fn transform_width_is_checked() {
        let data = anisotropic_sample();
        let pca = Pca::fit(&data, 1.0).unwrap();
        let narrow = array![[1.0, 2.0]];
        assert!(matches!(
            pca.transform(&narrow),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn loadings_scale_with_variance() {
        let data = anisotropic_sample();
        let pca = Pca::fit(&data, 1.0).unwrap();
        let loadings = pca.loadings();

        for c in 0..pca.n_components() {
            let amp = pca.explained_variance()[c].sqrt();
            for j in 0..pca.n_features() {
                assert_abs_diff_eq!(
                    loadings[[c, j]],
                    pca.components()[[c, j]] * amp,
                    epsilon = 1e-12
                );
            }
        }
    }
}
