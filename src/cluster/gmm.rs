//! Gaussian Mixture Model clustering.
//!
//! The mixture model is the classifier at the heart of the pipeline: it
//! provides **soft clustering**, so a profile sitting between two water
//! masses carries a posterior over both instead of a forced hard label.
//!
//! # The Probabilistic Model
//!
//! Data is assumed to be generated from K Gaussian components:
//!
//! ```text
//! P(x) = Σₖ πₖ × N(x | μₖ, Σₖ)
//! ```
//!
//! Where:
//! - πₖ = mixing weight (prior probability of component k)
//! - μₖ = mean of component k
//! - Σₖ = full covariance matrix of component k
//!
//! # The EM Algorithm
//!
//! Direct optimization is intractable (sum inside log). EM alternates:
//!
//! **E-step**: compute responsibilities (soft assignments):
//! ```text
//! γₙₖ = P(z=k | xₙ) = πₖ × N(xₙ | μₖ, Σₖ) / Σⱼ πⱼ × N(xₙ | μⱼ, Σⱼ)
//! ```
//!
//! **M-step**: update parameters from responsibilities:
//! - μₖ = Σₙ γₙₖ xₙ / Σₙ γₙₖ  (weighted mean)
//! - Σₖ = Σₙ γₙₖ (xₙ-μₖ)(xₙ-μₖ)ᵀ / Σₙ γₙₖ  (weighted scatter)
//! - πₖ = (1/N) Σₙ γₙₖ
//!
//! The loop stops when the mean per-sample log-likelihood improves by less
//! than `tol`, or at `max_iter`. Hitting the cap is not an error: the
//! best-effort model is returned with [`GmmModel::converged`] set to `false`
//! and a warning logged.
//!
//! # Failure Modes
//!
//! - **Local optima**: EM converges to local maxima; the default k-means
//!   seeding is much more stable than random restarts
//! - **Singular covariance**: a component collapsing onto fewer samples than
//!   dimensions loses rank; eigenvalues are clamped to `reg_covar` to keep
//!   every covariance positive definite
//! - **Wrong K**: too many components overfit; too few underfit

use ndarray::{Array1, Array2, ArrayView1, Axis};
use ndarray_linalg::{Eigh, UPLO};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use super::kmeans::{nearest_centroid, Kmeans};
use super::traits::{Clustering, SoftClustering};
use crate::error::{Error, Result};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// How the mixture parameters are initialized before the first EM step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitStrategy {
    /// Seed means from a short k-means run (the default; stable).
    KmeansSeed,
    /// Seed means from k distinct random samples.
    RandomPoints,
}

/// Gaussian Mixture Model configuration.
#[derive(Debug, Clone)]
pub struct Gmm {
    /// Number of components.
    n_components: usize,
    /// Maximum EM iterations.
    max_iter: usize,
    /// Convergence tolerance on the mean per-sample log-likelihood.
    tol: f64,
    /// Eigenvalue floor keeping covariances positive definite.
    reg_covar: f64,
    /// Random seed.
    seed: Option<u64>,
    /// Initialization strategy.
    init: InitStrategy,
}

/// Fitted mixture state: weights, means, covariances, and the cached
/// whitening factors used for density evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GmmModel {
    weights: Array1<f64>,
    means: Array2<f64>,
    covariances: Vec<Array2<f64>>,
    /// Per-component Λ^{-1/2} Vᵀ from the covariance eigendecomposition.
    whiteners: Vec<Array2<f64>>,
    log_dets: Vec<f64>,
    log_likelihood: f64,
    converged: bool,
    n_iter: usize,
}

impl Gmm {
    /// Create a new mixture fit with `k` components.
    pub fn new(k: usize) -> Self {
        Self {
            n_components: k,
            max_iter: 100,
            tol: 1e-3,
            reg_covar: 1e-6,
            seed: None,
            init: InitStrategy::KmeansSeed,
        }
    }

    /// Set maximum EM iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set convergence tolerance.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set the covariance eigenvalue floor.
    pub fn with_reg_covar(mut self, reg_covar: f64) -> Self {
        self.reg_covar = reg_covar;
        self
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the initialization strategy.
    pub fn with_init(mut self, init: InitStrategy) -> Self {
        self.init = init;
        self
    }

    /// Fit the mixture to `data` (N × C) by expectation-maximization.
    pub fn fit(&self, data: &Array2<f64>) -> Result<GmmModel> {
        let n = data.nrows();
        let c = data.ncols();
        if n == 0 || c == 0 {
            return Err(Error::EmptyInput);
        }
        if self.n_components == 0 {
            return Err(Error::InvalidParameter {
                name: "n_components",
                message: "must be > 0",
            });
        }
        if self.n_components > n {
            return Err(Error::InvalidClusterCount {
                requested: self.n_components,
                n_items: n,
            });
        }
        if self.max_iter == 0 {
            return Err(Error::InvalidParameter {
                name: "max_iter",
                message: "must be at least 1",
            });
        }
        if !(self.tol > 0.0) {
            return Err(Error::InvalidParameter {
                name: "tol",
                message: "must be > 0",
            });
        }
        if self.reg_covar <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "reg_covar",
                message: "must be > 0",
            });
        }

        let k = self.n_components;
        let mut resp = self.init_responsibilities(data)?;

        let mut model = GmmModel {
            weights: Array1::from_elem(k, 1.0 / k as f64),
            means: Array2::zeros((k, c)),
            covariances: vec![Array2::eye(c); k],
            whiteners: vec![Array2::eye(c); k],
            log_dets: vec![0.0; k],
            log_likelihood: f64::NEG_INFINITY,
            converged: false,
            n_iter: 0,
        };
        model.m_step(data, &resp, self.reg_covar)?;

        let mut prev_ll = f64::NEG_INFINITY;
        for iter in 0..self.max_iter {
            model.n_iter = iter + 1;

            let ll = model.e_step(data, &mut resp);
            model.log_likelihood = ll;

            if (ll - prev_ll).abs() < self.tol {
                model.converged = true;
                break;
            }
            prev_ll = ll;

            model.m_step(data, &resp, self.reg_covar)?;

            if model.n_iter % 10 == 0 {
                log::debug!(
                    "gmm: iteration {}, mean log-likelihood {:.6}",
                    model.n_iter,
                    ll
                );
            }
        }

        if !model.converged {
            log::warn!(
                "gmm: hit iteration cap ({}) before tolerance {:e}; returning best-effort parameters",
                self.max_iter,
                self.tol
            );
        }

        Ok(model)
    }

    /// Build the initial one-hot responsibilities from the chosen seeding.
    fn init_responsibilities(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        let n = data.nrows();
        let k = self.n_components;

        let labels = match self.init {
            InitStrategy::KmeansSeed => {
                let mut kmeans = Kmeans::new(k).with_max_iter(50);
                if let Some(s) = self.seed {
                    kmeans = kmeans.with_seed(s);
                }
                kmeans.fit(data)?.labels().to_vec()
            }
            InitStrategy::RandomPoints => {
                let mut rng: Box<dyn RngCore> = match self.seed {
                    Some(s) => Box::new(StdRng::seed_from_u64(s)),
                    None => Box::new(rand::rng()),
                };
                let mut indices: Vec<usize> = (0..n).collect();
                indices.shuffle(&mut rng);

                let c = data.ncols();
                let mut means = Array2::zeros((k, c));
                for (row, &i) in indices.iter().take(k).enumerate() {
                    means.row_mut(row).assign(&data.row(i));
                }
                (0..n)
                    .map(|i| nearest_centroid(&data.row(i), &means))
                    .collect()
            }
        };

        let mut resp = Array2::zeros((n, k));
        for (i, &label) in labels.iter().enumerate() {
            resp[[i, label]] = 1.0;
        }
        Ok(resp)
    }
}

impl GmmModel {
    /// Number of mixture components.
    pub fn n_components(&self) -> usize {
        self.means.nrows()
    }

    /// Dimensionality of the fitted space.
    pub fn n_features(&self) -> usize {
        self.means.ncols()
    }

    /// Component prior weights (sum to 1).
    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    /// Component means (K × C).
    pub fn means(&self) -> &Array2<f64> {
        &self.means
    }

    /// Component covariance matrices (each C × C, positive definite).
    pub fn covariances(&self) -> &[Array2<f64>] {
        &self.covariances
    }

    /// Whether the fit reached tolerance before the iteration cap.
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// EM iterations run.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Final mean per-sample log-likelihood of the training data.
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// Hard labels: arg-max posterior per row, ties to the lowest index.
    pub fn predict(&self, data: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(data)?;
        Ok(proba
            .axis_iter(Axis(0))
            .map(|row| argmax_lowest(&row.to_vec()))
            .collect())
    }

    /// Posterior responsibilities per row (rows sum to 1).
    pub fn predict_proba(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(data)?;
        let n = data.nrows();
        let k = self.n_components();

        let rows: Vec<Vec<f64>> = {
            #[cfg(feature = "parallel")]
            {
                (0..n)
                    .into_par_iter()
                    .map(|i| self.posterior_row(&data.row(i)).0)
                    .collect()
            }
            #[cfg(not(feature = "parallel"))]
            {
                (0..n).map(|i| self.posterior_row(&data.row(i)).0).collect()
            }
        };

        let mut out = Array2::zeros((n, k));
        for (i, row) in rows.into_iter().enumerate() {
            for (j, v) in row.into_iter().enumerate() {
                out[[i, j]] = v;
            }
        }
        Ok(out)
    }

    /// Per-sample log-likelihood under the mixture.
    pub fn score_samples(&self, data: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_width(data)?;
        Ok(Array1::from_iter(
            (0..data.nrows()).map(|i| logsumexp(&self.log_weighted_densities(&data.row(i)))),
        ))
    }

    fn check_width(&self, data: &Array2<f64>) -> Result<()> {
        if data.ncols() != self.n_features() {
            return Err(Error::DimensionMismatch {
                expected: self.n_features(),
                found: data.ncols(),
            });
        }
        Ok(())
    }

    /// Posterior over components for one sample, plus its log-likelihood.
    fn posterior_row(&self, x: &ArrayView1<'_, f64>) -> (Vec<f64>, f64) {
        let log_probs = self.log_weighted_densities(x);
        let lse = logsumexp(&log_probs);
        let posterior = log_probs.iter().map(|&lp| (lp - lse).exp()).collect();
        (posterior, lse)
    }

    /// `ln πₖ + ln N(x | μₖ, Σₖ)` for every component.
    fn log_weighted_densities(&self, x: &ArrayView1<'_, f64>) -> Vec<f64> {
        let c = self.n_features() as f64;
        let norm = c * (2.0 * std::f64::consts::PI).ln();

        (0..self.n_components())
            .map(|k| {
                let diff = x - &self.means.row(k);
                let white = self.whiteners[k].dot(&diff);
                let mahal = white.dot(&white);
                self.weights[k].ln() - 0.5 * (norm + self.log_dets[k] + mahal)
            })
            .collect()
    }

    /// E-step: refresh responsibilities in place, returning the mean
    /// per-sample log-likelihood under the current parameters.
    fn e_step(&self, data: &Array2<f64>, resp: &mut Array2<f64>) -> f64 {
        let n = data.nrows();
        let mut total = 0.0;
        for i in 0..n {
            let (posterior, lse) = self.posterior_row(&data.row(i));
            total += lse;
            for (k, v) in posterior.into_iter().enumerate() {
                resp[[i, k]] = v;
            }
        }
        total / n as f64
    }

    /// M-step: update weights, means, and covariances from responsibilities,
    /// then refresh the cached whitening factors.
    fn m_step(&mut self, data: &Array2<f64>, resp: &Array2<f64>, reg_covar: f64) -> Result<()> {
        let n = data.nrows();
        let c = data.ncols();
        let k = self.n_components();

        let nk: Vec<f64> = (0..k).map(|j| resp.column(j).sum()).collect();
        let total: f64 = nk.iter().sum();

        for j in 0..k {
            self.weights[j] = nk[j] / total;

            // A component that lost all responsibility keeps its previous
            // mean and covariance; its weight decays toward zero.
            if nk[j] <= 1e-10 {
                continue;
            }

            let mut mean = Array1::zeros(c);
            for i in 0..n {
                mean.scaled_add(resp[[i, j]], &data.row(i));
            }
            mean /= nk[j];

            let mut cov = Array2::zeros((c, c));
            for i in 0..n {
                let diff = &data.row(i) - &mean;
                let r = resp[[i, j]];
                for a in 0..c {
                    let ra = r * diff[a];
                    for b in 0..c {
                        cov[[a, b]] += ra * diff[b];
                    }
                }
            }
            cov /= nk[j];
            for a in 0..c {
                cov[[a, a]] += reg_covar;
            }

            self.means.row_mut(j).assign(&mean);
            self.covariances[j] = cov;
        }

        self.refresh_factors(reg_covar)
    }

    /// Eigendecompose every covariance, clamp eigenvalues to `reg_covar`,
    /// and cache the whitening transform and log-determinant. Covariances
    /// are rebuilt from the clamped spectrum so they stay positive definite.
    fn refresh_factors(&mut self, reg_covar: f64) -> Result<()> {
        let c = self.n_features();
        for j in 0..self.n_components() {
            let (vals, vecs) = self.covariances[j]
                .eigh(UPLO::Lower)
                .map_err(|e| Error::Decomposition(format!("component {j} covariance: {e}")))?;

            let clamped = vals.mapv(|v| v.max(reg_covar));

            let mut rebuilt = Array2::zeros((c, c));
            let mut whiten = Array2::zeros((c, c));
            for (idx, &lambda) in clamped.iter().enumerate() {
                let v = vecs.column(idx);
                let inv_sqrt = 1.0 / lambda.sqrt();
                for a in 0..c {
                    whiten[[idx, a]] = inv_sqrt * v[a];
                    for b in 0..c {
                        rebuilt[[a, b]] += lambda * v[a] * v[b];
                    }
                }
            }

            self.log_dets[j] = clamped.iter().map(|&l| l.ln()).sum();
            self.covariances[j] = rebuilt;
            self.whiteners[j] = whiten;
        }
        Ok(())
    }
}

/// Arg-max returning the lowest index on exact ties.
fn argmax_lowest(values: &[f64]) -> usize {
    let mut best = 0;
    let mut best_val = f64::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best = i;
        }
    }
    best
}

/// Log-sum-exp for numerical stability.
fn logsumexp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    let max_val = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_val.is_infinite() {
        return max_val;
    }
    max_val
        + values
            .iter()
            .map(|&v| (v - max_val).exp())
            .sum::<f64>()
            .ln()
}

impl Clustering for Gmm {
    fn fit_predict(&self, data: &Array2<f64>) -> Result<Vec<usize>> {
        let model = self.fit(data)?;
        model.predict(data)
    }

    fn n_clusters(&self) -> usize {
        self.n_components
    }
}

impl SoftClustering for Gmm {
    fn fit_predict_proba(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        let model = self.fit(data)?;
        model.predict_proba(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn two_blobs() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [0.1, 0.1],
            [0.0, 0.1],
            [10.0, 10.0],
            [10.1, 10.1],
            [10.0, 10.1],
        ]
    }

    #[test]
    fn separates_two_blobs() {
        let labels = Gmm::new(2)
            .with_seed(42)
            .fit_predict(&two_blobs())
            .unwrap();

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn posteriors_sum_to_one() {
        let data = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [5.0, 5.0], // between the blobs
            [10.0, 10.0],
            [9.9, 10.1],
        ];

        let proba = Gmm::new(2)
            .with_seed(42)
            .fit_predict_proba(&data)
            .unwrap();

        for row in proba.axis_iter(Axis(0)) {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let model = Gmm::new(2).with_seed(42).fit(&two_blobs()).unwrap();
        assert_abs_diff_eq!(model.weights().sum(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn deterministic_with_seed() {
        let data = two_blobs();
        let a = Gmm::new(2).with_seed(7).fit(&data).unwrap();
        let b = Gmm::new(2).with_seed(7).fit(&data).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.predict(&data).unwrap(), b.predict(&data).unwrap());
    }

    #[test]
    fn iteration_cap_is_nonfatal() {
        let model = Gmm::new(2)
            .with_seed(42)
            .with_max_iter(1)
            .with_tol(1e-12)
            .fit(&two_blobs())
            .unwrap();

        assert!(!model.converged());
        assert_eq!(model.n_iter(), 1);
        // Best-effort parameters are still usable.
        assert_eq!(model.predict(&two_blobs()).unwrap().len(), 6);
    }

    #[test]
    fn collapsed_component_stays_finite() {
        // Duplicated points give a singular scatter; regularization must
        // keep densities finite.
        let data = array![
            [1.0, 1.0],
            [1.0, 1.0],
            [1.0, 1.0],
            [8.0, 8.0],
            [8.0, 8.0],
            [8.0, 8.0],
        ];

        let model = Gmm::new(2).with_seed(3).fit(&data).unwrap();
        let scores = model.score_samples(&data).unwrap();
        for &s in scores.iter() {
            assert!(s.is_finite());
        }
    }

    #[test]
    fn random_points_init_also_fits() {
        let labels = Gmm::new(2)
            .with_seed(11)
            .with_init(InitStrategy::RandomPoints)
            .fit_predict(&two_blobs())
            .unwrap();
        assert_ne!(labels[0], labels[5]);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let data = two_blobs();
        assert!(Gmm::new(0).fit(&data).is_err());
        assert!(Gmm::new(2).with_tol(0.0).fit(&data).is_err());
        assert!(Gmm::new(2).with_max_iter(0).fit(&data).is_err());
        assert!(Gmm::new(2).with_reg_covar(0.0).fit(&data).is_err());
        assert!(matches!(
            Gmm::new(10).fit(&data),
            Err(Error::InvalidClusterCount { .. })
        ));
    }

    #[test]
    fn argmax_breaks_ties_low() {
        assert_eq!(argmax_lowest(&[0.5, 0.5]), 0);
        assert_eq!(argmax_lowest(&[0.2, 0.5, 0.5]), 1);
        assert_eq!(argmax_lowest(&[0.1, 0.9]), 1);
    }

    #[test]
    fn logsumexp_is_stable() {
        let vals = [-1000.0, -1000.0];
        let lse = logsumexp(&vals);
        assert_abs_diff_eq!(lse, -1000.0 + 2.0f64.ln(), epsilon = 1e-9);
        assert_eq!(logsumexp(&[]), f64::NEG_INFINITY);
    }
}
