//! The profile classification pipeline.
//!
//! Composes the stages end to end: fit a [`StandardScaler`] on the training
//! cohort, fit a [`Pca`] basis on the standardized matrix, fit the chosen
//! clusterer on the reduced scores, then classify any compatible cohort and
//! report summary statistics in original physical units.
//!
//! Every stage is fit once and held immutably; classification is a pure
//! function of the fitted parameters, re-runnable on new cohorts. A fitted
//! classifier serializes to JSON ([`ProfileClassifier::save`]) so the
//! parameter blobs can feed downstream mapping and visualization tools.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::cluster::{Dbscan, Gmm, GmmModel, InitStrategy, Kmeans, KmeansModel};
use crate::error::{Error, Result};
use crate::reduce::Pca;
use crate::scale::StandardScaler;

/// Clustering method the driver fits on the reduced scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ClusterMethod {
    /// Gaussian mixture with `k` components (the default path).
    Gmm {
        /// Number of mixture components.
        k: usize,
    },
    /// K-means with `k` clusters.
    Kmeans {
        /// Number of clusters.
        k: usize,
    },
    /// Density-based clustering; finds its own cluster count and labels
    /// outliers as noise.
    Dbscan {
        /// Neighborhood radius in reduced-score space.
        eps: f64,
        /// Neighborhood size (self included) for a core point.
        min_samples: usize,
    },
}

/// Pipeline configuration with validated, named fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Clustering method and its parameters.
    pub method: ClusterMethod,
    /// Cumulative explained-variance fraction the PCA basis must reach,
    /// in (0, 1].
    pub variance_threshold: f64,
    /// Iteration cap for the iterative fits.
    pub max_iter: usize,
    /// Convergence tolerance for the mixture fit.
    pub tol: f64,
    /// Mixture initialization strategy.
    pub init: InitStrategy,
    /// Seed for the stochastic fits; `None` draws from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            method: ClusterMethod::Gmm { k: 8 },
            variance_threshold: 0.999,
            max_iter: 100,
            tol: 1e-3,
            init: InitStrategy::KmeansSeed,
            seed: None,
        }
    }
}

impl ClassifierConfig {
    /// Reject malformed configuration before any computation starts.
    pub fn validate(&self) -> Result<()> {
        if !(self.variance_threshold > 0.0 && self.variance_threshold <= 1.0) {
            return Err(Error::InvalidParameter {
                name: "variance_threshold",
                message: "must be in (0, 1]",
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
        match self.method {
            ClusterMethod::Gmm { k } | ClusterMethod::Kmeans { k } => {
                if k == 0 {
                    return Err(Error::InvalidParameter {
                        name: "k",
                        message: "must be > 0",
                    });
                }
            }
            ClusterMethod::Dbscan { eps, min_samples } => {
                if !(eps > 0.0) {
                    return Err(Error::InvalidParameter {
                        name: "eps",
                        message: "must be positive",
                    });
                }
                if min_samples == 0 {
                    return Err(Error::InvalidParameter {
                        name: "min_samples",
                        message: "must be at least 1",
                    });
                }
            }
        }
        Ok(())
    }
}

/// The clusterer fitted on the reduced training scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum FittedClusterer {
    Gmm(GmmModel),
    Kmeans(KmeansModel),
    /// Density clustering keeps only its parameters: there is no
    /// out-of-sample model, each cohort is labeled by its own density pass.
    Dbscan(Dbscan),
}

/// Labels (and, for the mixture path, posteriors) for one cohort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    labels: Vec<Option<usize>>,
    posteriors: Option<Array2<f64>>,
}

impl Classification {
    /// Per-sample cluster label; `None` marks density-pass noise.
    pub fn labels(&self) -> &[Option<usize>] {
        &self.labels
    }

    /// Posterior responsibilities (mixture path only); rows sum to 1.
    pub fn posteriors(&self) -> Option<&Array2<f64>> {
        self.posteriors.as_ref()
    }

    /// Number of classified samples.
    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    /// Number of samples labeled noise.
    pub fn noise_count(&self) -> usize {
        self.labels.iter().filter(|l| l.is_none()).count()
    }
}

/// Read-only summary of a fitted pipeline, in original physical units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Retained PCA components.
    pub n_components: usize,
    /// Cumulative explained-variance fraction of the retained basis.
    pub cumulative_explained_variance: f64,
    /// Whether the iterative fit reached tolerance (always true for
    /// non-iterative methods).
    pub converged: bool,
    /// Clusters found or requested.
    pub n_clusters: usize,
    /// Training-cohort samples per cluster.
    pub cluster_counts: Vec<usize>,
    /// Training-cohort samples labeled noise.
    pub noise_count: usize,
    /// Per-cluster centroids mapped back to original units
    /// (`n_clusters` × M).
    pub centroids: Array2<f64>,
    /// Per-feature RMS reconstruction error of the training cohort through
    /// the retained basis, in original units.
    pub reconstruction_rmse: Array1<f64>,
}

/// A fully fitted classification pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileClassifier {
    config: ClassifierConfig,
    scaler: StandardScaler,
    pca: Pca,
    clusterer: FittedClusterer,
    summary: PipelineSummary,
}

impl ProfileClassifier {
    /// Fit the full pipeline on a training matrix (N × M).
    pub fn fit(train: &Array2<f64>, config: &ClassifierConfig) -> Result<Self> {
        config.validate()?;

        let scaler = StandardScaler::fit(train)?;
        let standardized = scaler.transform(train)?;
        let pca = Pca::fit(&standardized, config.variance_threshold)?;
        let reduced = pca.transform(&standardized)?;

        log::info!(
            "pipeline: {} profiles x {} features reduced to {} components ({:.4} variance)",
            train.nrows(),
            train.ncols(),
            pca.n_components(),
            pca.cumulative_explained_variance()
        );

        let (clusterer, labels, converged) = match config.method {
            ClusterMethod::Gmm { k } => {
                let mut gmm = Gmm::new(k)
                    .with_max_iter(config.max_iter)
                    .with_tol(config.tol)
                    .with_init(config.init);
                if let Some(s) = config.seed {
                    gmm = gmm.with_seed(s);
                }
                let model = gmm.fit(&reduced)?;
                let labels: Vec<Option<usize>> =
                    model.predict(&reduced)?.into_iter().map(Some).collect();
                let converged = model.converged();
                (FittedClusterer::Gmm(model), labels, converged)
            }
            ClusterMethod::Kmeans { k } => {
                let mut kmeans = Kmeans::new(k).with_max_iter(config.max_iter);
                if let Some(s) = config.seed {
                    kmeans = kmeans.with_seed(s);
                }
                let model = kmeans.fit(&reduced)?;
                let labels = model.labels().iter().map(|&l| Some(l)).collect();
                (FittedClusterer::Kmeans(model), labels, true)
            }
            ClusterMethod::Dbscan { eps, min_samples } => {
                let dbscan = Dbscan::new(eps, min_samples);
                let result = dbscan.fit(&reduced)?;
                let labels = result.labels().to_vec();
                (FittedClusterer::Dbscan(dbscan), labels, true)
            }
        };

        let n_clusters = match &clusterer {
            FittedClusterer::Gmm(m) => m.n_components(),
            FittedClusterer::Kmeans(m) => m.n_clusters(),
            FittedClusterer::Dbscan(_) => {
                labels.iter().flatten().map(|&l| l + 1).max().unwrap_or(0)
            }
        };

        let summary = Self::summarize(
            &scaler, &pca, &clusterer, &reduced, &standardized, &labels, n_clusters, converged,
        )?;

        Ok(Self {
            config: config.clone(),
            scaler,
            pca,
            clusterer,
            summary,
        })
    }

    /// Classify a cohort: standardize, project, and assign.
    ///
    /// Mixture and K-means paths classify arbitrary compatible matrices from
    /// the fitted parameters; the density path labels the presented cohort
    /// with its own (deterministic) density pass.
    pub fn classify(&self, data: &Array2<f64>) -> Result<Classification> {
        let standardized = self.scaler.transform(data)?;
        let reduced = self.pca.transform(&standardized)?;

        match &self.clusterer {
            FittedClusterer::Gmm(model) => {
                let posteriors = model.predict_proba(&reduced)?;
                let labels = posteriors
                    .axis_iter(Axis(0))
                    .map(|row| {
                        let mut best = 0;
                        let mut best_val = f64::NEG_INFINITY;
                        for (k, &v) in row.iter().enumerate() {
                            if v > best_val {
                                best_val = v;
                                best = k;
                            }
                        }
                        Some(best)
                    })
                    .collect();
                Ok(Classification {
                    labels,
                    posteriors: Some(posteriors),
                })
            }
            FittedClusterer::Kmeans(model) => {
                let labels = model.predict(&reduced)?.into_iter().map(Some).collect();
                Ok(Classification {
                    labels,
                    posteriors: None,
                })
            }
            FittedClusterer::Dbscan(dbscan) => {
                let result = dbscan.fit(&reduced)?;
                Ok(Classification {
                    labels: result.labels().to_vec(),
                    posteriors: None,
                })
            }
        }
    }

    /// Read-only summary of the fitted pipeline.
    pub fn summary(&self) -> &PipelineSummary {
        &self.summary
    }

    /// The configuration the pipeline was fit with.
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// The fitted standardizer.
    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// The fitted reduction basis.
    pub fn pca(&self) -> &Pca {
        &self.pca
    }

    /// The fitted mixture model, when the method is [`ClusterMethod::Gmm`].
    pub fn gmm(&self) -> Option<&GmmModel> {
        match &self.clusterer {
            FittedClusterer::Gmm(model) => Some(model),
            _ => None,
        }
    }

    /// Serialize the fitted pipeline to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path).map_err(|e| Error::Serialization(e.to_string()))?;
        serde_json::to_writer(BufWriter::new(file), self)
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Load a previously saved pipeline.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::Serialization(e.to_string()))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    #[allow(clippy::too_many_arguments)]
    fn summarize(
        scaler: &StandardScaler,
        pca: &Pca,
        clusterer: &FittedClusterer,
        reduced: &Array2<f64>,
        standardized: &Array2<f64>,
        labels: &[Option<usize>],
        n_clusters: usize,
        converged: bool,
    ) -> Result<PipelineSummary> {
        let mut cluster_counts = vec![0usize; n_clusters];
        let mut noise_count = 0;
        for label in labels {
            match label {
                Some(l) => cluster_counts[*l] += 1,
                None => noise_count += 1,
            }
        }

        // Cluster centers in reduced space, then back through both inverse
        // transforms into original units.
        let c = reduced.ncols();
        let centers_reduced = match clusterer {
            FittedClusterer::Gmm(model) => model.means().clone(),
            FittedClusterer::Kmeans(model) => model.centroids().clone(),
            FittedClusterer::Dbscan(_) => {
                let mut centers = Array2::zeros((n_clusters, c));
                for (i, label) in labels.iter().enumerate() {
                    if let Some(l) = label {
                        for j in 0..c {
                            centers[[*l, j]] += reduced[[i, j]];
                        }
                    }
                }
                for (mut row, &count) in
                    centers.axis_iter_mut(Axis(0)).zip(cluster_counts.iter())
                {
                    if count > 0 {
                        row /= count as f64;
                    }
                }
                centers
            }
        };

        let centroids = if centers_reduced.nrows() > 0 {
            scaler.inverse_transform(&pca.inverse_transform(&centers_reduced)?)?
        } else {
            Array2::zeros((0, scaler.n_features()))
        };

        // Reconstruction RMSE is computed on standardized data; rescale by
        // the per-feature training scale to report original units.
        let rmse_standardized = pca.reconstruction_rmse(standardized)?;
        let reconstruction_rmse = &rmse_standardized * scaler.scale();

        Ok(PipelineSummary {
            n_components: pca.n_components(),
            cumulative_explained_variance: pca.cumulative_explained_variance(),
            converged,
            n_clusters,
            cluster_counts,
            noise_count,
            centroids,
            reconstruction_rmse,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::synthetic_blobs;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn blob_cohort() -> (Array2<f64>, Vec<usize>) {
        let centers = array![[0.0, 0.0, 0.0], [10.0, 10.0, 10.0]];
        synthetic_blobs(&centers, 0.5, 50, 42).unwrap()
    }

    fn gmm_config(k: usize) -> ClassifierConfig {
        ClassifierConfig {
            method: ClusterMethod::Gmm { k },
            seed: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn gmm_pipeline_recovers_blobs() {
        let (data, truth) = blob_cohort();
        let model = ProfileClassifier::fit(&data, &gmm_config(2)).unwrap();
        let result = model.classify(&data).unwrap();

        let labels: Vec<usize> = result.labels().iter().map(|l| l.unwrap()).collect();
        assert_eq!(labels.len(), 100);
        let score = crate::metrics::ari(&labels, &truth);
        assert!(score > 0.95, "ari = {score}");

        let posteriors = result.posteriors().unwrap();
        for row in posteriors.axis_iter(Axis(0)) {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn summary_reports_original_unit_centroids() {
        let (data, _) = blob_cohort();
        let model = ProfileClassifier::fit(&data, &gmm_config(2)).unwrap();
        let summary = model.summary();

        assert_eq!(summary.n_clusters, 2);
        assert_eq!(summary.cluster_counts.iter().sum::<usize>(), 100);
        assert_eq!(summary.noise_count, 0);
        assert!(summary.cumulative_explained_variance <= 1.0 + 1e-9);

        // Each blob center must be recovered by one centroid, in original
        // units.
        for target in [0.0, 10.0] {
            let hit = summary.centroids.axis_iter(Axis(0)).any(|row| {
                row.iter().all(|&v| (v - target).abs() < 0.5)
            });
            assert!(hit, "no centroid near {target}");
        }
    }

    #[test]
    fn kmeans_path_classifies_held_out_samples() {
        let (data, _) = blob_cohort();
        let config = ClassifierConfig {
            method: ClusterMethod::Kmeans { k: 2 },
            seed: Some(7),
            ..Default::default()
        };
        let model = ProfileClassifier::fit(&data, &config).unwrap();

        let held_out = array![[0.1, -0.1, 0.2], [9.8, 10.2, 10.0]];
        let result = model.classify(&held_out).unwrap();
        assert_eq!(result.n_samples(), 2);
        assert_ne!(result.labels()[0], result.labels()[1]);
        assert!(result.posteriors().is_none());
    }

    #[test]
    fn dbscan_path_flags_noise() {
        let (mut data, _) = blob_cohort();
        // Push one sample far away from both blobs.
        data[[0, 0]] = 500.0;
        data[[0, 1]] = -500.0;
        data[[0, 2]] = 500.0;

        let config = ClassifierConfig {
            method: ClusterMethod::Dbscan {
                eps: 1.0,
                min_samples: 4,
            },
            ..Default::default()
        };
        let model = ProfileClassifier::fit(&data, &config).unwrap();

        assert!(model.summary().noise_count >= 1);
        let result = model.classify(&data).unwrap();
        assert!(result.labels()[0].is_none());
        assert_eq!(result.noise_count(), model.summary().noise_count);
    }

    #[test]
    fn invalid_config_fails_before_fitting() {
        let (data, _) = blob_cohort();
        let config = ClassifierConfig {
            variance_threshold: 0.0,
            ..gmm_config(2)
        };
        assert!(matches!(
            ProfileClassifier::fit(&data, &config),
            Err(Error::InvalidParameter { .. })
        ));

        let config = ClassifierConfig {
            method: ClusterMethod::Gmm { k: 0 },
            ..Default::default()
        };
        assert!(ProfileClassifier::fit(&data, &config).is_err());
    }

    #[test]
    fn seeded_fits_are_identical() {
        let (data, _) = blob_cohort();
        let a = ProfileClassifier::fit(&data, &gmm_config(3)).unwrap();
        let b = ProfileClassifier::fit(&data, &gmm_config(3)).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a.classify(&data).unwrap().labels(),
            b.classify(&data).unwrap().labels()
        );
    }

    #[test]
    fn save_load_round_trips() {
        let (data, _) = blob_cohort();
        let model = ProfileClassifier::fit(&data, &gmm_config(2)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        model.save(&path).unwrap();
        let restored = ProfileClassifier::load(&path).unwrap();

        assert_eq!(model, restored);
        assert_eq!(
            model.classify(&data).unwrap(),
            restored.classify(&data).unwrap()
        );
    }
}
