//! Clustering algorithms for grouping reduced profiles.
//!
//! The pipeline clusters profiles after standardization and dimensionality
//! reduction, in the reduced score space. Three algorithms are provided.
//!
//! ## Hard vs Soft Clustering
//!
//! **Hard clustering** assigns each profile to exactly one cluster. Simple,
//! but loses information at water-mass boundaries, where a profile genuinely
//! resembles two regimes at once.
//!
//! **Soft clustering** gives each profile a posterior distribution over
//! clusters. A profile in a frontal zone might be 60% subtropical mode water
//! and 40% subpolar — the posterior keeps that, a hard label cannot.
//!
//! ## Algorithms
//!
//! ### Gaussian Mixture Model ([`Gmm`])
//!
//! Models the reduced scores as a mixture of K full-covariance Gaussians,
//! fit by expectation-maximization. The primary classifier: soft posteriors,
//! out-of-sample prediction, per-sample likelihoods.
//!
//! **When to use**: the default; whenever you want posteriors or need to
//! classify profiles that were not in the training cohort.
//!
//! ### K-means ([`Kmeans`])
//!
//! Hard partitioning into k spherical clusters by Lloyd's algorithm with
//! k-means++ initialization. Also the seeding step of the mixture fit.
//!
//! **When to use**: fast exploration, or when hard labels suffice and the
//! spherical assumption is acceptable.
//!
//! ### DBSCAN ([`Dbscan`])
//!
//! Density-connectivity clustering. Finds its own cluster count, handles
//! non-convex shapes, and labels outliers as noise instead of forcing an
//! assignment — useful for flagging anomalous profiles.
//!
//! **When to use**: outlier screening, or when the number of regimes is
//! unknown and cluster shapes are irregular.
//!
//! ## Usage
//!
//! ```rust
//! use ndarray::array;
//! use pcm::cluster::{Clustering, Gmm, Kmeans, SoftClustering};
//!
//! let data = array![
//!     [0.0, 0.0],
//!     [0.1, 0.1],
//!     [10.0, 10.0],
//!     [10.1, 10.1],
//! ];
//!
//! // Hard clustering with K-means
//! let labels = Kmeans::new(2).with_seed(42).fit_predict(&data).unwrap();
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[0], labels[2]);
//!
//! // Soft clustering with a Gaussian mixture
//! let proba = Gmm::new(2).with_seed(42).fit_predict_proba(&data).unwrap();
//! // proba[[i, k]] = P(profile i belongs to component k)
//! ```

mod dbscan;
mod gmm;
mod kmeans;
mod traits;

pub use dbscan::{Dbscan, DbscanResult};
pub use gmm::{Gmm, GmmModel, InitStrategy};
pub use kmeans::{Kmeans, KmeansModel};
pub use traits::{Clustering, SoftClustering};
