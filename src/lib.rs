//! # pcm
//!
//! Profile Classification Model: statistical pipeline for clustering ocean
//! vertical profiles (temperature/salinity vs. depth).
//!
//! The pipeline is a sequence of pure transformations over an in-memory
//! sample matrix:
//!
//! 1. **Standardize** — per-feature mean/scale fit on a training cohort
//!    ([`StandardScaler`])
//! 2. **Reduce** — principal-component basis retained to a target
//!    explained-variance fraction ([`Pca`])
//! 3. **Cluster** — Gaussian mixture by default, K-means or DBSCAN as
//!    alternatives ([`cluster`])
//! 4. **Classify** — labels, posteriors, and per-cluster summaries in
//!    original units ([`ProfileClassifier`])
//!
//! Each stage is fit once and held immutably; classification is re-runnable
//! on any compatible cohort. All stochastic fits take an explicit seed.
//!
//! ```rust
//! use ndarray::array;
//! use pcm::{ClassifierConfig, ClusterMethod, ProfileClassifier};
//!
//! let cohort = array![
//!     [12.1, 9.3, 4.2],
//!     [12.0, 9.1, 4.3],
//!     [11.9, 9.4, 4.1],
//!     [3.2, 2.8, 1.9],
//!     [3.1, 2.6, 2.0],
//!     [3.3, 2.9, 1.8],
//! ];
//!
//! let config = ClassifierConfig {
//!     method: ClusterMethod::Gmm { k: 2 },
//!     seed: Some(42),
//!     ..Default::default()
//! };
//! let model = ProfileClassifier::fit(&cohort, &config).unwrap();
//! let result = model.classify(&cohort).unwrap();
//! assert_eq!(result.labels()[0], result.labels()[1]);
//! assert_ne!(result.labels()[0], result.labels()[3]);
//! ```
//!
//! The `parallel` feature enables row-parallel `transform`/`predict` paths
//! (rayon); fitting stays sequential either way.

pub mod cluster;
pub mod dataset;
/// Error types used across `pcm`.
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod reduce;
pub mod scale;


pub use cluster::{
    Clustering, Dbscan, DbscanResult, Gmm, GmmModel, InitStrategy, Kmeans, KmeansModel,
    SoftClustering,
};
pub use dataset::{synthetic_blobs, ProfileSet};
pub use error::{Error, Result};
pub use metrics::{ari, nmi, purity, strip_noise};
pub use pipeline::{
    Classification, ClassifierConfig, ClusterMethod, PipelineSummary, ProfileClassifier,
};
pub use reduce::Pca;
pub use scale::StandardScaler;
