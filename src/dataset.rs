//! Profile cohort container and synthetic data helpers.
//!
//! The pipeline itself is matrix-in, matrix-out; [`ProfileSet`] is the thin
//! container that keeps a cohort's sample matrix correlated with its
//! per-profile longitude/latitude, so downstream mapping of labels stays a
//! simple index lookup. How the matrix was produced (catalog reader, file
//! format) is outside this crate.

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A cohort of profiles: N × M sample matrix plus per-profile coordinates,
/// correlated by row index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSet {
    data: Array2<f64>,
    lon: Array1<f64>,
    lat: Array1<f64>,
}

impl ProfileSet {
    /// Build a cohort, validating that coordinates match the matrix rows.
    pub fn new(data: Array2<f64>, lon: Array1<f64>, lat: Array1<f64>) -> Result<Self> {
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(Error::EmptyInput);
        }
        if lon.len() != data.nrows() {
            return Err(Error::DimensionMismatch {
                expected: data.nrows(),
                found: lon.len(),
            });
        }
        if lat.len() != data.nrows() {
            return Err(Error::DimensionMismatch {
                expected: data.nrows(),
                found: lat.len(),
            });
        }
        Ok(Self { data, lon, lat })
    }

    /// Number of profiles (rows).
    pub fn n_profiles(&self) -> usize {
        self.data.nrows()
    }

    /// Number of features per profile (e.g. depth levels).
    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }

    /// The sample matrix.
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Per-profile longitudes.
    pub fn lon(&self) -> &Array1<f64> {
        &self.lon
    }

    /// Per-profile latitudes.
    pub fn lat(&self) -> &Array1<f64> {
        &self.lat
    }
}

/// Generate a seeded synthetic cohort: isotropic Gaussian blobs around the
/// given centers, `per_center` samples each, with ground-truth labels.
///
/// Rows are grouped by center in order, so row `i` belongs to center
/// `i / per_center`.
pub fn synthetic_blobs(
    centers: &Array2<f64>,
    spread: f64,
    per_center: usize,
    seed: u64,
) -> Result<(Array2<f64>, Vec<usize>)> {
    if centers.nrows() == 0 || centers.ncols() == 0 {
        return Err(Error::EmptyInput);
    }
    if per_center == 0 {
        return Err(Error::InvalidParameter {
            name: "per_center",
            message: "must be > 0",
        });
    }
    if !(spread > 0.0 && spread.is_finite()) {
        return Err(Error::InvalidParameter {
            name: "spread",
            message: "must be positive and finite",
        });
    }

    let noise = Normal::new(0.0, spread).map_err(|_| Error::InvalidParameter {
        name: "spread",
        message: "not a valid normal scale",
    })?;
    let mut rng = StdRng::seed_from_u64(seed);

    let k = centers.nrows();
    let d = centers.ncols();
    let n = k * per_center;

    let mut data = Array2::zeros((n, d));
    let mut labels = Vec::with_capacity(n);
    for c in 0..k {
        for s in 0..per_center {
            let row = c * per_center + s;
            for j in 0..d {
                data[[row, j]] = centers[[c, j]] + noise.sample(&mut rng);
            }
            labels.push(c);
        }
    }

    Ok((data, labels))
}
