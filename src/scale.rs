//! Per-feature standardization.
//!
//! Ocean profiles mix features with very different magnitudes (temperature in
//! °C near the surface, fractions of a degree at depth), so every pipeline
//! stage downstream of the loader expects standardized input: each feature
//! column centered on its training mean and divided by its training standard
//! deviation.
//!
//! Fitting is a constructor: a [`StandardScaler`] only exists with valid
//! parameters, and a failed fit constructs nothing.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Column-wise standardizer: `(x - mean) / scale` per feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Fit per-feature mean and standard deviation from a training matrix.
    ///
    /// Uses the population standard deviation (`ddof = 0`). Any column with
    /// zero variance makes the transform a division by zero and fails with
    /// [`Error::DegenerateFeature`].
    pub fn fit(data: &Array2<f64>) -> Result<Self> {
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(Error::EmptyInput);
        }

        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::Decomposition("column mean failed".to_string()))?;
        let scale = data.std_axis(Axis(0), 0.0);

        if let Some(index) = scale.iter().position(|&s| s == 0.0 || !s.is_finite()) {
            return Err(Error::DegenerateFeature { index });
        }

        Ok(Self { mean, scale })
    }

    /// Number of features the scaler was fit on.
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Per-feature training mean.
    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Per-feature training standard deviation.
    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    /// Standardize a matrix column-wise: `(x - mean) / scale`.
    pub fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(data)?;

        let mut out = data.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            row -= &self.mean;
            row /= &self.scale;
        }
        Ok(out)
    }

    /// Map a standardized matrix back to original units: `x * scale + mean`.
    pub fn inverse_transform(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(data)?;

        let mut out = data.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            row *= &self.scale;
            row += &self.mean;
        }
        Ok(out)
    }

    fn check_width(&self, data: &Array2<f64>) -> Result<()> {
        if data.ncols() != self.mean.len() {
            return Err(Error::DimensionMismatch {
                expected: self.mean.len(),
                found: data.ncols(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn fit_computes_column_statistics() {
        let data = array![[1.0, 10.0], [3.0, 20.0], [5.0, 30.0]];
        let scaler = StandardScaler::fit(&data).unwrap();

        assert_abs_diff_eq!(scaler.mean()[0], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(scaler.mean()[1], 20.0, epsilon = 1e-12);
        // Population std of {1, 3, 5} is sqrt(8/3).
        assert_abs_diff_eq!(scaler.scale()[0], (8.0f64 / 3.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn transform_centers_and_scales() {
        let data = array![[1.0, 10.0], [3.0, 20.0], [5.0, 30.0]];
        let scaler = StandardScaler::fit(&data).unwrap();
        let z = scaler.transform(&data).unwrap();

        for j in 0..2 {
            let col = z.column(j);
            assert_abs_diff_eq!(col.sum(), 0.0, epsilon = 1e-12);
            let var: f64 = col.iter().map(|v| v * v).sum::<f64>() / 3.0;
            assert_abs_diff_eq!(var, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn round_trip_is_identity() {
        let data = array![
            [12.5, 35.1, 4.2],
            [11.0, 35.4, 4.9],
            [9.75, 35.9, 5.3],
            [8.1, 36.2, 5.8]
        ];
        let scaler = StandardScaler::fit(&data).unwrap();
        let z = scaler.transform(&data).unwrap();
        let back = scaler.inverse_transform(&z).unwrap();

        for (a, b) in data.iter().zip(back.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-10);
        }
    }

    #[test]
    fn zero_variance_column_is_rejected() {
        let data = array![[1.0, 7.0], [2.0, 7.0], [3.0, 7.0]];
        let err = StandardScaler::fit(&data).unwrap_err();
        assert_eq!(err, Error::DegenerateFeature { index: 1 });
    }

    #[test]
    fn empty_input_is_rejected() {
        let data = Array2::<f64>::zeros((0, 3));
        assert_eq!(StandardScaler::fit(&data).unwrap_err(), Error::EmptyInput);
    }

    #[test]
    fn width_mismatch_is_rejected() {
        let train = array![[1.0, 2.0], [3.0, 4.0], [5.0, 7.0]];
        let scaler = StandardScaler::fit(&train).unwrap();
        let narrow = array![[1.0], [2.0]];
        assert_eq!(
            scaler.transform(&narrow).unwrap_err(),
            Error::DimensionMismatch {
                expected: 2,
                found: 1
            }
        );
    }
}
