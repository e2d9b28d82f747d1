//! Standard (z-score) scaling of numeric features

use serde::{Deserialize, Serialize};

use crate::feature_extractor::FeatureError;

/// Per-column mean and scale learned once from a training matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit on a training matrix (population standard deviation).
    ///
    /// Columns with zero variance get a scale of 1 so they pass through centred.
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self, FeatureError> {
        let first = rows.first().ok_or(FeatureError::EmptyBatch)?;
        let width = first.len();
        let count = rows.len() as f64;

        let mut mean = vec![0.0; width];
        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(FeatureError::WidthMismatch {
                    row: row_idx,
                    expected: width,
                    found: row.len(),
                });
            }
            for (sum, value) in mean.iter_mut().zip(row) {
                *sum += value;
            }
        }
        for sum in &mut mean {
            *sum /= count;
        }

        let mut scale = vec![0.0; width];
        for row in rows {
            for ((acc, value), m) in scale.iter_mut().zip(row).zip(&mean) {
                *acc += (value - m).powi(2);
            }
        }
        for acc in &mut scale {
            let std_dev = (*acc / count).sqrt();
            *acc = if std_dev < f64::EPSILON { 1.0 } else { std_dev };
        }

        Ok(Self { mean, scale })
    }

    /// Scale one row with the fitted parameters
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>, FeatureError> {
        if row.len() != self.mean.len() {
            return Err(FeatureError::WidthMismatch {
                row: 0,
                expected: self.mean.len(),
                found: row.len(),
            });
        }

        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(value, (mean, scale))| (value - mean) / scale)
            .collect())
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_mean_and_scale() {
        let rows = vec![vec![1.0, 10.0], vec![3.0, 10.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();

        assert_eq!(scaler.mean(), &[2.0, 10.0]);
        // population std of [1, 3] is 1; constant column falls back to 1
        assert_eq!(scaler.scale(), &[1.0, 1.0]);
    }

    #[test]
    fn test_transform_uses_fitted_parameters() {
        let scaler = StandardScaler::fit(&[vec![0.0], vec![4.0]]).unwrap();

        let scaled = scaler.transform_row(&[6.0]).unwrap();
        assert!((scaled[0] - 2.0).abs() < 1e-12);

        // transforming does not move the fitted mean
        assert_eq!(scaler.mean(), &[2.0]);
    }

    #[test]
    fn test_width_mismatch() {
        let scaler = StandardScaler::fit(&[vec![1.0, 2.0]]).unwrap();
        assert!(matches!(
            scaler.transform_row(&[1.0]),
            Err(FeatureError::WidthMismatch { expected: 2, found: 1, .. })
        ));
        assert!(matches!(
            StandardScaler::fit(&[]),
            Err(FeatureError::EmptyBatch)
        ));
    }
}
