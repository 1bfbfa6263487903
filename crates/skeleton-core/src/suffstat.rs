//! # Sufficient Statistic
//!
//! Sample size plus correlation matrix: everything the Gaussian CI test
//! reads. Produced by whoever estimates correlations from raw data and
//! borrowed read-only by every oracle call, so one instance can be shared
//! across threads testing different pairs.

#![allow(clippy::float_arithmetic)]

use crate::SkeletonError;
use nalgebra::DMatrix;

/// Absolute tolerance for the symmetry check.
pub const SYMMETRY_TOLERANCE: f64 = 1e-8;

/// Sample count and correlation matrix of the observed variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Suffstat {
    n: usize,
    c: DMatrix<f64>,
}

impl Suffstat {
    /// Create a sufficient statistic from a sample count and a correlation
    /// (or covariance) matrix.
    ///
    /// The matrix must be square, finite and symmetric with a positive
    /// diagonal; `n` must be positive. The oracle normalizes by the diagonal,
    /// so a covariance matrix tests the same hypotheses as its correlation
    /// matrix.
    pub fn new(n: usize, c: DMatrix<f64>) -> Result<Self, SkeletonError> {
        if n == 0 {
            return Err(SkeletonError::InvalidSuffstat(
                "sample count must be positive".to_string(),
            ));
        }
        if !c.is_square() {
            return Err(SkeletonError::NotSquare {
                rows: c.nrows(),
                cols: c.ncols(),
            });
        }
        if c.iter().any(|value| !value.is_finite()) {
            return Err(SkeletonError::InvalidSuffstat(
                "matrix has non-finite entries".to_string(),
            ));
        }

        if let Some(position) = c
            .diagonal()
            .iter()
            .position(|&variance| variance <= 0.0)
        {
            return Err(SkeletonError::InvalidSuffstat(format!(
                "variance of variable {position} is not positive"
            )));
        }

        let dim = c.nrows();
        for row in 0..dim {
            for col in (row + 1)..dim {
                if (c[(row, col)] - c[(col, row)]).abs() > SYMMETRY_TOLERANCE {
                    return Err(SkeletonError::InvalidSuffstat(format!(
                        "matrix is not symmetric at ({row}, {col})"
                    )));
                }
            }
        }

        Ok(Self { n, c })
    }

    /// Create a sufficient statistic from a covariance matrix, rescaling it
    /// to unit diagonal.
    pub fn from_covariance(n: usize, cov: DMatrix<f64>) -> Result<Self, SkeletonError> {
        if !cov.is_square() {
            return Err(SkeletonError::NotSquare {
                rows: cov.nrows(),
                cols: cov.ncols(),
            });
        }

        let scale = cov.diagonal();
        if let Some(position) = scale
            .iter()
            .position(|&variance| variance.is_nan() || variance <= 0.0)
        {
            return Err(SkeletonError::InvalidSuffstat(format!(
                "variance of variable {position} is not positive"
            )));
        }
        let scale = scale.map(f64::sqrt);

        let corr = DMatrix::from_fn(cov.nrows(), cov.ncols(), |row, col| {
            cov[(row, col)] / (scale[row] * scale[col])
        });
        Self::new(n, corr)
    }

    /// Number of samples the correlations were estimated from.
    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }

    /// The matrix as supplied: a correlation matrix, or a covariance matrix
    /// when built through [`Suffstat::new`] from one.
    #[must_use]
    pub fn correlation(&self) -> &DMatrix<f64> {
        &self.c
    }

    /// Number of variables.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.c.nrows()
    }
}
