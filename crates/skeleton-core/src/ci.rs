//! # Gaussian Conditional Independence Test
//!
//! Fisher z-test of `H0: X_i ⫫ X_j | X_S` on a correlation matrix.
//!
//! 1. `r` is `C[i, j] / sqrt(C[i, i] · C[j, j])` for an empty conditioning
//!    set, otherwise the partial correlation read off the precision matrix of
//!    the `{i, j} ∪ S` block:
//!    `r = -Θ[0,1] / sqrt(Θ[0,0] · Θ[1,1])`.
//! 2. `Z = sqrt(n - |S| - 3) · |0.5 · ln_1p(2r / (1 - r))|`.
//! 3. `reject` iff `Z > Φ⁻¹(1 - alpha / 2)`.
//!
//! ## p-value
//!
//! `p_value` is `Φ(Z)`.
//! It is not the conventional two-sided p-value `2 · (1 - Φ(Z))`, which is
//! available separately as [`CiTestResult::two_sided_p_value`]. Decisions
//! use only `statistic` and `crit_val`, so the two never disagree on `reject`.

#![allow(clippy::float_arithmetic)]

use crate::{SkeletonError, Suffstat};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Significance level used when none is configured.
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Relative pivot size below which a conditioning block counts as singular.
///
/// Compared against `min(diag(L))² / max(diag(L))²` of the Cholesky factor.
pub const SINGULARITY_TOLERANCE: f64 = 1e-12;

// =============================================================================
// RESULT & CONFIG
// =============================================================================

/// Outcome of one conditional independence test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CiTestResult {
    /// Fisher z statistic, non-negative.
    pub statistic: f64,
    /// Two-sided critical value `Φ⁻¹(1 - alpha / 2)`.
    pub crit_val: f64,
    /// `Φ(statistic)`.
    pub p_value: f64,
    /// True when independence is rejected (the edge stays).
    pub reject: bool,
}

impl CiTestResult {
    /// True when the test does not reject independence (the edge goes).
    #[must_use]
    pub fn is_independent(&self) -> bool {
        !self.reject
    }

    /// Conventional two-sided p-value `2 · (1 - Φ(statistic))`.
    #[must_use]
    pub fn two_sided_p_value(&self) -> f64 {
        2.0 * Normal::standard().sf(self.statistic)
    }
}

/// Configuration of the Gaussian CI test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CiTestConfig {
    /// Significance level, strictly between 0 and 1.
    pub alpha: f64,
}

impl Default for CiTestConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
        }
    }
}

impl CiTestConfig {
    /// Check that `alpha` lies in the open interval (0, 1).
    pub fn validate(&self) -> Result<(), SkeletonError> {
        validate_alpha(self.alpha)
    }
}

// =============================================================================
// CI TEST TRAIT
// =============================================================================

/// A conditional independence oracle over a shared sufficient statistic.
///
/// Implementations are stateless with respect to calls: the same inputs
/// always give the same result, and `suffstat` is only read.
pub trait CiTest {
    /// Test whether variables `i` and `j` are independent given `cond_set`.
    fn test(
        &self,
        suffstat: &Suffstat,
        i: usize,
        j: usize,
        cond_set: &[usize],
    ) -> Result<CiTestResult, SkeletonError>;
}

/// Fisher z-test with a fixed significance level.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GaussCiTest {
    config: CiTestConfig,
}

impl GaussCiTest {
    /// Create a test from a validated configuration.
    pub fn new(config: CiTestConfig) -> Result<Self, SkeletonError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Create a test with the given significance level.
    pub fn with_alpha(alpha: f64) -> Result<Self, SkeletonError> {
        Self::new(CiTestConfig { alpha })
    }

    /// The configured significance level.
    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.config.alpha
    }
}

impl CiTest for GaussCiTest {
    fn test(
        &self,
        suffstat: &Suffstat,
        i: usize,
        j: usize,
        cond_set: &[usize],
    ) -> Result<CiTestResult, SkeletonError> {
        gauss_ci_test(suffstat, i, j, cond_set, self.config.alpha)
    }
}

// =============================================================================
// TEST FUNCTIONS
// =============================================================================

/// Fisher z-test of `i ⫫ j | cond_set` at significance `alpha`.
///
/// An empty `cond_set` tests marginal independence.
pub fn gauss_ci_test(
    suffstat: &Suffstat,
    i: usize,
    j: usize,
    cond_set: &[usize],
    alpha: f64,
) -> Result<CiTestResult, SkeletonError> {
    validate_alpha(alpha)?;

    let r = partial_correlation(suffstat, i, j, cond_set)?;
    let statistic = fisher_z(r, suffstat.n(), cond_set.len())?;

    let normal = Normal::standard();
    let crit_val = normal.inverse_cdf(1.0 - alpha / 2.0);
    let p_value = normal.cdf(statistic);
    let reject = statistic > crit_val;

    tracing::debug!(
        i,
        j,
        conditioning = cond_set.len(),
        r,
        statistic,
        crit_val,
        reject,
        "gauss ci test"
    );

    Ok(CiTestResult {
        statistic,
        crit_val,
        p_value,
        reject,
    })
}

/// Partial correlation of `i` and `j` given `cond_set`.
///
/// The `{i, j} ∪ cond_set` block is rescaled to unit diagonal first, so a
/// covariance matrix gives the same answer as its correlation matrix. The
/// block is then inverted through its Cholesky factor. A numerically
/// singular block fails with [`SkeletonError::SingularMatrix`]; an
/// invertible block with a negative eigenvalue cannot come from a valid
/// correlation matrix and fails with [`SkeletonError::NotPositiveDefinite`].
pub fn partial_correlation(
    suffstat: &Suffstat,
    i: usize,
    j: usize,
    cond_set: &[usize],
) -> Result<f64, SkeletonError> {
    validate_hypothesis(suffstat.dim(), i, j, cond_set)?;

    let c = suffstat.correlation();
    if cond_set.is_empty() {
        return Ok(c[(i, j)] / (c[(i, i)] * c[(j, j)]).sqrt());
    }

    let vars: Vec<usize> = [i, j].into_iter().chain(cond_set.iter().copied()).collect();
    let block = unit_diagonal(&c.select_rows(&vars).select_columns(&vars));

    let Some(cholesky) = block.clone().cholesky() else {
        return Err(classify_indefinite(block, vars));
    };

    let pivots = cholesky.l_dirty().diagonal();
    let smallest = pivots.min();
    let largest = pivots.max();
    if smallest * smallest <= SINGULARITY_TOLERANCE * largest * largest {
        tracing::warn!(?vars, smallest, largest, "conditioning block is ill-conditioned");
        return Err(SkeletonError::SingularMatrix(vars));
    }

    let theta = cholesky.inverse();
    let scale = (theta[(0, 0)] * theta[(1, 1)]).sqrt();
    if !scale.is_finite() || scale <= 0.0 {
        return Err(SkeletonError::SingularMatrix(vars));
    }

    Ok(-theta[(0, 1)] / scale)
}

/// Rescale a symmetric block with positive diagonal to unit diagonal.
fn unit_diagonal(block: &DMatrix<f64>) -> DMatrix<f64> {
    let scale = block.diagonal().map(f64::sqrt);
    DMatrix::from_fn(block.nrows(), block.ncols(), |row, col| {
        block[(row, col)] / (scale[row] * scale[col])
    })
}

/// Error for a block whose Cholesky factorization failed.
fn classify_indefinite(block: DMatrix<f64>, vars: Vec<usize>) -> SkeletonError {
    let eigenvalues = block.symmetric_eigen().eigenvalues;
    let smallest = eigenvalues.min();
    let largest = eigenvalues.amax();

    if smallest.abs() <= SINGULARITY_TOLERANCE * largest {
        tracing::warn!(?vars, smallest, largest, "conditioning block is singular");
        SkeletonError::SingularMatrix(vars)
    } else {
        tracing::warn!(?vars, smallest, largest, "conditioning block is not positive definite");
        SkeletonError::NotPositiveDefinite(vars)
    }
}

/// Fisher z statistic of correlation `r` estimated from `n` samples with a
/// conditioning set of size `k`.
///
/// Requires `n >= k + 3`. `|r| = 1` gives an infinite statistic.
pub fn fisher_z(r: f64, n: usize, k: usize) -> Result<f64, SkeletonError> {
    let dof = n
        .checked_sub(k.saturating_add(3))
        .ok_or(SkeletonError::InsufficientSamples { n, conditioning: k })?;

    // ln_1p(2r / (1 - r)) == ln((1 + r) / (1 - r)), exact near r = 0
    let transformed = 0.5 * (2.0 * r / (1.0 - r)).ln_1p();
    let statistic = (dof as f64).sqrt() * transformed.abs();

    if statistic.is_nan() {
        return Err(SkeletonError::NonFiniteStatistic(r));
    }
    Ok(statistic)
}

// =============================================================================
// VALIDATION
// =============================================================================

fn validate_alpha(alpha: f64) -> Result<(), SkeletonError> {
    if alpha.is_nan() || alpha <= 0.0 || alpha >= 1.0 {
        return Err(SkeletonError::InvalidAlpha(alpha));
    }
    Ok(())
}

fn validate_hypothesis(
    dim: usize,
    i: usize,
    j: usize,
    cond_set: &[usize],
) -> Result<(), SkeletonError> {
    if let Some(&index) = [i, j].iter().chain(cond_set).find(|&&index| index >= dim) {
        return Err(SkeletonError::IndexOutOfBounds { index, dim });
    }
    if i == j {
        return Err(SkeletonError::InvalidHypothesis(format!(
            "tested variables must differ, got {i} twice"
        )));
    }
    if let Some(index) = cond_set.iter().find(|&&index| index == i || index == j) {
        return Err(SkeletonError::InvalidHypothesis(format!(
            "conditioning set contains tested variable {index}"
        )));
    }

    let mut seen = std::collections::HashSet::with_capacity(cond_set.len());
    if let Some(index) = cond_set.iter().find(|&&index| !seen.insert(index)) {
        return Err(SkeletonError::InvalidHypothesis(format!(
            "conditioning set lists variable {index} twice"
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    const EPS: f64 = 1e-10;

    fn chain(n: usize) -> Suffstat {
        // X0 -> X1 -> X2 with unit-variance links of correlation 0.5
        let c = dmatrix![
            1.0, 0.5, 0.25;
            0.5, 1.0, 0.5;
            0.25, 0.5, 1.0
        ];
        Suffstat::new(n, c).expect("suffstat")
    }

    fn pair(n: usize, r: f64) -> Suffstat {
        Suffstat::new(n, dmatrix![1.0, r; r, 1.0]).expect("suffstat")
    }

    #[test]
    fn identity_is_independent() {
        let stat = Suffstat::new(100, DMatrix::identity(3, 3)).expect("suffstat");
        let result = gauss_ci_test(&stat, 0, 1, &[], 0.05).expect("test");

        assert_eq!(result.statistic, 0.0);
        assert!(!result.reject);
        assert!(result.is_independent());
        assert!((result.crit_val - 1.959_963_984_540_054).abs() < 1e-6);
        assert!((result.p_value - 0.5).abs() < EPS);
    }

    #[test]
    fn marginal_statistic_matches_fisher_transform() {
        let result = gauss_ci_test(&pair(100, 0.5), 0, 1, &[], 0.05).expect("test");
        let expected = 97f64.sqrt() * 0.5f64.atanh();

        assert!((result.statistic - expected).abs() < EPS);
        assert!(result.reject);
    }

    #[test]
    fn statistic_is_symmetric_in_sign() {
        let positive = gauss_ci_test(&pair(50, 0.3), 0, 1, &[], 0.05).expect("test");
        let negative = gauss_ci_test(&pair(50, -0.3), 0, 1, &[], 0.05).expect("test");

        assert!((positive.statistic - negative.statistic).abs() < EPS);
    }

    #[test]
    fn partial_correlation_matches_closed_form() {
        let (a, b, c) = (0.6, 0.3, 0.4);
        let stat = Suffstat::new(
            200,
            dmatrix![
                1.0, a, b;
                a, 1.0, c;
                b, c, 1.0
            ],
        )
        .expect("suffstat");

        // r_{01|2} = (r01 - r02 r12) / sqrt((1 - r02²)(1 - r12²))
        let expected = (a - b * c) / ((1.0 - b * b) * (1.0 - c * c)).sqrt();
        let r = partial_correlation(&stat, 0, 1, &[2]).expect("partial");

        assert!((r - expected).abs() < EPS);
    }

    #[test]
    fn conditioning_on_mediator_removes_dependence() {
        let stat = chain(1000);

        let marginal = gauss_ci_test(&stat, 0, 2, &[], 0.05).expect("test");
        assert!(marginal.reject);

        let conditional = gauss_ci_test(&stat, 0, 2, &[1], 0.05).expect("test");
        assert!(conditional.statistic.abs() < 1e-9);
        assert!(!conditional.reject);
    }

    #[test]
    fn conditioning_reduces_degrees_of_freedom() {
        let stat = chain(30);
        let r = partial_correlation(&stat, 0, 1, &[2]).expect("partial");
        let result = gauss_ci_test(&stat, 0, 1, &[2], 0.05).expect("test");

        let expected = 26f64.sqrt() * r.atanh().abs();
        assert!((result.statistic - expected).abs() < EPS);
    }

    #[test]
    fn statistic_grows_with_correlation() {
        let mut previous = -1.0;
        for step in 0..20 {
            let r = f64::from(step) * 0.05;
            let result = gauss_ci_test(&pair(40, r), 0, 1, &[], 0.05).expect("test");
            assert!(result.statistic > previous);
            previous = result.statistic;
        }
    }

    #[test]
    fn perfect_correlation_diverges() {
        let result = gauss_ci_test(&pair(40, 1.0), 0, 1, &[], 0.05).expect("test");
        assert!(result.statistic.is_infinite());
        assert!(result.reject);

        let result = gauss_ci_test(&pair(40, -1.0), 0, 1, &[], 0.05).expect("test");
        assert!(result.statistic.is_infinite());
    }

    #[test]
    fn reported_p_value_is_cdf_of_statistic() {
        let result = gauss_ci_test(&pair(100, 0.2), 0, 1, &[], 0.05).expect("test");
        let normal = Normal::standard();

        assert!((result.p_value - normal.cdf(result.statistic)).abs() < EPS);
        assert!(
            (result.two_sided_p_value() - 2.0 * (1.0 - normal.cdf(result.statistic))).abs() < 1e-9
        );
        assert!(result.p_value > 0.5);
    }

    #[test]
    fn smaller_alpha_raises_critical_value() {
        let stat = pair(100, 0.2);
        let loose = gauss_ci_test(&stat, 0, 1, &[], 0.10).expect("test");
        let strict = gauss_ci_test(&stat, 0, 1, &[], 0.01).expect("test");

        assert!(strict.crit_val > loose.crit_val);
        assert!((strict.statistic - loose.statistic).abs() < EPS);
    }

    #[test]
    fn insufficient_samples_fail() {
        let stat = chain(3);

        let result = gauss_ci_test(&stat, 0, 1, &[2], 0.05);
        assert!(matches!(
            result,
            Err(SkeletonError::InsufficientSamples {
                n: 3,
                conditioning: 1
            })
        ));

        let boundary = gauss_ci_test(&stat, 0, 1, &[], 0.05).expect("test");
        assert_eq!(boundary.statistic, 0.0);
        assert!(!boundary.reject);
    }

    #[test]
    fn collinear_conditioning_set_is_singular() {
        let stat = Suffstat::new(
            100,
            dmatrix![
                1.0, 0.5, 0.5;
                0.5, 1.0, 1.0;
                0.5, 1.0, 1.0
            ],
        )
        .expect("suffstat");

        let result = gauss_ci_test(&stat, 0, 1, &[2], 0.05);
        assert!(matches!(result, Err(SkeletonError::SingularMatrix(_))));
    }

    #[test]
    fn covariance_input_matches_rescaled_correlation() {
        let cov = dmatrix![
            4.0, 1.0, 0.0;
            1.0, 4.0, 0.0;
            0.0, 0.0, 4.0
        ];
        let raw = Suffstat::new(100, cov.clone()).expect("suffstat");
        let rescaled = Suffstat::from_covariance(100, cov).expect("suffstat");

        for cond in [&[][..], &[2][..]] {
            let from_raw = gauss_ci_test(&raw, 0, 1, cond, 0.05).expect("test");
            let from_rescaled = gauss_ci_test(&rescaled, 0, 1, cond, 0.05).expect("test");

            assert!(from_raw.statistic.is_finite());
            assert!((from_raw.statistic - from_rescaled.statistic).abs() < EPS);
            assert_eq!(from_raw.reject, from_rescaled.reject);
        }

        let r = partial_correlation(&raw, 0, 1, &[]).expect("partial");
        assert!((r - 0.25).abs() < EPS);
    }

    #[test]
    fn indefinite_conditioning_block_is_not_positive_definite() {
        // symmetric with unit diagonal, invertible, one negative eigenvalue
        let stat = Suffstat::new(
            100,
            dmatrix![
                1.0, 0.9, 0.9;
                0.9, 1.0, -0.9;
                0.9, -0.9, 1.0
            ],
        )
        .expect("suffstat");

        let result = gauss_ci_test(&stat, 0, 1, &[2], 0.05);
        assert!(matches!(
            result,
            Err(SkeletonError::NotPositiveDefinite(vars)) if vars == vec![0, 1, 2]
        ));
    }

    #[test]
    fn malformed_hypotheses_fail() {
        let stat = chain(100);

        assert!(matches!(
            gauss_ci_test(&stat, 1, 1, &[], 0.05),
            Err(SkeletonError::InvalidHypothesis(_))
        ));
        assert!(matches!(
            gauss_ci_test(&stat, 0, 1, &[1], 0.05),
            Err(SkeletonError::InvalidHypothesis(_))
        ));
        assert!(matches!(
            gauss_ci_test(&stat, 0, 1, &[2, 2], 0.05),
            Err(SkeletonError::InvalidHypothesis(_))
        ));
        assert!(matches!(
            gauss_ci_test(&stat, 0, 5, &[], 0.05),
            Err(SkeletonError::IndexOutOfBounds { index: 5, dim: 3 })
        ));
    }

    #[test]
    fn invalid_alpha_fails() {
        let stat = chain(100);
        for alpha in [0.0, 1.0, -0.1, f64::NAN] {
            assert!(matches!(
                gauss_ci_test(&stat, 0, 1, &[], alpha),
                Err(SkeletonError::InvalidAlpha(_))
            ));
        }
    }

    #[test]
    fn config_defaults_and_deserializes() {
        assert_eq!(CiTestConfig::default().alpha, DEFAULT_ALPHA);

        let config: CiTestConfig = serde_json::from_str(r#"{"alpha": 0.01}"#).expect("parse");
        assert_eq!(config.alpha, 0.01);

        let config: CiTestConfig = serde_json::from_str("{}").expect("parse");
        assert_eq!(config, CiTestConfig::default());
    }

    #[test]
    fn gauss_test_through_trait_object() {
        let oracle: Box<dyn CiTest> = Box::new(GaussCiTest::with_alpha(0.01).expect("oracle"));
        let stat = chain(1000);

        let direct = gauss_ci_test(&stat, 0, 2, &[1], 0.01).expect("test");
        let via_trait = oracle.test(&stat, 0, 2, &[1]).expect("test");
        assert_eq!(direct, via_trait);

        assert!(GaussCiTest::with_alpha(2.0).is_err());
        assert_eq!(GaussCiTest::default().alpha(), DEFAULT_ALPHA);
    }
}
