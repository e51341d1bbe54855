//! Closed-form best linear unbiased combination of two correlated estimates
//!
//! Implements the k = 2 case of the Keller & Olkin (2004) correlated
//! estimator: with `S` the covariance of the two estimates, the weights are
//! `1ᵗS⁻¹ / (1ᵗS⁻¹1)` and the combined variance is `1 / (1ᵗS⁻¹1)`.

use derive_new::new;
use nalgebra::{Matrix2, Vector2};

use crate::error::MixError;

/// A scalar estimate together with its variance
#[derive(Debug, Clone, Copy, PartialEq, new)]
pub struct PointEstimate {
    pub value: f64,
    pub variance: f64,
}

/// Result of the closed-form two-series mix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlueMixture {
    pub estimate: f64,
    pub variance: f64,
    /// Weight of the first series; the second receives `1 - weight`
    pub weight: f64,
}

/// Combines two correlated estimates of the same quantity
///
/// Fails with [`MixError::SingularCovariance`] when `[[x1_var, cov], [cov, x2_var]]`
/// cannot be inverted, e.g. `x1_var == x2_var == cov`.
pub fn mix_two_closed_form(
    x1: f64,
    x1_var: f64,
    x2: f64,
    x2_var: f64,
    cov: f64,
) -> Result<BlueMixture, MixError> {
    let sigma = Matrix2::new(x1_var, cov, cov, x2_var);
    let sigma_inv = sigma.try_inverse().ok_or(MixError::SingularCovariance)?;

    // 1ᵗS⁻¹ stored as a column
    let row = sigma_inv.transpose() * Vector2::repeat(1.0);
    let precision = row.sum();
    if precision == 0.0 || !precision.is_finite() {
        return Err(MixError::SingularCovariance);
    }
    let weights = row / precision;

    Ok(BlueMixture {
        estimate: weights.dot(&Vector2::new(x1, x2)),
        variance: 1.0 / precision,
        weight: weights[0],
    })
}

/// Convenience over [`mix_two_closed_form`] for two [`PointEstimate`]s
pub fn mix_point_estimates(
    a: PointEstimate,
    b: PointEstimate,
    cov: f64,
) -> Result<BlueMixture, MixError> {
    mix_two_closed_form(a.value, a.variance, b.value, b.variance, cov)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_identical_estimates() {
        let mix = mix_two_closed_form(3.0, 2.0, 3.0, 2.0, 0.0).unwrap();
        assert_relative_eq!(mix.estimate, 3.0);
        assert_relative_eq!(mix.variance, 1.0);
        assert_relative_eq!(mix.weight, 0.5);
    }

    #[test]
    fn test_inverse_variance_weighting_without_covariance() {
        // weights proportional to 1/var: 1/1 vs 1/3
        let mix = mix_two_closed_form(0.0, 1.0, 4.0, 3.0, 0.0).unwrap();
        assert_relative_eq!(mix.weight, 0.75, epsilon = 1e-12);
        assert_relative_eq!(mix.estimate, 1.0, epsilon = 1e-12);
        assert_relative_eq!(mix.variance, 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_correlated_weights_match_kappa() {
        let (v1, v2, cov): (f64, f64, f64) = (1.0, 4.0, 0.5);
        let kappa = (v2 - cov) / (v1 + v2 - 2.0 * cov);
        let expected_var = kappa.powi(2) * v1 + (1.0 - kappa).powi(2) * v2
            + 2.0 * kappa * (1.0 - kappa) * cov;
        let mix = mix_two_closed_form(2.0, v1, 5.0, v2, cov).unwrap();
        assert_relative_eq!(mix.weight, kappa, epsilon = 1e-12);
        assert_relative_eq!(mix.estimate, 2.0 * kappa + 5.0 * (1.0 - kappa), epsilon = 1e-12);
        assert_relative_eq!(mix.variance, expected_var, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_covariance() {
        let err = mix_two_closed_form(1.0, 2.0, 3.0, 2.0, 2.0).unwrap_err();
        assert_eq!(err, MixError::SingularCovariance);
    }

    #[test]
    fn test_point_estimates() {
        let a = PointEstimate::new(1.0, 1.0);
        let b = PointEstimate::new(3.0, 1.0);
        let mix = mix_point_estimates(a, b, 0.0).unwrap();
        assert_relative_eq!(mix.estimate, 2.0);
        assert_relative_eq!(mix.variance, 0.5);
    }

    proptest! {
        #[test]
        fn weights_sum_to_one(
            x1 in -100.0f64..100.0,
            x2 in -100.0f64..100.0,
            v1 in 0.1f64..10.0,
            v2 in 0.1f64..10.0,
            rho in -0.9f64..0.9,
        ) {
            let cov = rho * (v1 * v2).sqrt();
            let mix = mix_two_closed_form(x1, v1, x2, v2, cov).unwrap();
            let explicit = mix.weight * x1 + (1.0 - mix.weight) * x2;
            prop_assert!((mix.estimate - explicit).abs() < 1e-8);
            prop_assert!(mix.variance > 0.0);
        }
    }
}
