use derive_new::new;
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::{
    error::MixError,
    math::{nan_count, nan_mean, nan_variance},
};

/// Summary statistics of one group entering a Welch's test
#[derive(Debug, Clone, Copy, PartialEq, new)]
pub struct GroupSummary {
    pub mean: f64,
    pub variance: f64,
    pub n: f64,
}

/// Outcome of a Welch's unequal-variances t-test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WelchTest {
    /// Two-sided p-value, NaN whenever `t` is undefined
    pub p: f64,
    pub t: f64,
    /// Welch-Satterthwaite degrees of freedom
    pub nu: f64,
}
impl WelchTest {
    pub fn between(x1: &GroupSummary, x2: &GroupSummary) -> Self {
        welchs_test(x1.mean, x1.variance, x1.n, x2.mean, x2.variance, x2.n)
    }
}

/// Welch's t-test from the summary statistics of two groups
pub fn welchs_test(
    x1_mean: f64,
    x1_var: f64,
    n1: f64,
    x2_mean: f64,
    x2_var: f64,
    n2: f64,
) -> WelchTest {
    let s1 = x1_var / n1;
    let s2 = x2_var / n2;
    let t = (x1_mean - x2_mean) / (s1 + s2).sqrt();
    let nu = (s1 + s2).powi(2)
        / (x1_var.powi(2) / (n1.powi(2) * (n1 - 1.0)) + x2_var.powi(2) / (n2.powi(2) * (n2 - 1.0)));
    let p = if t.is_nan() {
        f64::NAN
    } else {
        two_sided_p_value(t, nu)
    };
    WelchTest { p, t, nu }
}

/// `2 * F(-|t|)` under a Student-t with `nu` degrees of freedom
///
/// NaN when `nu` is not a valid parameter (NaN or non-positive).
fn two_sided_p_value(t: f64, nu: f64) -> f64 {
    match StudentsT::new(0.0, 1.0, nu) {
        Ok(dist) => 2.0 * dist.cdf(-t.abs()),
        Err(_) => f64::NAN,
    }
}

/// Element-wise Welch's tests over paired groups
pub fn welchs_test_many(
    x1: &[GroupSummary],
    x2: &[GroupSummary],
) -> Result<Vec<WelchTest>, MixError> {
    if x1.len() != x2.len() {
        return Err(MixError::LengthMismatch {
            expected: x1.len(),
            got: x2.len(),
        });
    }
    Ok(x1
        .iter()
        .zip(x2.iter())
        .map(|(a, b)| WelchTest::between(a, b))
        .collect())
}

/// Welch's t-test on raw samples
///
/// NaN entries are dropped from each sample independently; variances are
/// unbiased.
pub fn welchs_test_samples(x1: &[f64], x2: &[f64]) -> WelchTest {
    let summarize =
        |x: &[f64]| GroupSummary::new(nan_mean(x), nan_variance(x), nan_count(x) as f64);
    WelchTest::between(&summarize(x1), &summarize(x2))
}
