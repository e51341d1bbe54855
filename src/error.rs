use thiserror::Error;

/// Failures of the estimator-mixing core.
///
/// Empty and single-sample inputs are not errors: they surface as NaN-tagged
/// results instead.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixError {
    #[error("Series length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("Covariance matrix is singular; the series cannot be weighted")]
    SingularCovariance,

    #[error("At least one bootstrap repetition is required")]
    NoBootstrapRepetitions,
}
