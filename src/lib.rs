//! txmix: combining correlated estimates of transcription rates
//!
//! This library combines repeated, correlated point estimates of the same
//! quantity into one minimum-variance estimate, and runs Welch's t-tests over
//! grouped per-trace measurements (gene x nuclear cycle x construct).
//!
//! The main components of this library are:
//! - `mix_two_closed_form`: closed-form BLUE of two estimates with known covariance
//! - `mix_two_bootstrap` / `mix_four_bootstrap`: Lavancier-Rochet mixing of sample
//!   series, with the covariance of the medians estimated by bootstrap
//! - `BootstrapMixer`: seeded front end running independent mixes in parallel
//! - `welchs_test`: Welch's unequal-variances t-test from summary statistics
//! - `Comparisons`: the additivity, cross-cycle and cross-gene test families
//! - `ComparisonResults`: Structure to hold and display the comparison rows

mod blue;
mod bootstrap;
mod comparisons;
mod config;
mod error;
mod math;
mod results;
mod table;
mod utils;
mod welch;

pub use blue::{mix_point_estimates, mix_two_closed_form, BlueMixture, PointEstimate};
pub use bootstrap::{
    mix_bootstrap, mix_four_bootstrap, mix_two_bootstrap, BootstrapMixer, Mixture,
};
pub use comparisons::{annotate_p_values, Comparisons};
pub use config::{
    BootstrapConfig, ComparisonConfig, PValueCorrection, DEFAULT_BOOTSTRAP_REPETITIONS,
};
pub use error::MixError;
pub use results::{ComparisonFamily, ComparisonResults, ComparisonRow};
pub use table::{
    group_by, mix_columns, Construct, GroupAggregate, GroupKey, Quantity, QuantityPolicy,
    TraceRecord,
};
pub use utils::stream_rng;
pub use welch::{welchs_test, welchs_test_many, welchs_test_samples, GroupSummary, WelchTest};
