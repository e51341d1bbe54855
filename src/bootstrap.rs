//! Bootstrap mixing of correlated sample series
//!
//! Follows Lavancier & Rochet (2016): each series is summarised by its median,
//! the covariance of the medians is estimated by resampling every series with
//! replacement, and the medians are combined with generalised-least-squares
//! weights `(IᵗΣ⁻¹I)⁻¹ IᵗΣ⁻¹`.

use bon::Builder;
use nalgebra::{SMatrix, SVector};
use rand::Rng;
use rayon::prelude::*;
use tracing::info;

use crate::{
    config::BootstrapConfig,
    error::MixError,
    math::{arithmetic_mean, median, median_in_place},
    utils::{joint_valid_indices, select_indices, stream_rng},
};

/// Combined estimate of `K` series
#[derive(Debug, Clone)]
pub struct Mixture<const K: usize> {
    pub estimate: f64,
    /// NaN when fewer than two jointly valid entries were available
    pub variance: f64,
    pub weights: [f64; K],
    /// Number of positions at which every series was non-NaN
    pub n_valid: usize,
    /// Bootstrap covariance of the per-series medians
    pub covariance: Option<SMatrix<f64, K, K>>,
}
impl<const K: usize> Mixture<K> {
    fn empty() -> Self {
        Self {
            estimate: f64::NAN,
            variance: f64::NAN,
            weights: [f64::NAN; K],
            n_valid: 0,
            covariance: None,
        }
    }

    fn single(values: [f64; K]) -> Self {
        Self {
            estimate: arithmetic_mean(&values),
            variance: f64::NAN,
            weights: [1.0 / K as f64; K],
            n_valid: 1,
            covariance: None,
        }
    }

    pub fn std_error(&self) -> f64 {
        self.variance.sqrt()
    }
}

/// Mixes `K` series of the same length
///
/// Positions holding a NaN in any series are dropped from all of them before
/// anything else is computed. With no remaining positions the result is all
/// NaN; with one it is the plain average with equal weights and NaN variance.
/// A configuration with zero repetitions is rejected.
pub fn mix_bootstrap<const K: usize, R: Rng + ?Sized>(
    series: [&[f64]; K],
    config: &BootstrapConfig,
    rng: &mut R,
) -> Result<Mixture<K>, MixError> {
    if config.n_bootstrap == 0 {
        return Err(MixError::NoBootstrapRepetitions);
    }
    let valid = joint_valid_indices(&series)?;
    let samples = series.map(|s| select_indices(&valid, s));

    match valid.len() {
        0 => return Ok(Mixture::empty()),
        1 => return Ok(Mixture::single(std::array::from_fn(|i| samples[i][0]))),
        _ => {}
    }

    let medians = SVector::<f64, K>::from_fn(|i, _| median(&samples[i]));
    let sigma = bootstrap_covariance(&samples, &medians, config.n_bootstrap, |n| {
        rng.gen_range(0..n)
    });
    let (estimate, variance, weights) = gls_combine(sigma, &medians)?;

    if config.verbose {
        info!("weights {:?}", weights.as_slice());
        info!("{} +- {}", estimate, variance.sqrt());
    }

    Ok(Mixture {
        estimate,
        variance,
        weights: std::array::from_fn(|i| weights[i]),
        n_valid: valid.len(),
        covariance: Some(sigma),
    })
}

pub fn mix_two_bootstrap<R: Rng + ?Sized>(
    t1: &[f64],
    t2: &[f64],
    config: &BootstrapConfig,
    rng: &mut R,
) -> Result<Mixture<2>, MixError> {
    mix_bootstrap([t1, t2], config, rng)
}

pub fn mix_four_bootstrap<R: Rng + ?Sized>(
    t1: &[f64],
    t2: &[f64],
    t3: &[f64],
    t4: &[f64],
    config: &BootstrapConfig,
    rng: &mut R,
) -> Result<Mixture<4>, MixError> {
    mix_bootstrap([t1, t2, t3, t4], config, rng)
}

/// Estimates the covariance of the series medians around `medians`
///
/// Every repetition resamples each series independently, with replacement and
/// at its full length, and accumulates the outer product of the centred
/// resample medians. The sum is divided by the number of repetitions.
///
/// `draw(n)` supplies resampling indices in `0..n`, consumed series by series
/// within each repetition.
fn bootstrap_covariance<const K: usize, D: FnMut(usize) -> usize>(
    samples: &[Vec<f64>; K],
    medians: &SVector<f64, K>,
    n_bootstrap: usize,
    mut draw: D,
) -> SMatrix<f64, K, K> {
    let n = samples[0].len();
    let mut sigma = SMatrix::<f64, K, K>::zeros();
    let mut resample = vec![0.0; n];
    let mut delta = SVector::<f64, K>::zeros();

    for _ in 0..n_bootstrap {
        for (i, sample) in samples.iter().enumerate() {
            for slot in resample.iter_mut() {
                *slot = sample[draw(n)];
            }
            delta[i] = median_in_place(&mut resample) - medians[i];
        }
        sigma += delta * delta.transpose();
    }
    sigma / n_bootstrap as f64
}

/// Generalised-least-squares combination of `estimates` under covariance `sigma`
///
/// Returns `(estimate, variance, weights)`.
fn gls_combine<const K: usize>(
    sigma: SMatrix<f64, K, K>,
    estimates: &SVector<f64, K>,
) -> Result<(f64, f64, SVector<f64, K>), MixError> {
    let sigma_inv = sigma.try_inverse().ok_or(MixError::SingularCovariance)?;

    // IᵗΣ⁻¹ stored as a column
    let row = sigma_inv.transpose() * SVector::<f64, K>::repeat(1.0);
    let precision = row.sum();
    if precision == 0.0 || !precision.is_finite() {
        return Err(MixError::SingularCovariance);
    }
    let weights = row / precision;
    Ok((weights.dot(estimates), 1.0 / precision, weights))
}

/// Seeded front end to the bootstrap mixers
///
/// Each call derives its own random stream from `seed`, so results are
/// reproducible and batches can be spread over worker threads.
#[derive(Debug, Clone, Copy, Builder)]
pub struct BootstrapMixer {
    #[builder(default)]
    config: BootstrapConfig,
    #[builder(default)]
    seed: u64,
}
impl BootstrapMixer {
    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    pub fn mix_two(&self, t1: &[f64], t2: &[f64]) -> Result<Mixture<2>, MixError> {
        let mut rng = stream_rng(self.seed, 0);
        mix_two_bootstrap(t1, t2, &self.config, &mut rng)
    }

    pub fn mix_four(
        &self,
        t1: &[f64],
        t2: &[f64],
        t3: &[f64],
        t4: &[f64],
    ) -> Result<Mixture<4>, MixError> {
        let mut rng = stream_rng(self.seed, 0);
        mix_four_bootstrap(t1, t2, t3, t4, &self.config, &mut rng)
    }

    /// Mixes independent jobs in parallel, job `i` drawing from stream `i`
    pub fn mix_batch<const K: usize>(
        &self,
        jobs: &[[&[f64]; K]],
    ) -> Vec<Result<Mixture<K>, MixError>> {
        jobs.par_iter()
            .enumerate()
            .map(|(i, series)| {
                let mut rng = stream_rng(self.seed, i as u64);
                mix_bootstrap(*series, &self.config, &mut rng)
            })
            .collect()
    }
}
