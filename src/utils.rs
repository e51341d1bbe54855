use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::MixError;

/// Returns the indices at which every series holds a non-NaN value
///
/// Entries are paired by position: a NaN in any one series drops that index
/// from all of them.
pub fn joint_valid_indices(series: &[&[f64]]) -> Result<Vec<usize>, MixError> {
    let Some(first) = series.first() else {
        return Ok(Vec::new());
    };
    let len = first.len();
    if let Some(other) = series.iter().find(|s| s.len() != len) {
        return Err(MixError::LengthMismatch {
            expected: len,
            got: other.len(),
        });
    }
    Ok((0..len)
        .filter(|&i| series.iter().all(|s| !s[i].is_nan()))
        .collect())
}

pub fn select_indices<T: Copy>(indices: &[usize], data: &[T]) -> Vec<T> {
    indices.iter().map(|i| data[*i]).collect()
}

/// Builds an independent random stream for the `stream`-th job sharing `seed`
///
/// ChaCha streams with the same key never overlap, so jobs drawn this way can
/// run on separate workers without correlated resampling.
pub fn stream_rng(seed: u64, stream: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream);
    rng
}
