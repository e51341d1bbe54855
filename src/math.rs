use statrs::statistics::Statistics;

/// Median of a NaN-free sample, averaging the two middle values for even lengths
///
/// Returns NaN for an empty sample.
pub fn median(x: &[f64]) -> f64 {
    median_in_place(&mut x.to_vec())
}

/// Same as [`median`], reordering `x` instead of copying it
pub fn median_in_place(x: &mut [f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    let mid = x.len() / 2;
    let even = x.len() % 2 == 0;
    let (lower, upper, _) = x.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    let upper = *upper;
    if even {
        let lower = lower.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (lower + upper) / 2.0
    } else {
        upper
    }
}

pub fn arithmetic_mean(x: &[f64]) -> f64 {
    x.iter().sum::<f64>() / x.len() as f64
}

/// Mean of the non-NaN entries
pub fn nan_mean(x: &[f64]) -> f64 {
    x.iter().filter(|v| !v.is_nan()).mean()
}

/// Unbiased (n - 1) variance of the non-NaN entries
///
/// NaN when fewer than two entries are present.
pub fn nan_variance(x: &[f64]) -> f64 {
    x.iter().filter(|v| !v.is_nan()).variance()
}

pub fn nan_count(x: &[f64]) -> usize {
    x.iter().filter(|v| !v.is_nan()).count()
}
