//! Quantile math shared by the aggregation stages.

/// The nine interior decile fractions, ascending.
pub const DECILE_FRACTIONS: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

/// Fractions to aggregate at: the deciles, plus the outer percentiles
/// (1st..9th and 91st..99th) when requested.
pub fn percentile_fractions(show_outer_percentiles: bool) -> Vec<f64> {
    let mut fractions = Vec::with_capacity(27);
    if show_outer_percentiles {
        fractions.extend((1..10).map(|n| f64::from(n) / 100.0));
    }
    fractions.extend(DECILE_FRACTIONS);
    if show_outer_percentiles {
        fractions.extend((91..100).map(|n| f64::from(n) / 100.0));
    }
    fractions
}

/// Linearly interpolated quantile of an ascending-sorted slice.
///
/// The fraction `q` lands at position `q * (len - 1)`; values between two
/// ranks interpolate linearly. An empty slice has no quantiles and yields
/// NaN.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    debug_assert!((0.0..=1.0).contains(&q));
    if sorted.is_empty() {
        return f64::NAN;
    }
    let position = q * (sorted.len() - 1) as f64;
    let low = position.floor() as usize;
    let high = position.ceil() as usize;
    if low == high {
        return sorted[low];
    }
    let weight = position - low as f64;
    sorted[low] * (1.0 - weight) + sorted[high] * weight
}
