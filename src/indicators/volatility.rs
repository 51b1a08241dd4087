/// Substituted for sigma when a window has no measurable variance, so the
/// expected-move range never collapses to zero width
pub const SIGMA_FLOOR: f64 = 0.0005;

/// Single-step simple returns `close[i] / close[i-1] - 1`
pub fn calculate_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Population standard deviation, zero for an empty slice
pub fn calculate_stddev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Standard deviation of single-step returns with the floor applied
pub fn calculate_sigma(prices: &[f64]) -> f64 {
    floor_sigma(calculate_stddev(&calculate_returns(prices)))
}

/// Sigma of the last `window` returns ending at `i` (inclusive), no floor
///
/// Mirrors what was observable at time `i`; the trainer uses it so that no
/// future price leaks into a sample.
pub fn calculate_sigma_at(prices: &[f64], i: usize, window: usize) -> f64 {
    if i < 1 || i >= prices.len() {
        return 0.0;
    }

    let start = (i + 1).saturating_sub(window).max(1);
    let returns: Vec<f64> = (start..=i).map(|j| prices[j] / prices[j - 1] - 1.0).collect();
    calculate_stddev(&returns)
}

pub fn floor_sigma(sigma: f64) -> f64 {
    if sigma.is_finite() && sigma > f64::EPSILON {
        sigma
    } else {
        SIGMA_FLOOR
    }
}
