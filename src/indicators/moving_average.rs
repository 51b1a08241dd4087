/// Calculate an Exponential Moving Average series
///
/// Smoothing factor `k = 2 / (span + 1)`, seeded with the first element and
/// applied left to right. The output has the same length as the input.
pub fn calculate_ema_series(prices: &[f64], span: usize) -> Vec<f64> {
    let Some(&first) = prices.first() else {
        return Vec::new();
    };

    let k = 2.0 / (span as f64 + 1.0);
    let mut ema = first;
    let mut out = Vec::with_capacity(prices.len());
    out.push(ema);

    for price in &prices[1..] {
        ema += k * (price - ema);
        out.push(ema);
    }

    out
}

/// Last step of the EMA: `ema[-1] - ema[-2]`, zero with fewer than 2 points
pub fn calculate_ema_slope(prices: &[f64], span: usize) -> f64 {
    let ema = calculate_ema_series(prices, span);
    slope_at(&ema, ema.len().saturating_sub(1))
}

/// `series[i] - series[i - 1]`, zero when `i` has no predecessor
pub fn slope_at(series: &[f64], i: usize) -> f64 {
    if i == 0 || i >= series.len() {
        return 0.0;
    }
    series[i] - series[i - 1]
}

/// Rolling Simple Moving Average series
///
/// Warm-up entries average over however many points are available, so the
/// output always has the input's length.
pub fn calculate_rolling_sma(values: &[f64], period: usize) -> Vec<f64> {
    let period = period.max(1);
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;

    for (i, value) in values.iter().enumerate() {
        sum += value;
        if i >= period {
            sum -= values[i - period];
        }
        out.push(sum / (i + 1).min(period) as f64);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_seeded_with_first() {
        let ema = calculate_ema_series(&[10.0, 10.0, 10.0], 5);
        assert_eq!(ema, vec![10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_ema_recurrence() {
        // span 3 -> k = 0.5
        let ema = calculate_ema_series(&[100.0, 102.0, 104.0], 3);
        assert_eq!(ema, vec![100.0, 101.0, 102.5]);
    }

    #[test]
    fn test_ema_empty() {
        assert!(calculate_ema_series(&[], 5).is_empty());
    }

    #[test]
    fn test_ema_slope() {
        let slope = calculate_ema_slope(&[100.0, 102.0, 104.0], 3);
        assert!((slope - 1.5).abs() < 1e-12);

        assert_eq!(calculate_ema_slope(&[100.0], 3), 0.0);
        assert_eq!(calculate_ema_slope(&[], 3), 0.0);
    }

    #[test]
    fn test_rolling_sma_warmup() {
        let sma = calculate_rolling_sma(&[2.0, 4.0, 6.0, 8.0], 2);
        assert_eq!(sma, vec![2.0, 3.0, 5.0, 7.0]);
    }
}
