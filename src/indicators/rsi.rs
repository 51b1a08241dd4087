use super::moving_average::calculate_rolling_sma;

pub const RSI_PERIOD: usize = 14;
pub const RSI_NEUTRAL: f64 = 50.0;
const LOSS_FLOOR: f64 = 1e-6;

/// Calculate the 14-period Relative Strength Index over the most recent
/// 15 closes
///
/// Returns 50.0 (neutral) when fewer than 15 points are available or when
/// the window has neither gains nor losses. A window with gains but no
/// losses uses a tiny loss floor instead of dividing by zero, so the
/// result approaches 100.
pub fn calculate_rsi14(prices: &[f64]) -> f64 {
    if prices.len() < RSI_PERIOD + 1 {
        return RSI_NEUTRAL;
    }

    let window = &prices[prices.len() - (RSI_PERIOD + 1)..];
    let mut gains = 0.0;
    let mut losses = 0.0;

    for pair in window.windows(2) {
        let change = pair[1] - pair[0];
        if change >= 0.0 {
            gains += change;
        } else {
            losses -= change;
        }
    }

    rsi_from_averages(gains / RSI_PERIOD as f64, losses / RSI_PERIOD as f64)
}

/// Rolling RSI for every index of a close series
///
/// Gains and losses are smoothed with a warm-up SMA of 14, so early entries
/// are defined too. Used by the trainer to get point-in-time RSI values.
pub fn calculate_rsi_series(prices: &[f64]) -> Vec<f64> {
    if prices.is_empty() {
        return Vec::new();
    }

    let mut gains = Vec::with_capacity(prices.len());
    let mut losses = Vec::with_capacity(prices.len());
    gains.push(0.0);
    losses.push(0.0);

    for pair in prices.windows(2) {
        let change = pair[1] - pair[0];
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let avg_gains = calculate_rolling_sma(&gains, RSI_PERIOD);
    let avg_losses = calculate_rolling_sma(&losses, RSI_PERIOD);

    avg_gains
        .iter()
        .zip(avg_losses.iter())
        .map(|(&g, &l)| rsi_from_averages(g, l))
        .collect()
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain == 0.0 && avg_loss == 0.0 {
        return RSI_NEUTRAL;
    }

    let avg_loss = if avg_loss == 0.0 { LOSS_FLOOR } else { avg_loss };
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}
