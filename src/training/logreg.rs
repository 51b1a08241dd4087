use super::dataset::Dataset;
use crate::scoring::sigmoid;

#[derive(Debug, Clone)]
pub struct FitSettings {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            epochs: 60,
            l2: 0.001,
        }
    }
}

/// Per-column mean and population standard deviation
#[derive(Debug, Clone, PartialEq)]
pub struct Scaler {
    pub mu: [f64; 6],
    pub sd: [f64; 6],
}

impl Scaler {
    /// A column with zero spread gets `sd = 1`
    pub fn fit(rows: &[[f64; 6]]) -> Self {
        let n = rows.len().max(1) as f64;
        let mut mu = [0.0; 6];
        let mut sd = [0.0; 6];

        for row in rows {
            for j in 0..6 {
                mu[j] += row[j];
            }
        }
        for m in mu.iter_mut() {
            *m /= n;
        }

        for row in rows {
            for j in 0..6 {
                sd[j] += (row[j] - mu[j]).powi(2);
            }
        }
        for s in sd.iter_mut() {
            *s = (*s / n).sqrt();
            if *s == 0.0 || !s.is_finite() {
                *s = 1.0;
            }
        }

        Self { mu, sd }
    }

    pub fn transform(&self, row: &[f64; 6]) -> [f64; 6] {
        let mut out = [0.0; 6];
        for j in 0..6 {
            out[j] = (row[j] - self.mu[j]) / self.sd[j];
        }
        out
    }
}

/// Fitted logistic regression over standardised features
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticModel {
    pub weights: [f64; 6],
    pub bias: f64,
    pub scaler: Scaler,
}

impl LogisticModel {
    pub fn predict(&self, row: &[f64; 6]) -> f64 {
        let x = self.scaler.transform(row);
        sigmoid(linear(&self.weights, self.bias, &x))
    }

    /// Share of rows where `p > 0.5` agrees with the label
    pub fn accuracy(&self, dataset: &Dataset) -> f64 {
        if dataset.is_empty() {
            return 0.0;
        }
        let hits = dataset
            .rows
            .iter()
            .zip(dataset.labels.iter())
            .filter(|(row, y)| (self.predict(row) > 0.5) == (**y > 0.5))
            .count();
        hits as f64 / dataset.len() as f64
    }
}

fn linear(weights: &[f64; 6], bias: f64, x: &[f64; 6]) -> f64 {
    x.iter().zip(weights.iter()).fold(bias, |z, (xi, wi)| z + xi * wi)
}

/// Batch gradient descent from zero weights
///
/// Each epoch: `W -= lr * (Xᵗ(p - y) / n + l2 * W)`, `b -= lr * mean(p - y)`.
pub fn fit(dataset: &Dataset, settings: &FitSettings) -> LogisticModel {
    let scaler = Scaler::fit(&dataset.rows);
    let xs: Vec<[f64; 6]> = dataset.rows.iter().map(|r| scaler.transform(r)).collect();
    let n = xs.len();

    let mut weights = [0.0; 6];
    let mut bias = 0.0;

    if n == 0 {
        return LogisticModel {
            weights,
            bias,
            scaler,
        };
    }

    for _ in 0..settings.epochs {
        let mut grad_w = [0.0; 6];
        let mut grad_b = 0.0;

        for (x, &y) in xs.iter().zip(dataset.labels.iter()) {
            let err = sigmoid(linear(&weights, bias, x)) - y;
            for j in 0..6 {
                grad_w[j] += x[j] * err;
            }
            grad_b += err;
        }

        for j in 0..6 {
            let grad = grad_w[j] / n as f64 + settings.l2 * weights[j];
            weights[j] -= settings.learning_rate * grad;
        }
        bias -= settings.learning_rate * grad_b / n as f64;
    }

    LogisticModel {
        weights,
        bias,
        scaler,
    }
}
