use crate::config::PipelineSettings;
use crate::error::{FlightError, Result};
use tracing::debug;

/// Binary logistic regression trained by full-batch gradient descent.
///
/// Inputs are standardized with the training mean and standard deviation,
/// which are kept on the model and reapplied at inference.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticRegression {
    weights: Vec<f64>,
    bias: f64,
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl LogisticRegression {
    /// Fits a model; fails with `InsufficientData` on an empty matrix or
    /// when the labels contain only one class.
    pub fn fit(rows: &[Vec<f64>], labels: &[bool], settings: &PipelineSettings) -> Result<Self> {
        if rows.is_empty() || rows.len() != labels.len() {
            return Err(FlightError::insufficient(format!(
                "cannot fit a classifier on {} rows with {} labels",
                rows.len(),
                labels.len()
            )));
        }
        let positives = labels.iter().filter(|label| **label).count();
        if positives == 0 || positives == labels.len() {
            return Err(FlightError::insufficient(
                "training labels contain a single class",
            ));
        }

        let width = rows[0].len();
        let (means, scales) = column_statistics(rows, width);
        let standardized: Vec<Vec<f64>> = rows
            .iter()
            .map(|row| standardize(row, &means, &scales))
            .collect();

        let n = standardized.len() as f64;
        let mut weights = vec![0.0; width];
        let mut bias = 0.0;
        for _ in 0..settings.epochs {
            let mut grad = vec![0.0; width];
            let mut bias_grad = 0.0;
            for (row, label) in standardized.iter().zip(labels) {
                let target = if *label { 1.0 } else { 0.0 };
                let err = sigmoid(dot(&weights, row) + bias) - target;
                for (g, x) in grad.iter_mut().zip(row) {
                    *g += err * x;
                }
                bias_grad += err;
            }
            for (w, g) in weights.iter_mut().zip(&grad) {
                *w -= settings.learning_rate * (g / n + settings.l2 * *w);
            }
            bias -= settings.learning_rate * bias_grad / n;
        }
        debug!(rows = rows.len(), width, epochs = settings.epochs, "logistic regression fitted");

        Ok(Self {
            weights,
            bias,
            means,
            scales,
        })
    }

    /// Probability of the positive class.
    #[must_use]
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        let x = standardize(row, &self.means, &self.scales);
        sigmoid(dot(&self.weights, &x) + self.bias)
    }

    #[must_use]
    pub fn predict(&self, row: &[f64]) -> bool {
        self.predict_proba(row) >= 0.5
    }

    pub fn width(&self) -> usize {
        self.weights.len()
    }
}

fn column_statistics(rows: &[Vec<f64>], width: usize) -> (Vec<f64>, Vec<f64>) {
    let n = rows.len() as f64;
    let mut means = vec![0.0; width];
    for row in rows {
        for (m, x) in means.iter_mut().zip(row) {
            *m += x;
        }
    }
    for m in &mut means {
        *m /= n;
    }
    let mut scales = vec![0.0; width];
    for row in rows {
        for ((s, x), m) in scales.iter_mut().zip(row).zip(&means) {
            *s += (x - m).powi(2);
        }
    }
    for s in &mut scales {
        let std = (*s / n).sqrt();
        *s = if std > 1e-12 { std } else { 1.0 };
    }
    (means, scales)
}

fn standardize(row: &[f64], means: &[f64], scales: &[f64]) -> Vec<f64> {
    row.iter()
        .zip(means)
        .zip(scales)
        .map(|((x, m), s)| (x - m) / s)
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
