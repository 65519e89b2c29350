use statrs::statistics::Statistics;

use super::forest::validate_matrix;
use crate::analytics::error::AnalyticsResult;

#[derive(Debug, Clone)]
pub struct LogisticParams {
    pub learning_rate: f64,
    pub iterations: usize,
    pub l2: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            iterations: 1000,
            l2: 0.01,
        }
    }
}

/// Binary logistic regression over z-score standardized features, trained by
/// batch gradient descent with an L2 penalty on the weights.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    weights: Vec<f64>,
    bias: f64,
    means: Vec<f64>,
    stds: Vec<f64>,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticRegression {
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &LogisticParams) -> AnalyticsResult<Self> {
        validate_matrix(x, y)?;

        let n = x.len() as f64;
        let width = x[0].len();
        let (means, stds) = column_moments(x);
        let scaled: Vec<Vec<f64>> = x.iter().map(|row| standardize(row, &means, &stds)).collect();

        let mut weights = vec![0.0; width];
        let mut bias = 0.0;
        let mut grad = vec![0.0; width];

        for _ in 0..params.iterations {
            grad.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_bias = 0.0;

            for (row, &target) in scaled.iter().zip(y) {
                let z = bias + dot(&weights, row);
                let err = sigmoid(z) - target;
                for (g, v) in grad.iter_mut().zip(row) {
                    *g += err * v;
                }
                grad_bias += err;
            }

            for (w, g) in weights.iter_mut().zip(&grad) {
                *w -= params.learning_rate * (g / n + params.l2 * *w);
            }
            bias -= params.learning_rate * grad_bias / n;
        }

        Ok(Self {
            weights,
            bias,
            means,
            stds,
        })
    }

    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        let scaled = standardize(row, &self.means, &self.stds);
        sigmoid(self.bias + dot(&self.weights, &scaled))
    }

    /// Weights on the standardized scale, comparable across features.
    pub fn coefficients(&self) -> &[f64] {
        &self.weights
    }
}

/// Per-column mean and population standard deviation. A zero deviation is
/// replaced by 1 so standardizing never divides by zero.
pub(crate) fn column_moments(x: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>) {
    let width = x[0].len();
    (0..width)
        .map(|j| {
            let mean = x.iter().map(|row| row[j]).mean();
            let std = x.iter().map(|row| row[j]).population_std_dev();
            (mean, if std < 1e-12 { 1.0 } else { std })
        })
        .unzip()
}

pub(crate) fn standardize(row: &[f64], means: &[f64], stds: &[f64]) -> Vec<f64> {
    row.iter()
        .zip(means)
        .zip(stds)
        .map(|((v, m), s)| (v - m) / s)
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separable_data() {
        let x: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64, 5.0]).collect();
        let y: Vec<f64> = (0..30).map(|i| if i >= 15 { 1.0 } else { 0.0 }).collect();
        let model = LogisticRegression::fit(&x, &y, &LogisticParams::default()).unwrap();

        assert!(model.predict_proba(&[28.0, 5.0]) > 0.8);
        assert!(model.predict_proba(&[1.0, 5.0]) < 0.2);
        assert!(model.coefficients()[0] > 0.0);
        // constant column carries no signal
        assert_eq!(model.coefficients()[1], 0.0);
    }

    #[test]
    fn test_column_moments_guard_zero_variance() {
        let (means, stds) = column_moments(&[vec![1.0, 3.0], vec![3.0, 3.0]]);
        assert!((means[0] - 2.0).abs() < 1e-12);
        assert!((means[1] - 3.0).abs() < 1e-12);
        assert!((stds[0] - 1.0).abs() < 1e-12);
        assert_eq!(stds[1], 1.0);
    }
}
