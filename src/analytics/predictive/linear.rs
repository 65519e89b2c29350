use super::forest::validate_matrix;
use super::logistic::{column_moments, standardize};
use crate::analytics::error::{AnalyticsError, AnalyticsResult};

const RIDGE_EPSILON: f64 = 1e-6;

/// Ordinary least squares solved through the normal equations on standardized
/// features, with a small ridge term keeping `XᵀX` invertible.
#[derive(Debug, Clone)]
pub struct LinearRegression {
    intercept: f64,
    weights: Vec<f64>,
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl LinearRegression {
    pub fn fit(x: &[Vec<f64>], y: &[f64]) -> AnalyticsResult<Self> {
        validate_matrix(x, y)?;

        let (means, stds) = column_moments(x);
        let width = x[0].len() + 1;

        let mut xtx = vec![vec![0.0; width]; width];
        let mut xty = vec![0.0; width];
        for (row, &target) in x.iter().zip(y) {
            let mut design = Vec::with_capacity(width);
            design.push(1.0);
            design.extend(standardize(row, &means, &stds));

            for i in 0..width {
                xty[i] += design[i] * target;
                for j in 0..width {
                    xtx[i][j] += design[i] * design[j];
                }
            }
        }
        for (i, r) in xtx.iter_mut().enumerate().skip(1) {
            r[i] += RIDGE_EPSILON;
        }

        let beta = solve(xtx, xty)?;

        Ok(Self {
            intercept: beta[0],
            weights: beta[1..].to_vec(),
            means,
            stds,
        })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let scaled = standardize(row, &self.means, &self.stds);
        self.intercept + self.weights.iter().zip(&scaled).map(|(w, v)| w * v).sum::<f64>()
    }
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> AnalyticsResult<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(AnalyticsError::Internal(
                "Regression system is singular".to_string(),
            ));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::test_utils::assert_close;

    #[test]
    fn test_recovers_exact_plane() {
        let x: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![i as f64, ((i * 3) % 7) as f64])
            .collect();
        let y: Vec<f64> = x.iter().map(|r| 4.0 + 2.0 * r[0] - 3.0 * r[1]).collect();
        let model = LinearRegression::fit(&x, &y).unwrap();
        assert_close(model.predict(&[10.0, 2.0]), 4.0 + 20.0 - 6.0, 1e-3);
        assert_close(model.predict(&[30.0, 0.0]), 64.0, 1e-3);
    }

    #[test]
    fn test_constant_feature_is_tolerated() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, 1.0]).collect();
        let y: Vec<f64> = (0..10).map(|i| 1.5 * i as f64).collect();
        let model = LinearRegression::fit(&x, &y).unwrap();
        assert_close(model.predict(&[4.0, 1.0]), 6.0, 1e-3);
    }

    #[test]
    fn test_solve_small_system() {
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let x = solve(a, vec![5.0, 10.0]).unwrap();
        assert_close(x[0], 1.0, 1e-12);
        assert_close(x[1], 3.0, 1e-12);
    }
}
