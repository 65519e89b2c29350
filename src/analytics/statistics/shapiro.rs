//! Shapiro–Wilk W test using Royston's (1995) coefficient and p-value
//! approximations, valid for 3 to 5000 observations.

use statrs::distribution::ContinuousCDF;
use std::f64::consts::PI;

use super::{mean, sorted_copy, standard_normal};
use crate::analytics::error::{AnalyticsError, AnalyticsResult};

pub const MAX_SAMPLE_SIZE: usize = 5000;

const SMALL: f64 = 1e-19;

fn poly(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Returns `(W, p_value)`.
pub fn shapiro_wilk(values: &[f64]) -> AnalyticsResult<(f64, f64)> {
    let n = values.len();
    if !(3..=MAX_SAMPLE_SIZE).contains(&n) {
        return Err(AnalyticsError::InvalidInput(format!(
            "Shapiro-Wilk requires 3..={MAX_SAMPLE_SIZE} observations, got {n}"
        )));
    }

    let sorted = sorted_copy(values);
    let range = sorted[n - 1] - sorted[0];
    if range < SMALL {
        return Err(AnalyticsError::InvalidInput(
            "Normality test is undefined for a constant series".to_string(),
        ));
    }

    let normal = standard_normal()?;
    let a = coefficients(n, &normal);

    let m = mean(&sorted);
    let ssq: f64 = sorted.iter().map(|x| (x - m).powi(2)).sum();
    let numerator: f64 = a.iter().zip(&sorted).map(|(ai, xi)| ai * xi).sum();
    let w = (numerator * numerator / ssq).clamp(0.0, 1.0);

    Ok((w, p_value(w, n, &normal)))
}

fn coefficients(n: usize, normal: &statrs::distribution::Normal) -> Vec<f64> {
    if n == 3 {
        let h = 0.5f64.sqrt();
        return vec![-h, 0.0, h];
    }

    let nf = n as f64;
    let m: Vec<f64> = (1..=n)
        .map(|i| normal.inverse_cdf((i as f64 - 0.375) / (nf + 0.25)))
        .collect();
    let mm: f64 = m.iter().map(|v| v * v).sum();
    let u = 1.0 / nf.sqrt();

    let c_n = m[n - 1] / mm.sqrt();
    let a_n = c_n + poly(&[0.0, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056], u);

    let mut a = vec![0.0; n];
    if n > 5 {
        let c_n1 = m[n - 2] / mm.sqrt();
        let a_n1 = c_n1 + poly(&[0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633], u);
        let phi = (mm - 2.0 * m[n - 1].powi(2) - 2.0 * m[n - 2].powi(2))
            / (1.0 - 2.0 * a_n.powi(2) - 2.0 * a_n1.powi(2));
        let root = phi.sqrt();
        for i in 2..n - 2 {
            a[i] = m[i] / root;
        }
        a[1] = -a_n1;
        a[n - 2] = a_n1;
    } else {
        let phi = (mm - 2.0 * m[n - 1].powi(2)) / (1.0 - 2.0 * a_n.powi(2));
        let root = phi.sqrt();
        for i in 1..n - 1 {
            a[i] = m[i] / root;
        }
    }
    a[0] = -a_n;
    a[n - 1] = a_n;
    a
}

fn p_value(w: f64, n: usize, normal: &statrs::distribution::Normal) -> f64 {
    if (1.0 - w).abs() < 1e-12 {
        return 1.0;
    }
    let nf = n as f64;

    if n == 3 {
        let p = (6.0 / PI) * (w.sqrt().asin() - PI / 3.0);
        return p.clamp(0.0, 1.0);
    }

    let w1 = (1.0 - w).ln();
    let (y, mu, sigma) = if n <= 11 {
        let gamma = poly(&[-2.273, 0.459], nf);
        if w1 >= gamma {
            return 1e-99;
        }
        let y = -(gamma - w1).ln();
        let mu = poly(&[0.544, -0.39978, 0.025054, -0.0006714], nf);
        let sigma = poly(&[1.3822, -0.77857, 0.062767, -0.0020322], nf).exp();
        (y, mu, sigma)
    } else {
        let ln_n = nf.ln();
        let mu = poly(&[-1.5861, -0.31082, -0.083751, 0.0038915], ln_n);
        let sigma = poly(&[-0.4803, -0.082676, 0.0030302], ln_n).exp();
        (w1, mu, sigma)
    };

    (1.0 - normal.cdf((y - mu) / sigma)).clamp(0.0, 1.0)
}
