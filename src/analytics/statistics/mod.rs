//! Statistical Engine
//!
//! Descriptive statistics, correlation with significance testing, linear trend
//! detection, outlier detection and normality testing over numeric series.
//! Every function is pure; callers own data loading.

mod shapiro;

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};
use statrs::statistics::Statistics;
use std::collections::HashMap;

use crate::analytics::error::{AnalyticsError, AnalyticsResult};

pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;
const PROJECTION_STEPS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub mode: Option<f64>,
    pub std_dev: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub coefficient_of_variation: Option<f64>,
    pub standard_error: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    Spearman,
}

impl std::str::FromStr for CorrelationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pearson" => Ok(Self::Pearson),
            "spearman" => Ok(Self::Spearman),
            _ => Err(format!("Unknown correlation method: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    Negligible,
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl CorrelationStrength {
    pub fn from_coefficient(r: f64) -> Self {
        let r = r.abs();
        if r < 0.1 {
            Self::Negligible
        } else if r < 0.3 {
            Self::Weak
        } else if r < 0.5 {
            Self::Moderate
        } else if r < 0.7 {
            Self::Strong
        } else {
            Self::VeryStrong
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationDirection {
    Positive,
    Negative,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub level: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub method: CorrelationMethod,
    pub coefficient: f64,
    pub p_value: f64,
    pub significant: bool,
    pub strength: CorrelationStrength,
    pub direction: CorrelationDirection,
    pub confidence_interval: Option<ConfidenceInterval>,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    StronglyIncreasing,
    Increasing,
    WeaklyIncreasing,
    Stable,
    WeaklyDecreasing,
    Decreasing,
    StronglyDecreasing,
}

impl TrendDirection {
    pub fn classify(slope: f64, r_squared: f64) -> Self {
        if r_squared < 0.1 || slope.abs() < f64::EPSILON {
            return Self::Stable;
        }
        let increasing = slope > 0.0;
        match (increasing, r_squared) {
            (true, r) if r >= 0.7 => Self::StronglyIncreasing,
            (true, r) if r >= 0.4 => Self::Increasing,
            (true, _) => Self::WeaklyIncreasing,
            (false, r) if r >= 0.7 => Self::StronglyDecreasing,
            (false, r) if r >= 0.4 => Self::Decreasing,
            (false, _) => Self::WeaklyDecreasing,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub direction: TrendDirection,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub p_value: f64,
    pub std_error: f64,
    pub percent_change: Option<f64>,
    pub projection: Vec<f64>,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    #[default]
    Iqr,
    ZScore,
}

impl std::str::FromStr for OutlierMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "iqr" => Ok(Self::Iqr),
            "z_score" | "zscore" => Ok(Self::ZScore),
            _ => Err(format!("Unknown outlier method: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierResult {
    pub method: OutlierMethod,
    pub threshold: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub outlier_indices: Vec<usize>,
    pub outlier_values: Vec<f64>,
    pub outlier_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalityResult {
    pub test: String,
    pub statistic: f64,
    pub p_value: f64,
    pub is_normal: bool,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct StatisticalEngine {
    significance_level: f64,
}

impl Default for StatisticalEngine {
    fn default() -> Self {
        Self::new(0.05)
    }
}

impl StatisticalEngine {
    pub fn new(significance_level: f64) -> Self {
        Self { significance_level }
    }

    pub fn significance_level(&self) -> f64 {
        self.significance_level
    }

    pub fn calculate_descriptive_stats(&self, values: &[f64]) -> AnalyticsResult<DescriptiveStats> {
        require_len(values, 2, "descriptive statistics")?;
        require_finite(values, "values")?;

        let n = values.len() as f64;
        let sorted = sorted_copy(values);
        let mean = mean(values);
        let variance = sample_variance(values);
        let std_dev = sample_std_dev(values);
        let q1 = quantile(&sorted, 0.25);
        let q3 = quantile(&sorted, 0.75);
        let min = sorted[0];
        let max = sorted[sorted.len() - 1];

        Ok(DescriptiveStats {
            count: values.len(),
            mean,
            median: quantile(&sorted, 0.5),
            mode: mode(values),
            std_dev,
            variance,
            min,
            max,
            range: max - min,
            q1,
            q3,
            iqr: q3 - q1,
            skewness: skewness(values, mean),
            kurtosis: excess_kurtosis(values, mean),
            coefficient_of_variation: (mean.abs() > f64::EPSILON).then(|| std_dev / mean.abs()),
            standard_error: std_dev / n.sqrt(),
        })
    }

    pub fn calculate_correlation(
        &self,
        x: &[f64],
        y: &[f64],
        method: CorrelationMethod,
    ) -> AnalyticsResult<CorrelationResult> {
        if x.len() != y.len() {
            return Err(AnalyticsError::InvalidInput(format!(
                "Series must have equal length ({} vs {})",
                x.len(),
                y.len()
            )));
        }
        require_len(x, 3, "correlation")?;
        require_finite(x, "x")?;
        require_finite(y, "y")?;

        let (a, b) = match method {
            CorrelationMethod::Pearson => (x.to_vec(), y.to_vec()),
            CorrelationMethod::Spearman => (average_ranks(x), average_ranks(y)),
        };
        let r = pearson(&a, &b)?;
        let n = x.len();
        let p_value = correlation_p_value(r, n)?;

        let direction = if r > 0.0 {
            CorrelationDirection::Positive
        } else if r < 0.0 {
            CorrelationDirection::Negative
        } else {
            CorrelationDirection::None
        };

        Ok(CorrelationResult {
            method,
            coefficient: r,
            p_value,
            significant: p_value < self.significance_level,
            strength: CorrelationStrength::from_coefficient(r),
            direction,
            confidence_interval: fisher_interval(r, n, 0.95)?,
            sample_size: n,
        })
    }

    pub fn analyze_trend(&self, values: &[f64]) -> AnalyticsResult<TrendAnalysis> {
        require_len(values, 3, "trend analysis")?;
        require_finite(values, "values")?;

        let fit = LinearFit::from_series(values);
        let n = values.len();

        let first_fitted = fit.intercept;
        let last_fitted = fit.intercept + fit.slope * (n - 1) as f64;
        let percent_change = (first_fitted.abs() > f64::EPSILON)
            .then(|| (last_fitted - first_fitted) / first_fitted.abs() * 100.0);

        let projection = (0..PROJECTION_STEPS)
            .map(|k| fit.intercept + fit.slope * (n + k) as f64)
            .collect();

        let p_value = if fit.std_error > 0.0 {
            two_sided_t_p_value(fit.slope / fit.std_error, (n - 2) as f64)?
        } else if fit.slope.abs() < f64::EPSILON {
            1.0
        } else {
            0.0
        };

        Ok(TrendAnalysis {
            direction: TrendDirection::classify(fit.slope, fit.r_squared),
            slope: fit.slope,
            intercept: fit.intercept,
            r_squared: fit.r_squared,
            p_value,
            std_error: fit.std_error,
            percent_change,
            projection,
            sample_size: n,
        })
    }

    pub fn detect_outliers(
        &self,
        values: &[f64],
        method: OutlierMethod,
        threshold: Option<f64>,
    ) -> AnalyticsResult<OutlierResult> {
        require_len(values, 4, "outlier detection")?;
        require_finite(values, "values")?;

        let threshold = threshold.unwrap_or(match method {
            OutlierMethod::Iqr => DEFAULT_IQR_MULTIPLIER,
            OutlierMethod::ZScore => DEFAULT_Z_THRESHOLD,
        });
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(AnalyticsError::InvalidInput(format!(
                "Outlier threshold must be positive, got {threshold}"
            )));
        }

        let (lower_bound, upper_bound) = match method {
            OutlierMethod::Iqr => {
                let sorted = sorted_copy(values);
                let q1 = quantile(&sorted, 0.25);
                let q3 = quantile(&sorted, 0.75);
                let iqr = q3 - q1;
                (q1 - threshold * iqr, q3 + threshold * iqr)
            }
            OutlierMethod::ZScore => {
                let m = mean(values);
                let sd = sample_std_dev(values);
                (m - threshold * sd, m + threshold * sd)
            }
        };

        let (outlier_indices, outlier_values): (Vec<usize>, Vec<f64>) = values
            .iter()
            .enumerate()
            .filter(|(_, &v)| v < lower_bound || v > upper_bound)
            .map(|(i, &v)| (i, v))
            .unzip();

        let outlier_percentage = outlier_indices.len() as f64 / values.len() as f64 * 100.0;

        Ok(OutlierResult {
            method,
            threshold,
            lower_bound,
            upper_bound,
            outlier_indices,
            outlier_values,
            outlier_percentage,
        })
    }

    pub fn perform_normality_test(&self, values: &[f64]) -> AnalyticsResult<NormalityResult> {
        require_len(values, 3, "normality test")?;
        require_finite(values, "values")?;
        if values.len() > shapiro::MAX_SAMPLE_SIZE {
            return Err(AnalyticsError::InvalidInput(format!(
                "Shapiro-Wilk supports at most {} observations, got {}",
                shapiro::MAX_SAMPLE_SIZE,
                values.len()
            )));
        }

        let (statistic, p_value) = shapiro::shapiro_wilk(values)?;

        Ok(NormalityResult {
            test: "shapiro_wilk".to_string(),
            statistic,
            p_value,
            is_normal: p_value > self.significance_level,
            sample_size: values.len(),
        })
    }
}

// ============================================================================
// Helpers shared with the predictive and cohort engines
// ============================================================================

/// Ordinary least squares of `values` against their index.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub std_error: f64,
}

impl LinearFit {
    pub fn from_series(values: &[f64]) -> Self {
        let n = values.len();
        let x_mean = (n as f64 - 1.0) / 2.0;
        let y_mean = mean(values);

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for (i, &y) in values.iter().enumerate() {
            let dx = i as f64 - x_mean;
            sxx += dx * dx;
            sxy += dx * (y - y_mean);
        }

        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        let intercept = y_mean - slope * x_mean;

        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        for (i, &y) in values.iter().enumerate() {
            let fitted = intercept + slope * i as f64;
            ss_res += (y - fitted).powi(2);
            ss_tot += (y - y_mean).powi(2);
        }

        let r_squared = if ss_tot > 0.0 {
            (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let std_error = if n > 2 && sxx > 0.0 {
            (ss_res / (n - 2) as f64 / sxx).sqrt()
        } else {
            0.0
        };

        Self {
            slope,
            intercept,
            r_squared,
            std_error,
        }
    }
}

/// Arithmetic mean, 0 for an empty slice.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.mean()
}

/// Unbiased sample variance, 0 below two observations.
fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.variance()
}

fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.std_dev()
}

pub(crate) fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Linear interpolation between closest ranks over a sorted slice.
pub(crate) fn quantile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
}

fn mode(values: &[f64]) -> Option<f64> {
    let mut counts: HashMap<u64, (f64, usize)> = HashMap::new();
    for &v in values {
        // normalize -0.0 so it counts with 0.0
        let v = if v == 0.0 { 0.0 } else { v };
        counts.entry(v.to_bits()).or_insert((v, 0)).1 += 1;
    }
    counts
        .into_values()
        .filter(|(_, c)| *c > 1)
        .max_by(|(va, ca), (vb, cb)| ca.cmp(cb).then_with(|| vb.total_cmp(va)))
        .map(|(v, _)| v)
}

fn central_moment(values: &[f64], mean: f64, order: i32) -> f64 {
    values.iter().map(|v| (v - mean).powi(order)).sum::<f64>() / values.len() as f64
}

/// Adjusted Fisher–Pearson standardized moment coefficient.
fn skewness(values: &[f64], mean: f64) -> f64 {
    let n = values.len() as f64;
    let m2 = central_moment(values, mean, 2);
    if values.len() < 3 || m2 <= f64::EPSILON {
        return 0.0;
    }
    let g1 = central_moment(values, mean, 3) / m2.powf(1.5);
    g1 * (n * (n - 1.0)).sqrt() / (n - 2.0)
}

/// Bias-corrected sample excess kurtosis.
fn excess_kurtosis(values: &[f64], mean: f64) -> f64 {
    let n = values.len() as f64;
    let m2 = central_moment(values, mean, 2);
    if values.len() < 4 || m2 <= f64::EPSILON {
        return 0.0;
    }
    let g2 = central_moment(values, mean, 4) / (m2 * m2) - 3.0;
    ((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0))
}

/// 1-based ranks with ties sharing their average rank.
pub(crate) fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}

pub(crate) fn pearson(x: &[f64], y: &[f64]) -> AnalyticsResult<f64> {
    let mx = mean(x);
    let my = mean(y);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if sxx <= f64::EPSILON || syy <= f64::EPSILON {
        return Err(AnalyticsError::InvalidInput(
            "Correlation is undefined for a constant series".to_string(),
        ));
    }
    Ok((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}

fn correlation_p_value(r: f64, n: usize) -> AnalyticsResult<f64> {
    if r.abs() >= 1.0 - 1e-12 {
        return Ok(0.0);
    }
    let df = (n - 2) as f64;
    let t = r * (df / (1.0 - r * r)).sqrt();
    two_sided_t_p_value(t, df)
}

pub(crate) fn two_sided_t_p_value(t: f64, df: f64) -> AnalyticsResult<f64> {
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| AnalyticsError::Internal(format!("Student's t distribution: {e}")))?;
    Ok((2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0))
}

pub(crate) fn standard_normal() -> AnalyticsResult<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| AnalyticsError::Internal(format!("Normal distribution: {e}")))
}

fn fisher_interval(r: f64, n: usize, level: f64) -> AnalyticsResult<Option<ConfidenceInterval>> {
    if n <= 3 {
        return Ok(None);
    }
    let z = r.clamp(-1.0 + 1e-12, 1.0 - 1e-12).atanh();
    let se = 1.0 / ((n - 3) as f64).sqrt();
    let critical = standard_normal()?.inverse_cdf(1.0 - (1.0 - level) / 2.0);
    Ok(Some(ConfidenceInterval {
        lower: (z - critical * se).tanh(),
        upper: (z + critical * se).tanh(),
        level,
    }))
}

fn require_len(values: &[f64], min: usize, what: &str) -> AnalyticsResult<()> {
    if values.len() < min {
        return Err(AnalyticsError::InsufficientData(format!(
            "{what} requires at least {min} data points, got {}",
            values.len()
        )));
    }
    Ok(())
}

fn require_finite(values: &[f64], name: &str) -> AnalyticsResult<()> {
    if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
        return Err(AnalyticsError::InvalidInput(format!(
            "{name}[{pos}] is not a finite number"
        )));
    }
    Ok(())
}
