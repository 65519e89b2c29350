//! Predictive Analytics
//!
//! Lead-conversion prediction and monthly revenue forecasting. Models are
//! trained from the organization snapshot on every call and never persisted.

pub mod features;
pub mod forest;
pub mod linear;
pub mod logistic;

use chrono::{DateTime, Datelike, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use uuid::Uuid;

use crate::analytics::dataset::OrgDataset;
use crate::analytics::error::{AnalyticsError, AnalyticsResult};
use crate::analytics::statistics::mean;
use crate::core::config::AnalyticsConfig;

use features::{idx, FeatureExtractor, FEATURE_NAMES};
use forest::{normalize, ForestParams, RandomForest};
use linear::LinearRegression;
use logistic::{LogisticParams, LogisticRegression};

pub const MAX_FORECAST_MONTHS: usize = 24;
const TEST_FRACTION: f64 = 0.2;
const REVENUE_LAGS: usize = 3;
const MIN_DAYS_TO_CONVERSION: i64 = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionModel {
    #[default]
    RandomForest,
    LogisticRegression,
}

impl std::str::FromStr for ConversionModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random_forest" | "rf" => Ok(Self::RandomForest),
            "logistic_regression" | "logistic" => Ok(Self::LogisticRegression),
            _ => Err(format!("Unknown conversion model: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenueModel {
    #[default]
    RandomForest,
    Linear,
}

impl std::str::FromStr for RevenueModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random_forest" | "rf" => Ok(Self::RandomForest),
            "linear" | "linear_regression" => Ok(Self::Linear),
            _ => Err(format!("Unknown revenue model: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_probability(p: f64) -> Self {
        let distance = (p - 0.5).abs();
        if distance >= 0.3 {
            Self::High
        } else if distance >= 0.15 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionPrediction {
    pub lead_id: Uuid,
    pub conversion_probability: f64,
    pub predicted_conversion: bool,
    pub confidence: ConfidenceLevel,
    pub model_type: ConversionModel,
    pub training_samples: usize,
    pub model_accuracy: f64,
    pub feature_importances: Vec<FeatureImportance>,
    pub recommendations: Vec<String>,
    pub estimated_conversion_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyForecast {
    /// `YYYY-MM`
    pub month: String,
    pub predicted_revenue: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueForecast {
    pub model_type: RevenueModel,
    pub months_ahead: usize,
    pub forecasts: Vec<MonthlyForecast>,
    pub total_forecast: f64,
    pub model_r_squared: f64,
    pub rmse: f64,
    pub historical_months: usize,
    pub historical_monthly_average: f64,
    pub growth_rate: Option<f64>,
}

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// Converts cents to major currency units.
pub(crate) fn money(cents: i64) -> f64 {
    cents as f64 / 100.0
}

enum Classifier {
    Forest(RandomForest),
    Logistic(LogisticRegression),
}

impl Classifier {
    fn predict(&self, row: &[f64]) -> f64 {
        match self {
            Self::Forest(m) => m.predict(row),
            Self::Logistic(m) => m.predict_proba(row),
        }
    }

    fn importances(&self) -> Vec<f64> {
        match self {
            Self::Forest(m) => m.feature_importances(),
            Self::Logistic(m) => normalize(m.coefficients().iter().map(|w| w.abs()).collect()),
        }
    }
}

enum Regressor {
    Forest(RandomForest),
    Linear(LinearRegression),
}

impl Regressor {
    fn predict(&self, row: &[f64]) -> f64 {
        match self {
            Self::Forest(m) => m.predict(row),
            Self::Linear(m) => m.predict(row),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PredictiveAnalytics {
    config: AnalyticsConfig,
}

impl PredictiveAnalytics {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self { config }
    }

    pub fn predict_lead_conversion(
        &self,
        dataset: &OrgDataset,
        lead_id: Uuid,
        model_type: ConversionModel,
        now: DateTime<Utc>,
    ) -> AnalyticsResult<ConversionPrediction> {
        let target = dataset
            .lead(lead_id)
            .ok_or_else(|| AnalyticsError::NotFound(format!("Lead {lead_id} not found")))?;

        let extractor = FeatureExtractor::new(dataset, now);
        let training: Vec<_> = dataset
            .leads
            .iter()
            .filter(|l| l.is_closed() && l.id != lead_id)
            .collect();

        if training.len() < self.config.min_training_leads {
            return Err(AnalyticsError::InsufficientData(format!(
                "Conversion model needs at least {} closed leads, found {}",
                self.config.min_training_leads,
                training.len()
            )));
        }

        let x: Vec<Vec<f64>> = training.iter().map(|l| extractor.extract(l)).collect();
        let y: Vec<f64> = training
            .iter()
            .map(|l| if l.is_won() { 1.0 } else { 0.0 })
            .collect();

        let positives = y.iter().filter(|&&v| v > 0.5).count();
        if positives == 0 || positives == y.len() {
            return Err(AnalyticsError::InsufficientData(
                "Conversion model needs both won and lost leads".to_string(),
            ));
        }

        let (train_idx, test_idx) = split_indices(x.len(), self.config.random_seed);
        let x_train: Vec<Vec<f64>> = train_idx.iter().map(|&i| x[i].clone()).collect();
        let y_train: Vec<f64> = train_idx.iter().map(|&i| y[i]).collect();

        log::debug!(
            "Training {:?} on {} leads ({} held out) for organization {}",
            model_type,
            x_train.len(),
            test_idx.len(),
            dataset.organization_id
        );

        let model = match model_type {
            ConversionModel::RandomForest => Classifier::Forest(RandomForest::fit(
                &x_train,
                &y_train,
                &ForestParams::classifier(
                    self.config.forest_trees,
                    self.config.forest_max_depth,
                    self.config.random_seed,
                ),
            )?),
            ConversionModel::LogisticRegression => Classifier::Logistic(LogisticRegression::fit(
                &x_train,
                &y_train,
                &LogisticParams::default(),
            )?),
        };

        let correct = test_idx
            .iter()
            .filter(|&&i| (model.predict(&x[i]) >= 0.5) == (y[i] > 0.5))
            .count();
        let model_accuracy = correct as f64 / test_idx.len() as f64;

        let target_row = extractor.extract(target);
        let probability = model.predict(&target_row).clamp(0.0, 1.0);

        let mut feature_importances: Vec<FeatureImportance> = FEATURE_NAMES
            .iter()
            .zip(model.importances())
            .map(|(name, importance)| FeatureImportance {
                feature: name.to_string(),
                importance,
            })
            .collect();
        feature_importances.sort_by(|a, b| b.importance.total_cmp(&a.importance));

        let estimated_conversion_date = (probability >= 0.3).then(|| {
            let cycles: Vec<f64> = training
                .iter()
                .filter(|l| l.is_won())
                .map(|l| (l.updated_at - l.created_at).num_seconds() as f64 / 86_400.0)
                .collect();
            let avg_cycle = mean(&cycles);
            let remaining = (avg_cycle - target_row[idx::LEAD_AGE_DAYS]).round() as i64;
            now + Duration::days(remaining.max(MIN_DAYS_TO_CONVERSION))
        });

        Ok(ConversionPrediction {
            lead_id,
            conversion_probability: probability,
            predicted_conversion: probability >= 0.5,
            confidence: ConfidenceLevel::from_probability(probability),
            model_type,
            training_samples: x_train.len(),
            model_accuracy,
            feature_importances,
            recommendations: recommendations(&target_row, probability),
            estimated_conversion_date,
        })
    }

    /// Months of history a forecast needs: the configured minimum, but never
    /// fewer than the lag window plus two training rows.
    pub fn required_revenue_months(&self) -> usize {
        self.config.min_revenue_months.max(REVENUE_LAGS + 2)
    }

    pub fn forecast_revenue(
        &self,
        dataset: &OrgDataset,
        months_ahead: usize,
        model_type: RevenueModel,
    ) -> AnalyticsResult<RevenueForecast> {
        if !(1..=MAX_FORECAST_MONTHS).contains(&months_ahead) {
            return Err(AnalyticsError::InvalidInput(format!(
                "months_ahead must be between 1 and {MAX_FORECAST_MONTHS}, got {months_ahead}"
            )));
        }

        let (months, revenue) = monthly_revenue(dataset);
        let required = self.required_revenue_months();
        if revenue.len() < required {
            return Err(AnalyticsError::InsufficientData(format!(
                "Revenue forecast needs at least {required} months of history, found {}",
                revenue.len()
            )));
        }

        let mut x = Vec::with_capacity(revenue.len() - REVENUE_LAGS);
        let mut y = Vec::with_capacity(revenue.len() - REVENUE_LAGS);
        for t in REVENUE_LAGS..revenue.len() {
            x.push(revenue_features(t, months[t], &revenue));
            y.push(revenue[t]);
        }

        let model = match model_type {
            RevenueModel::RandomForest => Regressor::Forest(RandomForest::fit(
                &x,
                &y,
                &ForestParams::regressor(
                    self.config.forest_trees,
                    self.config.forest_max_depth,
                    self.config.random_seed,
                ),
            )?),
            RevenueModel::Linear => Regressor::Linear(LinearRegression::fit(&x, &y)?),
        };

        let fitted: Vec<f64> = x.iter().map(|row| model.predict(row)).collect();
        let y_mean = mean(&y);
        let ss_res: f64 = fitted.iter().zip(&y).map(|(f, a)| (a - f).powi(2)).sum();
        let ss_tot: f64 = y.iter().map(|a| (a - y_mean).powi(2)).sum();
        let rmse = (ss_res / y.len() as f64).sqrt();
        let model_r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        let mut series = revenue.clone();
        let mut month = months[months.len() - 1];
        let mut forecasts = Vec::with_capacity(months_ahead);
        for _ in 0..months_ahead {
            month = month.next();
            let t = series.len();
            let predicted = model.predict(&revenue_features(t, month, &series)).max(0.0);
            series.push(predicted);
            forecasts.push(MonthlyForecast {
                month: month.label(),
                predicted_revenue: predicted,
                lower_bound: (predicted - 1.96 * rmse).max(0.0),
                upper_bound: predicted + 1.96 * rmse,
            });
        }

        let total_forecast = forecasts.iter().map(|f| f.predicted_revenue).sum();
        let historical_monthly_average = mean(&revenue);

        Ok(RevenueForecast {
            model_type,
            months_ahead,
            forecasts,
            total_forecast,
            model_r_squared,
            rmse,
            historical_months: revenue.len(),
            historical_monthly_average,
            growth_rate: growth_rate(&revenue),
        })
    }
}

/// Seeded shuffle split into `(train, test)` index sets.
fn split_indices(n: usize, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let max_test = n.saturating_sub(1).max(1);
    let test_len = ((n as f64 * TEST_FRACTION).round() as usize).clamp(1, max_test);
    let test = indices.split_off(n - test_len);
    (indices, test)
}

fn recommendations(row: &[f64], probability: f64) -> Vec<String> {
    let mut out = Vec::new();

    if row[idx::TOTAL_COMMUNICATIONS] == 0.0 {
        out.push("No communication logged yet: make first contact".to_string());
    } else if row[idx::RESPONSE_RATE] < 0.2 {
        out.push("Low response rate: try a different channel or timing".to_string());
    }
    if row[idx::MEETING_COUNT] == 0.0 && probability >= 0.5 {
        out.push("Schedule a meeting to move the deal forward".to_string());
    }
    if row[idx::PROFILE_COMPLETENESS] < 0.5 {
        out.push("Complete the lead profile to improve qualification".to_string());
    }
    if row[idx::SCORE_TREND] < 0.0 {
        out.push("Lead score is declining: re-engage with fresh content".to_string());
    }
    if probability >= 0.7 {
        out.push("High conversion likelihood: prioritize and prepare a proposal".to_string());
    } else if probability < 0.3 {
        out.push("Low conversion likelihood: move to a nurturing sequence".to_string());
    }

    out
}

/// Won revenue per calendar month of close, gap months filled with zero.
fn monthly_revenue(dataset: &OrgDataset) -> (Vec<YearMonth>, Vec<f64>) {
    let mut by_month: BTreeMap<YearMonth, f64> = BTreeMap::new();
    for lead in dataset.leads.iter().filter(|l| l.is_won()) {
        if let (Some(value), Some(closed)) = (lead.value, lead.closed_at()) {
            *by_month.entry(YearMonth::of(closed)).or_insert(0.0) += money(value);
        }
    }

    let (Some(&first), Some(&last)) = (by_month.keys().next(), by_month.keys().next_back()) else {
        return (Vec::new(), Vec::new());
    };

    let mut months = Vec::new();
    let mut revenue = Vec::new();
    let mut current = first;
    while current <= last {
        months.push(current);
        revenue.push(by_month.get(&current).copied().unwrap_or(0.0));
        current = current.next();
    }
    (months, revenue)
}

fn revenue_features(t: usize, month: YearMonth, series: &[f64]) -> Vec<f64> {
    let angle = 2.0 * PI * month.month as f64 / 12.0;
    vec![
        t as f64,
        angle.sin(),
        angle.cos(),
        series[t - 1],
        series[t - 2],
        series[t - 3],
    ]
}

fn growth_rate(revenue: &[f64]) -> Option<f64> {
    if revenue.len() < 6 {
        return None;
    }
    let n = revenue.len();
    let recent = mean(&revenue[n - 3..]);
    let previous = mean(&revenue[n - 6..n - 3]);
    (previous.abs() > f64::EPSILON).then(|| (recent - previous) / previous * 100.0)
}
