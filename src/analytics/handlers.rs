use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::middleware::OrganizationContext;
use crate::core::shared::state::AppState;

use super::cohort::{BehavioralSegmentation, CohortAnalysis, CohortPeriod, LifecycleAnalysis};
use super::error::{AnalyticsError, AnalyticsResult};
use super::predictive::{ConversionModel, ConversionPrediction, RevenueForecast, RevenueModel};
use super::service::AnalyticsReport;
use super::statistics::{
    CorrelationMethod, CorrelationResult, DescriptiveStats, NormalityResult, OutlierMethod,
    OutlierResult, TrendAnalysis,
};

const DEFAULT_FORECAST_MONTHS: usize = 6;
const DEFAULT_COHORT_PERIODS: usize = 12;

fn parse_param<T>(raw: Option<&str>) -> AnalyticsResult<T>
where
    T: FromStr<Err = String> + Default,
{
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.parse().map_err(AnalyticsError::InvalidInput),
        None => Ok(T::default()),
    }
}

// ============================================================================
// Statistics
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuesRequest {
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationRequest {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub method: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierRequest {
    pub values: Vec<f64>,
    pub method: Option<String>,
    pub threshold: Option<f64>,
}

pub async fn handle_descriptive_stats(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ValuesRequest>,
) -> AnalyticsResult<Json<DescriptiveStats>> {
    Ok(Json(
        state
            .analytics
            .engine()
            .calculate_descriptive_stats(&req.values)?,
    ))
}

pub async fn handle_correlation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CorrelationRequest>,
) -> AnalyticsResult<Json<CorrelationResult>> {
    let method: CorrelationMethod = parse_param(req.method.as_deref())?;
    Ok(Json(
        state
            .analytics
            .engine()
            .calculate_correlation(&req.x, &req.y, method)?,
    ))
}

pub async fn handle_trend(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ValuesRequest>,
) -> AnalyticsResult<Json<TrendAnalysis>> {
    Ok(Json(state.analytics.engine().analyze_trend(&req.values)?))
}

pub async fn handle_outliers(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OutlierRequest>,
) -> AnalyticsResult<Json<OutlierResult>> {
    let method: OutlierMethod = parse_param(req.method.as_deref())?;
    Ok(Json(state.analytics.engine().detect_outliers(
        &req.values,
        method,
        req.threshold,
    )?))
}

pub async fn handle_normality(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ValuesRequest>,
) -> AnalyticsResult<Json<NormalityResult>> {
    Ok(Json(
        state
            .analytics
            .engine()
            .perform_normality_test(&req.values)?,
    ))
}

// ============================================================================
// Predictive
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelQuery {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForecastQuery {
    pub months: Option<usize>,
    pub model: Option<String>,
}

pub async fn handle_predict_conversion(
    State(state): State<Arc<AppState>>,
    org: OrganizationContext,
    Path(lead_id): Path<Uuid>,
    Query(query): Query<ModelQuery>,
) -> AnalyticsResult<Json<ConversionPrediction>> {
    let model: ConversionModel = parse_param(query.model.as_deref())?;
    let prediction = state
        .analytics
        .predict_lead_conversion(org.organization_id, lead_id, model)
        .await?;
    Ok(Json(prediction))
}

pub async fn handle_forecast_revenue(
    State(state): State<Arc<AppState>>,
    org: OrganizationContext,
    Query(query): Query<ForecastQuery>,
) -> AnalyticsResult<Json<RevenueForecast>> {
    let model: RevenueModel = parse_param(query.model.as_deref())?;
    let months = query.months.unwrap_or(DEFAULT_FORECAST_MONTHS);
    let forecast = state
        .analytics
        .forecast_revenue(org.organization_id, months, model)
        .await?;
    Ok(Json(forecast))
}

// ============================================================================
// Cohorts and segments
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CohortQuery {
    pub period: Option<String>,
    pub periods: Option<usize>,
}

pub async fn handle_cohorts(
    State(state): State<Arc<AppState>>,
    org: OrganizationContext,
    Query(query): Query<CohortQuery>,
) -> AnalyticsResult<Json<CohortAnalysis>> {
    let period: CohortPeriod = parse_param(query.period.as_deref())?;
    let periods = query.periods.unwrap_or(DEFAULT_COHORT_PERIODS);
    Ok(Json(
        state
            .analytics
            .analyze_cohorts(org.organization_id, period, periods)
            .await?,
    ))
}

pub async fn handle_lifecycle(
    State(state): State<Arc<AppState>>,
    org: OrganizationContext,
) -> AnalyticsResult<Json<LifecycleAnalysis>> {
    Ok(Json(state.analytics.lifecycle(org.organization_id).await?))
}

pub async fn handle_segments(
    State(state): State<Arc<AppState>>,
    org: OrganizationContext,
) -> AnalyticsResult<Json<BehavioralSegmentation>> {
    Ok(Json(
        state.analytics.segmentation(org.organization_id).await?,
    ))
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    pub parallel: Option<bool>,
}

pub async fn handle_report(
    State(state): State<Arc<AppState>>,
    org: OrganizationContext,
    Query(query): Query<ReportQuery>,
) -> AnalyticsResult<Json<AnalyticsReport>> {
    let parallel = query.parallel.unwrap_or(true);
    Ok(Json(
        state
            .analytics
            .generate_report(org.organization_id, parallel)
            .await?,
    ))
}
