pub mod cohort;
pub mod dataset;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod predictive;
pub mod service;
pub mod statistics;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub use dataset::OrgDataset;
pub use error::{AnalyticsError, AnalyticsResult};
pub use handlers::*;
pub use predictive::PredictiveAnalytics;
pub use service::{AdvancedAnalyticsService, AnalyticsReport, SectionError};
pub use statistics::StatisticalEngine;

pub fn configure_analytics_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Stateless statistics over caller-supplied series
        .route(
            "/api/analytics/statistics/descriptive",
            post(handle_descriptive_stats),
        )
        .route(
            "/api/analytics/statistics/correlation",
            post(handle_correlation),
        )
        .route("/api/analytics/statistics/trend", post(handle_trend))
        .route("/api/analytics/statistics/outliers", post(handle_outliers))
        .route(
            "/api/analytics/statistics/normality",
            post(handle_normality),
        )
        // Tenant-scoped analytics
        .route(
            "/api/analytics/leads/:id/conversion",
            get(handle_predict_conversion),
        )
        .route(
            "/api/analytics/revenue/forecast",
            get(handle_forecast_revenue),
        )
        .route("/api/analytics/cohorts", get(handle_cohorts))
        .route("/api/analytics/lifecycle", get(handle_lifecycle))
        .route("/api/analytics/segments", get(handle_segments))
        .route("/api/analytics/report", get(handle_report))
}
