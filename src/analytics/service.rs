//! Tenant-scoped orchestration of the analytics engines.
//!
//! The organization dataset is loaded once per call and shared with the
//! engines, which run on the blocking pool since they are CPU bound.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::analytics::cohort::{
    analyze_cohorts, behavioral_segmentation, lifecycle_stage_analysis, BehavioralSegmentation,
    CohortAnalysis, CohortPeriod, LifecycleAnalysis,
};
use crate::analytics::dataset::OrgDataset;
use crate::analytics::error::AnalyticsResult;
use crate::analytics::metrics::{
    advanced_metrics, correlation_insights, lead_statistics, score_trend, AdvancedMetrics,
    CorrelationInsights, LeadStatistics, ScoreTrend,
};
use crate::analytics::predictive::{
    ConversionModel, ConversionPrediction, PredictiveAnalytics, RevenueForecast, RevenueModel,
};
use crate::analytics::statistics::StatisticalEngine;
use crate::core::config::AnalyticsConfig;
use crate::leads::LeadStore;

const REPORT_COHORT_PERIODS: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionError {
    pub section: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub organization_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub parallel: bool,
    pub elapsed_ms: u64,
    pub lead_statistics: Option<LeadStatistics>,
    pub score_trend: Option<ScoreTrend>,
    pub correlations: Option<CorrelationInsights>,
    pub lifecycle: Option<LifecycleAnalysis>,
    pub segmentation: Option<BehavioralSegmentation>,
    pub cohort_summary: Option<CohortAnalysis>,
    pub advanced_metrics: Option<AdvancedMetrics>,
    pub section_errors: Vec<SectionError>,
}

pub struct AdvancedAnalyticsService {
    store: Arc<dyn LeadStore>,
    engine: StatisticalEngine,
    predictive: PredictiveAnalytics,
}

type SectionResult<T> = Result<T, SectionError>;

async fn run_section<T, F>(section: &'static str, job: F) -> SectionResult<T>
where
    F: FnOnce() -> AnalyticsResult<T> + Send + 'static,
    T: Send + 'static,
{
    let started = Instant::now();
    let outcome = match tokio::task::spawn_blocking(job).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) => Err(format!("section task failed: {e}")),
    };
    debug!(
        "Report section {section} finished in {:?}",
        started.elapsed()
    );
    outcome.map_err(|message| {
        warn!("Report section {section} failed: {message}");
        SectionError {
            section: section.to_string(),
            message,
        }
    })
}

fn keep<T>(result: SectionResult<T>, errors: &mut Vec<SectionError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

impl AdvancedAnalyticsService {
    pub fn new(store: Arc<dyn LeadStore>, config: AnalyticsConfig) -> Self {
        Self {
            store,
            engine: StatisticalEngine::new(config.significance_level),
            predictive: PredictiveAnalytics::new(config),
        }
    }

    pub fn engine(&self) -> &StatisticalEngine {
        &self.engine
    }

    async fn dataset(&self, organization_id: Uuid) -> AnalyticsResult<Arc<OrgDataset>> {
        let dataset = self.store.load_dataset(organization_id).await?;
        Ok(Arc::new(dataset))
    }

    /// Builds every report section. Only a failure to load the dataset fails
    /// the whole report; section failures are collected in `section_errors`.
    pub async fn generate_report(
        &self,
        organization_id: Uuid,
        parallel: bool,
    ) -> AnalyticsResult<AnalyticsReport> {
        let started = Instant::now();
        let now = Utc::now();
        let dataset = self.dataset(organization_id).await?;
        let engine = self.engine;

        let statistics = {
            let ds = Arc::clone(&dataset);
            run_section("lead_statistics", move || Ok(lead_statistics(&engine, &ds)))
        };
        let trend = {
            let ds = Arc::clone(&dataset);
            run_section("score_trend", move || score_trend(&engine, &ds))
        };
        let correlations = {
            let ds = Arc::clone(&dataset);
            run_section("correlations", move || Ok(correlation_insights(&engine, &ds)))
        };
        let lifecycle = {
            let ds = Arc::clone(&dataset);
            run_section("lifecycle", move || Ok(lifecycle_stage_analysis(&ds, now)))
        };
        let segmentation = {
            let ds = Arc::clone(&dataset);
            run_section("segmentation", move || Ok(behavioral_segmentation(&ds)))
        };
        let cohorts = {
            let ds = Arc::clone(&dataset);
            run_section("cohort_summary", move || {
                analyze_cohorts(&ds, CohortPeriod::Month, REPORT_COHORT_PERIODS, now)
            })
        };
        let metrics = {
            let ds = Arc::clone(&dataset);
            run_section("advanced_metrics", move || Ok(advanced_metrics(&ds, now)))
        };

        let (statistics, trend, correlations, lifecycle, segmentation, cohorts, metrics) =
            if parallel {
                tokio::join!(
                    statistics,
                    trend,
                    correlations,
                    lifecycle,
                    segmentation,
                    cohorts,
                    metrics
                )
            } else {
                (
                    statistics.await,
                    trend.await,
                    correlations.await,
                    lifecycle.await,
                    segmentation.await,
                    cohorts.await,
                    metrics.await,
                )
            };

        let mut section_errors = Vec::new();
        let report = AnalyticsReport {
            organization_id,
            generated_at: now,
            parallel,
            elapsed_ms: 0,
            lead_statistics: keep(statistics, &mut section_errors),
            score_trend: keep(trend, &mut section_errors),
            correlations: keep(correlations, &mut section_errors),
            lifecycle: keep(lifecycle, &mut section_errors),
            segmentation: keep(segmentation, &mut section_errors),
            cohort_summary: keep(cohorts, &mut section_errors),
            advanced_metrics: keep(metrics, &mut section_errors),
            section_errors,
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            "Generated analytics report for organization {} in {}ms \
             ({} leads, parallel={}, {} section errors)",
            organization_id,
            elapsed_ms,
            dataset.leads.len(),
            parallel,
            report.section_errors.len()
        );

        Ok(AnalyticsReport {
            elapsed_ms,
            ..report
        })
    }

    pub async fn predict_lead_conversion(
        &self,
        organization_id: Uuid,
        lead_id: Uuid,
        model: ConversionModel,
    ) -> AnalyticsResult<ConversionPrediction> {
        let dataset = self.dataset(organization_id).await?;
        let predictive = self.predictive.clone();
        let prediction = tokio::task::spawn_blocking(move || {
            predictive.predict_lead_conversion(&dataset, lead_id, model, Utc::now())
        })
        .await??;
        info!(
            "Conversion prediction for lead {lead_id}: {:.3} ({:?})",
            prediction.conversion_probability, model
        );
        Ok(prediction)
    }

    pub async fn forecast_revenue(
        &self,
        organization_id: Uuid,
        months_ahead: usize,
        model: RevenueModel,
    ) -> AnalyticsResult<RevenueForecast> {
        let dataset = self.dataset(organization_id).await?;
        let predictive = self.predictive.clone();
        tokio::task::spawn_blocking(move || {
            predictive.forecast_revenue(&dataset, months_ahead, model)
        })
        .await?
    }

    pub async fn analyze_cohorts(
        &self,
        organization_id: Uuid,
        period: CohortPeriod,
        periods_to_track: usize,
    ) -> AnalyticsResult<CohortAnalysis> {
        let dataset = self.dataset(organization_id).await?;
        tokio::task::spawn_blocking(move || {
            analyze_cohorts(&dataset, period, periods_to_track, Utc::now())
        })
        .await?
    }

    pub async fn lifecycle(&self, organization_id: Uuid) -> AnalyticsResult<LifecycleAnalysis> {
        let dataset = self.dataset(organization_id).await?;
        let analysis =
            tokio::task::spawn_blocking(move || lifecycle_stage_analysis(&dataset, Utc::now()))
                .await?;
        Ok(analysis)
    }

    pub async fn segmentation(
        &self,
        organization_id: Uuid,
    ) -> AnalyticsResult<BehavioralSegmentation> {
        let dataset = self.dataset(organization_id).await?;
        let segmentation =
            tokio::task::spawn_blocking(move || behavioral_segmentation(&dataset)).await?;
        Ok(segmentation)
    }
}
