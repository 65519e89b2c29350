mod common;

use std::sync::Arc;

use leadserver::analytics::cohort::CohortPeriod;
use leadserver::analytics::predictive::{ConversionModel, RevenueModel};
use leadserver::analytics::{AdvancedAnalyticsService, AnalyticsError};
use leadserver::core::shared::enums::{LeadSource, LeadStatus};
use leadserver::leads::LeadStore;
use uuid::Uuid;

use common::{days_ago, lead, seed_pipeline, store_with_org, test_config};

#[tokio::test]
async fn test_full_report_over_seeded_pipeline() {
    let (store, org) = store_with_org().await;
    seed_pipeline(&store, org).await;
    let service = AdvancedAnalyticsService::new(store, test_config().analytics);

    let report = service.generate_report(org, true).await.unwrap();

    assert!(report.section_errors.is_empty(), "{:?}", report.section_errors);
    assert_eq!(report.organization_id, org);

    let stats = report.lead_statistics.unwrap();
    assert_eq!(stats.total_leads, 40);
    assert!(stats.score_statistics.is_some());

    let metrics = report.advanced_metrics.unwrap();
    assert_eq!(metrics.won_leads, 20);
    assert_eq!(metrics.lost_leads, 10);
    assert_eq!(metrics.open_leads, 10);
    assert!((metrics.win_rate.unwrap() - 2.0 / 3.0).abs() < 1e-9);
    // Ten open leads at 2,500.00 each.
    assert!((metrics.pipeline_value - 25_000.0).abs() < 1e-9);

    let trend = report.score_trend.unwrap();
    assert_eq!(trend.days.len(), 4);
    assert!(trend.trend.slope > 0.0);

    let cohorts = report.cohort_summary.unwrap();
    assert_eq!(cohorts.periods_to_track, 6);
    assert!(!cohorts.cohorts.is_empty());

    let lifecycle = report.lifecycle.unwrap();
    assert_eq!(lifecycle.total_leads, 40);

    let segments = report.segmentation.unwrap();
    let counted: usize = segments.segments.iter().map(|s| s.lead_count).sum();
    assert_eq!(counted, 40);
}

#[tokio::test]
async fn test_sequential_report_matches_parallel() {
    let (store, org) = store_with_org().await;
    seed_pipeline(&store, org).await;
    let service = AdvancedAnalyticsService::new(store, test_config().analytics);

    let parallel = service.generate_report(org, true).await.unwrap();
    let sequential = service.generate_report(org, false).await.unwrap();

    assert!(!sequential.parallel);
    assert_eq!(
        serde_json::to_value(&parallel.advanced_metrics).unwrap(),
        serde_json::to_value(&sequential.advanced_metrics).unwrap()
    );
    assert_eq!(
        serde_json::to_value(&parallel.score_trend).unwrap(),
        serde_json::to_value(&sequential.score_trend).unwrap()
    );
}

#[tokio::test]
async fn test_conversion_prediction_with_both_models() {
    let (store, org) = store_with_org().await;
    let open = seed_pipeline(&store, org).await;
    let service = AdvancedAnalyticsService::new(store, test_config().analytics);

    for model in [ConversionModel::RandomForest, ConversionModel::LogisticRegression] {
        let prediction = service
            .predict_lead_conversion(org, open[0].id, model)
            .await
            .unwrap();

        assert_eq!(prediction.lead_id, open[0].id);
        assert_eq!(prediction.model_type, model);
        assert!((0.0..=1.0).contains(&prediction.conversion_probability));
        assert_eq!(prediction.predicted_conversion, prediction.conversion_probability >= 0.5);
        // 30 closed leads, 20% held out.
        assert_eq!(prediction.training_samples, 24);
        assert!((0.0..=1.0).contains(&prediction.model_accuracy));

        let total: f64 = prediction.feature_importances.iter().map(|f| f.importance).sum();
        assert!((total - 1.0).abs() < 1e-6 || total == 0.0);
        assert!(!prediction.recommendations.is_empty());
    }
}

#[tokio::test]
async fn test_revenue_forecast_from_monthly_history() {
    let (store, org) = store_with_org().await;
    for k in 0..18i64 {
        let closed = days_ago(30 * k + 3);
        store
            .create_lead(lead(
                org,
                LeadStatus::ClosedWon,
                LeadSource::Website,
                Some(1_000_000 + (18 - k) * 50_000),
                closed - chrono::Duration::days(25),
                closed,
            ))
            .await
            .unwrap();
    }
    let service = AdvancedAnalyticsService::new(store, test_config().analytics);

    for model in [RevenueModel::RandomForest, RevenueModel::Linear] {
        let forecast = service.forecast_revenue(org, 3, model).await.unwrap();
        assert_eq!(forecast.forecasts.len(), 3);
        assert!(forecast.historical_months >= 17);
        for month in &forecast.forecasts {
            assert!(month.predicted_revenue >= 0.0);
            assert!(month.lower_bound <= month.predicted_revenue);
            assert!(month.upper_bound >= month.predicted_revenue);
        }
        let total: f64 = forecast.forecasts.iter().map(|f| f.predicted_revenue).sum();
        assert!((forecast.total_forecast - total).abs() < 1e-6);
    }

    let err = service
        .forecast_revenue(org, 0, RevenueModel::Linear)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyticsError::InvalidInput(_)));
}

#[tokio::test]
async fn test_forecast_without_history_is_insufficient() {
    let (store, org) = store_with_org().await;
    let service = AdvancedAnalyticsService::new(store, test_config().analytics);
    let err = service
        .forecast_revenue(org, 6, RevenueModel::RandomForest)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyticsError::InsufficientData(_)));
}

#[tokio::test]
async fn test_analytics_are_tenant_scoped() {
    let (store, org) = store_with_org().await;
    let open = seed_pipeline(&store, org).await;
    let store: Arc<dyn LeadStore> = store;
    let service = AdvancedAnalyticsService::new(Arc::clone(&store), test_config().analytics);

    let stranger = Uuid::new_v4();
    let report = service.generate_report(stranger, true).await.unwrap();
    assert_eq!(report.lead_statistics.unwrap().total_leads, 0);

    let err = service
        .predict_lead_conversion(stranger, open[0].id, ConversionModel::RandomForest)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyticsError::NotFound(_)));

    let cohorts = service
        .analyze_cohorts(stranger, CohortPeriod::Week, 4)
        .await
        .unwrap();
    assert!(cohorts.cohorts.is_empty());
}
