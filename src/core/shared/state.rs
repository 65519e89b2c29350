use std::sync::Arc;

use crate::analytics::AdvancedAnalyticsService;
use crate::core::config::AppConfig;
use crate::leads::LeadStore;

/// Shared handles every route reaches through `State<Arc<AppState>>`.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn LeadStore>,
    pub analytics: Arc<AdvancedAnalyticsService>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn LeadStore>) -> Self {
        let analytics = Arc::new(AdvancedAnalyticsService::new(
            Arc::clone(&store),
            config.analytics.clone(),
        ));
        Self {
            config,
            store,
            analytics,
        }
    }
}
