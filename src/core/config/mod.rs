use anyhow::{anyhow, Context};
use std::str::FromStr;

// Type alias for backward compatibility
pub type Config = AppConfig;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database_url: Option<String>,
    pub analytics: AnalyticsConfig,
    pub automation: AutomationConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Tuning for the statistical and predictive engines.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalyticsConfig {
    /// Closed leads required before a conversion model is trained.
    pub min_training_leads: usize,
    /// Historical months required before revenue is forecast.
    pub min_revenue_months: usize,
    pub forest_trees: usize,
    pub forest_max_depth: usize,
    pub random_seed: u64,
    pub significance_level: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            min_training_leads: 20,
            min_revenue_months: 30,
            forest_trees: 100,
            forest_max_depth: 8,
            random_seed: 42,
            significance_level: 0.05,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AutomationConfig {
    /// Cron expression for the lead rescoring job; `None` disables it.
    pub rescore_schedule: Option<String>,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            rescore_schedule: Some("0 0 * * * *".to_string()),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database_url: None,
            analytics: AnalyticsConfig::default(),
            automation: AutomationConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup so it can be
    /// exercised without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();
        let analytics_defaults = AnalyticsConfig::default();

        let server = ServerConfig {
            host: lookup("LEADSERVER_HOST").unwrap_or(defaults.server.host),
            port: parse_or(&lookup, "LEADSERVER_PORT", defaults.server.port)?,
        };

        let analytics = AnalyticsConfig {
            min_training_leads: parse_or(
                &lookup,
                "LEADSERVER_MIN_TRAINING_LEADS",
                analytics_defaults.min_training_leads,
            )?,
            min_revenue_months: parse_or(
                &lookup,
                "LEADSERVER_MIN_REVENUE_MONTHS",
                analytics_defaults.min_revenue_months,
            )?,
            forest_trees: parse_or(
                &lookup,
                "LEADSERVER_FOREST_TREES",
                analytics_defaults.forest_trees,
            )?,
            forest_max_depth: parse_or(
                &lookup,
                "LEADSERVER_FOREST_MAX_DEPTH",
                analytics_defaults.forest_max_depth,
            )?,
            random_seed: parse_or(
                &lookup,
                "LEADSERVER_RANDOM_SEED",
                analytics_defaults.random_seed,
            )?,
            significance_level: parse_or(
                &lookup,
                "LEADSERVER_SIGNIFICANCE_LEVEL",
                analytics_defaults.significance_level,
            )?,
        };

        if analytics.forest_trees == 0 {
            return Err(anyhow!("LEADSERVER_FOREST_TREES must be at least 1"));
        }
        let alpha = analytics.significance_level;
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(anyhow!(
                "LEADSERVER_SIGNIFICANCE_LEVEL must be in (0, 1), got {alpha}"
            ));
        }

        let rescore_schedule = match lookup("LEADSERVER_RESCORE_SCHEDULE") {
            Some(s) if s.trim().is_empty() => None,
            Some(s) => Some(s.trim().to_string()),
            None => defaults.automation.rescore_schedule,
        };

        Ok(AppConfig {
            server,
            database_url: lookup("DATABASE_URL").filter(|s| !s.is_empty()),
            analytics,
            automation: AutomationConfig { rescore_schedule },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid value for {key}: {raw}")),
        None => Ok(default),
    }
}
