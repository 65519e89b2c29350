use crate::core::shared::state::AppState;
use crate::leads::{rescore_organization, LeadsResult, RescoreSummary};
use chrono::{DateTime, Utc};
use cron::Schedule;
use log::{error, info, trace, warn};
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::{interval, Duration};

const RESCORE_REASON: &str = "scheduled";

/// Normalizes a cron schedule to the seconds-first format the `cron` crate
/// parses. Standard 5-field expressions get a leading `0` seconds field.
fn normalize_cron_schedule(schedule: &str) -> String {
    let trimmed = schedule.trim();
    let parts: Vec<&str> = trimmed.split_whitespace().collect();

    match parts.len() {
        // 5 fields: minute-first, add seconds
        5 => format!("0 {}", parts.join(" ")),
        // 6 or 7 fields: already seconds-first (7 carries a year)
        6 | 7 => parts.join(" "),
        // Invalid: return as-is and let cron parser handle the error
        _ => trimmed.to_string(),
    }
}

pub fn parse_schedule(schedule: &str) -> Result<Schedule, cron::error::Error> {
    let normalized = normalize_cron_schedule(schedule);
    trace!(
        "Parsing schedule: original='{}', normalized='{}'",
        schedule,
        normalized
    );
    Schedule::from_str(&normalized)
}

/// True when the schedule has a fire time in `(since, now]`.
fn is_due(schedule: &Schedule, since: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    schedule.after(&since).next().is_some_and(|t| t <= now)
}

pub struct AutomationService {
    state: Arc<AppState>,
}

impl AutomationService {
    #[must_use]
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Runs the rescoring job on its schedule until the task is dropped.
    /// Returns immediately when no schedule is configured.
    pub async fn spawn(self) -> Result<(), cron::error::Error> {
        let Some(raw) = self.state.config.automation.rescore_schedule.clone() else {
            info!("Lead rescoring schedule disabled");
            return Ok(());
        };
        let schedule = parse_schedule(&raw)?;
        info!("Lead rescoring scheduled with '{}'", raw);

        let mut ticker = interval(Duration::from_secs(60));
        let mut last_check = Utc::now();
        loop {
            ticker.tick().await;
            let now = Utc::now();
            if is_due(&schedule, last_check, now) {
                if let Err(e) = self.rescore_all_organizations().await {
                    error!("Scheduled lead rescoring failed: {}", e);
                }
            }
            last_check = now;
        }
    }

    /// Rescores the open leads of every organization. A failing organization
    /// is logged and skipped.
    pub async fn rescore_all_organizations(&self) -> LeadsResult<RescoreSummary> {
        let store = self.state.store.as_ref();
        let mut total = RescoreSummary::default();

        for organization_id in store.list_organization_ids().await? {
            match rescore_organization(store, organization_id, RESCORE_REASON).await {
                Ok(summary) => {
                    trace!(
                        "Rescored organization {}: {} evaluated, {} changed",
                        organization_id,
                        summary.evaluated,
                        summary.changed
                    );
                    total.evaluated += summary.evaluated;
                    total.changed += summary.changed;
                }
                Err(e) => warn!(
                    "Skipping rescoring for organization {}: {}",
                    organization_id, e
                ),
            }
        }

        info!(
            "Scheduled rescoring evaluated {} leads, {} changed",
            total.evaluated, total.changed
        );
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AppConfig;
    use crate::core::shared::enums::LeadSource;
    use crate::core::shared::models::Organization;
    use crate::core::shared::test_utils::LeadBuilder;
    use crate::leads::{LeadStore, MemoryLeadStore};
    use chrono::TimeZone;
    use uuid::Uuid;

    #[test]
    fn test_normalize_cron_schedule() {
        assert_eq!(normalize_cron_schedule("*/15 * * * *"), "0 */15 * * * *");
        assert_eq!(normalize_cron_schedule(" 0 0 * * * * "), "0 0 * * * *");
        assert_eq!(normalize_cron_schedule("0 0 12 * * * 2030"), "0 0 12 * * * 2030");
        assert_eq!(normalize_cron_schedule("hourly"), "hourly");
    }

    #[test]
    fn test_parse_schedule_accepts_both_forms() {
        assert!(parse_schedule("0 * * * *").is_ok());
        assert!(parse_schedule("0 0 * * * *").is_ok());
        assert!(parse_schedule("not a schedule").is_err());
    }

    #[test]
    fn test_is_due_window() {
        let hourly = parse_schedule("0 * * * *").unwrap();
        let at = |h, m| Utc.with_ymd_and_hms(2024, 6, 15, h, m, 0).unwrap();

        assert!(is_due(&hourly, at(9, 59), at(10, 0)));
        assert!(is_due(&hourly, at(9, 30), at(10, 5)));
        assert!(!is_due(&hourly, at(10, 0), at(10, 59)));
    }

    #[tokio::test]
    async fn test_rescore_all_organizations() {
        let store = Arc::new(MemoryLeadStore::new());
        for _ in 0..2 {
            let org = Uuid::new_v4();
            store
                .create_organization(Organization {
                    id: org,
                    name: "Org".to_string(),
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
            store
                .create_lead(LeadBuilder::new(org).source(LeadSource::Referral).build())
                .await
                .unwrap();
        }
        let state = Arc::new(AppState::new(AppConfig::default(), store));
        let summary = AutomationService::new(state)
            .rescore_all_organizations()
            .await
            .unwrap();
        assert_eq!(summary.evaluated, 2);
        assert_eq!(summary.changed, 2);
    }
}
