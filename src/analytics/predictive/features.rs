use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::analytics::dataset::OrgDataset;
use crate::analytics::statistics::LinearFit;
use crate::core::shared::enums::{CommunicationDirection, CommunicationType};
use crate::core::shared::models::{Communication, Lead, LeadScoreHistory};

pub const FEATURE_NAMES: [&str; 14] = [
    "score",
    "lead_age_days",
    "total_communications",
    "email_count",
    "call_count",
    "meeting_count",
    "linkedin_count",
    "sms_count",
    "inbound_ratio",
    "score_trend",
    "profile_completeness",
    "source_encoded",
    "temperature_encoded",
    "response_rate",
];

pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

/// Positional indices into a feature row.
pub mod idx {
    pub const LEAD_AGE_DAYS: usize = 1;
    pub const TOTAL_COMMUNICATIONS: usize = 2;
    pub const MEETING_COUNT: usize = 5;
    pub const SCORE_TREND: usize = 9;
    pub const PROFILE_COMPLETENESS: usize = 10;
    pub const RESPONSE_RATE: usize = 13;
}

/// Builds conversion-model feature rows for the leads of one dataset.
pub struct FeatureExtractor<'a> {
    communications: HashMap<Uuid, Vec<&'a Communication>>,
    history: HashMap<Uuid, Vec<&'a LeadScoreHistory>>,
    now: DateTime<Utc>,
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(dataset: &'a OrgDataset, now: DateTime<Utc>) -> Self {
        Self {
            communications: dataset.communications_by_lead(),
            history: dataset.history_by_lead(),
            now,
        }
    }

    pub fn extract(&self, lead: &Lead) -> Vec<f64> {
        let comms = self
            .communications
            .get(&lead.id)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let count_of = |kind: CommunicationType| {
            comms.iter().filter(|c| c.communication_type == kind).count() as f64
        };
        let inbound = comms
            .iter()
            .filter(|c| c.direction == CommunicationDirection::Inbound)
            .count() as f64;
        let total = comms.len() as f64;
        let outbound = total - inbound;

        let inbound_ratio = if total > 0.0 { inbound / total } else { 0.0 };
        let response_rate = if outbound > 0.0 {
            (inbound / outbound).min(1.0)
        } else if inbound > 0.0 {
            1.0
        } else {
            0.0
        };

        let age_end = lead.closed_at().unwrap_or(self.now);
        let lead_age_days = ((age_end - lead.created_at).num_seconds() as f64 / 86_400.0).max(0.0);

        vec![
            lead.score as f64,
            lead_age_days,
            total,
            count_of(CommunicationType::Email),
            count_of(CommunicationType::Call),
            count_of(CommunicationType::Meeting),
            count_of(CommunicationType::Linkedin),
            count_of(CommunicationType::Sms),
            inbound_ratio,
            self.score_trend(lead.id),
            lead.profile_completeness(),
            lead.source.ordinal(),
            lead.lead_temperature.ordinal(),
            response_rate,
        ]
    }

    fn score_trend(&self, lead_id: Uuid) -> f64 {
        match self.history.get(&lead_id) {
            Some(entries) if entries.len() >= 2 => {
                let scores: Vec<f64> = entries.iter().map(|h| h.new_score as f64).collect();
                LinearFit::from_series(&scores).slope
            }
            _ => 0.0,
        }
    }
}
