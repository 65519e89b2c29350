use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::core::shared::enums::{
    CommunicationDirection, CommunicationType, LeadSource, LeadStatus, LeadTemperature,
};
use crate::core::shared::models::{Communication, Lead, LeadScoreHistory};

/// Fixed reference instant so date arithmetic in tests is reproducible.
pub fn reference_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

pub struct LeadBuilder {
    lead: Lead,
}

impl LeadBuilder {
    pub fn new(organization_id: Uuid) -> Self {
        let now = reference_now();
        Self {
            lead: Lead {
                id: Uuid::new_v4(),
                organization_id,
                first_name: None,
                last_name: None,
                email: None,
                phone: None,
                company: None,
                job_title: None,
                website: None,
                industry: None,
                score: 0,
                status: LeadStatus::New,
                source: LeadSource::Other,
                value: None,
                lead_temperature: LeadTemperature::Cold,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn score(mut self, score: i32) -> Self {
        self.lead.set_score(score);
        self
    }

    pub fn status(mut self, status: LeadStatus) -> Self {
        self.lead.status = status;
        self
    }

    pub fn source(mut self, source: LeadSource) -> Self {
        self.lead.source = source;
        self
    }

    pub fn value(mut self, cents: i64) -> Self {
        self.lead.value = Some(cents);
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.lead.created_at = at;
        if self.lead.updated_at < at {
            self.lead.updated_at = at;
        }
        self
    }

    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.lead.updated_at = at;
        self
    }

    pub fn closed_after_days(mut self, days: i64) -> Self {
        self.lead.updated_at = self.lead.created_at + Duration::days(days);
        self
    }

    pub fn full_profile(mut self) -> Self {
        self.lead.first_name = Some("Ana".to_string());
        self.lead.last_name = Some("Silva".to_string());
        self.lead.email = Some("ana@example.com".to_string());
        self.lead.phone = Some("+55 11 5555-0000".to_string());
        self.lead.company = Some("Acme".to_string());
        self.lead.job_title = Some("CTO".to_string());
        self.lead.website = Some("https://acme.example".to_string());
        self.lead.industry = Some("Software".to_string());
        self
    }

    pub fn build(self) -> Lead {
        self.lead
    }
}

pub fn communication(
    lead: &Lead,
    kind: CommunicationType,
    direction: CommunicationDirection,
    at: DateTime<Utc>,
) -> Communication {
    Communication {
        id: Uuid::new_v4(),
        lead_id: lead.id,
        organization_id: lead.organization_id,
        communication_type: kind,
        direction,
        subject: None,
        created_at: at,
    }
}

pub fn score_entry(lead: &Lead, previous: i32, new: i32, at: DateTime<Utc>) -> LeadScoreHistory {
    LeadScoreHistory {
        id: Uuid::new_v4(),
        lead_id: lead.id,
        organization_id: lead.organization_id,
        previous_score: previous,
        new_score: new,
        score_change: new - previous,
        reason: "test".to_string(),
        created_at: at,
    }
}

pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} ± {tolerance}, got {actual}"
    );
}
