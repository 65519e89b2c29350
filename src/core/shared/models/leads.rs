use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::enums::{
    CommunicationDirection, CommunicationType, LeadSource, LeadStatus, LeadTemperature,
};
use crate::core::shared::schema::leads::{communications, lead_score_history, leads, organizations};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = organizations)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = leads)]
#[diesel(treat_none_as_null = true)]
pub struct Lead {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub score: i32,
    pub status: LeadStatus,
    pub source: LeadSource,
    /// Deal value in cents.
    pub value: Option<i64>,
    pub lead_temperature: LeadTemperature,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn is_closed(&self) -> bool {
        self.status.is_closed()
    }

    pub fn is_won(&self) -> bool {
        self.status == LeadStatus::ClosedWon
    }

    /// Closed leads are considered closed at their last update.
    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.is_closed().then_some(self.updated_at)
    }

    /// Fraction of the eight profile fields that carry a non-blank value.
    pub fn profile_completeness(&self) -> f64 {
        let fields = [
            &self.first_name,
            &self.last_name,
            &self.email,
            &self.phone,
            &self.company,
            &self.job_title,
            &self.website,
            &self.industry,
        ];
        let filled = fields
            .iter()
            .filter(|f| f.as_deref().is_some_and(|v| !v.trim().is_empty()))
            .count();
        filled as f64 / fields.len() as f64
    }

    pub fn set_score(&mut self, score: i32) {
        self.score = score.clamp(0, 100);
        self.lead_temperature = LeadTemperature::from_score(self.score);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = communications)]
pub struct Communication {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub organization_id: Uuid,
    #[serde(rename = "type")]
    pub communication_type: CommunicationType,
    pub direction: CommunicationDirection,
    pub subject: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = lead_score_history)]
pub struct LeadScoreHistory {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub organization_id: Uuid,
    pub previous_score: i32,
    pub new_score: i32,
    pub score_change: i32,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl LeadScoreHistory {
    pub fn new(lead: &Lead, new_score: i32, reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            lead_id: lead.id,
            organization_id: lead.organization_id,
            previous_score: lead.score,
            new_score,
            score_change: new_score - lead.score,
            reason: reason.into(),
            created_at: at,
        }
    }
}
