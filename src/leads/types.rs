use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::shared::enums::{
    CommunicationDirection, CommunicationType, LeadSource, LeadStatus, LeadTemperature,
};
use crate::core::shared::models::Lead;

use super::error::{LeadsError, LeadsResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrganizationRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateLeadRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub status: Option<LeadStatus>,
    pub source: Option<LeadSource>,
    /// Deal value in cents.
    pub value: Option<i64>,
    /// Explicit starting score; computed from the profile when absent.
    pub score: Option<i32>,
    /// Backdates imported leads.
    pub created_at: Option<DateTime<Utc>>,
    /// Last activity of an imported lead; the close time when it is closed.
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateLeadRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub status: Option<LeadStatus>,
    pub source: Option<LeadSource>,
    pub value: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommunicationRequest {
    #[serde(rename = "type")]
    pub communication_type: CommunicationType,
    pub direction: CommunicationDirection,
    pub subject: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Listing filter; every field narrows the result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
    pub source: Option<LeadSource>,
    pub temperature: Option<LeadTemperature>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl LeadFilter {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 500;

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    /// In-process form of the filter, mirrored by the SQL query.
    pub fn matches(&self, lead: &Lead) -> bool {
        if self.status.is_some_and(|s| s != lead.status)
            || self.source.is_some_and(|s| s != lead.source)
            || self.temperature.is_some_and(|t| t != lead.lead_temperature)
        {
            return false;
        }
        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => true,
            Some(term) => {
                let term = term.to_lowercase();
                [&lead.first_name, &lead.last_name, &lead.email, &lead.company]
                    .iter()
                    .filter_map(|f| f.as_deref())
                    .any(|v| v.to_lowercase().contains(&term))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreOutcome {
    pub lead: Lead,
    pub previous_score: i32,
    pub new_score: i32,
    pub changed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RescoreSummary {
    pub evaluated: usize,
    pub changed: usize,
}

pub(crate) fn validate_value(value: Option<i64>) -> LeadsResult<()> {
    match value {
        Some(v) if v < 0 => Err(LeadsError::Validation(format!(
            "Lead value must not be negative, got {v}"
        ))),
        _ => Ok(()),
    }
}

pub(crate) fn validate_email(email: Option<&str>) -> LeadsResult<()> {
    match email.map(str::trim) {
        Some(e) if !e.is_empty() && !e.contains('@') => {
            Err(LeadsError::Validation(format!("Invalid email address: {e}")))
        }
        _ => Ok(()),
    }
}
