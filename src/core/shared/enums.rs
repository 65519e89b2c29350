//! Database Enum Types for the Lead Pipeline
//!
//! Enums are persisted as lowercase snake_case text so rows stay readable from
//! plain SQL. Each type round-trips through `Display`/`FromStr` and maps onto
//! the `Text` SQL type for Diesel.

use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};
use std::io::Write;

macro_rules! text_enum_sql {
    ($ty:ident) => {
        impl ToSql<Text, Pg> for $ty {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                out.write_all(self.as_str().as_bytes())?;
                Ok(serialize::IsNull::No)
            }
        }

        impl FromSql<Text, Pg> for $ty {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let value = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
                value.parse::<$ty>().map_err(Into::into)
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// ============================================================================
// LEAD STATUS
// ============================================================================

/// Pipeline position of a lead
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    AsExpression,
    FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

impl LeadStatus {
    /// Pipeline order, used wherever stages are reported.
    pub const ALL: [LeadStatus; 7] = [
        Self::New,
        Self::Contacted,
        Self::Qualified,
        Self::Proposal,
        Self::Negotiation,
        Self::ClosedWon,
        Self::ClosedLost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::Proposal => "proposal",
            Self::Negotiation => "negotiation",
            Self::ClosedWon => "closed_won",
            Self::ClosedLost => "closed_lost",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ClosedWon | Self::ClosedLost)
    }
}

impl std::str::FromStr for LeadStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(Self::New),
            "contacted" => Ok(Self::Contacted),
            "qualified" => Ok(Self::Qualified),
            "proposal" => Ok(Self::Proposal),
            "negotiation" => Ok(Self::Negotiation),
            "closed_won" | "won" => Ok(Self::ClosedWon),
            "closed_lost" | "lost" => Ok(Self::ClosedLost),
            _ => Err(format!("Unknown lead status: {s}")),
        }
    }
}

text_enum_sql!(LeadStatus);

// ============================================================================
// LEAD SOURCE
// ============================================================================

/// Acquisition channel of a lead
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    AsExpression,
    FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    Website,
    Referral,
    SocialMedia,
    EmailCampaign,
    ColdOutreach,
    Event,
    Partner,
    #[default]
    Other,
}

impl LeadSource {
    pub const ALL: [LeadSource; 8] = [
        Self::Website,
        Self::Referral,
        Self::SocialMedia,
        Self::EmailCampaign,
        Self::ColdOutreach,
        Self::Event,
        Self::Partner,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Website => "website",
            Self::Referral => "referral",
            Self::SocialMedia => "social_media",
            Self::EmailCampaign => "email_campaign",
            Self::ColdOutreach => "cold_outreach",
            Self::Event => "event",
            Self::Partner => "partner",
            Self::Other => "other",
        }
    }

    /// Ordinal quality rank used as a model feature.
    pub fn ordinal(&self) -> f64 {
        match self {
            Self::Referral => 7.0,
            Self::Partner => 6.0,
            Self::Event => 5.0,
            Self::Website => 4.0,
            Self::EmailCampaign => 3.0,
            Self::SocialMedia => 2.0,
            Self::ColdOutreach => 1.0,
            Self::Other => 0.0,
        }
    }
}

impl std::str::FromStr for LeadSource {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "website" | "web" => Ok(Self::Website),
            "referral" => Ok(Self::Referral),
            "social_media" | "social" => Ok(Self::SocialMedia),
            "email_campaign" | "email" => Ok(Self::EmailCampaign),
            "cold_outreach" | "cold" => Ok(Self::ColdOutreach),
            "event" => Ok(Self::Event),
            "partner" => Ok(Self::Partner),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown lead source: {s}")),
        }
    }
}

text_enum_sql!(LeadSource);

// ============================================================================
// LEAD TEMPERATURE
// ============================================================================

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    AsExpression,
    FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum LeadTemperature {
    Hot,
    Warm,
    #[default]
    Cold,
}

impl LeadTemperature {
    pub const ALL: [LeadTemperature; 3] = [Self::Hot, Self::Warm, Self::Cold];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Warm => "warm",
            Self::Cold => "cold",
        }
    }

    pub fn from_score(score: i32) -> Self {
        if score >= 70 {
            Self::Hot
        } else if score >= 40 {
            Self::Warm
        } else {
            Self::Cold
        }
    }

    pub fn ordinal(&self) -> f64 {
        match self {
            Self::Hot => 2.0,
            Self::Warm => 1.0,
            Self::Cold => 0.0,
        }
    }
}

impl std::str::FromStr for LeadTemperature {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hot" => Ok(Self::Hot),
            "warm" => Ok(Self::Warm),
            "cold" => Ok(Self::Cold),
            _ => Err(format!("Unknown lead temperature: {s}")),
        }
    }
}

text_enum_sql!(LeadTemperature);

// ============================================================================
// COMMUNICATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationType {
    Email,
    Call,
    Meeting,
    Linkedin,
    Sms,
}

impl CommunicationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Call => "call",
            Self::Meeting => "meeting",
            Self::Linkedin => "linkedin",
            Self::Sms => "sms",
        }
    }
}

impl std::str::FromStr for CommunicationType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "call" | "phone" => Ok(Self::Call),
            "meeting" => Ok(Self::Meeting),
            "linkedin" => Ok(Self::Linkedin),
            "sms" => Ok(Self::Sms),
            _ => Err(format!("Unknown communication type: {s}")),
        }
    }
}

text_enum_sql!(CommunicationType);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationDirection {
    Inbound,
    Outbound,
}

impl CommunicationDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

impl std::str::FromStr for CommunicationDirection {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inbound" | "in" => Ok(Self::Inbound),
            "outbound" | "out" => Ok(Self::Outbound),
            _ => Err(format!("Unknown communication direction: {s}")),
        }
    }
}

text_enum_sql!(CommunicationDirection);
