#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use leadserver::core::config::{AnalyticsConfig, AppConfig};
use leadserver::core::shared::enums::{
    CommunicationDirection, CommunicationType, LeadSource, LeadStatus, LeadTemperature,
};
use leadserver::core::shared::models::{Communication, Lead, LeadScoreHistory, Organization};
use leadserver::leads::{LeadStore, MemoryLeadStore};

/// Small, fast model settings for tests.
pub fn test_config() -> AppConfig {
    AppConfig {
        analytics: AnalyticsConfig {
            min_training_leads: 10,
            min_revenue_months: 12,
            forest_trees: 15,
            forest_max_depth: 5,
            ..AnalyticsConfig::default()
        },
        automation: leadserver::core::config::AutomationConfig {
            rescore_schedule: None,
        },
        ..AppConfig::default()
    }
}

pub async fn store_with_org() -> (Arc<MemoryLeadStore>, Uuid) {
    let store = Arc::new(MemoryLeadStore::new());
    let org = Uuid::new_v4();
    store
        .create_organization(Organization {
            id: org,
            name: "Acme Corp".to_string(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    (store, org)
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

pub fn lead(
    org: Uuid,
    status: LeadStatus,
    source: LeadSource,
    value_cents: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> Lead {
    let mut lead = Lead {
        id: Uuid::new_v4(),
        organization_id: org,
        first_name: Some("Dana".to_string()),
        last_name: Some("Lee".to_string()),
        email: Some("dana@example.com".to_string()),
        phone: None,
        company: Some("Initech".to_string()),
        job_title: None,
        website: None,
        industry: None,
        score: 0,
        status,
        source,
        value: value_cents,
        lead_temperature: LeadTemperature::Cold,
        created_at,
        updated_at,
    };
    lead.set_score(match source {
        LeadSource::Referral | LeadSource::Partner => 70,
        LeadSource::Website | LeadSource::Event => 45,
        _ => 20,
    });
    lead
}

pub async fn log_communications(
    store: &MemoryLeadStore,
    lead: &Lead,
    kind: CommunicationType,
    count: usize,
) {
    for i in 0..count {
        store
            .add_communication(Communication {
                id: Uuid::new_v4(),
                lead_id: lead.id,
                organization_id: lead.organization_id,
                communication_type: kind,
                direction: if i % 2 == 0 {
                    CommunicationDirection::Outbound
                } else {
                    CommunicationDirection::Inbound
                },
                subject: None,
                created_at: lead.created_at + Duration::hours(i as i64 + 1),
            })
            .await
            .unwrap();
    }
}

/// Seeds a pipeline where referral leads with meetings tend to win and cold
/// outreach leads without engagement tend to lose. Returns the open leads.
pub async fn seed_pipeline(store: &MemoryLeadStore, org: Uuid) -> Vec<Lead> {
    for i in 0..30i64 {
        let created = days_ago(120 - i);
        let closed = created + Duration::days(20 + i % 7);
        let (status, source, meetings) = if i % 3 == 0 {
            (LeadStatus::ClosedLost, LeadSource::ColdOutreach, 0)
        } else {
            (LeadStatus::ClosedWon, LeadSource::Referral, 2)
        };
        let lead = store
            .create_lead(lead(
                org,
                status,
                source,
                Some(500_000 + i * 10_000),
                created,
                closed,
            ))
            .await
            .unwrap();
        log_communications(store, &lead, CommunicationType::Meeting, meetings).await;
        log_communications(store, &lead, CommunicationType::Email, 1 + (i % 3) as usize).await;
    }

    let mut open = Vec::new();
    for i in 0..10i64 {
        let created = days_ago(10 + i);
        let source = if i % 2 == 0 {
            LeadSource::Referral
        } else {
            LeadSource::ColdOutreach
        };
        let lead = store
            .create_lead(lead(
                org,
                LeadStatus::Qualified,
                source,
                Some(250_000),
                created,
                created,
            ))
            .await
            .unwrap();
        open.push(lead);
    }

    for (day, score) in [(6, 40), (4, 48), (2, 55), (1, 61)] {
        let mut target = open[0].clone();
        let entry = LeadScoreHistory::new(&target, score, "manual", days_ago(day));
        target.set_score(score);
        store.record_score_change(target, entry).await.unwrap();
        open[0] = store.get_lead(org, open[0].id).await.unwrap();
    }

    open
}
