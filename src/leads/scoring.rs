//! Rule-based lead scoring.
//!
//! A score is built from profile completeness, acquisition channel and
//! engagement, then clamped to 0..=100. Rescoring writes a history row only
//! when the score actually moves.

use chrono::Utc;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::core::shared::enums::{CommunicationType, LeadSource};
use crate::core::shared::models::{Communication, Lead, LeadScoreHistory};

use super::error::LeadsResult;
use super::store::LeadStore;
use super::types::{LeadFilter, RescoreSummary, ScoreOutcome};

const POINTS_PER_COMMUNICATION: i32 = 3;
const COMMUNICATION_CAP: i32 = 25;
const POINTS_PER_MEETING: i32 = 5;
const MEETING_CAP: i32 = 10;

fn has(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn profile_points(lead: &Lead) -> i32 {
    [
        (&lead.email, 10),
        (&lead.phone, 10),
        (&lead.company, 10),
        (&lead.job_title, 10),
        (&lead.website, 5),
        (&lead.industry, 5),
    ]
    .iter()
    .filter(|(field, _)| has(field))
    .map(|(_, points)| points)
    .sum()
}

fn source_points(source: LeadSource) -> i32 {
    match source {
        LeadSource::Referral => 15,
        LeadSource::Partner => 12,
        LeadSource::Event => 10,
        LeadSource::Website => 8,
        LeadSource::EmailCampaign => 6,
        LeadSource::SocialMedia => 5,
        LeadSource::ColdOutreach => 3,
        LeadSource::Other => 0,
    }
}

fn engagement_points(communications: &[Communication]) -> i32 {
    let total = communications.len() as i32;
    let meetings = communications
        .iter()
        .filter(|c| c.communication_type == CommunicationType::Meeting)
        .count() as i32;
    (total * POINTS_PER_COMMUNICATION).min(COMMUNICATION_CAP)
        + (meetings * POINTS_PER_MEETING).min(MEETING_CAP)
}

pub fn calculate_lead_score(lead: &Lead, communications: &[Communication]) -> i32 {
    (profile_points(lead) + source_points(lead.source) + engagement_points(communications))
        .clamp(0, 100)
}

/// Recomputes a lead's score and persists it with a history row when it changed.
pub async fn rescore_lead(
    store: &dyn LeadStore,
    organization_id: Uuid,
    lead_id: Uuid,
    reason: &str,
) -> LeadsResult<ScoreOutcome> {
    let lead = store.get_lead(organization_id, lead_id).await?;
    let communications = store.list_communications(organization_id, lead_id).await?;
    let new_score = calculate_lead_score(&lead, &communications);
    let previous_score = lead.score;

    if new_score == previous_score {
        debug!("Score of lead {lead_id} unchanged at {new_score}");
        return Ok(ScoreOutcome {
            lead,
            previous_score,
            new_score,
            changed: false,
        });
    }

    let entry = LeadScoreHistory::new(&lead, new_score, reason, Utc::now());
    let mut updated = lead;
    updated.set_score(new_score);
    let updated = store.record_score_change(updated, entry).await?;

    info!("Lead {lead_id} rescored {previous_score} -> {new_score} ({reason})");

    Ok(ScoreOutcome {
        lead: updated,
        previous_score,
        new_score,
        changed: true,
    })
}

/// Rescores every open lead of an organization, logging and skipping failures.
pub async fn rescore_organization(
    store: &dyn LeadStore,
    organization_id: Uuid,
    reason: &str,
) -> LeadsResult<RescoreSummary> {
    let mut summary = RescoreSummary::default();
    let mut offset = 0;

    loop {
        let page = store
            .list_leads(
                organization_id,
                LeadFilter {
                    limit: Some(LeadFilter::MAX_LIMIT),
                    offset: Some(offset),
                    ..Default::default()
                },
            )
            .await?;
        let fetched = page.len() as i64;

        for lead in page.into_iter().filter(|l| !l.is_closed()) {
            summary.evaluated += 1;
            match rescore_lead(store, organization_id, lead.id, reason).await {
                Ok(outcome) if outcome.changed => summary.changed += 1,
                Ok(_) => {}
                Err(e) => warn!("Failed to rescore lead {}: {e}", lead.id),
            }
        }

        if fetched < LeadFilter::MAX_LIMIT {
            break;
        }
        offset += fetched;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::enums::{CommunicationDirection, LeadStatus, LeadTemperature};
    use crate::core::shared::models::Organization;
    use crate::core::shared::test_utils::{communication, reference_now, LeadBuilder};
    use crate::leads::store::MemoryLeadStore;

    #[test]
    fn test_profile_and_source_points() {
        let lead = LeadBuilder::new(Uuid::new_v4())
            .source(LeadSource::Referral)
            .full_profile()
            .build();
        // 50 profile + 15 referral
        assert_eq!(calculate_lead_score(&lead, &[]), 65);

        let bare = LeadBuilder::new(Uuid::new_v4()).build();
        assert_eq!(calculate_lead_score(&bare, &[]), 0);
    }

    #[test]
    fn test_blank_fields_do_not_count() {
        let mut lead = LeadBuilder::new(Uuid::new_v4()).build();
        lead.email = Some("   ".to_string());
        lead.company = Some("Initech".to_string());
        assert_eq!(calculate_lead_score(&lead, &[]), 10);
    }

    #[test]
    fn test_engagement_is_capped() {
        let lead = LeadBuilder::new(Uuid::new_v4())
            .source(LeadSource::Referral)
            .full_profile()
            .build();
        let now = reference_now();
        let comms: Vec<Communication> = (0..12)
            .map(|i| {
                let kind = if i < 4 {
                    CommunicationType::Meeting
                } else {
                    CommunicationType::Email
                };
                communication(&lead, kind, CommunicationDirection::Outbound, now)
            })
            .collect();
        // 65 + min(36, 25) + min(20, 10)
        assert_eq!(calculate_lead_score(&lead, &comms), 100);
        assert_eq!(engagement_points(&comms[..2]), 6 + 10);
    }

    #[tokio::test]
    async fn test_rescore_records_history_only_on_change() {
        let store = MemoryLeadStore::new();
        let org = Uuid::new_v4();
        store
            .create_organization(Organization {
                id: org,
                name: "Acme".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let lead = store
            .create_lead(LeadBuilder::new(org).source(LeadSource::Event).full_profile().build())
            .await
            .unwrap();

        let first = rescore_lead(&store, org, lead.id, "manual").await.unwrap();
        assert!(first.changed);
        assert_eq!((first.previous_score, first.new_score), (0, 60));
        assert_eq!(first.lead.lead_temperature, LeadTemperature::Warm);

        let second = rescore_lead(&store, org, lead.id, "manual").await.unwrap();
        assert!(!second.changed);

        let history = store.list_score_history(org, lead.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, "manual");
        assert_eq!(history[0].score_change, 60);
    }

    #[tokio::test]
    async fn test_rescore_organization_skips_closed_leads() {
        let store = MemoryLeadStore::new();
        let org = Uuid::new_v4();
        store
            .create_organization(Organization {
                id: org,
                name: "Acme".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let open = store
            .create_lead(LeadBuilder::new(org).source(LeadSource::Partner).build())
            .await
            .unwrap();
        let closed = store
            .create_lead(
                LeadBuilder::new(org)
                    .source(LeadSource::Partner)
                    .status(LeadStatus::ClosedWon)
                    .build(),
            )
            .await
            .unwrap();

        let summary = rescore_organization(&store, org, "scheduled").await.unwrap();
        assert_eq!(summary.evaluated, 1);
        assert_eq!(summary.changed, 1);
        assert_eq!(store.get_lead(org, open.id).await.unwrap().score, 12);
        assert_eq!(store.get_lead(org, closed.id).await.unwrap().score, 0);
    }
}
