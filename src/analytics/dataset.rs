//! Per-organization snapshot the analytics engines compute over.

use std::collections::HashMap;
use uuid::Uuid;

use crate::core::shared::models::{Communication, Lead, LeadScoreHistory};

#[derive(Debug, Clone, Default)]
pub struct OrgDataset {
    pub organization_id: Uuid,
    pub leads: Vec<Lead>,
    pub communications: Vec<Communication>,
    pub score_history: Vec<LeadScoreHistory>,
}

impl OrgDataset {
    /// Builds a snapshot, dropping any row that belongs to another organization.
    pub fn new(
        organization_id: Uuid,
        leads: Vec<Lead>,
        communications: Vec<Communication>,
        score_history: Vec<LeadScoreHistory>,
    ) -> Self {
        let leads: Vec<Lead> = leads
            .into_iter()
            .filter(|l| l.organization_id == organization_id)
            .collect();
        let mut communications: Vec<Communication> = communications
            .into_iter()
            .filter(|c| c.organization_id == organization_id)
            .collect();
        let mut score_history: Vec<LeadScoreHistory> = score_history
            .into_iter()
            .filter(|h| h.organization_id == organization_id)
            .collect();

        communications.sort_by_key(|c| c.created_at);
        score_history.sort_by_key(|h| h.created_at);

        Self {
            organization_id,
            leads,
            communications,
            score_history,
        }
    }

    pub fn lead(&self, id: Uuid) -> Option<&Lead> {
        self.leads.iter().find(|l| l.id == id)
    }

    /// Communications grouped by lead, oldest first.
    pub fn communications_by_lead(&self) -> HashMap<Uuid, Vec<&Communication>> {
        let mut map: HashMap<Uuid, Vec<&Communication>> = HashMap::new();
        for c in &self.communications {
            map.entry(c.lead_id).or_default().push(c);
        }
        map
    }

    /// Score history grouped by lead, oldest first.
    pub fn history_by_lead(&self) -> HashMap<Uuid, Vec<&LeadScoreHistory>> {
        let mut map: HashMap<Uuid, Vec<&LeadScoreHistory>> = HashMap::new();
        for h in &self.score_history {
            map.entry(h.lead_id).or_default().push(h);
        }
        map
    }
}
