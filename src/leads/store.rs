//! Lead persistence seam.
//!
//! Every call is scoped by organization id; a row belonging to another
//! organization is reported as not found.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::analytics::dataset::OrgDataset;
use crate::core::shared::models::{Communication, Lead, LeadScoreHistory, Organization};

use super::error::{LeadsError, LeadsResult};
use super::types::LeadFilter;

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn ping(&self) -> LeadsResult<()>;

    // Organizations
    async fn create_organization(&self, organization: Organization) -> LeadsResult<Organization>;
    async fn get_organization(&self, id: Uuid) -> LeadsResult<Organization>;
    async fn list_organization_ids(&self) -> LeadsResult<Vec<Uuid>>;

    // Leads
    async fn create_lead(&self, lead: Lead) -> LeadsResult<Lead>;
    async fn get_lead(&self, organization_id: Uuid, id: Uuid) -> LeadsResult<Lead>;
    async fn list_leads(&self, organization_id: Uuid, filter: LeadFilter) -> LeadsResult<Vec<Lead>>;
    async fn update_lead(&self, lead: Lead) -> LeadsResult<Lead>;
    async fn delete_lead(&self, organization_id: Uuid, id: Uuid) -> LeadsResult<()>;

    // Communications
    async fn add_communication(&self, communication: Communication) -> LeadsResult<Communication>;
    async fn list_communications(
        &self,
        organization_id: Uuid,
        lead_id: Uuid,
    ) -> LeadsResult<Vec<Communication>>;

    // Score history
    /// Persists the lead's new score and its history row together.
    async fn record_score_change(&self, lead: Lead, entry: LeadScoreHistory) -> LeadsResult<Lead>;
    async fn list_score_history(
        &self,
        organization_id: Uuid,
        lead_id: Uuid,
    ) -> LeadsResult<Vec<LeadScoreHistory>>;

    /// Snapshot of everything the analytics engines read for one organization.
    async fn load_dataset(&self, organization_id: Uuid) -> LeadsResult<OrgDataset>;
}

pub(crate) fn lead_not_found(id: Uuid) -> LeadsError {
    LeadsError::NotFound(format!("Lead {id} not found"))
}

pub(crate) fn organization_not_found(id: Uuid) -> LeadsError {
    LeadsError::NotFound(format!("Organization {id} not found"))
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Default)]
struct MemoryInner {
    organizations: HashMap<Uuid, Organization>,
    leads: HashMap<Uuid, Lead>,
    communications: Vec<Communication>,
    score_history: Vec<LeadScoreHistory>,
}

impl MemoryInner {
    fn scoped_lead(&self, organization_id: Uuid, id: Uuid) -> LeadsResult<&Lead> {
        self.leads
            .get(&id)
            .filter(|l| l.organization_id == organization_id)
            .ok_or_else(|| lead_not_found(id))
    }
}

/// Process-local store used by tests and the `--memory` server mode.
#[derive(Default)]
pub struct MemoryLeadStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn ping(&self) -> LeadsResult<()> {
        Ok(())
    }

    async fn create_organization(&self, organization: Organization) -> LeadsResult<Organization> {
        let mut inner = self.inner.write().await;
        if inner.organizations.contains_key(&organization.id) {
            return Err(LeadsError::Validation(format!(
                "Organization {} already exists",
                organization.id
            )));
        }
        inner
            .organizations
            .insert(organization.id, organization.clone());
        Ok(organization)
    }

    async fn get_organization(&self, id: Uuid) -> LeadsResult<Organization> {
        self.inner
            .read()
            .await
            .organizations
            .get(&id)
            .cloned()
            .ok_or_else(|| organization_not_found(id))
    }

    async fn list_organization_ids(&self) -> LeadsResult<Vec<Uuid>> {
        let inner = self.inner.read().await;
        let mut ids: Vec<Uuid> = inner.organizations.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    async fn create_lead(&self, lead: Lead) -> LeadsResult<Lead> {
        let mut inner = self.inner.write().await;
        if !inner.organizations.contains_key(&lead.organization_id) {
            return Err(organization_not_found(lead.organization_id));
        }
        inner.leads.insert(lead.id, lead.clone());
        Ok(lead)
    }

    async fn get_lead(&self, organization_id: Uuid, id: Uuid) -> LeadsResult<Lead> {
        self.inner
            .read()
            .await
            .scoped_lead(organization_id, id)
            .cloned()
    }

    async fn list_leads(
        &self,
        organization_id: Uuid,
        filter: LeadFilter,
    ) -> LeadsResult<Vec<Lead>> {
        let inner = self.inner.read().await;
        let mut leads: Vec<Lead> = inner
            .leads
            .values()
            .filter(|l| l.organization_id == organization_id && filter.matches(l))
            .cloned()
            .collect();
        leads.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(leads
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit() as usize)
            .collect())
    }

    async fn update_lead(&self, lead: Lead) -> LeadsResult<Lead> {
        let mut inner = self.inner.write().await;
        inner.scoped_lead(lead.organization_id, lead.id)?;
        inner.leads.insert(lead.id, lead.clone());
        Ok(lead)
    }

    async fn delete_lead(&self, organization_id: Uuid, id: Uuid) -> LeadsResult<()> {
        let mut inner = self.inner.write().await;
        inner.scoped_lead(organization_id, id)?;
        inner.leads.remove(&id);
        inner.communications.retain(|c| c.lead_id != id);
        inner.score_history.retain(|h| h.lead_id != id);
        Ok(())
    }

    async fn add_communication(&self, communication: Communication) -> LeadsResult<Communication> {
        let mut inner = self.inner.write().await;
        inner.scoped_lead(communication.organization_id, communication.lead_id)?;
        inner.communications.push(communication.clone());
        Ok(communication)
    }

    async fn list_communications(
        &self,
        organization_id: Uuid,
        lead_id: Uuid,
    ) -> LeadsResult<Vec<Communication>> {
        let inner = self.inner.read().await;
        inner.scoped_lead(organization_id, lead_id)?;
        let mut out: Vec<Communication> = inner
            .communications
            .iter()
            .filter(|c| c.lead_id == lead_id && c.organization_id == organization_id)
            .cloned()
            .collect();
        out.sort_by_key(|c| c.created_at);
        Ok(out)
    }

    async fn record_score_change(&self, lead: Lead, entry: LeadScoreHistory) -> LeadsResult<Lead> {
        if entry.lead_id != lead.id || entry.organization_id != lead.organization_id {
            return Err(LeadsError::Validation(
                "Score history entry does not belong to the lead".to_string(),
            ));
        }
        let mut inner = self.inner.write().await;
        inner.scoped_lead(lead.organization_id, lead.id)?;
        inner.leads.insert(lead.id, lead.clone());
        inner.score_history.push(entry);
        Ok(lead)
    }

    async fn list_score_history(
        &self,
        organization_id: Uuid,
        lead_id: Uuid,
    ) -> LeadsResult<Vec<LeadScoreHistory>> {
        let inner = self.inner.read().await;
        inner.scoped_lead(organization_id, lead_id)?;
        let mut out: Vec<LeadScoreHistory> = inner
            .score_history
            .iter()
            .filter(|h| h.lead_id == lead_id && h.organization_id == organization_id)
            .cloned()
            .collect();
        out.sort_by_key(|h| h.created_at);
        Ok(out)
    }

    async fn load_dataset(&self, organization_id: Uuid) -> LeadsResult<OrgDataset> {
        let inner = self.inner.read().await;
        let leads = inner
            .leads
            .values()
            .filter(|l| l.organization_id == organization_id)
            .cloned()
            .collect();
        let communications = inner
            .communications
            .iter()
            .filter(|c| c.organization_id == organization_id)
            .cloned()
            .collect();
        let history = inner
            .score_history
            .iter()
            .filter(|h| h.organization_id == organization_id)
            .cloned()
            .collect();
        Ok(OrgDataset::new(organization_id, leads, communications, history))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::enums::{CommunicationDirection, CommunicationType, LeadStatus};
    use crate::core::shared::test_utils::{communication, reference_now, LeadBuilder};
    use chrono::Utc;

    async fn store_with_org() -> (MemoryLeadStore, Uuid) {
        let store = MemoryLeadStore::new();
        let org = store
            .create_organization(Organization {
                id: Uuid::new_v4(),
                name: "Acme".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        (store, org.id)
    }

    #[tokio::test]
    async fn test_lead_requires_existing_organization() {
        let store = MemoryLeadStore::new();
        let lead = LeadBuilder::new(Uuid::new_v4()).build();
        assert!(matches!(
            store.create_lead(lead).await,
            Err(LeadsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reads_are_tenant_scoped() {
        let (store, org) = store_with_org().await;
        let (_, other) = store_with_org().await;
        let lead = store.create_lead(LeadBuilder::new(org).build()).await.unwrap();

        assert!(store.get_lead(org, lead.id).await.is_ok());
        assert!(matches!(
            store.get_lead(other, lead.id).await,
            Err(LeadsError::NotFound(_))
        ));
        assert!(store.list_leads(other, LeadFilter::default()).await.unwrap().is_empty());
        assert!(store.delete_lead(other, lead.id).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_cascades_and_dataset_is_scoped() {
        let (store, org) = store_with_org().await;
        let keep = store.create_lead(LeadBuilder::new(org).build()).await.unwrap();
        let gone = store
            .create_lead(LeadBuilder::new(org).status(LeadStatus::Contacted).build())
            .await
            .unwrap();
        for lead in [&keep, &gone] {
            store
                .add_communication(communication(
                    lead,
                    CommunicationType::Email,
                    CommunicationDirection::Outbound,
                    reference_now(),
                ))
                .await
                .unwrap();
        }

        store.delete_lead(org, gone.id).await.unwrap();
        let dataset = store.load_dataset(org).await.unwrap();
        assert_eq!(dataset.leads.len(), 1);
        assert_eq!(dataset.communications.len(), 1);
        assert_eq!(dataset.communications[0].lead_id, keep.id);
    }

    #[tokio::test]
    async fn test_score_change_is_recorded_with_lead() {
        let (store, org) = store_with_org().await;
        let mut lead = store.create_lead(LeadBuilder::new(org).build()).await.unwrap();
        let entry = LeadScoreHistory::new(&lead, 55, "manual", reference_now());
        lead.set_score(55);
        store.record_score_change(lead.clone(), entry).await.unwrap();

        let stored = store.get_lead(org, lead.id).await.unwrap();
        assert_eq!(stored.score, 55);
        let history = store.list_score_history(org, lead.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].score_change, 55);
    }
}
