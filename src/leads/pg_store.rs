use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

use crate::analytics::dataset::OrgDataset;
use crate::core::shared::models::{Communication, Lead, LeadScoreHistory, Organization};
use crate::core::shared::schema::leads::{communications, lead_score_history, leads, organizations};
use crate::core::shared::utils::DbPool;

use super::error::{LeadsError, LeadsResult};
use super::store::{lead_not_found, organization_not_found, LeadStore};
use super::types::LeadFilter;

/// Postgres-backed store. Diesel is synchronous, so every query runs on the
/// blocking thread pool with its own pooled connection.
#[derive(Clone)]
pub struct PgLeadStore {
    pool: DbPool,
}

impl PgLeadStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn run<F, T>(&self, f: F) -> LeadsResult<T>
    where
        F: FnOnce(&mut PgConnection) -> LeadsResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| LeadsError::Database(e.to_string()))?;
            f(&mut conn)
        })
        .await?
    }
}

fn ensure_lead(conn: &mut PgConnection, organization_id: Uuid, id: Uuid) -> LeadsResult<()> {
    let found: i64 = leads::table
        .filter(leads::id.eq(id))
        .filter(leads::organization_id.eq(organization_id))
        .count()
        .get_result(conn)?;
    if found == 0 {
        return Err(lead_not_found(id));
    }
    Ok(())
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn ping(&self) -> LeadsResult<()> {
        self.run(|conn| {
            diesel::sql_query("SELECT 1").execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn create_organization(&self, organization: Organization) -> LeadsResult<Organization> {
        self.run(move |conn| {
            diesel::insert_into(organizations::table)
                .values(&organization)
                .get_result(conn)
                .map_err(|e| match e {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        LeadsError::Validation(format!(
                            "Organization {} already exists",
                            organization.id
                        ))
                    }
                    other => other.into(),
                })
        })
        .await
    }

    async fn get_organization(&self, id: Uuid) -> LeadsResult<Organization> {
        self.run(move |conn| {
            organizations::table
                .find(id)
                .first(conn)
                .optional()?
                .ok_or_else(|| organization_not_found(id))
        })
        .await
    }

    async fn list_organization_ids(&self) -> LeadsResult<Vec<Uuid>> {
        self.run(|conn| {
            Ok(organizations::table
                .select(organizations::id)
                .order(organizations::id.asc())
                .load(conn)?)
        })
        .await
    }

    async fn create_lead(&self, lead: Lead) -> LeadsResult<Lead> {
        self.run(move |conn| {
            diesel::insert_into(leads::table)
                .values(&lead)
                .get_result(conn)
                .map_err(|e| match e {
                    DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                        organization_not_found(lead.organization_id)
                    }
                    other => other.into(),
                })
        })
        .await
    }

    async fn get_lead(&self, organization_id: Uuid, id: Uuid) -> LeadsResult<Lead> {
        self.run(move |conn| {
            leads::table
                .filter(leads::id.eq(id))
                .filter(leads::organization_id.eq(organization_id))
                .first(conn)
                .optional()?
                .ok_or_else(|| lead_not_found(id))
        })
        .await
    }

    async fn list_leads(
        &self,
        organization_id: Uuid,
        filter: LeadFilter,
    ) -> LeadsResult<Vec<Lead>> {
        self.run(move |conn| {
            let mut query = leads::table
                .filter(leads::organization_id.eq(organization_id))
                .into_boxed();

            if let Some(status) = filter.status {
                query = query.filter(leads::status.eq(status));
            }
            if let Some(source) = filter.source {
                query = query.filter(leads::source.eq(source));
            }
            if let Some(temperature) = filter.temperature {
                query = query.filter(leads::lead_temperature.eq(temperature));
            }
            if let Some(search) = filter
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
            {
                let term = format!("%{search}%");
                query = query.filter(
                    leads::first_name
                        .ilike(term.clone())
                        .or(leads::last_name.ilike(term.clone()))
                        .or(leads::email.ilike(term.clone()))
                        .or(leads::company.ilike(term)),
                );
            }

            Ok(query
                .order((leads::created_at.desc(), leads::id.asc()))
                .offset(filter.offset())
                .limit(filter.limit())
                .load(conn)?)
        })
        .await
    }

    async fn update_lead(&self, lead: Lead) -> LeadsResult<Lead> {
        self.run(move |conn| {
            diesel::update(
                leads::table
                    .filter(leads::id.eq(lead.id))
                    .filter(leads::organization_id.eq(lead.organization_id)),
            )
            .set(&lead)
            .get_result(conn)
            .optional()?
            .ok_or_else(|| lead_not_found(lead.id))
        })
        .await
    }

    async fn delete_lead(&self, organization_id: Uuid, id: Uuid) -> LeadsResult<()> {
        self.run(move |conn| {
            let deleted = diesel::delete(
                leads::table
                    .filter(leads::id.eq(id))
                    .filter(leads::organization_id.eq(organization_id)),
            )
            .execute(conn)?;
            if deleted == 0 {
                return Err(lead_not_found(id));
            }
            Ok(())
        })
        .await
    }

    async fn add_communication(&self, communication: Communication) -> LeadsResult<Communication> {
        self.run(move |conn| {
            ensure_lead(conn, communication.organization_id, communication.lead_id)?;
            Ok(diesel::insert_into(communications::table)
                .values(&communication)
                .get_result(conn)?)
        })
        .await
    }

    async fn list_communications(
        &self,
        organization_id: Uuid,
        lead_id: Uuid,
    ) -> LeadsResult<Vec<Communication>> {
        self.run(move |conn| {
            ensure_lead(conn, organization_id, lead_id)?;
            Ok(communications::table
                .filter(communications::lead_id.eq(lead_id))
                .filter(communications::organization_id.eq(organization_id))
                .order(communications::created_at.asc())
                .load(conn)?)
        })
        .await
    }

    async fn record_score_change(&self, lead: Lead, entry: LeadScoreHistory) -> LeadsResult<Lead> {
        if entry.lead_id != lead.id || entry.organization_id != lead.organization_id {
            return Err(LeadsError::Validation(
                "Score history entry does not belong to the lead".to_string(),
            ));
        }
        self.run(move |conn| {
            conn.transaction::<Lead, LeadsError, _>(|conn| {
                let updated: Lead = diesel::update(
                    leads::table
                        .filter(leads::id.eq(lead.id))
                        .filter(leads::organization_id.eq(lead.organization_id)),
                )
                .set((
                    leads::score.eq(lead.score),
                    leads::lead_temperature.eq(lead.lead_temperature),
                ))
                .get_result(conn)
                .optional()?
                .ok_or_else(|| lead_not_found(lead.id))?;

                diesel::insert_into(lead_score_history::table)
                    .values(&entry)
                    .execute(conn)?;

                Ok(updated)
            })
        })
        .await
    }

    async fn list_score_history(
        &self,
        organization_id: Uuid,
        lead_id: Uuid,
    ) -> LeadsResult<Vec<LeadScoreHistory>> {
        self.run(move |conn| {
            ensure_lead(conn, organization_id, lead_id)?;
            Ok(lead_score_history::table
                .filter(lead_score_history::lead_id.eq(lead_id))
                .filter(lead_score_history::organization_id.eq(organization_id))
                .order(lead_score_history::created_at.asc())
                .load(conn)?)
        })
        .await
    }

    async fn load_dataset(&self, organization_id: Uuid) -> LeadsResult<OrgDataset> {
        self.run(move |conn| {
            let org_leads: Vec<Lead> = leads::table
                .filter(leads::organization_id.eq(organization_id))
                .load(conn)?;
            let org_communications: Vec<Communication> = communications::table
                .filter(communications::organization_id.eq(organization_id))
                .load(conn)?;
            let org_history: Vec<LeadScoreHistory> = lead_score_history::table
                .filter(lead_score_history::organization_id.eq(organization_id))
                .load(conn)?;

            log::debug!(
                "Loaded dataset for organization {}: {} leads, {} communications, {} score changes",
                organization_id,
                org_leads.len(),
                org_communications.len(),
                org_history.len()
            );

            Ok(OrgDataset::new(
                organization_id,
                org_leads,
                org_communications,
                org_history,
            ))
        })
        .await
    }
}
