use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::middleware::OrganizationContext;
use crate::core::shared::enums::{LeadSource, LeadStatus, LeadTemperature};
use crate::core::shared::models::{Communication, Lead, LeadScoreHistory, Organization};
use crate::core::shared::state::AppState;

use super::error::{LeadsError, LeadsResult};
use super::scoring::{calculate_lead_score, rescore_lead};
use super::types::{
    validate_email, validate_value, CreateCommunicationRequest, CreateLeadRequest,
    CreateOrganizationRequest, LeadFilter, ScoreOutcome, UpdateLeadRequest,
};

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// Organizations
// ============================================================================

pub async fn handle_create_organization(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrganizationRequest>,
) -> LeadsResult<(StatusCode, Json<Organization>)> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(LeadsError::Validation(
            "Organization name is required".to_string(),
        ));
    }

    let organization = state
        .store
        .create_organization(Organization {
            id: Uuid::new_v4(),
            name,
            created_at: Utc::now(),
        })
        .await?;

    log::info!("Created organization {}", organization.id);
    Ok((StatusCode::CREATED, Json(organization)))
}

/// Callers may only read the organization named in their own tenant header.
pub async fn handle_get_organization(
    State(state): State<Arc<AppState>>,
    org: OrganizationContext,
    Path(id): Path<Uuid>,
) -> LeadsResult<Json<Organization>> {
    if id != org.organization_id {
        return Err(LeadsError::NotFound(format!("Organization {id} not found")));
    }
    Ok(Json(state.store.get_organization(id).await?))
}

// ============================================================================
// Leads
// ============================================================================

pub async fn handle_create_lead(
    State(state): State<Arc<AppState>>,
    org: OrganizationContext,
    Json(req): Json<CreateLeadRequest>,
) -> LeadsResult<(StatusCode, Json<Lead>)> {
    validate_email(req.email.as_deref())?;
    validate_value(req.value)?;
    if let Some(score) = req.score {
        if !(0..=100).contains(&score) {
            return Err(LeadsError::Validation(format!(
                "Score must be between 0 and 100, got {score}"
            )));
        }
    }

    let created_at = req.created_at.unwrap_or_else(Utc::now);
    if req.updated_at.is_some_and(|u| u < created_at) {
        return Err(LeadsError::Validation(
            "updated_at must not precede created_at".to_string(),
        ));
    }
    let mut lead = Lead {
        id: Uuid::new_v4(),
        organization_id: org.organization_id,
        first_name: non_blank(req.first_name),
        last_name: non_blank(req.last_name),
        email: non_blank(req.email),
        phone: non_blank(req.phone),
        company: non_blank(req.company),
        job_title: non_blank(req.job_title),
        website: non_blank(req.website),
        industry: non_blank(req.industry),
        score: 0,
        status: req.status.unwrap_or(LeadStatus::New),
        source: req.source.unwrap_or(LeadSource::Other),
        value: req.value,
        lead_temperature: LeadTemperature::Cold,
        created_at,
        updated_at: req.updated_at.unwrap_or(created_at),
    };
    let score = req.score.unwrap_or_else(|| calculate_lead_score(&lead, &[]));
    lead.set_score(score);

    let lead = state.store.create_lead(lead).await?;
    log::info!(
        "Created lead {} in organization {} with score {}",
        lead.id,
        lead.organization_id,
        lead.score
    );
    Ok((StatusCode::CREATED, Json(lead)))
}

pub async fn handle_list_leads(
    State(state): State<Arc<AppState>>,
    org: OrganizationContext,
    Query(filter): Query<LeadFilter>,
) -> LeadsResult<Json<Vec<Lead>>> {
    Ok(Json(
        state.store.list_leads(org.organization_id, filter).await?,
    ))
}

pub async fn handle_get_lead(
    State(state): State<Arc<AppState>>,
    org: OrganizationContext,
    Path(id): Path<Uuid>,
) -> LeadsResult<Json<Lead>> {
    Ok(Json(state.store.get_lead(org.organization_id, id).await?))
}

pub async fn handle_update_lead(
    State(state): State<Arc<AppState>>,
    org: OrganizationContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateLeadRequest>,
) -> LeadsResult<Json<Lead>> {
    validate_email(req.email.as_deref())?;
    validate_value(req.value)?;

    let mut lead = state.store.get_lead(org.organization_id, id).await?;
    let previous_status = lead.status;

    macro_rules! apply {
        ($($field:ident),*) => {
            $(if let Some(v) = req.$field {
                lead.$field = non_blank(Some(v));
            })*
        };
    }
    apply!(first_name, last_name, email, phone, company, job_title, website, industry);

    if let Some(status) = req.status {
        lead.status = status;
    }
    if let Some(source) = req.source {
        lead.source = source;
    }
    if req.value.is_some() {
        lead.value = req.value;
    }
    lead.updated_at = Utc::now();

    let lead = state.store.update_lead(lead).await?;
    if previous_status != lead.status {
        log::info!(
            "Lead {} moved from {} to {}",
            lead.id,
            previous_status,
            lead.status
        );
    }
    Ok(Json(lead))
}

pub async fn handle_delete_lead(
    State(state): State<Arc<AppState>>,
    org: OrganizationContext,
    Path(id): Path<Uuid>,
) -> LeadsResult<StatusCode> {
    state.store.delete_lead(org.organization_id, id).await?;
    log::info!("Deleted lead {id}");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Communications and scoring
// ============================================================================

pub async fn handle_add_communication(
    State(state): State<Arc<AppState>>,
    org: OrganizationContext,
    Path(lead_id): Path<Uuid>,
    Json(req): Json<CreateCommunicationRequest>,
) -> LeadsResult<(StatusCode, Json<Communication>)> {
    let communication = Communication {
        id: Uuid::new_v4(),
        lead_id,
        organization_id: org.organization_id,
        communication_type: req.communication_type,
        direction: req.direction,
        subject: non_blank(req.subject),
        created_at: req.created_at.unwrap_or_else(Utc::now),
    };
    let communication = state.store.add_communication(communication).await?;
    Ok((StatusCode::CREATED, Json(communication)))
}

pub async fn handle_list_communications(
    State(state): State<Arc<AppState>>,
    org: OrganizationContext,
    Path(lead_id): Path<Uuid>,
) -> LeadsResult<Json<Vec<Communication>>> {
    Ok(Json(
        state
            .store
            .list_communications(org.organization_id, lead_id)
            .await?,
    ))
}

pub async fn handle_rescore_lead(
    State(state): State<Arc<AppState>>,
    org: OrganizationContext,
    Path(lead_id): Path<Uuid>,
) -> LeadsResult<Json<ScoreOutcome>> {
    let outcome = rescore_lead(state.store.as_ref(), org.organization_id, lead_id, "manual").await?;
    Ok(Json(outcome))
}

pub async fn handle_score_history(
    State(state): State<Arc<AppState>>,
    org: OrganizationContext,
    Path(lead_id): Path<Uuid>,
) -> LeadsResult<Json<Vec<LeadScoreHistory>>> {
    Ok(Json(
        state
            .store
            .list_score_history(org.organization_id, lead_id)
            .await?,
    ))
}
