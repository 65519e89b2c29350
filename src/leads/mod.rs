pub mod error;
pub mod handlers;
pub mod pg_store;
pub mod scoring;
pub mod store;
pub mod types;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub use error::{LeadsError, LeadsResult};
pub use handlers::*;
pub use pg_store::PgLeadStore;
pub use scoring::{calculate_lead_score, rescore_lead, rescore_organization};
pub use store::{LeadStore, MemoryLeadStore};
pub use types::*;

pub fn configure_leads_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/organizations", post(handle_create_organization))
        .route("/api/organizations/:id", get(handle_get_organization))
        .route("/api/leads", post(handle_create_lead))
        .route("/api/leads", get(handle_list_leads))
        .route(
            "/api/leads/:id",
            get(handle_get_lead)
                .put(handle_update_lead)
                .delete(handle_delete_lead),
        )
        .route(
            "/api/leads/:id/communications",
            post(handle_add_communication).get(handle_list_communications),
        )
        .route("/api/leads/:id/score", post(handle_rescore_lead))
        .route("/api/leads/:id/score-history", get(handle_score_history))
}
