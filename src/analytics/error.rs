use axum::{response::IntoResponse, Json};

use crate::leads::LeadsError;

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

impl From<LeadsError> for AnalyticsError {
    fn from(e: LeadsError) -> Self {
        match e {
            LeadsError::NotFound(msg) => Self::NotFound(msg),
            LeadsError::Validation(msg) => Self::InvalidInput(msg),
            LeadsError::Database(msg) => Self::Database(msg),
            LeadsError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<tokio::task::JoinError> for AnalyticsError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl IntoResponse for AnalyticsError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let (status, message) = match &self {
            Self::InsufficientData(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            Self::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Database(msg) | Self::Internal(msg) => {
                log::error!("Analytics request failed: {self}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
