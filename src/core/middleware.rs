use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ORGANIZATION_HEADER: &str = "x-organization-id";

// ============================================================================
// Organization Context
// ============================================================================

/// Tenant the request operates on. Every store and analytics call is scoped
/// by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationContext {
    pub organization_id: Uuid,
}

impl OrganizationContext {
    pub fn new(organization_id: Uuid) -> Self {
        Self { organization_id }
    }
}

fn reject(message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
}

/// Axum extractor for OrganizationContext
#[axum::async_trait]
impl<S> FromRequestParts<S> for OrganizationContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ORGANIZATION_HEADER)
            .ok_or_else(|| reject("Organization context required"))?
            .to_str()
            .map_err(|_| reject("Invalid organization header"))?;

        let organization_id = Uuid::parse_str(raw.trim())
            .map_err(|_| reject("Organization id must be a UUID"))?;

        Ok(OrganizationContext::new(organization_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> Result<OrganizationContext, StatusCode> {
        let (mut parts, _) = req.into_parts();
        OrganizationContext::from_request_parts(&mut parts, &())
            .await
            .map_err(|(status, _)| status)
    }

    #[tokio::test]
    async fn test_header_is_parsed() {
        let org = Uuid::new_v4();
        let req = Request::builder()
            .header(ORGANIZATION_HEADER, org.to_string())
            .body(())
            .unwrap();
        assert_eq!(extract(req).await.unwrap().organization_id, org);
    }

    #[tokio::test]
    async fn test_missing_or_invalid_header_is_rejected() {
        let req = Request::builder().body(()).unwrap();
        assert_eq!(extract(req).await.unwrap_err(), StatusCode::BAD_REQUEST);

        let req = Request::builder()
            .header(ORGANIZATION_HEADER, "acme")
            .body(())
            .unwrap();
        assert_eq!(extract(req).await.unwrap_err(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_header_is_the_only_source() {
        let mut req = Request::builder().body(()).unwrap();
        req.extensions_mut()
            .insert(OrganizationContext::new(Uuid::new_v4()));
        assert_eq!(extract(req).await.unwrap_err(), StatusCode::BAD_REQUEST);
    }
}
