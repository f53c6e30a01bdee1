//! Service catalog endpoints.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Deserialize;

use super::{cached, SLOW_CHANGING};
use crate::content::query_string;
use crate::content::services::{self, ServiceOrdering};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ServiceListQuery {
    #[serde(default, deserialize_with = "query_string::or_default")]
    pub order: ServiceOrdering,
}

/// GET /api/services?order=displayOrder|nameAsc|featuredFirst
pub async fn list_services(
    State(state): State<AppState>,
    Query(query): Query<ServiceListQuery>,
) -> Result<Response, ApiError> {
    let items = services::get_services(state.content.as_ref(), query.order)
        .await
        .map_err(ApiError::internal("Failed to fetch services"))?;
    Ok(cached(SLOW_CHANGING, false, items))
}

/// GET /api/services/{slug}
pub async fn get_service(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let service = services::get_service_by_slug(state.content.as_ref(), &slug)
        .await
        .map_err(ApiError::internal("Failed to fetch service"))?
        .ok_or(ApiError::NotFound)?;
    Ok(cached(SLOW_CHANGING, false, service))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::testing::{app, get};
    use crate::state::testing::Harness;

    fn harness() -> Harness {
        Harness::new(vec![
            json!({ "_id": "s1", "_type": "service", "name": "Research", "slug": { "current": "research" }, "isActive": true, "displayOrder": 2 }),
            json!({ "_id": "s2", "_type": "service", "name": "Audits", "slug": { "current": "audits" }, "isActive": true, "displayOrder": 1, "featured": true }),
            json!({ "_id": "s3", "_type": "service", "name": "Retired", "slug": { "current": "retired" }, "isActive": false, "displayOrder": 0 }),
        ])
    }

    #[tokio::test]
    async fn test_list_orders() {
        let harness = harness();
        let (status, _, body) = get(app(&harness), "/api/services").await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body.as_array().unwrap().iter().map(|s| s["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Audits", "Research"]);

        let (_, _, body) = get(app(&harness), "/api/services?order=nameAsc").await;
        assert_eq!(body[0]["name"], "Audits");
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, _, _) = get(app(&harness), "/api/services?order=random").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, body) = get(app(&harness), "/api/services?order=").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_inactive_service_is_not_found() {
        let harness = harness();
        let (status, _, body) = get(app(&harness), "/api/services/research").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Research");

        let (status, _, _) = get(app(&harness), "/api/services/retired").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
