//! Team directory endpoints.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Deserialize;

use super::{cached, SLOW_CHANGING};
use crate::content::query_string;
use crate::content::team::{self, TeamOrdering};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TeamListQuery {
    #[serde(default, deserialize_with = "query_string::or_default")]
    pub order: TeamOrdering,
}

/// GET /api/team?order=displayOrder|nameAsc|joinDateDesc
pub async fn list_team(
    State(state): State<AppState>,
    Query(query): Query<TeamListQuery>,
) -> Result<Response, ApiError> {
    let members = team::get_team_members(state.content.as_ref(), query.order)
        .await
        .map_err(ApiError::internal("Failed to fetch team members"))?;
    Ok(cached(SLOW_CHANGING, false, members))
}

/// GET /api/team/{slug}
pub async fn get_team_member(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let member = team::get_team_member_by_slug(state.content.as_ref(), &slug)
        .await
        .map_err(ApiError::internal("Failed to fetch team member"))?
        .ok_or(ApiError::NotFound)?;
    Ok(cached(SLOW_CHANGING, false, member))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::content::case_studies::fixtures::case_study;
    use crate::routes::testing::{app, get};
    use crate::state::testing::Harness;

    #[tokio::test]
    async fn test_list_and_detail() {
        let harness = Harness::new(vec![
            json!({ "_id": "m1", "_type": "teamMember", "name": "Sam Okafor", "slug": { "current": "sam" }, "isActive": true, "displayOrder": 2, "joinDate": "2019-05-01", "favoriteProject": { "_ref": "cs-1" } }),
            json!({ "_id": "m2", "_type": "teamMember", "name": "Alex Chen", "slug": { "current": "alex" }, "isActive": true, "displayOrder": 1, "joinDate": "2023-01-15" }),
            case_study("cs-1", "education", &["research"], false, 4),
        ]);

        let (status, _, body) = get(app(&harness), "/api/team?order=joinDateDesc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["name"], "Alex Chen");

        let (status, _, body) = get(app(&harness), "/api/team?order=").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["name"], "Alex Chen");

        let (status, _, body) = get(app(&harness), "/api/team/sam").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["favoriteProject"]["slug"], "cs-1");

        let (status, _, _) = get(app(&harness), "/api/team/nobody").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
