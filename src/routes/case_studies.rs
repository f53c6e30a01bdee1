//! Case study read endpoints.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use serde::{Deserialize, Serialize};

use super::{authorize_preview, cached, SLOW_CHANGING};
use crate::content::case_studies::{self, CaseStudyFilter};
use crate::content::query_string;
use crate::content::models::{CaseStudyStats, IndustryCount, ProjectTypeCount};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PreviewQuery {
    #[serde(default, deserialize_with = "query_string::flag")]
    pub preview: bool,
}

/// Filter options for the case study index.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetsResponse {
    pub industries: Vec<IndustryCount>,
    pub project_types: Vec<ProjectTypeCount>,
    pub stats: CaseStudyStats,
}

/// GET /api/case-studies
pub async fn list_case_studies(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(mut filter): Query<CaseStudyFilter>,
) -> Result<Response, ApiError> {
    filter.preview = authorize_preview(&state, &headers, filter.preview)?;
    let items = case_studies::get_case_studies(state.content.as_ref(), &filter)
        .await
        .map_err(ApiError::internal("Failed to fetch case studies"))?;
    Ok(cached(SLOW_CHANGING, filter.preview, items))
}

/// GET /api/case-studies/{slug}
pub async fn get_case_study(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Result<Response, ApiError> {
    let preview = authorize_preview(&state, &headers, query.preview)?;
    let case_study = case_studies::get_case_study_by_slug(state.content.as_ref(), &slug, preview)
        .await
        .map_err(ApiError::internal("Failed to fetch case study"))?
        .ok_or(ApiError::NotFound)?;
    Ok(cached(SLOW_CHANGING, preview, case_study))
}

/// GET /api/case-studies/facets
pub async fn case_study_facets(State(state): State<AppState>) -> Result<Response, ApiError> {
    let client = state.content.as_ref();
    let (industries, project_types, stats) = tokio::try_join!(
        case_studies::get_case_study_industries(client),
        case_studies::get_case_study_project_types(client),
        case_studies::get_case_study_stats(client),
    )
    .map_err(ApiError::internal("Failed to fetch case study facets"))?;

    Ok(cached(
        SLOW_CHANGING,
        false,
        FacetsResponse {
            industries,
            project_types,
            stats,
        },
    ))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;

    use crate::content::case_studies::fixtures::case_study;
    use crate::routes::testing::{app, get, send};
    use crate::state::testing::Harness;

    fn harness() -> Harness {
        let mut draft = case_study("draft", "health", &["research"], true, 20);
        draft["isDraft"] = json!(true);
        Harness::new(vec![
            case_study("a", "education", &["research", "strategy"], true, 1),
            case_study("b", "health", &["research"], false, 2),
            case_study("c", "education", &["design"], false, 3),
            draft,
        ])
    }

    #[tokio::test]
    async fn test_list_excludes_drafts_and_sets_cache() {
        let harness = harness();
        let (status, headers, body) = get(app(&harness), "/api/case-studies").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers["cache-control"],
            "public, s-maxage=300, stale-while-revalidate=600"
        );
        let ids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
    }

    #[tokio::test]
    async fn test_list_filters_by_query() {
        let harness = harness();
        let (_, _, body) = get(app(&harness), "/api/case-studies?industry=education&projectType=design").await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["_id"], "c");
    }

    #[tokio::test]
    async fn test_empty_query_values_add_no_filter() {
        let harness = harness();
        for uri in [
            "/api/case-studies?industry=&projectType=&featured=&preview=",
            "/api/case-studies?industry=&projectType=",
        ] {
            let (status, _, body) = get(app(&harness), uri).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert_eq!(body.as_array().unwrap().len(), 3, "{uri}");
        }

        let (status, _, _) = get(app(&harness), "/api/case-studies/a?preview=").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_detail_hides_draft_related_case_studies() {
        let mut secret = case_study("secret", "health", &["research"], false, 4);
        secret["isDraft"] = json!(true);
        let mut public = case_study("pub", "health", &["research"], false, 5);
        public["relatedCaseStudies"] = json!([{ "_ref": "secret" }]);
        let harness = Harness::new(vec![secret, public]);

        let (status, _, _) = get(app(&harness), "/api/case-studies/secret").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, body) = get(app(&harness), "/api/case-studies/pub").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["relatedCaseStudies"], json!([]));
    }

    #[tokio::test]
    async fn test_preview_needs_authorization() {
        let harness = harness();
        let (status, _, body) = get(app(&harness), "/api/case-studies?preview=true").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let req = Request::get("/api/case-studies?preview=true")
            .header("authorization", "Bearer preview-secret")
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = send(app(&harness), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["cache-control"], "no-cache");
        assert_eq!(body.as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_detail_and_missing_slug() {
        let harness = harness();
        let (status, _, body) = get(app(&harness), "/api/case-studies/a").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Case a");

        let (status, _, body) = get(app(&harness), "/api/case-studies/draft").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "Not found" }));
    }

    #[tokio::test]
    async fn test_facets() {
        let harness = harness();
        let (status, _, body) = get(app(&harness), "/api/case-studies/facets").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["industries"][0], json!({ "industry": "education", "count": 2 }));
        assert_eq!(body["projectTypes"][0], json!({ "type": "research", "count": 2 }));
        assert_eq!(body["stats"]["totalProjects"], 3);
    }
}
