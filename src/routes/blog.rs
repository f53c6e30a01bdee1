//! Blog ("insights") read endpoints.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use serde::Deserialize;

use super::case_studies::PreviewQuery;
use super::{authorize_preview, cached, BLOG};
use crate::content::blog::{self, BlogQuery, DEFAULT_SEARCH_LIMIT};
use crate::content::query_string;
use crate::error::ApiError;
use crate::state::AppState;

/// Upper bound on `pageSize` and search `limit`.
const MAX_PAGE_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default, deserialize_with = "query_string::number")]
    pub limit: Option<usize>,
}

/// GET /api/blog
pub async fn list_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(mut query): Query<BlogQuery>,
) -> Result<Response, ApiError> {
    query.preview = authorize_preview(&state, &headers, query.preview)?;
    query.page = query.page.max(1);
    query.page_size = query.page_size.clamp(1, MAX_PAGE_SIZE);

    let page = blog::get_blog_posts(state.content.as_ref(), &query)
        .await
        .map_err(ApiError::internal("Failed to fetch blog posts"))?;
    Ok(cached(BLOG, query.preview, page))
}

/// GET /api/blog/{slug}
pub async fn get_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Result<Response, ApiError> {
    let preview = authorize_preview(&state, &headers, query.preview)?;
    let post = blog::get_blog_post_by_slug(state.content.as_ref(), &slug, preview)
        .await
        .map_err(ApiError::internal("Failed to fetch blog post"))?
        .ok_or(ApiError::NotFound)?;
    Ok(cached(BLOG, preview, post))
}

/// GET /api/blog/search?q=
pub async fn search_posts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Response, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).min(MAX_PAGE_SIZE);
    let posts = blog::search_blog_posts(state.content.as_ref(), &query.q, limit)
        .await
        .map_err(ApiError::internal("Failed to search blog posts"))?;
    Ok(cached(BLOG, false, posts))
}
