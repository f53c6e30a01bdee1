//! Case study accessors.

use serde::Deserialize;
use serde_json::{json, Value};

use super::client::ContentClient;
use super::models::{
    CaseStudy, CaseStudyListItem, CaseStudyStats, IndustryCount, ProjectTypeCount, SlugParam,
};
use super::query::{
    ContentQuery, Expr, Field, Filter, Ordering, Predicate, Projection, Selection, Slice,
    Visibility,
};
use super::{decode, decode_optional, query_string, slugs, strings, tally};
use crate::error::ContentError;

const DOC_TYPE: &str = "caseStudy";

pub const DEFAULT_FEATURED_LIMIT: usize = 3;
pub const DEFAULT_RELATED_LIMIT: usize = 3;

/// Filters accepted by [`get_case_studies`]. Absent values add no predicate.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseStudyFilter {
    #[serde(default, deserialize_with = "query_string::non_empty")]
    pub industry: Option<String>,
    #[serde(default, deserialize_with = "query_string::non_empty")]
    pub project_type: Option<String>,
    #[serde(default, deserialize_with = "query_string::flag")]
    pub featured: bool,
    #[serde(default, deserialize_with = "query_string::flag")]
    pub preview: bool,
}

fn list_projection() -> Projection {
    vec![
        Field::attr("_id"),
        Field::attr("title"),
        Field::path("slug", "slug.current"),
        Field::attr("shortDescription"),
        Field::object("client", "client", vec![Field::attr("name"), Field::attr("industry")]),
        Field::attr("projectType"),
        Field::path("heroImage", "heroImage.asset->url"),
        Field::object(
            "impactMetrics",
            "impact.metrics[0..2]",
            vec![Field::attr("metric"), Field::attr("value")],
        ),
        Field::attr("featured"),
        Field::attr("publishedAt"),
    ]
}

fn detail_projection(preview: bool) -> Projection {
    vec![
        Field::attr("_id"),
        Field::attr("_createdAt"),
        Field::attr("_updatedAt"),
        Field::attr("title"),
        Field::path("slug", "slug.current"),
        Field::attr("shortDescription"),
        Field::attr("client"),
        Field::attr("projectType"),
        Field::attr("timeline"),
        Field::attr("challenge"),
        Field::attr("approach"),
        Field::attr("solution"),
        Field::attr("impact"),
        Field::object("heroImage", "heroImage", vec![Field::attr("asset"), Field::attr("alt")]),
        Field::object(
            "gallery",
            "gallery",
            vec![Field::attr("asset"), Field::attr("alt"), Field::attr("caption")],
        ),
        Field::attr("beforeAfter"),
        Field::attr("featured"),
        Field::attr("isDraft"),
        Field::attr("publishedAt"),
        Field::references(
            "relatedCaseStudies",
            "relatedCaseStudies",
            Visibility::published(preview),
            vec![
                Field::attr("_id"),
                Field::attr("title"),
                Field::path("slug", "slug.current"),
                Field::attr("shortDescription"),
                Field::path("heroImage", "heroImage.asset->url"),
            ],
        ),
    ]
}

fn published() -> Filter {
    Filter::of_type(DOC_TYPE).published(false)
}

async fn list(
    client: &dyn ContentClient,
    selection: Selection,
) -> Result<Vec<CaseStudyListItem>, ContentError> {
    let query = ContentQuery::select(selection.project(list_projection()));
    decode(client.fetch(&query).await?)
}

/// Case studies ordered featured-first, then most recently published.
#[tracing::instrument(skip(client))]
pub async fn get_case_studies(
    client: &dyn ContentClient,
    params: &CaseStudyFilter,
) -> Result<Vec<CaseStudyListItem>, ContentError> {
    let mut filter = Filter::of_type(DOC_TYPE).published(params.preview);
    if let Some(industry) = &params.industry {
        filter = filter.eq("client.industry", "industry", industry.as_str());
    }
    if let Some(project_type) = &params.project_type {
        filter = filter.contains("projectType", "projectType", project_type.as_str());
    }
    if params.featured {
        filter = filter.flag("featured");
    }

    let selection = Selection::new(filter)
        .order(&[Ordering::desc("featured"), Ordering::desc("publishedAt")]);
    list(client, selection).await
}

/// Full case study, or `None` when no visible document has this slug.
#[tracing::instrument(skip(client))]
pub async fn get_case_study_by_slug(
    client: &dyn ContentClient,
    slug: &str,
    preview: bool,
) -> Result<Option<CaseStudy>, ContentError> {
    let filter = Filter::of_type(DOC_TYPE)
        .eq("slug.current", "slug", slug)
        .published(preview);
    let query = ContentQuery::select(Selection::new(filter).first().project(detail_projection(preview)));

    let mut case_study: Option<CaseStudy> = decode_optional(client.fetch(&query).await?)?;
    if let Some(cs) = case_study.as_mut() {
        cs.approach.process_steps.sort_by_key(|step| step.step_number);
    }
    Ok(case_study)
}

/// Most recently published featured case studies.
pub async fn get_featured_case_studies(
    client: &dyn ContentClient,
    limit: usize,
) -> Result<Vec<CaseStudyListItem>, ContentError> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let selection = Selection::new(published().flag("featured"))
        .order(&[Ordering::desc("publishedAt")])
        .slice(Slice::limit(limit));
    list(client, selection).await
}

/// Published case studies sharing a project type or the client industry with
/// `case_study_id`, excluding it.
#[tracing::instrument(skip(client))]
pub async fn get_related_case_studies(
    client: &dyn ContentClient,
    case_study_id: &str,
    limit: usize,
) -> Result<Vec<CaseStudyListItem>, ContentError> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    let source = Selection::new(Filter::of_type(DOC_TYPE).eq("_id", "id", case_study_id))
        .first()
        .project(vec![
            Field::attr("projectType"),
            Field::path("industry", "client.industry"),
        ]);
    let source = client.fetch(&ContentQuery::select(source)).await?;
    if source.is_null() {
        return Ok(Vec::new());
    }

    let project_types = strings(source.get("projectType"));
    let industry = source.get("industry").and_then(Value::as_str);

    let mut clauses = Vec::new();
    let mut filter = published().not_eq("_id", "id", case_study_id);
    if let Some(industry) = industry {
        filter = filter.bind("industry", industry);
        clauses.push(Predicate::Equals("client.industry", "industry".to_string()));
    }
    if !project_types.is_empty() {
        filter = filter.bind("projectTypes", json!(project_types));
        clauses.push(Predicate::Overlaps("projectType", "projectTypes".to_string()));
    }
    if clauses.is_empty() {
        return Ok(Vec::new());
    }

    let selection = Selection::new(filter.push(Predicate::Any(clauses)))
        .order(&[Ordering::desc("publishedAt")])
        .slice(Slice::limit(limit));
    list(client, selection).await
}

/// Distinct client industries with their published case study count.
pub async fn get_case_study_industries(
    client: &dyn ContentClient,
) -> Result<Vec<IndustryCount>, ContentError> {
    let selection =
        Selection::new(published()).project(vec![Field::path("industry", "client.industry")]);
    let rows: Vec<Value> = decode(client.fetch(&ContentQuery::select(selection)).await?)?;

    Ok(tally(rows.iter().flat_map(|row| strings(row.get("industry"))))
        .into_iter()
        .map(|(industry, count)| IndustryCount { industry, count })
        .collect())
}

/// Distinct project types with their published case study count.
pub async fn get_case_study_project_types(
    client: &dyn ContentClient,
) -> Result<Vec<ProjectTypeCount>, ContentError> {
    let selection = Selection::new(published()).project(vec![Field::attr("projectType")]);
    let rows: Vec<Value> = decode(client.fetch(&ContentQuery::select(selection)).await?)?;

    Ok(tally(rows.iter().flat_map(|row| strings(row.get("projectType"))))
        .into_iter()
        .map(|(project_type, count)| ProjectTypeCount { project_type, count })
        .collect())
}

/// Headline numbers for the impact page.
pub async fn get_case_study_stats(
    client: &dyn ContentClient,
) -> Result<CaseStudyStats, ContentError> {
    let query = ContentQuery {
        expr: Expr::Object(vec![
            ("totalProjects", Expr::Count(published())),
            (
                "caseStudies",
                Expr::Select(Selection::new(published()).project(vec![
                    Field::path("industry", "client.industry"),
                    Field::path("metrics", "impact.metrics[].metric"),
                ])),
            ),
        ]),
    };
    let result = client.fetch(&query).await?;

    let total_projects = result
        .get("totalProjects")
        .and_then(Value::as_u64)
        .unwrap_or_default() as usize;
    let rows = result
        .get("caseStudies")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let industries_served = tally(rows.iter().flat_map(|row| strings(row.get("industry")))).len();
    let metrics_reported = rows
        .iter()
        .map(|row| strings(row.get("metrics")).len())
        .sum();

    Ok(CaseStudyStats {
        total_projects,
        industries_served,
        metrics_reported,
    })
}

pub async fn case_study_static_params(
    client: &dyn ContentClient,
) -> Result<Vec<SlugParam>, ContentError> {
    slugs(client, published()).await
}
