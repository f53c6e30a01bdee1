//! Service catalog accessors.

use serde::Deserialize;

use super::client::ContentClient;
use super::models::{Service, ServiceListItem, SlugParam};
use super::query::{ContentQuery, Field, Filter, Ordering, Projection, Selection, Visibility};
use super::{decode, decode_optional, slugs};
use crate::error::ContentError;

const DOC_TYPE: &str = "service";

/// Named catalog orderings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceOrdering {
    #[default]
    DisplayOrder,
    NameAsc,
    FeaturedFirst,
}

impl ServiceOrdering {
    fn keys(self) -> &'static [Ordering] {
        const DISPLAY: &[Ordering] = &[Ordering::asc("displayOrder"), Ordering::asc("name")];
        const NAME: &[Ordering] = &[Ordering::asc("name")];
        const FEATURED: &[Ordering] = &[
            Ordering::desc("featured"),
            Ordering::asc("displayOrder"),
            Ordering::asc("name"),
        ];
        match self {
            Self::DisplayOrder => DISPLAY,
            Self::NameAsc => NAME,
            Self::FeaturedFirst => FEATURED,
        }
    }
}

fn list_projection() -> Projection {
    vec![
        Field::attr("_id"),
        Field::attr("name"),
        Field::path("slug", "slug.current"),
        Field::attr("tagline"),
        Field::attr("description"),
        Field::attr("icon"),
        Field::attr("category"),
        Field::attr("featured"),
        Field::path("featuredImage", "featuredImage.asset->url"),
        Field::attr("displayOrder"),
    ]
}

fn detail_projection() -> Projection {
    vec![
        Field::attr("_id"),
        Field::attr("name"),
        Field::path("slug", "slug.current"),
        Field::attr("tagline"),
        Field::attr("description"),
        Field::attr("icon"),
        Field::attr("featuredImage"),
        Field::attr("category"),
        Field::attr("featured"),
        Field::attr("fullDescription"),
        Field::attr("idealFor"),
        Field::attr("capabilities"),
        Field::attr("deliverables"),
        Field::attr("benefits"),
        Field::attr("processOverview"),
        Field::attr("processSteps"),
        Field::attr("timeline"),
        Field::attr("pricingModel"),
        Field::attr("startingPrice"),
        Field::attr("pricingDetails"),
        Field::attr("packages"),
        Field::references(
            "relatedCaseStudies",
            "relatedCaseStudies",
            Visibility::Published,
            vec![
                Field::attr("_id"),
                Field::attr("title"),
                Field::path("slug", "slug.current"),
                Field::attr("shortDescription"),
                Field::path("heroImage", "heroImage.asset->url"),
            ],
        ),
        Field::attr("faqs"),
        Field::attr("isActive"),
        Field::attr("displayOrder"),
        Field::attr("seo"),
    ]
}

fn active() -> Filter {
    Filter::of_type(DOC_TYPE).flag("isActive")
}

/// Active services in the requested order.
#[tracing::instrument(skip(client))]
pub async fn get_services(
    client: &dyn ContentClient,
    ordering: ServiceOrdering,
) -> Result<Vec<ServiceListItem>, ContentError> {
    let selection = Selection::new(active())
        .order(ordering.keys())
        .project(list_projection());
    decode(client.fetch(&ContentQuery::select(selection)).await?)
}

#[tracing::instrument(skip(client))]
pub async fn get_service_by_slug(
    client: &dyn ContentClient,
    slug: &str,
) -> Result<Option<Service>, ContentError> {
    let selection = Selection::new(active().eq("slug.current", "slug", slug))
        .first()
        .project(detail_projection());

    let mut service: Option<Service> =
        decode_optional(client.fetch(&ContentQuery::select(selection)).await?)?;
    if let Some(service) = service.as_mut() {
        service.process_steps.sort_by_key(|step| step.step_number);
    }
    Ok(service)
}

pub async fn service_static_params(
    client: &dyn ContentClient,
) -> Result<Vec<SlugParam>, ContentError> {
    slugs(client, active()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::case_studies::fixtures::case_study;
    use crate::content::MemoryContentStore;
    use serde_json::{json, Value};

    fn service(id: &str, name: &str, order: i64, featured: bool, active: bool) -> Value {
        json!({
            "_id": id,
            "_type": "service",
            "name": name,
            "slug": { "current": id },
            "category": "consulting",
            "featured": featured,
            "isActive": active,
            "displayOrder": order,
            "processSteps": [
                { "stepNumber": 3, "title": "Deliver" },
                { "stepNumber": 1, "title": "Discover" },
                { "stepNumber": 2, "title": "Design" }
            ],
            "relatedCaseStudies": [{ "_ref": "cs-1" }],
        })
    }

    fn store() -> MemoryContentStore {
        MemoryContentStore::from_documents([
            service("research", "Research", 2, false, true),
            service("strategy", "Strategy", 3, true, true),
            service("audits", "Audits", 1, false, true),
            service("retired", "Retired", 0, true, false),
            case_study("cs-1", "Health", &["research"], false, 3),
        ])
    }

    fn ids(items: &[ServiceListItem]) -> Vec<&str> {
        items.iter().map(|s| s.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_orderings_only_return_active() {
        let store = store();
        let by_order = get_services(&store, ServiceOrdering::DisplayOrder).await.unwrap();
        assert_eq!(ids(&by_order), vec!["audits", "research", "strategy"]);

        let by_name = get_services(&store, ServiceOrdering::NameAsc).await.unwrap();
        assert_eq!(ids(&by_name), vec!["audits", "research", "strategy"]);

        let featured = get_services(&store, ServiceOrdering::FeaturedFirst).await.unwrap();
        assert_eq!(ids(&featured), vec!["strategy", "audits", "research"]);
    }

    #[tokio::test]
    async fn test_by_slug_sorts_steps_and_resolves_case_studies() {
        let store = store();
        let service = get_service_by_slug(&store, "research").await.unwrap().unwrap();
        let steps: Vec<u32> = service.process_steps.iter().map(|s| s.step_number).collect();
        assert_eq!(steps, vec![1, 2, 3]);
        assert_eq!(service.related_case_studies[0].title, "Case cs-1");

        assert!(get_service_by_slug(&store, "retired").await.unwrap().is_none());
        assert_eq!(service_static_params(&store).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_related_case_studies_skip_drafts() {
        let mut draft = case_study("cs-draft", "Health", &["policy"], false, 4);
        draft["isDraft"] = json!(true);
        let mut audits = service("audits", "Audits", 1, false, true);
        audits["relatedCaseStudies"] = json!([{ "_ref": "cs-draft" }, { "_ref": "cs-1" }]);
        let store = MemoryContentStore::from_documents([
            audits,
            draft,
            case_study("cs-1", "Health", &["research"], false, 3),
        ]);

        let service = get_service_by_slug(&store, "audits").await.unwrap().unwrap();
        let related: Vec<&str> = service
            .related_case_studies
            .iter()
            .map(|cs| cs.id.as_str())
            .collect();
        assert_eq!(related, vec!["cs-1"]);
    }

    #[test]
    fn test_ordering_parses_from_query_value() {
        let ordering: ServiceOrdering = serde_json::from_value(json!("featuredFirst")).unwrap();
        assert_eq!(ordering, ServiceOrdering::FeaturedFirst);
    }
}
