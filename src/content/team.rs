//! Team member accessors.

use serde::Deserialize;

use super::client::ContentClient;
use super::models::{SlugParam, TeamMember, TeamMemberListItem};
use super::query::{ContentQuery, Field, Filter, Ordering, Projection, Selection, Visibility};
use super::{decode, decode_optional, slugs};
use crate::error::ContentError;

const DOC_TYPE: &str = "teamMember";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TeamOrdering {
    #[default]
    DisplayOrder,
    NameAsc,
    JoinDateDesc,
}

impl TeamOrdering {
    fn keys(self) -> &'static [Ordering] {
        const DISPLAY: &[Ordering] = &[Ordering::asc("displayOrder"), Ordering::asc("name")];
        const NAME: &[Ordering] = &[Ordering::asc("name")];
        const JOINED: &[Ordering] = &[Ordering::desc("joinDate"), Ordering::asc("name")];
        match self {
            Self::DisplayOrder => DISPLAY,
            Self::NameAsc => NAME,
            Self::JoinDateDesc => JOINED,
        }
    }
}

fn list_projection() -> Projection {
    vec![
        Field::attr("_id"),
        Field::attr("name"),
        Field::path("slug", "slug.current"),
        Field::attr("role"),
        Field::attr("department"),
        Field::attr("displayOrder"),
        Field::path("photo", "photo.asset->url"),
        Field::attr("shortBio"),
        Field::attr("expertise"),
        Field::attr("pronouns"),
        Field::attr("socialLinks"),
    ]
}

fn detail_projection() -> Projection {
    vec![
        Field::attr("_id"),
        Field::attr("name"),
        Field::path("slug", "slug.current"),
        Field::attr("role"),
        Field::attr("department"),
        Field::attr("displayOrder"),
        Field::attr("photo"),
        Field::attr("shortBio"),
        Field::attr("fullBio"),
        Field::attr("expertise"),
        Field::attr("quote"),
        Field::attr("yearsExperience"),
        Field::attr("education"),
        Field::attr("awards"),
        Field::attr("email"),
        Field::attr("socialLinks"),
        Field::attr("pronouns"),
        Field::attr("isActive"),
        Field::attr("joinDate"),
        Field::attr("languages"),
        Field::attr("interests"),
        Field::reference(
            "favoriteProject",
            "favoriteProject",
            Visibility::Published,
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

fn active() -> Filter {
    Filter::of_type(DOC_TYPE).flag("isActive")
}

#[tracing::instrument(skip(client))]
pub async fn get_team_members(
    client: &dyn ContentClient,
    ordering: TeamOrdering,
) -> Result<Vec<TeamMemberListItem>, ContentError> {
    let selection = Selection::new(active())
        .order(ordering.keys())
        .project(list_projection());
    decode(client.fetch(&ContentQuery::select(selection)).await?)
}

/// Full profile with the favorite project resolved one level deep.
#[tracing::instrument(skip(client))]
pub async fn get_team_member_by_slug(
    client: &dyn ContentClient,
    slug: &str,
) -> Result<Option<TeamMember>, ContentError> {
    let selection = Selection::new(active().eq("slug.current", "slug", slug))
        .first()
        .project(detail_projection());
    decode_optional(client.fetch(&ContentQuery::select(selection)).await?)
}

pub async fn team_member_static_params(
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

    fn member(id: &str, name: &str, order: i64, joined: &str, active: bool) -> Value {
        json!({
            "_id": id,
            "_type": "teamMember",
            "name": name,
            "slug": { "current": id },
            "role": "Consultant",
            "displayOrder": order,
            "joinDate": joined,
            "isActive": active,
            "expertise": ["facilitation"],
        })
    }

    fn store() -> MemoryContentStore {
        let mut lead = member("sam", "Sam Okafor", 1, "2019-05-01", true);
        lead["favoriteProject"] = json!({ "_ref": "cs-1" });
        MemoryContentStore::from_documents([
            lead,
            member("alex", "Alex Chen", 3, "2023-01-15", true),
            member("riley", "Riley Park", 2, "2021-09-01", true),
            member("former", "Former Member", 0, "2018-01-01", false),
            case_study("cs-1", "Education", &["research"], true, 2),
        ])
    }

    fn ids(items: &[TeamMemberListItem]) -> Vec<&str> {
        items.iter().map(|m| m.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_orderings() {
        let store = store();
        let by_order = get_team_members(&store, TeamOrdering::DisplayOrder).await.unwrap();
        assert_eq!(ids(&by_order), vec!["sam", "riley", "alex"]);

        let by_name = get_team_members(&store, TeamOrdering::NameAsc).await.unwrap();
        assert_eq!(ids(&by_name), vec!["alex", "riley", "sam"]);

        let by_join = get_team_members(&store, TeamOrdering::JoinDateDesc).await.unwrap();
        assert_eq!(ids(&by_join), vec!["alex", "riley", "sam"]);
    }

    #[tokio::test]
    async fn test_by_slug_resolves_favorite_project() {
        let store = store();
        let sam = get_team_member_by_slug(&store, "sam").await.unwrap().unwrap();
        assert_eq!(sam.favorite_project.unwrap().slug, "cs-1");

        let riley = get_team_member_by_slug(&store, "riley").await.unwrap().unwrap();
        assert!(riley.favorite_project.is_none());

        assert!(get_team_member_by_slug(&store, "former").await.unwrap().is_none());
        assert_eq!(team_member_static_params(&store).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_draft_favorite_project_is_hidden() {
        let mut draft = case_study("cs-draft", "Education", &["research"], false, 5);
        draft["isDraft"] = json!(true);
        let mut alex = member("alex", "Alex Chen", 3, "2023-01-15", true);
        alex["favoriteProject"] = json!({ "_ref": "cs-draft" });
        let store = MemoryContentStore::from_documents([alex, draft]);

        let alex = get_team_member_by_slug(&store, "alex").await.unwrap().unwrap();
        assert!(alex.favorite_project.is_none());
    }
}
