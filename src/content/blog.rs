//! Blog post accessors.

use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use super::client::ContentClient;
use super::memory::portable_text;
use super::models::{
    BlogPost, BlogPostListItem, CategoryCount, PaginatedBlogPosts, SlugParam, TagCount,
};
use super::query::{
    wildcard, ContentQuery, Expr, Field, Filter, Ordering, Predicate, Projection, Selection, Slice,
    Visibility,
};
use super::{decode, decode_optional, query_string, slugs, strings, tally};
use crate::error::ContentError;

const DOC_TYPE: &str = "blogPost";

const WORDS_PER_MINUTE: usize = 200;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const DEFAULT_RELATED_LIMIT: usize = 3;
pub const DEFAULT_RECENT_LIMIT: usize = 3;

/// Parameters accepted by [`get_blog_posts`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlogQuery {
    #[serde(deserialize_with = "first_page_if_blank")]
    pub page: usize,
    #[serde(deserialize_with = "default_size_if_blank")]
    pub page_size: usize,
    /// Category slug.
    #[serde(deserialize_with = "query_string::non_empty")]
    pub category: Option<String>,
    #[serde(deserialize_with = "query_string::non_empty")]
    pub tag: Option<String>,
    #[serde(deserialize_with = "query_string::non_empty")]
    pub search: Option<String>,
    #[serde(deserialize_with = "query_string::flag")]
    pub preview: bool,
}

fn first_page_if_blank<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    Ok(query_string::number(deserializer)?.unwrap_or(1))
}

fn default_size_if_blank<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    Ok(query_string::number(deserializer)?.unwrap_or(DEFAULT_PAGE_SIZE))
}

impl Default for BlogQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            category: None,
            tag: None,
            search: None,
            preview: false,
        }
    }
}

fn list_projection() -> Projection {
    vec![
        Field::attr("_id"),
        Field::attr("title"),
        Field::path("slug", "slug.current"),
        Field::attr("excerpt"),
        Field::path("featuredImage", "featuredImage.asset->url"),
        Field::object(
            "author",
            "author->",
            vec![Field::attr("name"), Field::path("photo", "photo.asset->url")],
        ),
        Field::path("categories", "categories[]->title"),
        Field::attr("tags"),
        Field::attr("publishedAt"),
        Field::attr("readingTime"),
    ]
}

fn detail_projection(preview: bool) -> Projection {
    vec![
        Field::attr("_id"),
        Field::attr("_createdAt"),
        Field::attr("_updatedAt"),
        Field::attr("title"),
        Field::path("slug", "slug.current"),
        Field::attr("excerpt"),
        Field::attr("content"),
        Field::object(
            "featuredImage",
            "featuredImage",
            vec![Field::attr("asset"), Field::attr("alt")],
        ),
        Field::object(
            "author",
            "author->",
            vec![
                Field::attr("_id"),
                Field::attr("name"),
                Field::attr("photo"),
                Field::attr("role"),
            ],
        ),
        Field::object(
            "categories",
            "categories[]->",
            vec![
                Field::attr("_id"),
                Field::attr("title"),
                Field::path("slug", "slug.current"),
            ],
        ),
        Field::attr("tags"),
        Field::attr("publishedAt"),
        Field::attr("isDraft"),
        Field::attr("readingTime"),
        Field::attr("seo"),
        Field::references(
            "relatedPosts",
            "relatedPosts",
            Visibility::published_until_now(preview),
            vec![
                Field::attr("_id"),
                Field::attr("title"),
                Field::path("slug", "slug.current"),
                Field::attr("excerpt"),
                Field::path("featuredImage", "featuredImage.asset->url"),
                Field::attr("publishedAt"),
            ],
        ),
    ]
}

fn published() -> Filter {
    Filter::of_type(DOC_TYPE).published_until_now(false)
}

fn newest_first(filter: Filter) -> Selection {
    Selection::new(filter).order(&[Ordering::desc("publishedAt")])
}

async fn list(
    client: &dyn ContentClient,
    selection: Selection,
) -> Result<Vec<BlogPostListItem>, ContentError> {
    let query = ContentQuery::select(selection.project(list_projection()));
    decode(client.fetch(&query).await?)
}

/// One page of posts plus the total match count, fetched in a single round trip.
#[tracing::instrument(skip(client))]
pub async fn get_blog_posts(
    client: &dyn ContentClient,
    params: &BlogQuery,
) -> Result<PaginatedBlogPosts, ContentError> {
    let page = params.page.max(1);
    let page_size = params.page_size;

    let mut filter = Filter::of_type(DOC_TYPE).published_until_now(params.preview);
    if let Some(category) = &params.category {
        filter = filter.contains("categories[]->slug.current", "category", category.as_str());
    }
    if let Some(tag) = &params.tag {
        filter = filter.contains("tags", "tag", tag.as_str());
    }
    if let Some(search) = params.search.as_deref().filter(|s| !s.trim().is_empty()) {
        filter = filter.search(&["title", "excerpt"], "search", search);
    }

    let slice = Slice::page(page, page_size);
    let end = match slice {
        Slice::Range { end, .. } => end,
        _ => 0,
    };
    let selection = newest_first(filter).slice(slice).project(list_projection());
    let result = client.fetch(&ContentQuery::paged(selection)).await?;

    let total = result
        .get("total")
        .and_then(Value::as_u64)
        .unwrap_or_default() as usize;
    let posts: Vec<BlogPostListItem> =
        decode(result.get("items").cloned().unwrap_or(Value::Array(Vec::new())))?;

    Ok(PaginatedBlogPosts {
        posts,
        total,
        page,
        page_size,
        has_more: end < total,
    })
}

/// Full post, or `None` when no visible post has this slug. Reading time is
/// derived from the body when the document does not carry one.
#[tracing::instrument(skip(client))]
pub async fn get_blog_post_by_slug(
    client: &dyn ContentClient,
    slug: &str,
    preview: bool,
) -> Result<Option<BlogPost>, ContentError> {
    let filter = Filter::of_type(DOC_TYPE)
        .eq("slug.current", "slug", slug)
        .published_until_now(preview);
    let query = ContentQuery::select(Selection::new(filter).first().project(detail_projection(preview)));

    let mut post: Option<BlogPost> = decode_optional(client.fetch(&query).await?)?;
    if let Some(post) = post.as_mut() {
        if post.reading_time.is_none() {
            post.reading_time = Some(calculate_reading_time(&post.content));
        }
    }
    Ok(post)
}

/// Published posts sharing a category or a tag with `post_id`, excluding it.
#[tracing::instrument(skip(client))]
pub async fn get_related_blog_posts(
    client: &dyn ContentClient,
    post_id: &str,
    limit: usize,
) -> Result<Vec<BlogPostListItem>, ContentError> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    let source = Selection::new(Filter::of_type(DOC_TYPE).eq("_id", "id", post_id))
        .first()
        .project(vec![
            Field::path("categories", "categories[]._ref"),
            Field::attr("tags"),
        ]);
    let source = client.fetch(&ContentQuery::select(source)).await?;
    if source.is_null() {
        return Ok(Vec::new());
    }

    let categories = strings(source.get("categories"));
    let tags = strings(source.get("tags"));

    let mut clauses = Vec::new();
    let mut filter = published().not_eq("_id", "id", post_id);
    if !categories.is_empty() {
        filter = filter.bind("categories", json!(categories));
        clauses.push(Predicate::Overlaps("categories[]._ref", "categories".to_string()));
    }
    if !tags.is_empty() {
        filter = filter.bind("tags", json!(tags));
        clauses.push(Predicate::Overlaps("tags", "tags".to_string()));
    }
    if clauses.is_empty() {
        return Ok(Vec::new());
    }

    let selection = newest_first(filter.push(Predicate::Any(clauses))).slice(Slice::limit(limit));
    list(client, selection).await
}

/// Every category with its published post count, busiest first.
pub async fn get_blog_categories(
    client: &dyn ContentClient,
) -> Result<Vec<CategoryCount>, ContentError> {
    let query = ContentQuery {
        expr: Expr::Object(vec![
            (
                "categories",
                Expr::Select(Selection::new(Filter::of_type("category")).project(vec![
                    Field::attr("_id"),
                    Field::attr("title"),
                    Field::path("slug", "slug.current"),
                ])),
            ),
            (
                "posts",
                Expr::Select(
                    Selection::new(published())
                        .project(vec![Field::path("categories", "categories[]._ref")]),
                ),
            ),
        ]),
    };
    let result = client.fetch(&query).await?;

    let posts = result
        .get("posts")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let counts: std::collections::BTreeMap<String, usize> = tally(
        posts
            .iter()
            .flat_map(|post| strings(post.get("categories"))),
    )
    .into_iter()
    .collect();

    let mut categories: Vec<CategoryCount> = result
        .get("categories")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|row| {
            let id = row.get("_id")?.as_str()?.to_string();
            Some(CategoryCount {
                count: counts.get(&id).copied().unwrap_or_default(),
                title: row.get("title").and_then(Value::as_str).unwrap_or_default().to_string(),
                slug: row.get("slug").and_then(Value::as_str).unwrap_or_default().to_string(),
                id,
            })
        })
        .collect();
    categories.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.title.cmp(&b.title)));
    Ok(categories)
}

/// Every tag used by a published post with its post count, busiest first.
pub async fn get_blog_tags(client: &dyn ContentClient) -> Result<Vec<TagCount>, ContentError> {
    let selection = Selection::new(published()).project(vec![Field::attr("tags")]);
    let rows: Vec<Value> = decode(client.fetch(&ContentQuery::select(selection)).await?)?;

    Ok(tally(rows.iter().flat_map(|row| strings(row.get("tags"))))
        .into_iter()
        .map(|(tag, count)| TagCount { tag, count })
        .collect())
}

/// Case-insensitive substring search over title, excerpt and body text.
#[tracing::instrument(skip(client))]
pub async fn search_blog_posts(
    client: &dyn ContentClient,
    term: &str,
    limit: usize,
) -> Result<Vec<BlogPostListItem>, ContentError> {
    if limit == 0 || term.trim().is_empty() {
        return Ok(Vec::new());
    }
    let filter = published().bind("search", wildcard(term)).push(Predicate::Any(vec![
        Predicate::Matches("title", "search".to_string()),
        Predicate::Matches("excerpt", "search".to_string()),
        Predicate::TextMatches("content", "search".to_string()),
    ]));
    list(client, newest_first(filter).slice(Slice::limit(limit))).await
}

pub async fn get_recent_blog_posts(
    client: &dyn ContentClient,
    limit: usize,
) -> Result<Vec<BlogPostListItem>, ContentError> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    list(client, newest_first(published()).slice(Slice::limit(limit))).await
}

/// Posts highlighted on the landing page. There is no editorial flag for
/// posts, so these are the most recently published.
pub async fn get_featured_blog_posts(
    client: &dyn ContentClient,
    limit: usize,
) -> Result<Vec<BlogPostListItem>, ContentError> {
    get_recent_blog_posts(client, limit).await
}

pub async fn blog_post_static_params(
    client: &dyn ContentClient,
) -> Result<Vec<SlugParam>, ContentError> {
    slugs(client, published()).await
}

/// Minutes to read a portable-text body at 200 words per minute, rounded up.
/// Non-empty content always takes at least a minute.
pub fn calculate_reading_time(content: &[Value]) -> u32 {
    if content.is_empty() {
        return 0;
    }
    let text = portable_text(&Value::Array(content.to_vec()));
    let words = text.split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE).max(1) as u32
}

pub fn blog_post_url(slug: &str) -> String {
    format!("/insights/{slug}")
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{json, Value};

    pub fn paragraph(text: &str) -> Value {
        json!({
            "_type": "block",
            "children": [{ "_type": "span", "text": text }]
        })
    }

    pub fn post(id: &str, title: &str, day: u32, categories: &[&str], tags: &[&str]) -> Value {
        let refs: Vec<Value> = categories.iter().map(|c| json!({ "_ref": c })).collect();
        json!({
            "_id": id,
            "_type": "blogPost",
            "title": title,
            "slug": { "current": id },
            "excerpt": format!("Excerpt for {id}"),
            "content": [paragraph("Body text about community design.")],
            "author": { "_ref": "author-1" },
            "categories": refs,
            "tags": tags,
            "publishedAt": format!("2024-02-{day:02}T09:00:00Z"),
        })
    }

    pub fn category(id: &str, title: &str) -> Value {
        json!({ "_id": id, "_type": "category", "title": title, "slug": { "current": title.to_lowercase() } })
    }

    pub fn author() -> Value {
        json!({ "_id": "author-1", "_type": "teamMember", "name": "Jordan Rivers", "role": "Principal" })
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{author, category, paragraph, post};
    use super::*;
    use crate::content::MemoryContentStore;

    fn store() -> MemoryContentStore {
        let mut draft = post("draft", "Draft Equity", 20, &["cat-policy"], &[]);
        draft["isDraft"] = json!(true);
        let mut scheduled = post("scheduled", "Future Equity", 1, &[], &[]);
        scheduled["publishedAt"] = json!("2999-01-01T00:00:00Z");
        let mut body_match = post("body", "Field notes", 4, &[], &["fieldwork"]);
        body_match["content"] = json!([paragraph("Notes on EQUITY in practice.")]);

        MemoryContentStore::from_documents([
            author(),
            category("cat-policy", "Policy"),
            category("cat-design", "Design"),
            category("cat-empty", "Empty"),
            post("p1", "Equity in Design", 10, &["cat-design"], &["equity", "design"]),
            post("p2", "Designing for equity", 12, &["cat-policy"], &["equity"]),
            post("p3", "Civic tech", 8, &["cat-policy"], &["civic"]),
            post("p4", "EQUITY audits", 6, &[], &["audit"]),
            post("p5", "Team update", 2, &["cat-design"], &[]),
            body_match,
            draft,
            scheduled,
        ])
    }

    #[tokio::test]
    async fn test_pagination_invariants() {
        let store = store();
        let page = get_blog_posts(
            &store,
            &BlogQuery {
                page: 1,
                page_size: 4,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.total, 6);
        assert_eq!(page.posts.len(), 4);
        assert!(page.has_more);
        assert_eq!(page.posts[0].id, "p2");
        assert_eq!(page.posts[0].author.as_ref().unwrap().name, "Jordan Rivers");
        assert_eq!(page.posts[0].categories, vec!["Policy"]);

        let last = get_blog_posts(
            &store,
            &BlogQuery {
                page: 2,
                page_size: 4,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(last.posts.len(), 2);
        assert!(!last.has_more);
        assert_eq!(last.has_more, last.page * last.page_size < last.total);
    }

    #[tokio::test]
    async fn test_category_tag_and_search_filters() {
        let store = store();
        let by_category = get_blog_posts(
            &store,
            &BlogQuery {
                category: Some("policy".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let ids: Vec<&str> = by_category.posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p3"]);

        let by_tag = get_blog_posts(
            &store,
            &BlogQuery {
                tag: Some("equity".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(by_tag.total, 2);

        let searched = get_blog_posts(
            &store,
            &BlogQuery {
                search: Some("EQUITY".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(searched.total, 3);

        let unknown = get_blog_posts(
            &store,
            &BlogQuery {
                category: Some("nonexistent".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(unknown.total, 0);
        assert!(!unknown.has_more);
    }

    #[tokio::test]
    async fn test_search_matches_title_case_insensitively() {
        let store = MemoryContentStore::from_documents([
            post("a", "Equity first", 1, &[], &[]),
            post("b", "Building EQUITY", 3, &[], &[]),
            post("c", "the equity lens", 2, &[], &[]),
            post("d", "Civic tech", 4, &[], &[]),
            post("e", "Team news", 5, &[], &[]),
        ]);
        let hits = search_blog_posts(&store, "equity", 5).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_search_includes_body_text() {
        let store = store();
        let hits = search_blog_posts(&store, "equity", 10).await.unwrap();
        assert!(hits.iter().any(|p| p.id == "body"));
        assert!(!hits.iter().any(|p| p.id == "draft" || p.id == "scheduled"));
        assert!(search_blog_posts(&store, "  ", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_by_slug_fills_reading_time_and_hides_scheduled() {
        let store = store();
        let post = get_blog_post_by_slug(&store, "p1", false).await.unwrap().unwrap();
        assert_eq!(post.reading_time, Some(1));
        assert_eq!(post.categories[0].slug.as_deref(), Some("design"));
        assert!(get_blog_post_by_slug(&store, "scheduled", false).await.unwrap().is_none());
        assert!(get_blog_post_by_slug(&store, "scheduled", true).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_related_references_hide_drafts_and_scheduled() {
        let mut live = post("live", "Live post", 9, &[], &[]);
        live["relatedPosts"] = json!([
            { "_ref": "draft" },
            { "_ref": "scheduled" },
            { "_ref": "p3" }
        ]);
        let mut docs = vec![live];
        let store = store();
        for id in ["draft", "scheduled", "p3"] {
            docs.push(store.get(id).await.unwrap());
        }
        let store = MemoryContentStore::from_documents(docs);

        let post = get_blog_post_by_slug(&store, "live", false).await.unwrap().unwrap();
        let related: Vec<&str> = post.related_posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(related, vec!["p3"]);

        let preview = get_blog_post_by_slug(&store, "live", true).await.unwrap().unwrap();
        assert_eq!(preview.related_posts.len(), 3);
    }

    #[tokio::test]
    async fn test_huge_page_is_empty_without_more() {
        let store = store();
        let page = get_blog_posts(
            &store,
            &BlogQuery {
                page: usize::MAX,
                page_size: 50,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(page.posts.is_empty());
        assert_eq!(page.total, 6);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_related_by_category_or_tag() {
        let store = store();
        let related = get_related_blog_posts(&store, "p1", 3).await.unwrap();
        let ids: Vec<&str> = related.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p5"]);
        assert!(get_related_blog_posts(&store, "p1", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_categories_and_tags_counts() {
        let store = store();
        let categories = get_blog_categories(&store).await.unwrap();
        let summary: Vec<(&str, usize)> = categories
            .iter()
            .map(|c| (c.title.as_str(), c.count))
            .collect();
        assert_eq!(summary, vec![("Design", 2), ("Policy", 2), ("Empty", 0)]);

        let tags = get_blog_tags(&store).await.unwrap();
        assert_eq!(
            tags[0],
            TagCount {
                tag: "equity".to_string(),
                count: 2
            }
        );
    }

    #[test]
    fn test_reading_time_rounds_up() {
        let words = vec!["word"; 401].join(" ");
        assert_eq!(calculate_reading_time(&[paragraph(&words)]), 3);
        assert_eq!(calculate_reading_time(&[paragraph("short")]), 1);
        assert_eq!(calculate_reading_time(&[]), 0);
        assert_eq!(blog_post_url("equity-audits"), "/insights/equity-audits");
    }
}
