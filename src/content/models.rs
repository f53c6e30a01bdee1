//! Typed shapes of the documents returned by the content queries.
//!
//! List items are the reduced projections (image fields already resolved to
//! URLs); detail types carry rich text as raw portable-text blocks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Portable-text block sequence, passed through untouched.
pub type RichText = Vec<Value>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageRef {
    pub asset: Option<Value>,
    pub alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Seo {
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub keywords: Vec<String>,
}

/// `{ "slug": "..." }` rows used by the pre-render pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlugParam {
    pub slug: String,
}

// ============================================================================
// Case studies
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSummary {
    pub name: String,
    pub industry: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricSummary {
    pub metric: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaseStudyListItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub slug: String,
    pub short_description: Option<String>,
    pub client: ClientSummary,
    pub project_type: Vec<String>,
    pub hero_image: Option<String>,
    pub impact_metrics: Vec<MetricSummary>,
    pub featured: bool,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Client {
    pub name: String,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub logo: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Timeline {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PainPoint {
    pub point: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Challenge {
    pub overview: RichText,
    pub pain_points: Vec<PainPoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessStep {
    pub step_number: u32,
    pub title: String,
    pub description: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Approach {
    pub methodology: RichText,
    pub process_steps: Vec<ProcessStep>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Deliverable {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Solution {
    pub overview: RichText,
    pub deliverables: Vec<Deliverable>,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metric {
    pub metric: String,
    pub value: String,
    pub change: Option<String>,
    pub context: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Testimonial {
    pub quote: String,
    pub author: String,
    pub role: Option<String>,
    pub photo: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Impact {
    pub overview: RichText,
    pub metrics: Vec<Metric>,
    pub testimonial: Option<Testimonial>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BeforeAfter {
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub description: Option<String>,
}

/// Related case study as resolved inside a detail projection (one level deep).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelatedCaseStudy {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub slug: String,
    pub short_description: Option<String>,
    pub hero_image: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaseStudy {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "_updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
    pub title: String,
    pub slug: String,
    pub short_description: Option<String>,
    pub client: Client,
    pub project_type: Vec<String>,
    pub timeline: Timeline,
    pub challenge: Challenge,
    pub approach: Approach,
    pub solution: Solution,
    pub impact: Impact,
    pub hero_image: Option<ImageRef>,
    pub gallery: Vec<ImageRef>,
    pub before_after: Option<BeforeAfter>,
    pub featured: bool,
    pub is_draft: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub related_case_studies: Vec<RelatedCaseStudy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryCount {
    pub industry: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectTypeCount {
    #[serde(rename = "type")]
    pub project_type: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseStudyStats {
    pub total_projects: usize,
    pub industries_served: usize,
    pub metrics_reported: usize,
}

// ============================================================================
// Blog
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthorSummary {
    pub name: String,
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlogPostListItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    pub author: Option<AuthorSummary>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub reading_time: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Author {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub photo: Option<Value>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelatedPost {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlogPost {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "_updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: RichText,
    pub featured_image: Option<ImageRef>,
    pub author: Option<Author>,
    pub categories: Vec<CategoryRef>,
    pub tags: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub is_draft: bool,
    pub reading_time: Option<u32>,
    pub seo: Option<Seo>,
    pub related_posts: Vec<RelatedPost>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedBlogPosts {
    pub posts: Vec<BlogPostListItem>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub slug: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

// ============================================================================
// Services
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceListItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub slug: String,
    pub tagline: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub category: Option<String>,
    pub featured: bool,
    pub featured_image: Option<String>,
    pub display_order: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Capability {
    pub capability: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceProcessStep {
    pub step_number: u32,
    pub title: String,
    pub description: Option<String>,
    pub duration: Option<String>,
    pub activities: Vec<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceTimeline {
    pub minimum: Option<String>,
    pub typical: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Package {
    pub name: String,
    pub price: Option<String>,
    pub description: Option<String>,
    pub features: Vec<String>,
    pub recommended: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Faq {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Service {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub slug: String,
    pub tagline: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub featured_image: Option<ImageRef>,
    pub category: Option<String>,
    pub featured: bool,
    pub full_description: RichText,
    pub ideal_for: Vec<String>,
    pub capabilities: Vec<Capability>,
    pub deliverables: Vec<Deliverable>,
    pub benefits: Vec<String>,
    pub process_overview: Option<String>,
    pub process_steps: Vec<ServiceProcessStep>,
    pub timeline: Option<ServiceTimeline>,
    pub pricing_model: Option<String>,
    pub starting_price: Option<String>,
    pub pricing_details: Option<String>,
    pub packages: Vec<Package>,
    pub related_case_studies: Vec<RelatedCaseStudy>,
    pub faqs: Vec<Faq>,
    pub is_active: bool,
    pub display_order: Option<i64>,
    pub seo: Option<Seo>,
}

// ============================================================================
// Team
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SocialLinks {
    pub linkedin: Option<String>,
    pub twitter: Option<String>,
    pub dribbble: Option<String>,
    pub behance: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamMemberListItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub slug: String,
    pub role: String,
    pub department: Option<String>,
    pub display_order: Option<i64>,
    pub photo: Option<String>,
    pub short_bio: Option<String>,
    pub expertise: Vec<String>,
    pub pronouns: Option<String>,
    pub social_links: Option<SocialLinks>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Education {
    pub degree: String,
    pub institution: Option<String>,
    pub year: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Award {
    pub title: String,
    pub organization: Option<String>,
    pub year: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamMember {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub slug: String,
    pub role: String,
    pub department: Option<String>,
    pub display_order: Option<i64>,
    pub photo: Option<ImageRef>,
    pub short_bio: Option<String>,
    pub full_bio: RichText,
    pub expertise: Vec<String>,
    pub quote: Option<String>,
    pub years_experience: Option<u32>,
    pub education: Vec<Education>,
    pub awards: Vec<Award>,
    pub email: Option<String>,
    pub social_links: Option<SocialLinks>,
    pub pronouns: Option<String>,
    pub is_active: bool,
    pub join_date: Option<String>,
    pub languages: Vec<String>,
    pub interests: Vec<String>,
    pub favorite_project: Option<RelatedCaseStudy>,
}
