//! Content query builder.
//!
//! Queries are built as values (filter, ordering, slice, projection) and
//! rendered to GROQ text only at the transport boundary. Caller-supplied
//! values are always bound as `$params`; the rendered text only ever contains
//! literals that come from this crate.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde_json::Value;

/// Bound query parameters, keyed by name without the `$`.
pub type Params = BTreeMap<String, Value>;

/// A single boolean clause. Paths are crate-defined attribute paths such as
/// `client.industry` or `categories[]->slug.current`.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `_type == "<type>"`
    TypeIs(&'static str),
    /// `isDraft != true`
    NotDraft,
    /// `publishedAt <= now()`
    PublishedUntilNow,
    /// `<path> == true`
    IsTrue(&'static str),
    /// `<path> == $param`
    Equals(&'static str, String),
    /// `<path> != $param`
    NotEquals(&'static str, String),
    /// `$param in <path>`
    ParamIn(String, &'static str),
    /// `count((<path>)[@ in $param]) > 0`
    Overlaps(&'static str, String),
    /// `lower(<path>) match $param`
    Matches(&'static str, String),
    /// `pt::text(<path>) match $param`
    TextMatches(&'static str, String),
    /// `(<a> || <b> || ...)`
    Any(Vec<Predicate>),
}

impl Predicate {
    fn render(&self, out: &mut String) {
        match self {
            Self::TypeIs(t) => {
                let _ = write!(out, "_type == \"{t}\"");
            }
            Self::NotDraft => out.push_str("isDraft != true"),
            Self::PublishedUntilNow => out.push_str("publishedAt <= now()"),
            Self::IsTrue(path) => {
                let _ = write!(out, "{path} == true");
            }
            Self::Equals(path, param) => {
                let _ = write!(out, "{path} == ${param}");
            }
            Self::NotEquals(path, param) => {
                let _ = write!(out, "{path} != ${param}");
            }
            Self::ParamIn(param, path) => {
                let _ = write!(out, "${param} in {path}");
            }
            Self::Overlaps(path, param) => {
                let _ = write!(out, "count(({path})[@ in ${param}]) > 0");
            }
            Self::Matches(path, param) => {
                let _ = write!(out, "lower({path}) match ${param}");
            }
            Self::TextMatches(path, param) => {
                let _ = write!(out, "pt::text({path}) match ${param}");
            }
            Self::Any(clauses) => {
                out.push('(');
                for (i, clause) in clauses.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" || ");
                    }
                    clause.render(out);
                }
                out.push(')');
            }
        }
    }
}

/// Which documents a public read may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Everything, drafts included (preview).
    All,
    /// `isDraft != true`
    Published,
    /// `isDraft != true && publishedAt <= now()`
    PublishedUntilNow,
}

impl Visibility {
    pub fn published(preview: bool) -> Self {
        if preview {
            Self::All
        } else {
            Self::Published
        }
    }

    pub fn published_until_now(preview: bool) -> Self {
        if preview {
            Self::All
        } else {
            Self::PublishedUntilNow
        }
    }

    pub fn predicates(self) -> Vec<Predicate> {
        match self {
            Self::All => Vec::new(),
            Self::Published => vec![Predicate::NotDraft],
            Self::PublishedUntilNow => vec![Predicate::NotDraft, Predicate::PublishedUntilNow],
        }
    }

    /// The gate as a clause over `prefix`-qualified attributes, e.g. `@->`.
    fn render(self, prefix: &str, out: &mut String) {
        for (i, predicate) in self.predicates().iter().enumerate() {
            if i > 0 {
                out.push_str(" && ");
            }
            out.push_str(prefix);
            predicate.render(out);
        }
    }
}

/// Ordered list of predicates joined with `&&`.
///
/// Always starts with the document type predicate, so it is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub(crate) predicates: Vec<Predicate>,
    pub(crate) params: Params,
}

impl Filter {
    pub fn of_type(doc_type: &'static str) -> Self {
        Self {
            predicates: vec![Predicate::TypeIs(doc_type)],
            params: Params::new(),
        }
    }

    pub fn visible(mut self, visibility: Visibility) -> Self {
        self.predicates.extend(visibility.predicates());
        self
    }

    /// Exclude drafts unless `preview` is set.
    pub fn published(self, preview: bool) -> Self {
        self.visible(Visibility::published(preview))
    }

    /// Exclude drafts and scheduled documents unless `preview` is set.
    pub fn published_until_now(self, preview: bool) -> Self {
        self.visible(Visibility::published_until_now(preview))
    }

    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub fn push(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn flag(self, path: &'static str) -> Self {
        self.push(Predicate::IsTrue(path))
    }

    pub fn eq(self, path: &'static str, param: &str, value: impl Into<Value>) -> Self {
        self.bind(param, value)
            .push(Predicate::Equals(path, param.to_string()))
    }

    pub fn not_eq(self, path: &'static str, param: &str, value: impl Into<Value>) -> Self {
        self.bind(param, value)
            .push(Predicate::NotEquals(path, param.to_string()))
    }

    /// `$param in <path>` for array-valued attributes.
    pub fn contains(self, path: &'static str, param: &str, value: impl Into<Value>) -> Self {
        self.bind(param, value)
            .push(Predicate::ParamIn(param.to_string(), path))
    }

    /// Case-insensitive substring match of `term` against any of `paths`.
    pub fn search(self, paths: &[&'static str], param: &str, term: &str) -> Self {
        let clauses = paths
            .iter()
            .map(|path| Predicate::Matches(path, param.to_string()))
            .collect();
        self.bind(param, wildcard(term)).push(Predicate::Any(clauses))
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The filter clause as it appears between `*[` and `]`.
    pub fn to_groq(&self) -> String {
        let mut out = String::new();
        for (i, predicate) in self.predicates.iter().enumerate() {
            if i > 0 {
                out.push_str(" && ");
            }
            predicate.render(&mut out);
        }
        out
    }
}

/// Build the `*term*` containment pattern for a search term.
pub fn wildcard(term: &str) -> String {
    format!("*{}*", term.trim().to_lowercase())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ordering {
    pub path: &'static str,
    pub descending: bool,
}

impl Ordering {
    pub const fn asc(path: &'static str) -> Self {
        Self {
            path,
            descending: false,
        }
    }

    pub const fn desc(path: &'static str) -> Self {
        Self {
            path,
            descending: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slice {
    All,
    /// `[0]`: a single document or `null`.
    First,
    /// Half-open `[start...end]`.
    Range { start: usize, end: usize },
}

impl Slice {
    pub fn limit(limit: usize) -> Self {
        Self::Range {
            start: 0,
            end: limit,
        }
    }

    /// Page `page` (1-based) of `page_size` items. Saturates at `usize::MAX`.
    pub fn page(page: usize, page_size: usize) -> Self {
        let start = page.saturating_sub(1).saturating_mul(page_size);
        Self::Range {
            start,
            end: start.saturating_add(page_size),
        }
    }
}

/// One entry in a projection.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// `name`
    Attr(&'static str),
    /// `"name": <path>`
    Path {
        name: &'static str,
        path: &'static str,
    },
    /// `"name": <path> { ... }`, mapped over arrays.
    Object {
        name: &'static str,
        path: &'static str,
        fields: Vec<Field>,
    },
    /// `"name": <attr>` dereferenced one level, dropping targets outside
    /// `visibility`. `many` marks an array of references.
    Ref {
        name: &'static str,
        attr: &'static str,
        many: bool,
        visibility: Visibility,
        fields: Vec<Field>,
    },
}

impl Field {
    pub fn attr(name: &'static str) -> Self {
        Self::Attr(name)
    }

    pub fn path(name: &'static str, path: &'static str) -> Self {
        Self::Path { name, path }
    }

    pub fn object(name: &'static str, path: &'static str, fields: Vec<Field>) -> Self {
        Self::Object { name, path, fields }
    }

    /// A single reference resolved to its target.
    pub fn reference(
        name: &'static str,
        attr: &'static str,
        visibility: Visibility,
        fields: Vec<Field>,
    ) -> Self {
        Self::Ref {
            name,
            attr,
            many: false,
            visibility,
            fields,
        }
    }

    /// An array of references resolved to their targets.
    pub fn references(
        name: &'static str,
        attr: &'static str,
        visibility: Visibility,
        fields: Vec<Field>,
    ) -> Self {
        Self::Ref {
            name,
            attr,
            many: true,
            visibility,
            fields,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Attr(name)
            | Self::Path { name, .. }
            | Self::Object { name, .. }
            | Self::Ref { name, .. } => name,
        }
    }

    fn render(&self, out: &mut String) {
        match self {
            Self::Attr(name) => out.push_str(name),
            Self::Path { name, path } => {
                let _ = write!(out, "\"{name}\": {path}");
            }
            Self::Object { name, path, fields } => {
                if name == path {
                    out.push_str(name);
                } else {
                    let _ = write!(out, "\"{name}\": {path}");
                }
                out.push(' ');
                render_fields(fields, out);
            }
            Self::Ref {
                name,
                attr,
                many,
                visibility,
                fields,
            } => {
                let _ = write!(out, "\"{name}\": ");
                match (*many, *visibility) {
                    (true, Visibility::All) => {
                        let _ = write!(out, "{attr}[]->");
                    }
                    (true, gated) => {
                        let _ = write!(out, "{attr}[");
                        gated.render("@->", out);
                        out.push_str("]->");
                    }
                    (false, Visibility::All) => {
                        let _ = write!(out, "{attr}->");
                    }
                    (false, gated) => {
                        let _ = write!(out, "*[_id == ^.{attr}._ref && ");
                        gated.render("", out);
                        out.push_str("][0]");
                    }
                }
                out.push(' ');
                render_fields(fields, out);
            }
        }
    }
}

fn render_fields(fields: &[Field], out: &mut String) {
    out.push_str("{ ");
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        field.render(out);
    }
    out.push_str(" }");
}

pub type Projection = Vec<Field>;

/// `*[filter] | order(...) [slice] { projection }`
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub filter: Filter,
    pub order: Vec<Ordering>,
    pub slice: Slice,
    pub projection: Option<Projection>,
}

impl Selection {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            order: Vec::new(),
            slice: Slice::All,
            projection: None,
        }
    }

    pub fn order(mut self, order: &[Ordering]) -> Self {
        self.order = order.to_vec();
        self
    }

    pub fn slice(mut self, slice: Slice) -> Self {
        self.slice = slice;
        self
    }

    pub fn first(self) -> Self {
        self.slice(Slice::First)
    }

    pub fn project(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    fn render(&self, out: &mut String) {
        let _ = write!(out, "*[{}]", self.filter.to_groq());
        if !self.order.is_empty() {
            out.push_str(" | order(");
            for (i, o) in self.order.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{} {}", o.path, if o.descending { "desc" } else { "asc" });
            }
            out.push(')');
        }
        match self.slice {
            Slice::All => {}
            Slice::First => out.push_str("[0]"),
            Slice::Range { start, end } => {
                let _ = write!(out, " [{start}...{end}]");
            }
        }
        if let Some(projection) = &self.projection {
            out.push(' ');
            render_fields(projection, out);
        }
    }
}

/// Top-level query expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Select(Selection),
    Count(Filter),
    /// `{ "key": <expr>, ... }`, evaluated in one round trip.
    Object(Vec<(&'static str, Expr)>),
}

impl Expr {
    fn render(&self, out: &mut String) {
        match self {
            Self::Select(selection) => selection.render(out),
            Self::Count(filter) => {
                let _ = write!(out, "count(*[{}])", filter.to_groq());
            }
            Self::Object(entries) => {
                out.push_str("{ ");
                for (i, (key, expr)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "\"{key}\": ");
                    expr.render(out);
                }
                out.push_str(" }");
            }
        }
    }

    fn collect_params(&self, params: &mut Params) {
        match self {
            Self::Select(selection) => params.extend(selection.filter.params.clone()),
            Self::Count(filter) => params.extend(filter.params.clone()),
            Self::Object(entries) => {
                for (_, expr) in entries {
                    expr.collect_params(params);
                }
            }
        }
    }
}

/// A complete query ready to hand to a [`ContentClient`](super::client::ContentClient).
#[derive(Debug, Clone, PartialEq)]
pub struct ContentQuery {
    pub expr: Expr,
}

impl ContentQuery {
    pub fn select(selection: Selection) -> Self {
        Self {
            expr: Expr::Select(selection),
        }
    }

    pub fn count(filter: Filter) -> Self {
        Self {
            expr: Expr::Count(filter),
        }
    }

    /// A page of items plus the total match count for the same filter.
    pub fn paged(selection: Selection) -> Self {
        let total = Expr::Count(selection.filter.clone());
        Self {
            expr: Expr::Object(vec![("items", Expr::Select(selection)), ("total", total)]),
        }
    }

    /// The GROQ text and the parameters it references.
    pub fn render(&self) -> (String, Params) {
        let mut text = String::new();
        self.expr.render(&mut text);
        let mut params = Params::new();
        self.expr.collect_params(&mut params);
        (text, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_always_starts_with_type() {
        let filter = Filter::of_type("caseStudy");
        assert_eq!(filter.to_groq(), "_type == \"caseStudy\"");
        assert_eq!(filter.predicates().len(), 1);
    }

    #[test]
    fn test_published_skipped_in_preview() {
        let live = Filter::of_type("blogPost").published_until_now(false);
        assert_eq!(
            live.to_groq(),
            "_type == \"blogPost\" && isDraft != true && publishedAt <= now()"
        );
        let preview = Filter::of_type("blogPost").published_until_now(true);
        assert_eq!(preview.to_groq(), "_type == \"blogPost\"");
    }

    #[test]
    fn test_caller_values_are_bound_not_interpolated() {
        let hostile = "\"] | *[_type == \"contactSubmission\"";
        let filter = Filter::of_type("caseStudy")
            .published(false)
            .eq("client.industry", "industry", hostile)
            .contains("projectType", "projectType", "research");
        let groq = filter.to_groq();
        assert!(!groq.contains("contactSubmission"));
        assert!(groq.contains("client.industry == $industry"));
        assert!(groq.contains("$projectType in projectType"));
        assert_eq!(filter.params()["industry"], Value::from(hostile));
    }

    #[test]
    fn test_search_binds_lowercase_wildcard() {
        let filter = Filter::of_type("blogPost").search(&["title", "excerpt"], "search", " Equity ");
        assert_eq!(
            filter.to_groq(),
            "_type == \"blogPost\" && (lower(title) match $search || lower(excerpt) match $search)"
        );
        assert_eq!(filter.params()["search"], Value::from("*equity*"));
    }

    #[test]
    fn test_page_slice_is_half_open() {
        assert_eq!(Slice::page(1, 10), Slice::Range { start: 0, end: 10 });
        assert_eq!(Slice::page(3, 5), Slice::Range { start: 10, end: 15 });
        assert_eq!(Slice::page(0, 5), Slice::Range { start: 0, end: 5 });
    }

    #[test]
    fn test_page_slice_saturates_on_huge_page() {
        assert_eq!(
            Slice::page(usize::MAX, 50),
            Slice::Range {
                start: usize::MAX,
                end: usize::MAX
            }
        );
    }

    #[test]
    fn test_reference_fields_render_visibility_gate() {
        let fields = || vec![Field::attr("_id")];
        let (text, _) = ContentQuery::select(
            Selection::new(Filter::of_type("blogPost")).first().project(vec![
                Field::references(
                    "relatedPosts",
                    "relatedPosts",
                    Visibility::PublishedUntilNow,
                    fields(),
                ),
                Field::reference("favoriteProject", "favoriteProject", Visibility::Published, fields()),
                Field::references("preview", "relatedPosts", Visibility::All, fields()),
            ]),
        )
        .render();
        assert_eq!(
            text,
            "*[_type == \"blogPost\"][0] { \
             \"relatedPosts\": relatedPosts[@->isDraft != true && @->publishedAt <= now()]-> { _id }, \
             \"favoriteProject\": *[_id == ^.favoriteProject._ref && isDraft != true][0] { _id }, \
             \"preview\": relatedPosts[]-> { _id } }"
        );
    }

    #[test]
    fn test_paged_query_renders_items_and_total() {
        let selection = Selection::new(Filter::of_type("blogPost").contains("tags", "tag", "policy"))
            .order(&[Ordering::desc("publishedAt")])
            .slice(Slice::page(2, 10))
            .project(vec![
                Field::attr("_id"),
                Field::path("slug", "slug.current"),
                Field::object("author", "author->", vec![Field::attr("name")]),
            ]);
        let (text, params) = ContentQuery::paged(selection).render();
        assert_eq!(
            text,
            "{ \"items\": *[_type == \"blogPost\" && $tag in tags] | order(publishedAt desc) [10...20] \
             { _id, \"slug\": slug.current, \"author\": author-> { name } }, \
             \"total\": count(*[_type == \"blogPost\" && $tag in tags]) }"
        );
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_first_slice_and_plain_object() {
        let selection = Selection::new(Filter::of_type("caseStudy").eq("slug.current", "slug", "x"))
            .first()
            .project(vec![Field::object("client", "client", vec![Field::attr("name")])]);
        let (text, _) = ContentQuery::select(selection).render();
        assert_eq!(
            text,
            "*[_type == \"caseStudy\" && slug.current == $slug][0] { client { name } }"
        );
    }
}
