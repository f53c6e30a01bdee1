//! In-process content store.
//!
//! Documents live in a flat table keyed by `_id`; references are `_ref` ids
//! resolved on demand while evaluating a path, never stored as links. Used
//! when no Sanity project is configured (local development against an
//! export file) and by tests.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::client::{ContentClient, Mutation};
use super::query::{
    ContentQuery, Expr, Field, Filter, Params, Predicate, Selection, Slice, Visibility,
};
use crate::error::ContentError;

type Table = BTreeMap<String, Value>;

#[derive(Default)]
pub struct MemoryContentStore {
    docs: RwLock<Table>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_documents(documents: impl IntoIterator<Item = Value>) -> Self {
        let docs = documents
            .into_iter()
            .filter_map(|doc| {
                let id = doc.get("_id")?.as_str()?.to_string();
                Some((id, doc))
            })
            .collect();
        Self {
            docs: RwLock::new(docs),
        }
    }

    /// Load a JSON array or an NDJSON export (one document per line).
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ContentError> {
        let raw = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| ContentError::Query(format!("cannot read seed file: {e}")))?;
        let trimmed = raw.trim_start();
        let documents: Vec<Value> = if trimmed.starts_with('[') {
            serde_json::from_str(trimmed)?
        } else {
            raw.lines()
                .filter(|line| !line.trim().is_empty())
                .map(serde_json::from_str)
                .collect::<Result<_, _>>()?
        };
        tracing::info!(count = documents.len(), "content seed loaded");
        Ok(Self::from_documents(documents))
    }

    pub async fn get(&self, id: &str) -> Option<Value> {
        self.docs.read().await.get(id).cloned()
    }

    pub async fn documents_of_type(&self, doc_type: &str) -> Vec<Value> {
        self.docs
            .read()
            .await
            .values()
            .filter(|doc| doc.get("_type").and_then(Value::as_str) == Some(doc_type))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ContentClient for MemoryContentStore {
    async fn fetch(&self, query: &ContentQuery) -> Result<Value, ContentError> {
        let docs = self.docs.read().await;
        let eval = Evaluator {
            docs: &docs,
            now: Utc::now(),
        };
        eval.expr(&query.expr)
    }

    async fn mutate(&self, mutations: Vec<Mutation>) -> Result<(), ContentError> {
        let mut docs = self.docs.write().await;
        // Validate on a copy so the transaction applies all-or-nothing.
        let mut staged = docs.clone();
        for mutation in mutations {
            apply(&mut staged, mutation)?;
        }
        *docs = staged;
        Ok(())
    }
}

fn document_id(doc: &mut Value) -> Result<String, ContentError> {
    let obj = doc
        .as_object_mut()
        .ok_or_else(|| ContentError::Query("document must be an object".to_string()))?;
    let id = match obj.get("_id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            obj.insert("_id".to_string(), Value::from(id.clone()));
            id
        }
    };
    Ok(id)
}

fn apply(docs: &mut Table, mutation: Mutation) -> Result<(), ContentError> {
    match mutation {
        Mutation::Create(mut doc) => {
            let id = document_id(&mut doc)?;
            if docs.contains_key(&id) {
                return Err(ContentError::Query(format!("document {id} already exists")));
            }
            docs.insert(id, doc);
        }
        Mutation::CreateOrReplace(mut doc) => {
            let id = document_id(&mut doc)?;
            docs.insert(id, doc);
        }
        Mutation::Patch { id, set, unset } => {
            let doc = docs
                .get_mut(&id)
                .and_then(Value::as_object_mut)
                .ok_or_else(|| ContentError::Query(format!("document {id} not found")))?;
            for (key, value) in set {
                doc.insert(key, value);
            }
            for key in unset {
                doc.remove(&key);
            }
        }
    }
    Ok(())
}

/// One step of an attribute path such as `categories[]->slug.current`.
#[derive(Debug, Clone, PartialEq)]
enum Step {
    Attr(String),
    Each,
    Range(usize, usize),
    Deref,
}

fn parse_path(path: &str) -> Vec<Step> {
    let mut steps = Vec::new();
    let mut chars = path.chars().peekable();
    let mut ident = String::new();

    let flush = |ident: &mut String, steps: &mut Vec<Step>| {
        if !ident.is_empty() {
            steps.push(Step::Attr(std::mem::take(ident)));
        }
    };

    while let Some(c) = chars.next() {
        match c {
            '.' => flush(&mut ident, &mut steps),
            '[' => {
                flush(&mut ident, &mut steps);
                let inner: String = chars.by_ref().take_while(|c| *c != ']').collect();
                match inner.split_once("..") {
                    Some((a, b)) => {
                        let start = a.trim().parse().unwrap_or(0);
                        let end = b.trim().parse().unwrap_or(start);
                        steps.push(Step::Range(start, end));
                    }
                    None => steps.push(Step::Each),
                }
            }
            '-' if chars.peek() == Some(&'>') => {
                chars.next();
                flush(&mut ident, &mut steps);
                steps.push(Step::Deref);
            }
            c => ident.push(c),
        }
    }
    flush(&mut ident, &mut steps);
    steps
}

struct Evaluator<'a> {
    docs: &'a Table,
    now: DateTime<Utc>,
}

impl Evaluator<'_> {
    fn expr(&self, expr: &Expr) -> Result<Value, ContentError> {
        match expr {
            Expr::Select(selection) => self.select(selection),
            Expr::Count(filter) => Ok(Value::from(self.matching(filter).len())),
            Expr::Object(entries) => {
                let mut out = Map::new();
                for (key, expr) in entries {
                    out.insert((*key).to_string(), self.expr(expr)?);
                }
                Ok(Value::Object(out))
            }
        }
    }

    fn matching(&self, filter: &Filter) -> Vec<&Value> {
        self.docs
            .values()
            .filter(|doc| {
                filter
                    .predicates
                    .iter()
                    .all(|p| self.predicate(doc, p, &filter.params))
            })
            .collect()
    }

    fn select(&self, selection: &Selection) -> Result<Value, ContentError> {
        let mut hits = self.matching(&selection.filter);

        hits.sort_by(|a, b| {
            for order in &selection.order {
                let left = self.path(a, order.path);
                let right = self.path(b, order.path);
                let ord = compare(&left, &right);
                let ord = if order.descending { ord.reverse() } else { ord };
                if ord != CmpOrdering::Equal {
                    return ord;
                }
            }
            CmpOrdering::Equal
        });

        let project = |doc: &Value| match &selection.projection {
            Some(fields) => self.project(doc, fields),
            None => doc.clone(),
        };

        Ok(match selection.slice {
            Slice::First => hits.first().map(|d| project(d)).unwrap_or(Value::Null),
            Slice::All => Value::Array(hits.into_iter().map(project).collect()),
            Slice::Range { start, end } => Value::Array(
                hits.into_iter()
                    .skip(start)
                    .take(end.saturating_sub(start))
                    .map(project)
                    .collect(),
            ),
        })
    }

    fn project(&self, doc: &Value, fields: &[Field]) -> Value {
        let mut out = Map::new();
        for field in fields {
            let value = match field {
                Field::Attr(name) => doc.get(*name).cloned().unwrap_or(Value::Null),
                Field::Path { path, .. } => self.path(doc, path),
                Field::Object { path, fields, .. } => match self.path(doc, path) {
                    Value::Array(items) => Value::Array(
                        items
                            .iter()
                            .filter(|item| item.is_object())
                            .map(|item| self.project(item, fields))
                            .collect(),
                    ),
                    value @ Value::Object(_) => self.project(&value, fields),
                    _ => Value::Null,
                },
                Field::Ref {
                    attr,
                    many,
                    visibility,
                    fields,
                    ..
                } => {
                    let resolve = |link: &Value| self.resolve(link, *visibility, fields);
                    match (doc.get(*attr), *many) {
                        (Some(Value::Array(links)), true) => {
                            Value::Array(links.iter().filter_map(resolve).collect())
                        }
                        (Some(link), false) => resolve(link).unwrap_or(Value::Null),
                        _ => Value::Null,
                    }
                }
            };
            out.insert(field.name().to_string(), value);
        }
        Value::Object(out)
    }

    /// Projected target of a `_ref`, or `None` when it is missing or not visible.
    fn resolve(&self, link: &Value, visibility: Visibility, fields: &[Field]) -> Option<Value> {
        let target = link
            .get("_ref")
            .and_then(Value::as_str)
            .and_then(|id| self.docs.get(id))?;
        let params = Params::new();
        visibility
            .predicates()
            .iter()
            .all(|p| self.predicate(target, p, &params))
            .then(|| self.project(target, fields))
    }

    fn path(&self, doc: &Value, path: &str) -> Value {
        self.walk(doc, &parse_path(path))
    }

    fn walk(&self, value: &Value, steps: &[Step]) -> Value {
        let Some((step, rest)) = steps.split_first() else {
            return value.clone();
        };
        match step {
            Step::Attr(name) => match value {
                Value::Array(items) => {
                    Value::Array(items.iter().map(|item| self.walk(item, steps)).collect())
                }
                Value::Object(obj) => match obj.get(name) {
                    Some(next) => self.walk(next, rest),
                    None => Value::Null,
                },
                _ => Value::Null,
            },
            Step::Each => match value {
                Value::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        match self.walk(item, rest) {
                            Value::Array(nested) if rest.iter().any(|s| *s == Step::Each) => {
                                out.extend(nested)
                            }
                            v => out.push(v),
                        }
                    }
                    Value::Array(out)
                }
                _ => Value::Null,
            },
            Step::Range(start, end) => match value {
                Value::Array(items) => {
                    let slice: Vec<Value> = items
                        .iter()
                        .skip(*start)
                        .take(end.saturating_sub(*start) + 1)
                        .cloned()
                        .collect();
                    self.walk(&Value::Array(slice), rest)
                }
                _ => Value::Null,
            },
            Step::Deref => {
                let target = value
                    .get("_ref")
                    .and_then(Value::as_str)
                    .and_then(|id| self.docs.get(id));
                match target {
                    Some(doc) => self.walk(doc, rest),
                    None => Value::Null,
                }
            }
        }
    }

    fn predicate(&self, doc: &Value, predicate: &Predicate, params: &Params) -> bool {
        let param = |name: &String| params.get(name).cloned().unwrap_or(Value::Null);
        match predicate {
            Predicate::TypeIs(t) => doc.get("_type").and_then(Value::as_str) == Some(*t),
            Predicate::NotDraft => doc.get("isDraft") != Some(&Value::Bool(true)),
            Predicate::PublishedUntilNow => doc
                .get("publishedAt")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .is_some_and(|at| at.with_timezone(&Utc) <= self.now),
            Predicate::IsTrue(path) => self.path(doc, path) == Value::Bool(true),
            Predicate::Equals(path, name) => {
                let value = self.path(doc, path);
                !value.is_null() && value == param(name)
            }
            Predicate::NotEquals(path, name) => self.path(doc, path) != param(name),
            Predicate::ParamIn(name, path) => {
                let needle = param(name);
                match self.path(doc, path) {
                    Value::Array(items) => items.contains(&needle),
                    other => !other.is_null() && other == needle,
                }
            }
            Predicate::Overlaps(path, name) => {
                let wanted = match param(name) {
                    Value::Array(items) => items,
                    _ => return false,
                };
                match self.path(doc, path) {
                    Value::Array(items) => items.iter().any(|i| !i.is_null() && wanted.contains(i)),
                    _ => false,
                }
            }
            Predicate::Matches(path, name) => {
                let pattern = param(name);
                let needle = pattern.as_str().unwrap_or_default().trim_matches('*');
                self.path(doc, path)
                    .as_str()
                    .is_some_and(|text| text.to_lowercase().contains(&needle.to_lowercase()))
            }
            Predicate::TextMatches(path, name) => {
                let pattern = param(name);
                let needle = pattern.as_str().unwrap_or_default().trim_matches('*');
                portable_text(&self.path(doc, path))
                    .to_lowercase()
                    .contains(&needle.to_lowercase())
            }
            Predicate::Any(clauses) => clauses.iter().any(|c| self.predicate(doc, c, params)),
        }
    }
}

/// Plain text of a portable-text block array (`pt::text`).
pub fn portable_text(blocks: &Value) -> String {
    let Value::Array(blocks) = blocks else {
        return String::new();
    };
    blocks
        .iter()
        .filter(|block| block.get("_type").and_then(Value::as_str) == Some("block"))
        .map(|block| {
            block
                .get("children")
                .and_then(Value::as_array)
                .map(|children| {
                    children
                        .iter()
                        .filter(|c| c.get("_type").and_then(Value::as_str) == Some("span"))
                        .filter_map(|c| c.get("text").and_then(Value::as_str))
                        .collect::<Vec<_>>()
                        .join("")
                })
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare(a: &Value, b: &Value) -> CmpOrdering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::query::Ordering;
    use serde_json::json;

    fn store() -> MemoryContentStore {
        MemoryContentStore::from_documents(vec![
            json!({ "_id": "cat-policy", "_type": "category", "title": "Policy", "slug": { "current": "policy" } }),
            json!({ "_id": "img-1", "_type": "sanity.imageAsset", "url": "https://cdn.test/1.png" }),
            json!({
                "_id": "a", "_type": "blogPost", "title": "Designing for Equity",
                "slug": { "current": "a" }, "publishedAt": "2024-03-01T00:00:00Z",
                "categories": [{ "_ref": "cat-policy" }], "tags": ["civic"],
                "featuredImage": { "asset": { "_ref": "img-1" } },
                "content": [{ "_type": "block", "children": [{ "_type": "span", "text": "Hello world" }] }]
            }),
            json!({
                "_id": "b", "_type": "blogPost", "title": "Draft", "isDraft": true,
                "slug": { "current": "b" }, "publishedAt": "2024-04-01T00:00:00Z"
            }),
            json!({
                "_id": "c", "_type": "blogPost", "title": "Future", "slug": { "current": "c" },
                "publishedAt": "2999-01-01T00:00:00Z"
            }),
        ])
    }

    #[test]
    fn test_parse_path_steps() {
        assert_eq!(
            parse_path("categories[]->slug.current"),
            vec![
                Step::Attr("categories".into()),
                Step::Each,
                Step::Deref,
                Step::Attr("slug".into()),
                Step::Attr("current".into()),
            ]
        );
        assert_eq!(
            parse_path("impact.metrics[0..2]"),
            vec![
                Step::Attr("impact".into()),
                Step::Attr("metrics".into()),
                Step::Range(0, 2)
            ]
        );
    }

    #[tokio::test]
    async fn test_published_filter_hides_drafts_and_scheduled() {
        let store = store();
        let query = ContentQuery::select(
            Selection::new(Filter::of_type("blogPost").published_until_now(false))
                .order(&[Ordering::desc("publishedAt")])
                .project(vec![Field::attr("_id")]),
        );
        let result = store.fetch(&query).await.unwrap();
        assert_eq!(result, json!([{ "_id": "a" }]));
    }

    #[tokio::test]
    async fn test_reference_paths_resolve() {
        let store = store();
        let query = ContentQuery::select(
            Selection::new(Filter::of_type("blogPost").contains(
                "categories[]->slug.current",
                "category",
                "policy",
            ))
            .first()
            .project(vec![
                Field::path("categories", "categories[]->title"),
                Field::path("featuredImage", "featuredImage.asset->url"),
            ]),
        );
        let result = store.fetch(&query).await.unwrap();
        assert_eq!(
            result,
            json!({ "categories": ["Policy"], "featuredImage": "https://cdn.test/1.png" })
        );
    }

    #[tokio::test]
    async fn test_first_on_no_match_is_null() {
        let store = store();
        let query = ContentQuery::select(
            Selection::new(Filter::of_type("blogPost").eq("slug.current", "slug", "missing")).first(),
        );
        assert_eq!(store.fetch(&query).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_mutations_are_all_or_nothing() {
        let store = store();
        let result = store
            .mutate(vec![
                Mutation::Create(json!({ "_id": "new", "_type": "contactSubmission" })),
                Mutation::patch("does-not-exist").set("status", "x"),
            ])
            .await;
        assert!(result.is_err());
        assert!(store.get("new").await.is_none());
    }

    #[test]
    fn test_portable_text_flattens_spans() {
        let blocks = json!([
            { "_type": "block", "children": [{ "_type": "span", "text": "One " }, { "_type": "span", "text": "two" }] },
            { "_type": "image" },
            { "_type": "block", "children": [{ "_type": "span", "text": "three" }] }
        ]);
        assert_eq!(portable_text(&blocks), "One two\n\nthree");
    }
}
