//! Content access: query building, the store client and typed accessors
//! per document type.

pub mod blog;
pub mod case_studies;
pub mod client;
pub mod memory;
pub mod models;
pub mod query;
pub mod query_string;
pub mod services;
pub mod team;

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use client::{ContentClient, HttpContentClient, Mutation};
pub use memory::MemoryContentStore;

use crate::error::ContentError;
use models::SlugParam;
use query::{ContentQuery, Field, Filter, Selection};

/// Drop `null` object entries and array elements.
///
/// Projections yield `null` for absent attributes and dangling references;
/// after pruning, the models' `#[serde(default)]` fills them in.
fn prune_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, prune_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !v.is_null())
                .map(prune_nulls)
                .collect(),
        ),
        other => other,
    }
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ContentError> {
    Ok(serde_json::from_value(prune_nulls(value))?)
}

/// Decode a `[0]` selection; `null` means no match.
pub(crate) fn decode_optional<T: DeserializeOwned>(value: Value) -> Result<Option<T>, ContentError> {
    if value.is_null() {
        return Ok(None);
    }
    decode(value).map(Some)
}

/// Slug of every document matching `filter`, for pre-rendering.
pub(crate) async fn slugs(
    client: &dyn ContentClient,
    filter: Filter,
) -> Result<Vec<SlugParam>, ContentError> {
    let selection = Selection::new(filter).project(vec![Field::path("slug", "slug.current")]);
    let rows: Vec<Value> = decode(client.fetch(&ContentQuery::select(selection)).await?)?;
    Ok(rows
        .into_iter()
        .filter_map(|row| row.get("slug").and_then(Value::as_str).map(str::to_string))
        .map(|slug| SlugParam { slug })
        .collect())
}

/// Count occurrences and order by count descending, then key ascending.
pub(crate) fn tally<I>(keys: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = String>,
{
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_default() += 1;
    }
    let mut rows: Vec<(String, usize)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows
}

/// Strings in a JSON value that may be a single string or an array of them.
pub(crate) fn strings(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
