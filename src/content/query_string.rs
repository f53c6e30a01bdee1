//! Query-string decoding for the read endpoints.
//!
//! An empty value (`?industry=`) is the same as leaving the parameter out.
//! Use with `#[serde(default, deserialize_with = "...")]`.

use std::str::FromStr;

use serde::de::{DeserializeOwned, IntoDeserializer};
use serde::{Deserialize, Deserializer};

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(Some(raw).filter(|value| !value.trim().is_empty()))
}

pub fn non_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    present(deserializer)
}

/// Only the literal `true` switches a flag on.
pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(present(deserializer)?.is_some_and(|value| value.trim() == "true"))
}

/// A number, or `None` when the value is empty or not numeric.
pub fn number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    Ok(present(deserializer)?.and_then(|value| value.trim().parse().ok()))
}

/// A named option such as an ordering; empty falls back to the default,
/// unknown names are still rejected.
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    match present(deserializer)? {
        Some(value) => T::deserialize(value.into_deserializer()),
        None => Ok(T::default()),
    }
}
