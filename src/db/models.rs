//! Database Models - rows read back by sqlx.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Hits recorded for one rate-limit key inside the current window.
#[derive(Debug, Clone, FromRow)]
pub struct HitWindow {
    pub hits: i64,
    pub oldest: Option<DateTime<Utc>>,
}
