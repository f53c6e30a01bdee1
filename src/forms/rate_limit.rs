//! Sliding-window submission limits keyed by scope and submitter.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::db::models::HitWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Records a hit for `key` if it is under the limit.
///
/// A check that returns [`RateDecision::Allowed`] has already counted
/// towards the window.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(
        &self,
        scope: &str,
        key: &str,
        limit: &RateLimitConfig,
    ) -> Result<RateDecision, sqlx::Error>;
}

// ============================================================================
// Postgres
// ============================================================================

/// Shared across every process pointed at the same database.
pub struct PgRateLimiter {
    pool: PgPool,
}

impl PgRateLimiter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimiter for PgRateLimiter {
    async fn check(
        &self,
        scope: &str,
        key: &str,
        limit: &RateLimitConfig,
    ) -> Result<RateDecision, sqlx::Error> {
        let window_secs = limit.window.as_secs_f64();
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent checks for the same key until commit.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1 || ':' || $2))")
            .bind(scope)
            .bind(key)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "DELETE FROM submission_hits WHERE scope = $1 AND hit_at <= now() - make_interval(secs => $2)",
        )
        .bind(scope)
        .bind(window_secs)
        .execute(&mut *tx)
        .await?;

        let window: HitWindow = sqlx::query_as(
            "SELECT COUNT(*) AS hits, MIN(hit_at) AS oldest FROM submission_hits WHERE scope = $1 AND key = $2",
        )
        .bind(scope)
        .bind(key)
        .fetch_one(&mut *tx)
        .await?;

        if window.hits >= i64::from(limit.max_submissions) {
            tx.commit().await?;
            let retry_after = window
                .oldest
                .and_then(|oldest| {
                    let reopens = oldest + chrono::Duration::from_std(limit.window).ok()?;
                    (reopens - Utc::now()).to_std().ok()
                })
                .unwrap_or(limit.window);
            return Ok(RateDecision::Limited { retry_after });
        }

        sqlx::query("INSERT INTO submission_hits (scope, key) VALUES ($1, $2)")
            .bind(scope)
            .bind(key)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(RateDecision::Allowed)
    }
}

// ============================================================================
// In-process fallback
// ============================================================================

/// Per-process limiter for running without a database. Limits are not shared
/// between replicas.
#[derive(Default)]
pub struct MemoryRateLimiter {
    hits: RwLock<HashMap<String, Vec<Instant>>>,
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn check(
        &self,
        scope: &str,
        key: &str,
        limit: &RateLimitConfig,
    ) -> Result<RateDecision, sqlx::Error> {
        let now = Instant::now();
        let mut hits = self.hits.write().await;

        // Evict expired hits everywhere so memory tracks active submitters only.
        hits.retain(|_, times| {
            times.retain(|t| now.duration_since(*t) < limit.window);
            !times.is_empty()
        });

        let entry = hits.entry(format!("{scope}:{key}")).or_default();
        if entry.len() >= limit.max_submissions as usize {
            let oldest = entry.iter().min().copied().unwrap_or(now);
            let retry_after = limit.window.saturating_sub(now.duration_since(oldest));
            return Ok(RateDecision::Limited { retry_after });
        }

        entry.push(now);
        Ok(RateDecision::Allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit() -> RateLimitConfig {
        RateLimitConfig {
            max_submissions: 3,
            window: Duration::from_secs(3600),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_limiter_allows_up_to_max() {
        let limiter = MemoryRateLimiter::new();
        for _ in 0..3 {
            assert!(limiter
                .check("contact", "a@example.org", &limit())
                .await
                .unwrap()
                .is_allowed());
        }
        let decision = limiter.check("contact", "a@example.org", &limit()).await.unwrap();
        assert_eq!(
            decision,
            RateDecision::Limited {
                retry_after: Duration::from_secs(3600)
            }
        );

        assert!(limiter
            .check("contact", "b@example.org", &limit())
            .await
            .unwrap()
            .is_allowed());
        assert!(limiter
            .check("newsletter", "a@example.org", &limit())
            .await
            .unwrap()
            .is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_limiter_window_slides() {
        let limiter = MemoryRateLimiter::new();
        limiter.check("contact", "a", &limit()).await.unwrap();
        tokio::time::advance(Duration::from_secs(1800)).await;
        limiter.check("contact", "a", &limit()).await.unwrap();
        limiter.check("contact", "a", &limit()).await.unwrap();
        assert!(!limiter.check("contact", "a", &limit()).await.unwrap().is_allowed());

        // First hit leaves the window; one slot opens.
        tokio::time::advance(Duration::from_secs(1801)).await;
        assert!(limiter.check("contact", "a", &limit()).await.unwrap().is_allowed());
        assert!(!limiter.check("contact", "a", &limit()).await.unwrap().is_allowed());
    }
}
