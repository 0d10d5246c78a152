//! Quasar unified cache layer
//!
//! Every materialized ranking in Quasar lives behind this crate: per-user
//! recommendation lists, neighbor tables, latest/popular views, ignore sets
//! and freshness timestamps. The contract is deliberately small:
//! - typed scalar keys (string / time / integer)
//! - sets and sorted sets, all operations single-key atomic
//! - `set_sorted` is an observable-atomic replace: readers see either the
//!   full pre-state or the full post-state of a key, never a partial write
//! - sorted reads return descending score order, ties broken by ascending id
//!
//! Two backends ship: `RedisCache` for deployments and `MemoryCache` for
//! tests and single-node setups.

mod error;
mod keys;
mod measurement;
mod memory;
mod metrics;
mod redis_store;

pub use error::{CacheError, CacheResult};
pub use keys::{
    CacheKey, COLLABORATIVE_RECOMMEND, HIDDEN_ITEMS, IGNORE_ITEMS, ITEM_CATEGORIES,
    ITEM_NEIGHBORS, LAST_MODIFY_USER_TIME, LAST_UPDATE_USER_RECOMMEND_TIME, LATEST_ITEMS,
    MEASUREMENTS, OFFLINE_RECOMMEND, OFFLINE_RECOMMEND_DIGEST, POPULAR_ITEMS, RECOMMEND_LOCK,
    USER_NEIGHBORS,
};
pub use measurement::{get_measurements, insert_measurements, Measurement};
pub use memory::MemoryCache;
pub use metrics::CacheMetrics;
pub use redis_store::RedisCache;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A ranked entry: item id plus its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scored {
    pub id: String,
    pub score: f64,
}

impl Scored {
    pub fn new(id: impl Into<String>, score: f64) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// Strip scores, keeping ranked order.
pub fn remove_scores(scored: &[Scored]) -> Vec<String> {
    scored.iter().map(|s| s.id.clone()).collect()
}

/// Collect just the scores, keeping ranked order.
pub fn get_scores(scored: &[Scored]) -> Vec<f64> {
    scored.iter().map(|s| s.score).collect()
}

/// Zip parallel id/score slices into scored entries.
pub fn create_scored(ids: Vec<String>, scores: Vec<f64>) -> Vec<Scored> {
    ids.into_iter()
        .zip(scores)
        .map(|(id, score)| Scored { id, score })
        .collect()
}

/// Canonical ranking order: descending score, ascending id on ties.
pub fn sort_scored(scored: &mut [Scored]) {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Core cache operations.
///
/// All operations are single-key atomic. `get_sorted(key, 0, -1)` returns the
/// whole list; `begin`/`end` are inclusive ranks into the descending order.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn set_string(&self, key: &str, value: &str) -> CacheResult<()>;
    async fn get_string(&self, key: &str) -> CacheResult<String>;

    async fn set_time(&self, key: &str, value: DateTime<Utc>) -> CacheResult<()>;
    async fn get_time(&self, key: &str) -> CacheResult<DateTime<Utc>>;

    async fn set_int(&self, key: &str, value: i64) -> CacheResult<()>;
    async fn get_int(&self, key: &str) -> CacheResult<i64>;
    async fn incr(&self, key: &str) -> CacheResult<i64>;

    /// Insert or update members of a sorted set.
    async fn add_sorted(&self, key: &str, scored: &[Scored]) -> CacheResult<()>;
    /// Atomically replace the whole sorted set.
    async fn set_sorted(&self, key: &str, scored: &[Scored]) -> CacheResult<()>;
    /// Read ranks `begin..=end` (descending score; `end == -1` means all).
    async fn get_sorted(&self, key: &str, begin: isize, end: isize) -> CacheResult<Vec<Scored>>;
    async fn rem_sorted(&self, key: &str, id: &str) -> CacheResult<()>;
    /// Keep only the `n` highest-scored members.
    async fn trim_sorted(&self, key: &str, n: usize) -> CacheResult<()>;

    async fn add_set(&self, key: &str, members: &[String]) -> CacheResult<()>;
    async fn get_set(&self, key: &str) -> CacheResult<Vec<String>>;
    async fn rem_set(&self, key: &str, member: &str) -> CacheResult<()>;

    /// Set `key` only if absent, with a TTL. Returns whether the key was set.
    /// Used for advisory locks; crashed holders release by TTL.
    async fn set_if_absent(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<bool>;
    async fn del(&self, key: &str) -> CacheResult<()>;

    /// Drop everything. Test and maintenance use only.
    async fn purge(&self) -> CacheResult<()>;

    /// Liveness probe; maps backend failures to `CacheError::Unavailable`.
    async fn ping(&self) -> CacheResult<()>;
}
