//! Popular-items snapshot cache
//!
//! In-process view of the top popular items per category. The popularity
//! scores themselves come from an external pipeline; this cache only reads
//! the `popular_items[:category]` sorted sets and keeps an `Arc` snapshot
//! per category. Reads clone the current snapshot pointer and never block a
//! refresh; a refresh swaps in a new pointer on miss or once the snapshot is
//! older than the configured window.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use quasar_cache::{CacheKey, CacheStore, Scored, POPULAR_ITEMS};
use tracing::debug;

use crate::error::Result;

struct Snapshot {
    fetched_at: DateTime<Utc>,
    items: Vec<Scored>,
}

pub struct PopularItemsCache {
    cache: Arc<dyn CacheStore>,
    window: Duration,
    limit: usize,
    snapshots: DashMap<String, Arc<Snapshot>>,
}

impl PopularItemsCache {
    pub fn new(cache: Arc<dyn CacheStore>, window: Duration, limit: usize) -> Self {
        Self {
            cache,
            window,
            limit,
            snapshots: DashMap::new(),
        }
    }

    /// Top popular items of a category view, newest snapshot within the
    /// refresh window.
    pub async fn get(&self, category: &str) -> Result<Vec<Scored>> {
        let now = Utc::now();
        if let Some(snapshot) = self.snapshots.get(category) {
            let age = now
                .signed_duration_since(snapshot.fetched_at)
                .to_std()
                .unwrap_or_default();
            if age < self.window {
                return Ok(snapshot.items.clone());
            }
        }
        self.refresh(category, now).await
    }

    /// Drop a category snapshot so the next read refetches.
    pub fn invalidate(&self, category: &str) {
        self.snapshots.remove(category);
    }

    async fn refresh(&self, category: &str, now: DateTime<Utc>) -> Result<Vec<Scored>> {
        let key = CacheKey::table(POPULAR_ITEMS, category);
        let items = self
            .cache
            .get_sorted(&key, 0, self.limit as isize - 1)
            .await?;
        debug!(category = %category, count = items.len(), "popular snapshot refreshed");
        let snapshot = Arc::new(Snapshot {
            fetched_at: now,
            items: items.clone(),
        });
        self.snapshots.insert(category.to_string(), snapshot);
        Ok(items)
    }
}
