//! Hidden-items manager
//!
//! Process-wide oracle answering "is this item visible in this category
//! view?". Two kinds of bucket: a global one for items hidden everywhere
//! (hidden flag or deletion) and one per category for items stripped from a
//! single category view. Backed by the `hidden_items[:category]` sorted sets
//! in the cache so hides propagate across processes; the in-process view is
//! updated synchronously by [`CacheModification`](super::modification) and
//! repaired by the periodic reconciler.
//!
//! Reads take the shared lock, mutations the exclusive one. A successful
//! hide is observed by every subsequent query in the same process; across
//! processes the guarantee is eventual, bounded by the reconcile period.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use quasar_cache::{CacheKey, CacheStore, Scored, HIDDEN_ITEMS, ITEM_CATEGORIES};
use quasar_data::DataStore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;

#[derive(Default)]
struct Buckets {
    global: HashSet<String>,
    per_category: HashMap<String, HashSet<String>>,
}

pub struct HiddenItemsManager {
    cache: Arc<dyn CacheStore>,
    buckets: RwLock<Buckets>,
}

impl HiddenItemsManager {
    pub fn new(cache: Arc<dyn CacheStore>) -> Arc<Self> {
        Arc::new(Self {
            cache,
            buckets: RwLock::new(Buckets::default()),
        })
    }

    /// Build the manager and prime it from the cache-backed hidden markers.
    pub async fn load(cache: Arc<dyn CacheStore>) -> Result<Arc<Self>> {
        let manager = Self::new(cache);
        manager.refresh_from_cache().await?;
        Ok(manager)
    }

    /// Batch visibility query for one category view.
    pub fn is_hidden(&self, item_ids: &[String], category: &str) -> Vec<bool> {
        let buckets = self.buckets.read().expect("hidden buckets poisoned");
        let in_category = buckets.per_category.get(category);
        item_ids
            .iter()
            .map(|id| {
                buckets.global.contains(id)
                    || in_category.map_or(false, |bucket| bucket.contains(id))
            })
            .collect()
    }

    /// Single-id convenience query.
    pub fn is_hidden_one(&self, item_id: &str, category: &str) -> bool {
        let buckets = self.buckets.read().expect("hidden buckets poisoned");
        buckets.global.contains(item_id)
            || buckets
                .per_category
                .get(category)
                .map_or(false, |bucket| bucket.contains(item_id))
    }

    /// Drop hidden entries from a ranked list, preserving order.
    pub fn filter_visible(&self, scored: Vec<Scored>, category: &str) -> Vec<Scored> {
        let buckets = self.buckets.read().expect("hidden buckets poisoned");
        let in_category = buckets.per_category.get(category);
        scored
            .into_iter()
            .filter(|s| {
                !buckets.global.contains(&s.id)
                    && !in_category.map_or(false, |bucket| bucket.contains(&s.id))
            })
            .collect()
    }

    pub(crate) fn hide(&self, item_id: &str) {
        self.buckets
            .write()
            .expect("hidden buckets poisoned")
            .global
            .insert(item_id.to_string());
    }

    pub(crate) fn unhide(&self, item_id: &str) {
        self.buckets
            .write()
            .expect("hidden buckets poisoned")
            .global
            .remove(item_id);
    }

    pub(crate) fn hide_in(&self, item_id: &str, category: &str) {
        self.buckets
            .write()
            .expect("hidden buckets poisoned")
            .per_category
            .entry(category.to_string())
            .or_default()
            .insert(item_id.to_string());
    }

    pub(crate) fn unhide_in(&self, item_id: &str, category: &str) {
        let mut buckets = self.buckets.write().expect("hidden buckets poisoned");
        if let Some(bucket) = buckets.per_category.get_mut(category) {
            bucket.remove(item_id);
        }
    }

    /// Rebuild the in-process view from the cache-backed markers.
    pub async fn refresh_from_cache(&self) -> Result<()> {
        let mut next = Buckets::default();
        for entry in self.cache.get_sorted(HIDDEN_ITEMS, 0, -1).await? {
            next.global.insert(entry.id);
        }
        for category in self.cache.get_set(ITEM_CATEGORIES).await? {
            let key = CacheKey::table(HIDDEN_ITEMS, &category);
            let ids: HashSet<String> = self
                .cache
                .get_sorted(&key, 0, -1)
                .await?
                .into_iter()
                .map(|s| s.id)
                .collect();
            if !ids.is_empty() {
                next.per_category.insert(category, ids);
            }
        }
        *self.buckets.write().expect("hidden buckets poisoned") = next;
        Ok(())
    }

    /// Reconcile against the truth store: pick up `is_hidden` flips that
    /// happened out-of-band and push them into the cache-backed markers, then
    /// rebuild the in-process view.
    pub async fn reconcile(&self, data: &dyn DataStore) -> Result<()> {
        let mut cursor = String::new();
        loop {
            let (items, next) = data.list_items(&cursor, 1024).await?;
            for item in items {
                if item.is_hidden {
                    self.cache
                        .add_sorted(
                            HIDDEN_ITEMS,
                            &[Scored::new(
                                item.item_id.clone(),
                                chrono::Utc::now().timestamp() as f64,
                            )],
                        )
                        .await?;
                } else {
                    self.cache.rem_sorted(HIDDEN_ITEMS, &item.item_id).await?;
                }
            }
            if next.is_empty() {
                break;
            }
            cursor = next;
        }
        self.refresh_from_cache().await?;
        debug!("hidden items reconciled");
        Ok(())
    }
}

/// Spawn the periodic reconciliation job.
pub fn spawn_reconciler(
    manager: Arc<HiddenItemsManager>,
    data: Arc<dyn DataStore>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = manager.reconcile(data.as_ref()).await {
                warn!("hidden items reconciliation failed: {}", e);
            }
        }
    })
}
