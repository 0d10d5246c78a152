pub mod candidates;
pub mod hidden;
pub mod item_cache;
pub mod merger;
pub mod modification;
pub mod online;
pub mod popular;
pub mod ranking;
pub mod replacement;
pub mod session;
pub mod worker;

use std::sync::Arc;

use quasar_cache::CacheStore;
use quasar_data::DataStore;
use serde::Serialize;

pub use hidden::{spawn_reconciler, HiddenItemsManager};
pub use modification::CacheModification;
pub use online::{OnlineRecommender, WriteBack};
pub use popular::PopularItemsCache;
pub use session::SessionRecommender;
pub use worker::Worker;

/// Liveness of the two backing stores.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub cache_store_connected: bool,
    pub data_store_connected: bool,
    pub cache_store_error: Option<String>,
    pub data_store_error: Option<String>,
}

impl HealthStatus {
    pub fn ready(&self) -> bool {
        self.cache_store_connected && self.data_store_connected
    }
}

pub async fn check_health(cache: &Arc<dyn CacheStore>, data: &Arc<dyn DataStore>) -> HealthStatus {
    let cache_store_error = cache.ping().await.err().map(|e| e.to_string());
    let data_store_error = data.ping().await.err().map(|e| e.to_string());
    HealthStatus {
        cache_store_connected: cache_store_error.is_none(),
        data_store_connected: data_store_error.is_none(),
        cache_store_error,
        data_store_error,
    }
}
