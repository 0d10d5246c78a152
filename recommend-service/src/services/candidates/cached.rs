//! Latest / popular candidates
//!
//! Both read a pre-materialized sorted set (`latest_items[:cat]` scored by
//! timestamp, `popular_items[:cat]` by long-horizon popularity) and only
//! apply visibility. One source type covers both tables.

use async_trait::async_trait;
use quasar_cache::{CacheKey, CacheStore, LATEST_ITEMS, POPULAR_ITEMS};
use quasar_data::User;
use std::sync::Arc;

use super::{CandidateContext, CandidateSource};
use crate::error::Result;

pub struct CachedListSource {
    cache: Arc<dyn CacheStore>,
    prefix: &'static str,
    name: &'static str,
}

impl CachedListSource {
    pub fn latest(cache: Arc<dyn CacheStore>) -> Self {
        Self {
            cache,
            prefix: LATEST_ITEMS,
            name: "latest",
        }
    }

    pub fn popular(cache: Arc<dyn CacheStore>) -> Self {
        Self {
            cache,
            prefix: POPULAR_ITEMS,
            name: "popular",
        }
    }
}

#[async_trait]
impl CandidateSource for CachedListSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn generate(
        &self,
        _user: &User,
        category: &str,
        ctx: &CandidateContext<'_>,
    ) -> Result<Vec<String>> {
        let key = CacheKey::table(self.prefix, category);
        let ranked = self.cache.get_sorted(&key, 0, -1).await?;
        let ids: Vec<String> = ranked
            .into_iter()
            .map(|s| s.id)
            .filter(|id| ctx.eligible(id, category))
            .take(ctx.cache_size)
            .collect();
        Ok(ids)
    }
}
