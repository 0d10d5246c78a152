//! Online read path
//!
//! Serves a user's ranked list from the materialized `offline_recommend`
//! key, applying visibility and seen filters at read time, and walks the
//! configured fallback chain when the list runs short of the requested
//! window. Optionally writes back a feedback row per served item so the
//! items stop surfacing once the write-back delay elapses.
//!
//! Seen-filter scope: unexpired ignore entries always filter; feedback-based
//! exclusion is skipped when replacement is enabled, because replacement
//! deliberately keeps served history alive with decayed scores.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use quasar_cache::{
    remove_scores, CacheKey, CacheStore, Scored, COLLABORATIVE_RECOMMEND, IGNORE_ITEMS,
    ITEM_NEIGHBORS, LAST_MODIFY_USER_TIME, LATEST_ITEMS, OFFLINE_RECOMMEND, POPULAR_ITEMS,
    USER_NEIGHBORS,
};
use quasar_data::{DataStore, Feedback};
use tracing::debug;

use crate::config::Config;
use crate::error::{RecommendError, Result};
use crate::services::candidates::{accumulate_from_user_neighbors, accumulate_neighbors};
use crate::services::hidden::HiddenItemsManager;
use crate::services::merger::concat_fallbacks;
use crate::services::popular::PopularItemsCache;

/// Feedback written back for every served item.
pub struct WriteBack {
    pub feedback_type: String,
    pub delay: Duration,
}

pub struct OnlineRecommender {
    cfg: Config,
    cache: Arc<dyn CacheStore>,
    data: Arc<dyn DataStore>,
    hidden: Arc<HiddenItemsManager>,
    popular: Arc<PopularItemsCache>,
}

impl OnlineRecommender {
    pub fn new(
        cfg: Config,
        cache: Arc<dyn CacheStore>,
        data: Arc<dyn DataStore>,
        hidden: Arc<HiddenItemsManager>,
        popular: Arc<PopularItemsCache>,
    ) -> Self {
        Self {
            cfg,
            cache,
            data,
            hidden,
            popular,
        }
    }

    pub async fn recommend(
        &self,
        user_id: &str,
        category: &str,
        n: usize,
        offset: usize,
    ) -> Result<Vec<String>> {
        self.recommend_with_write_back(user_id, category, n, offset, None)
            .await
    }

    pub async fn recommend_with_write_back(
        &self,
        user_id: &str,
        category: &str,
        n: usize,
        offset: usize,
        write_back: Option<WriteBack>,
    ) -> Result<Vec<String>> {
        let now = Utc::now();
        let cfg = &self.cfg.recommend;

        let mut exclude: HashSet<String> = HashSet::new();
        let ignore_key = CacheKey::key(IGNORE_ITEMS, user_id);
        for entry in self.cache.get_sorted(&ignore_key, 0, -1).await? {
            if entry.score > now.timestamp() as f64 {
                exclude.insert(entry.id);
            }
        }
        let feedback = self.data.get_user_feedback(user_id, Some(now), &[]).await?;
        let history: HashSet<String> = feedback.iter().map(|f| f.key.item_id.clone()).collect();
        if !cfg.replacement.enable_replacement {
            exclude.extend(history.iter().cloned());
        }

        let offline = self
            .cache
            .get_sorted(&CacheKey::key_in(OFFLINE_RECOMMEND, user_id, category), 0, -1)
            .await?;
        let primary: Vec<Scored> = self
            .hidden
            .filter_visible(offline, category)
            .into_iter()
            .filter(|s| !exclude.contains(&s.id))
            .collect();

        let mut fallbacks = Vec::new();
        if primary.len() < offset + n {
            debug!(
                user_id = %user_id,
                have = primary.len(),
                want = offset + n,
                "offline list short, consulting fallback chain"
            );
            for strategy in &cfg.online.fallback_recommend {
                fallbacks.push(
                    self.fallback(strategy, user_id, category, &exclude, &history, &feedback)
                        .await?,
                );
            }
        }

        let served = remove_scores(&concat_fallbacks(primary, fallbacks, n, offset));
        if let Some(write_back) = write_back {
            self.write_back(user_id, &served, write_back).await?;
        }
        Ok(served)
    }

    async fn fallback(
        &self,
        strategy: &str,
        user_id: &str,
        category: &str,
        exclude: &HashSet<String>,
        history: &HashSet<String>,
        feedback: &[Feedback],
    ) -> Result<Vec<Scored>> {
        let cfg = &self.cfg.recommend;
        let eligible = |id: &str| {
            !exclude.contains(id)
                && !history.contains(id)
                && !self.hidden.is_hidden_one(id, category)
        };

        match strategy {
            "item_based" => {
                let mut seeds: Vec<String> = Vec::new();
                for row in feedback {
                    if cfg.is_positive(&row.key.feedback_type)
                        && !seeds.contains(&row.key.item_id)
                    {
                        seeds.push(row.key.item_id.clone());
                    }
                    if seeds.len() >= cfg.online.num_feedback_fallback_item_based {
                        break;
                    }
                }
                accumulate_neighbors(self.cache.as_ref(), &seeds, category, eligible).await
            }
            "user_based" => {
                accumulate_from_user_neighbors(
                    self.cache.as_ref(),
                    self.data.as_ref(),
                    user_id,
                    cfg,
                    eligible,
                )
                .await
            }
            "latest" => {
                let latest = self
                    .cache
                    .get_sorted(&CacheKey::table(LATEST_ITEMS, category), 0, -1)
                    .await?;
                Ok(latest.into_iter().filter(|s| eligible(&s.id)).collect())
            }
            "popular" => {
                let popular = self.popular.get(category).await?;
                Ok(popular.into_iter().filter(|s| eligible(&s.id)).collect())
            }
            "collaborative" => {
                let precomputed = self
                    .cache
                    .get_sorted(
                        &CacheKey::key_in(COLLABORATIVE_RECOMMEND, user_id, category),
                        0,
                        -1,
                    )
                    .await?;
                Ok(precomputed.into_iter().filter(|s| eligible(&s.id)).collect())
            }
            other => Err(RecommendError::InvalidArgument(format!(
                "unknown fallback recommender: {:?}",
                other
            ))),
        }
    }

    async fn write_back(
        &self,
        user_id: &str,
        served: &[String],
        write_back: WriteBack,
    ) -> Result<()> {
        if served.is_empty() {
            return Ok(());
        }
        let now = Utc::now();
        let visible_at = now
            + chrono::Duration::from_std(write_back.delay)
                .map_err(|e| RecommendError::InvalidArgument(format!("write-back delay: {}", e)))?;
        let rows: Vec<Feedback> = served
            .iter()
            .map(|item_id| Feedback::new(&write_back.feedback_type, user_id, item_id, visible_at))
            .collect();
        self.data
            .batch_insert_feedback(&rows, true, false, false)
            .await?;
        self.cache
            .set_time(&CacheKey::key(LAST_MODIFY_USER_TIME, user_id), now)
            .await?;
        Ok(())
    }

    /// Newest items of a category view, hidden entries dropped at read time.
    pub async fn latest(&self, category: &str, n: usize, offset: usize) -> Result<Vec<Scored>> {
        let list = self
            .cache
            .get_sorted(&CacheKey::table(LATEST_ITEMS, category), 0, -1)
            .await?;
        Ok(window(self.hidden.filter_visible(list, category), n, offset))
    }

    /// Popular items of a category view, hidden entries dropped at read time.
    pub async fn popular(&self, category: &str, n: usize, offset: usize) -> Result<Vec<Scored>> {
        let list = self
            .cache
            .get_sorted(&CacheKey::table(POPULAR_ITEMS, category), 0, -1)
            .await?;
        Ok(window(self.hidden.filter_visible(list, category), n, offset))
    }

    /// An item's neighbors, hidden entries dropped at read time.
    pub async fn item_neighbors(
        &self,
        item_id: &str,
        category: &str,
        n: usize,
        offset: usize,
    ) -> Result<Vec<Scored>> {
        let list = self
            .cache
            .get_sorted(&CacheKey::key_in(ITEM_NEIGHBORS, item_id, category), 0, -1)
            .await?;
        Ok(window(self.hidden.filter_visible(list, category), n, offset))
    }

    /// A user's nearest neighbors.
    pub async fn user_neighbors(&self, user_id: &str, n: usize, offset: usize) -> Result<Vec<Scored>> {
        let list = self
            .cache
            .get_sorted(&CacheKey::key(USER_NEIGHBORS, user_id), 0, -1)
            .await?;
        Ok(window(list, n, offset))
    }
}

fn window(list: Vec<Scored>, n: usize, offset: usize) -> Vec<Scored> {
    list.into_iter().skip(offset).take(n).collect()
}
