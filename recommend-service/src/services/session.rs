//! Session (stateless) recommendations
//!
//! The caller posts a feedback window, most recent first or not; nothing is
//! read from or written to per-user state. The newest positive items seed an
//! item-based pass over the neighbor tables, every item in the window is
//! excluded, and the visibility layer applies as in any other ranked view.

use std::sync::Arc;

use chrono::Utc;
use quasar_cache::{CacheStore, Scored};
use quasar_data::Feedback;

use crate::config::Config;
use crate::error::Result;
use crate::services::candidates::accumulate_neighbors;
use crate::services::hidden::HiddenItemsManager;

pub struct SessionRecommender {
    cfg: Config,
    cache: Arc<dyn CacheStore>,
    hidden: Arc<HiddenItemsManager>,
}

impl SessionRecommender {
    pub fn new(cfg: Config, cache: Arc<dyn CacheStore>, hidden: Arc<HiddenItemsManager>) -> Self {
        Self { cfg, cache, hidden }
    }

    /// Rank items similar to the posted window. Same inputs, same output.
    pub async fn recommend(
        &self,
        feedback: &[Feedback],
        category: &str,
        n: usize,
        offset: usize,
    ) -> Result<Vec<Scored>> {
        let cfg = &self.cfg.recommend;
        let now = Utc::now();

        let mut positives: Vec<&Feedback> = feedback
            .iter()
            .filter(|row| row.timestamp <= now && cfg.is_positive(&row.key.feedback_type))
            .collect();
        positives.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let mut seeds: Vec<String> = Vec::new();
        for row in positives {
            if !seeds.contains(&row.key.item_id) {
                seeds.push(row.key.item_id.clone());
            }
            if seeds.len() >= cfg.online.num_feedback_fallback_item_based {
                break;
            }
        }

        let windowed: Vec<String> = feedback.iter().map(|f| f.key.item_id.clone()).collect();
        let eligible = |id: &str| {
            !windowed.iter().any(|w| w == id) && !self.hidden.is_hidden_one(id, category)
        };
        let ranked = accumulate_neighbors(self.cache.as_ref(), &seeds, category, eligible).await?;
        Ok(ranked.into_iter().skip(offset).take(n).collect())
    }
}
