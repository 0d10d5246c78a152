//! User-based candidates
//!
//! Walks the user's nearest neighbors from `user_neighbors:{user}` and pulls
//! each neighbor's positive items, weighting every item by the neighbor's
//! similarity. An item liked by several neighbors accumulates by sum.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use quasar_cache::{remove_scores, sort_scored, CacheKey, CacheStore, Scored, USER_NEIGHBORS};
use quasar_data::{DataStore, User};
use std::sync::Arc;

use super::{CandidateContext, CandidateSource};
use crate::config::RecommendConfig;
use crate::error::Result;

/// Accumulate similarity-weighted items from the user's neighbors.
pub async fn accumulate_from_user_neighbors(
    cache: &dyn CacheStore,
    data: &dyn DataStore,
    user_id: &str,
    cfg: &RecommendConfig,
    eligible: impl Fn(&str) -> bool,
) -> Result<Vec<Scored>> {
    let neighbors = cache
        .get_sorted(
            &CacheKey::key(USER_NEIGHBORS, user_id),
            0,
            cfg.cache_size as isize - 1,
        )
        .await?;

    let now = Utc::now();
    let mut weights: HashMap<String, f64> = HashMap::new();
    for neighbor in &neighbors {
        let feedback = data
            .get_user_feedback(&neighbor.id, Some(now), &cfg.data_source.positive_feedback_types)
            .await?;
        for row in feedback {
            if !eligible(&row.key.item_id) {
                continue;
            }
            *weights.entry(row.key.item_id).or_insert(0.0) += neighbor.score;
        }
    }
    let mut scored: Vec<Scored> = weights
        .into_iter()
        .map(|(id, score)| Scored { id, score })
        .collect();
    sort_scored(&mut scored);
    Ok(scored)
}

pub struct UserBasedSource {
    cache: Arc<dyn CacheStore>,
    data: Arc<dyn DataStore>,
    cfg: RecommendConfig,
}

impl UserBasedSource {
    pub fn new(cache: Arc<dyn CacheStore>, data: Arc<dyn DataStore>, cfg: RecommendConfig) -> Self {
        Self { cache, data, cfg }
    }
}

#[async_trait]
impl CandidateSource for UserBasedSource {
    fn name(&self) -> &'static str {
        "user_based"
    }

    async fn generate(
        &self,
        user: &User,
        category: &str,
        ctx: &CandidateContext<'_>,
    ) -> Result<Vec<String>> {
        let mut scored = accumulate_from_user_neighbors(
            self.cache.as_ref(),
            self.data.as_ref(),
            &user.user_id,
            &self.cfg,
            |id| ctx.eligible(id, category),
        )
        .await?;
        scored.truncate(ctx.cache_size);
        Ok(remove_scores(&scored))
    }
}
