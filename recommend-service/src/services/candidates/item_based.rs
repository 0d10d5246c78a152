//! Item-based candidates
//!
//! Seeds are the user's most recent positive items. For every seed the
//! precomputed `item_neighbors:{item}[:category]` table contributes its
//! weights; a candidate reached from several seeds accumulates by sum, which
//! favors items similar to many things the user liked over items extremely
//! similar to a single one.

use std::collections::HashMap;

use async_trait::async_trait;
use quasar_cache::{remove_scores, sort_scored, CacheKey, CacheStore, Scored, ITEM_NEIGHBORS};
use quasar_data::User;
use std::sync::Arc;

use super::{CandidateContext, CandidateSource};
use crate::error::Result;

/// Sum neighbor weights over the seed items, dropping ineligible candidates.
/// Ordered by accumulated score, descending.
pub async fn accumulate_neighbors(
    cache: &dyn CacheStore,
    seeds: &[String],
    category: &str,
    eligible: impl Fn(&str) -> bool,
) -> Result<Vec<Scored>> {
    let mut weights: HashMap<String, f64> = HashMap::new();
    for seed in seeds {
        let key = CacheKey::key_in(ITEM_NEIGHBORS, seed, category);
        for neighbor in cache.get_sorted(&key, 0, -1).await? {
            if !eligible(&neighbor.id) {
                continue;
            }
            *weights.entry(neighbor.id).or_insert(0.0) += neighbor.score;
        }
    }
    let mut scored: Vec<Scored> = weights
        .into_iter()
        .map(|(id, score)| Scored { id, score })
        .collect();
    sort_scored(&mut scored);
    Ok(scored)
}

pub struct ItemBasedSource {
    cache: Arc<dyn CacheStore>,
    num_feedback: usize,
}

impl ItemBasedSource {
    pub fn new(cache: Arc<dyn CacheStore>, num_feedback: usize) -> Self {
        Self {
            cache,
            num_feedback,
        }
    }
}

#[async_trait]
impl CandidateSource for ItemBasedSource {
    fn name(&self) -> &'static str {
        "item_based"
    }

    async fn generate(
        &self,
        _user: &User,
        category: &str,
        ctx: &CandidateContext<'_>,
    ) -> Result<Vec<String>> {
        let seeds: Vec<String> = ctx
            .positive_items
            .iter()
            .take(self.num_feedback)
            .cloned()
            .collect();
        if seeds.is_empty() {
            return Ok(Vec::new());
        }
        let mut scored = accumulate_neighbors(self.cache.as_ref(), &seeds, category, |id| {
            ctx.eligible(id, category)
        })
        .await?;
        scored.truncate(ctx.cache_size);
        Ok(remove_scores(&scored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quasar_cache::MemoryCache;

    #[tokio::test]
    async fn test_sum_collapse_across_seeds() {
        let cache = MemoryCache::new();
        cache
            .set_sorted(
                &CacheKey::key(ITEM_NEIGHBORS, "1"),
                &[Scored::new("9", 1.0), Scored::new("2", 100000.0)],
            )
            .await
            .unwrap();
        cache
            .set_sorted(
                &CacheKey::key(ITEM_NEIGHBORS, "2"),
                &[Scored::new("9", 1.0), Scored::new("8", 1.0)],
            )
            .await
            .unwrap();

        let seeds = vec!["1".to_string(), "2".to_string()];
        let scored = accumulate_neighbors(&cache, &seeds, "", |id| id != "2").await.unwrap();

        // 9 reached from both seeds sums to 2, 8 from one seed stays 1
        assert_eq!(scored[0], Scored::new("9", 2.0));
        assert_eq!(scored[1], Scored::new("8", 1.0));
    }

    #[tokio::test]
    async fn test_category_scoped_neighbors() {
        let cache = MemoryCache::new();
        cache
            .set_sorted(
                &CacheKey::key_in(ITEM_NEIGHBORS, "1", "*"),
                &[Scored::new("9", 1.0)],
            )
            .await
            .unwrap();

        let seeds = vec!["1".to_string()];
        let global = accumulate_neighbors(&cache, &seeds, "", |_| true).await.unwrap();
        assert!(global.is_empty());
        let scoped = accumulate_neighbors(&cache, &seeds, "*", |_| true).await.unwrap();
        assert_eq!(remove_scores(&scoped), vec!["9"]);
    }
}
