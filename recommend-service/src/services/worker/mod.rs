//! Recommendation orchestrator
//!
//! Drives the per-user pipeline: freshness check, candidate collection from
//! the enabled generators, ranking, replacement blend, explore substitution
//! and a single atomic commit per category view. Users fan out across a
//! bounded set of tokio tasks; within one user the pipeline is sequential
//! and budgeted, and a cache-backed advisory lock keeps rebuilds of the same
//! user from running concurrently anywhere in the fleet.
//!
//! Failure policy: a generator error degrades to an empty list and the
//! pipeline continues; a filter or commit error abandons that user's rebuild
//! and leaves the previous list readable. The seen-set append and timestamp
//! update are serialized after the list commit, so readers never observe a
//! half-replaced list.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use quasar_cache::{
    CacheError, CacheKey, CacheStore, Scored, IGNORE_ITEMS, LAST_MODIFY_USER_TIME,
    LAST_UPDATE_USER_RECOMMEND_TIME, LATEST_ITEMS, OFFLINE_RECOMMEND, OFFLINE_RECOMMEND_DIGEST,
    POPULAR_ITEMS, RECOMMEND_LOCK, ITEM_CATEGORIES,
};
use quasar_data::{DataStore, User};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::models::{CtrModel, ModelSlot, RankingModel};
use crate::services::candidates::{
    CachedListSource, CandidateContext, CandidateSource, CollaborativeSource, ItemBasedSource,
    UserBasedSource,
};
use crate::services::hidden::HiddenItemsManager;
use crate::services::item_cache::ItemCache;
use crate::services::merger::{explore_recommend, ExploreFractions};
use crate::services::ranking::{
    merge_and_shuffle, rank_by_click_through_rate, rank_by_collaborative,
};
use crate::services::replacement;

pub struct Worker {
    cfg: Config,
    cache: Arc<dyn CacheStore>,
    data: Arc<dyn DataStore>,
    hidden: Arc<HiddenItemsManager>,
    ranking_model: Arc<ModelSlot<dyn RankingModel>>,
    ctr_model: Arc<ModelSlot<dyn CtrModel>>,
    rng: Mutex<StdRng>,
}

/// What the ranking stage settled on; replacement scores history through the
/// same model so old and new entries stay comparable.
enum ActiveRanker {
    ClickThrough(Arc<dyn CtrModel>),
    Collaborative(Arc<dyn RankingModel>),
    Shuffle,
}

impl Worker {
    pub fn new(
        cfg: Config,
        cache: Arc<dyn CacheStore>,
        data: Arc<dyn DataStore>,
        hidden: Arc<HiddenItemsManager>,
        ranking_model: Arc<ModelSlot<dyn RankingModel>>,
        ctr_model: Arc<ModelSlot<dyn CtrModel>>,
    ) -> Arc<Self> {
        let seed = cfg.recommend.offline.seed;
        Arc::new(Self {
            cfg,
            cache,
            data,
            hidden,
            ranking_model,
            ctr_model,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        })
    }

    /// Rebuild stale recommendation lists for a batch of users.
    pub async fn recommend(self: &Arc<Self>, users: Vec<User>) {
        let item_cache = match ItemCache::load(self.data.as_ref()).await {
            Ok(cache) => Arc::new(cache),
            Err(e) => {
                warn!("item snapshot load failed, skipping batch: {}", e);
                return;
            }
        };
        let mut categories = vec![String::new()];
        categories.extend(item_cache.categories());
        match self.cache.get_set(ITEM_CATEGORIES).await {
            Ok(known) => categories.extend(known),
            Err(e) => warn!("category set unavailable, using item snapshot only: {}", e),
        }
        categories.sort();
        categories.dedup();
        let categories = Arc::new(categories);

        let semaphore = Arc::new(Semaphore::new(self.cfg.service.jobs.max(1)));
        let budget = Duration::from_secs(self.cfg.recommend.offline.pipeline_budget_secs);
        let mut tasks = tokio::task::JoinSet::new();
        for user in users {
            let worker = self.clone();
            let items = item_cache.clone();
            let categories = categories.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                match tokio::time::timeout(
                    budget,
                    worker.recommend_user(&user, &items, &categories),
                )
                .await
                {
                    Err(_) => {
                        warn!(user_id = %user.user_id, "pipeline budget exceeded, rebuild abandoned")
                    }
                    Ok(Err(e)) => warn!(user_id = %user.user_id, "rebuild failed: {}", e),
                    Ok(Ok(true)) => debug!(user_id = %user.user_id, "recommendation refreshed"),
                    Ok(Ok(false)) => {}
                }
            });
        }
        while tasks.join_next().await.is_some() {}
    }

    /// Refresh one user if stale. Returns whether a rebuild ran.
    async fn recommend_user(
        &self,
        user: &User,
        items: &ItemCache,
        categories: &[String],
    ) -> Result<bool> {
        if !self.check_recommend_timeout(&user.user_id).await? {
            return Ok(false);
        }
        let lock_key = CacheKey::key(RECOMMEND_LOCK, &user.user_id);
        let ttl = self.cfg.recommend.offline.pipeline_budget_secs;
        if !self.cache.set_if_absent(&lock_key, "building", ttl).await? {
            debug!(user_id = %user.user_id, "rebuild already in flight, skipping");
            return Ok(false);
        }
        let outcome = self.rebuild(user, items, categories).await;
        // best effort; the TTL releases the lock if this fails
        let _ = self.cache.del(&lock_key).await;
        outcome.map(|_| true)
    }

    /// Stale iff the list is missing, produced under another configuration,
    /// older than the last user event, or past its refresh period.
    pub async fn check_recommend_timeout(&self, user_id: &str) -> Result<bool> {
        let list = self
            .cache
            .get_sorted(&CacheKey::key(OFFLINE_RECOMMEND, user_id), 0, -1)
            .await?;
        if list.is_empty() {
            return Ok(true);
        }

        let digest_key = CacheKey::key(OFFLINE_RECOMMEND_DIGEST, user_id);
        match self.cache.get_string(&digest_key).await {
            Ok(digest) if digest == self.cfg.recommend.recommend_digest() => {}
            Ok(_) | Err(CacheError::NotFound(_)) => return Ok(true),
            Err(e) => return Err(e.into()),
        }

        let update_key = CacheKey::key(LAST_UPDATE_USER_RECOMMEND_TIME, user_id);
        let updated = match self.cache.get_time(&update_key).await {
            Ok(t) => t,
            Err(CacheError::NotFound(_)) => return Ok(true),
            Err(e) => return Err(e.into()),
        };

        let modify_key = CacheKey::key(LAST_MODIFY_USER_TIME, user_id);
        match self.cache.get_time(&modify_key).await {
            Ok(modified) if modified > updated => return Ok(true),
            Ok(_) | Err(CacheError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let now = Utc::now();
        if updated < now {
            let age = (now - updated).to_std().unwrap_or_default();
            if age > Duration::from_secs(self.cfg.recommend.offline.refresh_recommend_period_secs)
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn rebuild(&self, user: &User, items: &ItemCache, categories: &[String]) -> Result<()> {
        let cfg = &self.cfg.recommend;
        let now = Utc::now();

        // seen items: any feedback up to now plus unexpired ignore entries
        let feedback = self
            .data
            .get_user_feedback(&user.user_id, Some(now), &[])
            .await?;
        let mut exclude: HashSet<String> =
            feedback.iter().map(|f| f.key.item_id.clone()).collect();
        let ignore_key = CacheKey::key(IGNORE_ITEMS, &user.user_id);
        for entry in self.cache.get_sorted(&ignore_key, 0, -1).await? {
            if entry.score > now.timestamp() as f64 {
                exclude.insert(entry.id);
            }
        }

        // history split, newest first, deduplicated
        let mut positive_items: Vec<String> = Vec::new();
        let mut read_items: Vec<String> = Vec::new();
        for row in &feedback {
            if cfg.is_positive(&row.key.feedback_type) {
                if !positive_items.contains(&row.key.item_id) {
                    positive_items.push(row.key.item_id.clone());
                }
            } else if cfg.is_read(&row.key.feedback_type)
                && !read_items.contains(&row.key.item_id)
            {
                read_items.push(row.key.item_id.clone());
            }
        }

        let sources = self.sources();
        let ranker = self.active_ranker(user);
        let fractions = ExploreFractions {
            popular: cfg
                .offline
                .explore_recommend
                .get("popular")
                .copied()
                .unwrap_or(0.0),
            latest: cfg
                .offline
                .explore_recommend
                .get("latest")
                .copied()
                .unwrap_or(0.0),
        };

        let mut served: HashSet<String> = HashSet::new();
        for category in categories {
            let ctx = CandidateContext {
                items,
                exclude: &exclude,
                positive_items: &positive_items,
                cache_size: cfg.cache_size,
                hidden: Some(self.hidden.as_ref()),
            };
            let mut candidates: Vec<Vec<String>> = Vec::with_capacity(sources.len());
            for source in &sources {
                match source.generate(user, category, &ctx).await {
                    Ok(list) => candidates.push(list),
                    Err(e) => {
                        warn!(
                            user_id = %user.user_id,
                            generator = source.name(),
                            "candidate generator failed, substituting empty: {}", e
                        );
                        candidates.push(Vec::new());
                    }
                }
            }

            let mut ranked = match &ranker {
                ActiveRanker::ClickThrough(model) => {
                    rank_by_click_through_rate(model.as_ref(), user, &candidates, items)?
                }
                ActiveRanker::Collaborative(model) => {
                    rank_by_collaborative(model.as_ref(), user, &candidates)?
                }
                ActiveRanker::Shuffle => {
                    let mut rng = self.rng.lock().expect("worker rng poisoned");
                    merge_and_shuffle(&mut rng, &candidates)
                }
            };
            ranked.truncate(cfg.cache_size);

            if cfg.replacement.enable_replacement {
                if let Some((positive_history, read_history)) = self.score_history(
                    user,
                    items,
                    category,
                    &positive_items,
                    &read_items,
                    &ranker,
                ) {
                    ranked = replacement::blend(
                        &cfg.replacement,
                        ranked,
                        positive_history,
                        read_history,
                    );
                    ranked.truncate(cfg.cache_size);
                }
            }

            if fractions.popular > 0.0 || fractions.latest > 0.0 {
                let popular = self
                    .cache
                    .get_sorted(
                        &CacheKey::table(POPULAR_ITEMS, category),
                        0,
                        cfg.cache_size as isize - 1,
                    )
                    .await?;
                let latest = self
                    .cache
                    .get_sorted(
                        &CacheKey::table(LATEST_ITEMS, category),
                        0,
                        cfg.cache_size as isize - 1,
                    )
                    .await?;
                let mut rng = self.rng.lock().expect("worker rng poisoned");
                ranked = explore_recommend(&mut rng, ranked, &popular, &latest, fractions);
            }

            served.extend(ranked.iter().map(|s| s.id.clone()));
            self.cache
                .set_sorted(
                    &CacheKey::key_in(OFFLINE_RECOMMEND, &user.user_id, category),
                    &ranked,
                )
                .await?;
        }

        // bookkeeping after the list commits: ignore entries and timestamps
        // only shape future rebuilds
        let expiry = (now.timestamp() + cfg.offline.ignore_ttl_secs as i64) as f64;
        let ignore_entries: Vec<Scored> = served
            .into_iter()
            .map(|id| Scored::new(id, expiry))
            .collect();
        self.cache.add_sorted(&ignore_key, &ignore_entries).await?;
        self.cache
            .set_string(
                &CacheKey::key(OFFLINE_RECOMMEND_DIGEST, &user.user_id),
                &cfg.recommend_digest(),
            )
            .await?;
        self.cache
            .set_time(
                &CacheKey::key(LAST_UPDATE_USER_RECOMMEND_TIME, &user.user_id),
                now,
            )
            .await?;
        info!(user_id = %user.user_id, categories = categories.len(), "recommendation committed");
        Ok(())
    }

    /// Score history items with the active ranker for the replacement blend.
    /// `None` when no model applies; replacement is skipped rather than
    /// blending incomparable scores.
    fn score_history(
        &self,
        user: &User,
        items: &ItemCache,
        category: &str,
        positive_items: &[String],
        read_items: &[String],
        ranker: &ActiveRanker,
    ) -> Option<(Vec<Scored>, Vec<Scored>)> {
        let score = |id: &str| -> Option<f64> {
            match ranker {
                ActiveRanker::ClickThrough(model) => {
                    Some(model.predict(&user.user_id, id, &user.labels, items.labels(id)) as f64)
                }
                ActiveRanker::Collaborative(model) => {
                    Some(model.predict(&user.user_id, id) as f64)
                }
                ActiveRanker::Shuffle => None,
            }
        };
        let visible = |id: &str| {
            items.visible(id, category) && !self.hidden.is_hidden_one(id, category)
        };

        let mut positive_history = Vec::new();
        for id in positive_items {
            if visible(id) {
                positive_history.push(Scored::new(id.clone(), score(id)?));
            }
        }
        let mut read_history = Vec::new();
        for id in read_items {
            if positive_items.contains(id) {
                continue;
            }
            if visible(id) {
                read_history.push(Scored::new(id.clone(), score(id)?));
            }
        }
        Some((positive_history, read_history))
    }

    fn active_ranker(&self, user: &User) -> ActiveRanker {
        if self.cfg.recommend.offline.enable_click_through_prediction {
            if let Some(model) = self.ctr_model.load() {
                if !model.invalid() {
                    return ActiveRanker::ClickThrough(model);
                }
            }
        }
        if let Some(model) = self.ranking_model.load() {
            if !model.invalid() && model.user_predictable(&user.user_id) {
                return ActiveRanker::Collaborative(model);
            }
        }
        ActiveRanker::Shuffle
    }

    fn sources(&self) -> Vec<Box<dyn CandidateSource>> {
        let offline = &self.cfg.recommend.offline;
        let mut sources: Vec<Box<dyn CandidateSource>> = Vec::new();
        if offline.enable_collaborative {
            sources.push(Box::new(CollaborativeSource::new(self.ranking_model.clone())));
        }
        if offline.enable_item_based {
            sources.push(Box::new(ItemBasedSource::new(
                self.cache.clone(),
                offline.num_feedback_item_based,
            )));
        }
        if offline.enable_user_based {
            sources.push(Box::new(UserBasedSource::new(
                self.cache.clone(),
                self.data.clone(),
                self.cfg.recommend.clone(),
            )));
        }
        if offline.enable_latest {
            sources.push(Box::new(CachedListSource::latest(self.cache.clone())));
        }
        if offline.enable_popular {
            sources.push(Box::new(CachedListSource::popular(self.cache.clone())));
        }
        sources
    }
}
