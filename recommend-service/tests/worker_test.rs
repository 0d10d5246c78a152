//! End-to-end tests for the offline recommendation pipeline against the
//! in-memory cache and data stores.

use std::sync::Arc;

use chrono::{Duration, Utc};
use quasar_cache::{
    remove_scores, CacheKey, CacheStore, MemoryCache, Scored, IGNORE_ITEMS,
    LAST_MODIFY_USER_TIME, LAST_UPDATE_USER_RECOMMEND_TIME, LATEST_ITEMS, OFFLINE_RECOMMEND,
    OFFLINE_RECOMMEND_DIGEST, POPULAR_ITEMS, RECOMMEND_LOCK, USER_NEIGHBORS, ITEM_NEIGHBORS,
};
use quasar_data::{DataStore, Feedback, Item, MemoryData, User};
use recommend_service::models::{CtrModel, ModelSlot, RankingModel};
use recommend_service::services::HiddenItemsManager;
use recommend_service::{Config, Worker};

struct MockRankingModel {
    num_users: usize,
    num_items: usize,
}

impl RankingModel for MockRankingModel {
    fn invalid(&self) -> bool {
        false
    }
    fn predict(&self, _: &str, item_id: &str) -> f32 {
        item_id.parse().unwrap_or(0.0)
    }
    fn user_predictable(&self, user_id: &str) -> bool {
        user_id.parse::<usize>().map_or(false, |i| i < self.num_users)
    }
    fn item_predictable(&self, item_id: &str) -> bool {
        item_id.parse::<usize>().map_or(false, |i| i < self.num_items)
    }
    fn user_factor(&self, _: &str) -> Option<Vec<f32>> {
        Some(vec![1.0])
    }
    fn item_factor(&self, item_id: &str) -> Option<Vec<f32>> {
        Some(vec![item_id.parse().unwrap_or(0.0)])
    }
    fn items(&self) -> Vec<String> {
        (0..self.num_items).map(|i| i.to_string()).collect()
    }
}

struct MockFactorizationMachine;

impl CtrModel for MockFactorizationMachine {
    fn invalid(&self) -> bool {
        false
    }
    fn predict(&self, _: &str, item_id: &str, _: &[String], _: &[String]) -> f32 {
        item_id.parse().unwrap_or(0.0)
    }
}

struct Fixture {
    cache: Arc<dyn CacheStore>,
    data: Arc<dyn DataStore>,
    hidden: Arc<HiddenItemsManager>,
}

impl Fixture {
    fn new() -> Self {
        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
        let data: Arc<dyn DataStore> = Arc::new(MemoryData::new());
        let hidden = HiddenItemsManager::new(cache.clone());
        Self {
            cache,
            data,
            hidden,
        }
    }

    fn worker(
        &self,
        cfg: Config,
        ranking: Option<Arc<dyn RankingModel>>,
        ctr: Option<Arc<dyn CtrModel>>,
    ) -> Arc<Worker> {
        let ranking_slot = match ranking {
            Some(model) => Arc::new(ModelSlot::with(model)),
            None => Arc::new(ModelSlot::empty()),
        };
        let ctr_slot = match ctr {
            Some(model) => Arc::new(ModelSlot::with(model)),
            None => Arc::new(ModelSlot::empty()),
        };
        Worker::new(
            cfg,
            self.cache.clone(),
            self.data.clone(),
            self.hidden.clone(),
            ranking_slot,
            ctr_slot,
        )
    }
}

fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.service.jobs = 1;
    cfg
}

fn offline_key(user: &str, category: &str) -> String {
    CacheKey::key_in(OFFLINE_RECOMMEND, user, category)
}

async fn recommends(cache: &dyn CacheStore, user: &str, category: &str, end: isize) -> Vec<Scored> {
    cache
        .get_sorted(&offline_key(user, category), 0, end)
        .await
        .unwrap()
}

fn scored(pairs: &[(&str, f64)]) -> Vec<Scored> {
    pairs.iter().map(|(id, s)| Scored::new(*id, *s)).collect()
}

#[tokio::test]
async fn test_check_recommend_timeout() {
    let fx = Fixture::new();
    let cfg = test_config();
    let worker = fx.worker(cfg.clone(), None, None);
    let now = Utc::now();

    // empty cache
    assert!(worker.check_recommend_timeout("0").await.unwrap());
    fx.cache
        .set_sorted(&offline_key("0", ""), &scored(&[("0", 0.0)]))
        .await
        .unwrap();

    // digest mismatch
    assert!(worker.check_recommend_timeout("0").await.unwrap());
    fx.cache
        .set_string(
            &CacheKey::key(OFFLINE_RECOMMEND_DIGEST, "0"),
            &cfg.recommend.recommend_digest(),
        )
        .await
        .unwrap();

    // update time missing
    fx.cache
        .set_time(
            &CacheKey::key(LAST_MODIFY_USER_TIME, "0"),
            now - Duration::hours(1),
        )
        .await
        .unwrap();
    assert!(worker.check_recommend_timeout("0").await.unwrap());

    // modified after the last rebuild
    fx.cache
        .set_time(
            &CacheKey::key(LAST_UPDATE_USER_RECOMMEND_TIME, "0"),
            now - Duration::hours(100),
        )
        .await
        .unwrap();
    assert!(worker.check_recommend_timeout("0").await.unwrap());

    // fresh
    fx.cache
        .set_time(
            &CacheKey::key(LAST_UPDATE_USER_RECOMMEND_TIME, "0"),
            now + Duration::hours(100),
        )
        .await
        .unwrap();
    assert!(!worker.check_recommend_timeout("0").await.unwrap());

    // list emptied out from under the bookkeeping
    fx.cache.set_sorted(&offline_key("0", ""), &[]).await.unwrap();
    assert!(worker.check_recommend_timeout("0").await.unwrap());
}

#[tokio::test]
async fn test_recommend_collaborative() {
    let fx = Fixture::new();
    let mut cfg = test_config();
    cfg.recommend.offline.enable_collaborative = true;

    let now = Utc::now();
    let mut feedback = Vec::new();
    for item in 4..=9 {
        feedback.push(Feedback::new(
            "click",
            "0",
            item.to_string(),
            now - Duration::hours(1),
        ));
    }
    for item in 0..=3 {
        feedback.push(Feedback::new(
            "click",
            "0",
            item.to_string(),
            now + Duration::hours(1),
        ));
    }
    fx.data
        .batch_insert_feedback(&feedback, true, true, true)
        .await
        .unwrap();
    fx.data
        .batch_insert_items(&[
            Item::new("10").hidden(),
            Item::new("11").hidden(),
            Item::new("3").with_categories(&["*"]),
            Item::new("1").with_categories(&["*"]),
        ])
        .await
        .unwrap();

    let worker = fx.worker(
        cfg,
        Some(Arc::new(MockRankingModel {
            num_users: 1,
            num_items: 12,
        })),
        None,
    );
    worker.recommend(vec![User::new("0")]).await;

    assert_eq!(
        recommends(fx.cache.as_ref(), "0", "", -1).await,
        scored(&[("3", 3.0), ("2", 2.0), ("1", 1.0), ("0", 0.0)])
    );
    assert_eq!(
        recommends(fx.cache.as_ref(), "0", "*", -1).await,
        scored(&[("3", 3.0), ("1", 1.0)])
    );

    // served items land in the ignore set with future expiries
    let ignored = fx
        .cache
        .get_sorted(&CacheKey::key(IGNORE_ITEMS, "0"), 0, -1)
        .await
        .unwrap();
    let mut ignored_ids = remove_scores(&ignored);
    ignored_ids.sort();
    assert_eq!(ignored_ids, vec!["0", "1", "2", "3"]);
    for entry in &ignored {
        assert!(entry.score > Utc::now().timestamp() as f64);
    }
}

#[tokio::test]
async fn test_recommend_item_based() {
    let fx = Fixture::new();
    let mut cfg = test_config();
    cfg.recommend.offline.enable_item_based = true;

    let past = Utc::now() - Duration::hours(1);
    let feedback: Vec<Feedback> = (21..=24)
        .map(|item| Feedback::new("a", "0", item.to_string(), past))
        .collect();
    fx.data
        .batch_insert_feedback(&feedback, true, true, true)
        .await
        .unwrap();

    let neighbors: Vec<(&str, Vec<(&str, f64)>)> = vec![
        ("21", vec![("22", 100000.0), ("25", 1000000.0), ("29", 1.0)]),
        ("22", vec![("23", 100000.0), ("25", 1000000.0), ("28", 1.0), ("29", 1.0)]),
        (
            "23",
            vec![("24", 100000.0), ("25", 1000000.0), ("27", 1.0), ("28", 1.0), ("29", 1.0)],
        ),
        (
            "24",
            vec![
                ("21", 100000.0),
                ("25", 1000000.0),
                ("26", 1.0),
                ("27", 1.0),
                ("28", 1.0),
                ("29", 1.0),
            ],
        ),
    ];
    for (item, table) in neighbors {
        let entries: Vec<Scored> = table.into_iter().map(|(id, s)| Scored::new(id, s)).collect();
        fx.cache
            .set_sorted(&CacheKey::key(ITEM_NEIGHBORS, item), &entries)
            .await
            .unwrap();
    }
    let scoped: Vec<(&str, Vec<(&str, f64)>)> = vec![
        ("21", vec![("22", 100000.0)]),
        ("22", vec![("28", 1.0)]),
        ("23", vec![("24", 100000.0), ("28", 1.0)]),
        ("24", vec![("26", 1.0), ("28", 1.0)]),
    ];
    for (item, table) in scoped {
        let entries: Vec<Scored> = table.into_iter().map(|(id, s)| Scored::new(id, s)).collect();
        fx.cache
            .set_sorted(&CacheKey::key_in(ITEM_NEIGHBORS, item, "*"), &entries)
            .await
            .unwrap();
    }

    let items: Vec<Item> = (25..=29).map(|i| Item::new(i.to_string())).collect();
    fx.data.batch_insert_items(&items).await.unwrap();
    fx.data
        .batch_insert_items(&[
            Item::new("25").hidden(),
            Item::new("26").with_categories(&["*"]),
            Item::new("28").with_categories(&["*"]),
        ])
        .await
        .unwrap();

    let worker = fx.worker(
        cfg,
        Some(Arc::new(MockRankingModel {
            num_users: 1,
            num_items: 10,
        })),
        None,
    );
    worker.recommend(vec![User::new("0")]).await;

    assert_eq!(
        recommends(fx.cache.as_ref(), "0", "", 2).await,
        scored(&[("29", 29.0), ("28", 28.0), ("27", 27.0)])
    );
    assert_eq!(
        recommends(fx.cache.as_ref(), "0", "*", 2).await,
        scored(&[("28", 28.0), ("26", 26.0)])
    );
}

#[tokio::test]
async fn test_recommend_user_based() {
    let fx = Fixture::new();
    let mut cfg = test_config();
    cfg.recommend.offline.enable_user_based = true;

    fx.cache
        .set_sorted(
            &CacheKey::key(USER_NEIGHBORS, "0"),
            &scored(&[("1", 2.0), ("2", 1.5), ("3", 1.0)]),
        )
        .await
        .unwrap();
    let past = Utc::now() - Duration::hours(1);
    let rows: Vec<Feedback> = [
        ("1", "10"),
        ("1", "11"),
        ("2", "10"),
        ("2", "12"),
        ("2", "48"),
        ("3", "10"),
        ("3", "13"),
        ("3", "48"),
    ]
    .iter()
    .map(|(user, item)| Feedback::new("a", *user, *item, past))
    .collect();
    fx.data
        .batch_insert_feedback(&rows, true, true, true)
        .await
        .unwrap();
    fx.data
        .batch_insert_items(&[
            Item::new("10").hidden(),
            Item::new("12").with_categories(&["*"]),
            Item::new("48").with_categories(&["*"]),
        ])
        .await
        .unwrap();

    let worker = fx.worker(
        cfg,
        Some(Arc::new(MockRankingModel {
            num_users: 1,
            num_items: 10,
        })),
        None,
    );
    worker.recommend(vec![User::new("0")]).await;

    assert_eq!(
        recommends(fx.cache.as_ref(), "0", "", 2).await,
        scored(&[("48", 48.0), ("13", 13.0), ("12", 12.0)])
    );
    assert_eq!(
        recommends(fx.cache.as_ref(), "0", "*", 2).await,
        scored(&[("48", 48.0), ("12", 12.0)])
    );
}

#[tokio::test]
async fn test_recommend_popular() {
    let fx = Fixture::new();
    let mut cfg = test_config();
    cfg.recommend.offline.enable_popular = true;

    fx.cache
        .set_sorted(
            POPULAR_ITEMS,
            &scored(&[("11", 11.0), ("10", 10.0), ("9", 9.0), ("8", 8.0)]),
        )
        .await
        .unwrap();
    fx.cache
        .set_sorted(
            &CacheKey::table(POPULAR_ITEMS, "*"),
            &scored(&[("20", 20.0), ("19", 19.0), ("18", 18.0)]),
        )
        .await
        .unwrap();
    fx.data
        .batch_insert_items(&[
            Item::new("11").hidden(),
            Item::new("10"),
            Item::new("9"),
            Item::new("8"),
            Item::new("20").with_categories(&["*"]),
            Item::new("19").with_categories(&["*"]),
            Item::new("18").with_categories(&["*"]),
        ])
        .await
        .unwrap();

    let worker = fx.worker(
        cfg,
        Some(Arc::new(MockRankingModel {
            num_users: 1,
            num_items: 10,
        })),
        None,
    );
    worker.recommend(vec![User::new("0")]).await;

    assert_eq!(
        recommends(fx.cache.as_ref(), "0", "", -1).await,
        scored(&[("10", 10.0), ("9", 9.0), ("8", 8.0)])
    );
    assert_eq!(
        recommends(fx.cache.as_ref(), "0", "*", -1).await,
        scored(&[("20", 20.0), ("19", 19.0), ("18", 18.0)])
    );
}

#[tokio::test]
async fn test_recommend_latest() {
    let fx = Fixture::new();
    let mut cfg = test_config();
    cfg.recommend.offline.enable_latest = true;

    fx.cache
        .set_sorted(
            LATEST_ITEMS,
            &scored(&[("11", 11.0), ("10", 10.0), ("9", 9.0), ("8", 8.0)]),
        )
        .await
        .unwrap();
    fx.cache
        .set_sorted(
            &CacheKey::table(LATEST_ITEMS, "*"),
            &scored(&[("20", 10.0), ("19", 9.0), ("18", 8.0)]),
        )
        .await
        .unwrap();
    fx.data
        .batch_insert_items(&[
            Item::new("11").hidden(),
            Item::new("10"),
            Item::new("9"),
            Item::new("8"),
            Item::new("20").with_categories(&["*"]),
            Item::new("19").with_categories(&["*"]),
            Item::new("18").with_categories(&["*"]),
        ])
        .await
        .unwrap();

    let worker = fx.worker(
        cfg,
        Some(Arc::new(MockRankingModel {
            num_users: 1,
            num_items: 10,
        })),
        None,
    );
    worker.recommend(vec![User::new("0")]).await;

    assert_eq!(
        recommends(fx.cache.as_ref(), "0", "", -1).await,
        scored(&[("10", 10.0), ("9", 9.0), ("8", 8.0)])
    );
    assert_eq!(
        recommends(fx.cache.as_ref(), "0", "*", -1).await,
        scored(&[("20", 20.0), ("19", 19.0), ("18", 18.0)])
    );
}

#[tokio::test]
async fn test_recommend_cold_start() {
    let fx = Fixture::new();
    let mut cfg = test_config();
    cfg.recommend.offline.enable_collaborative = true;
    cfg.recommend.offline.enable_latest = true;

    fx.cache
        .set_sorted(
            LATEST_ITEMS,
            &scored(&[("11", 11.0), ("10", 10.0), ("9", 9.0), ("8", 8.0)]),
        )
        .await
        .unwrap();
    fx.cache
        .set_sorted(
            &CacheKey::table(LATEST_ITEMS, "*"),
            &scored(&[("20", 10.0), ("19", 9.0), ("18", 8.0)]),
        )
        .await
        .unwrap();
    fx.data
        .batch_insert_items(&[
            Item::new("11").hidden(),
            Item::new("10"),
            Item::new("9"),
            Item::new("8"),
            Item::new("20").with_categories(&["*"]),
            Item::new("19").with_categories(&["*"]),
            Item::new("18").with_categories(&["*"]),
        ])
        .await
        .unwrap();

    // no ranking model loaded at all
    let worker = fx.worker(cfg.clone(), None, None);
    worker.recommend(vec![User::new("0")]).await;
    assert_eq!(
        remove_scores(&recommends(fx.cache.as_ref(), "0", "", -1).await),
        vec!["10", "9", "8"]
    );
    assert_eq!(
        remove_scores(&recommends(fx.cache.as_ref(), "0", "*", -1).await),
        vec!["20", "19", "18"]
    );

    // model present but the user is outside its index
    let worker = fx.worker(
        cfg,
        Some(Arc::new(MockRankingModel {
            num_users: 10,
            num_items: 100,
        })),
        None,
    );
    worker.recommend(vec![User::new("100")]).await;
    assert_eq!(
        remove_scores(&recommends(fx.cache.as_ref(), "100", "", -1).await),
        vec!["10", "9", "8"]
    );
    assert_eq!(
        remove_scores(&recommends(fx.cache.as_ref(), "100", "*", -1).await),
        vec!["20", "19", "18"]
    );
}

#[tokio::test]
async fn test_explore_recommend_injects_sources() {
    let fx = Fixture::new();
    let mut cfg = test_config();
    cfg.recommend.offline.enable_latest = true;
    cfg.recommend.offline.explore_recommend =
        [("popular".to_string(), 1.0)].into_iter().collect();

    fx.cache
        .set_sorted(
            LATEST_ITEMS,
            &scored(&[("3", 3.0), ("2", 2.0), ("1", 1.0)]),
        )
        .await
        .unwrap();
    fx.cache
        .set_sorted(POPULAR_ITEMS, &scored(&[("42", 0.0)]))
        .await
        .unwrap();
    fx.data
        .batch_insert_items(&[Item::new("1"), Item::new("2"), Item::new("3")])
        .await
        .unwrap();

    let worker = fx.worker(
        cfg,
        Some(Arc::new(MockRankingModel {
            num_users: 1,
            num_items: 10,
        })),
        None,
    );
    worker.recommend(vec![User::new("0")]).await;

    let result = recommends(fx.cache.as_ref(), "0", "", -1).await;
    assert_eq!(result.len(), 3);
    // the popular explore item takes the first slot and outranks the rest
    assert_eq!(result[0].id, "42");
    let scores: Vec<f64> = result.iter().map(|s| s.score).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn test_replacement_click_through_rate() {
    let fx = Fixture::new();
    let mut cfg = test_config();
    cfg.recommend.data_source.positive_feedback_types = vec!["p".to_string()];
    cfg.recommend.data_source.read_feedback_types = vec!["n".to_string()];
    cfg.recommend.offline.enable_popular = true;
    cfg.recommend.offline.enable_click_through_prediction = true;
    cfg.recommend.replacement.enable_replacement = true;

    let items: Vec<Item> = [5, 6, 7, 8, 9, 10]
        .iter()
        .map(|i| Item::new(i.to_string()))
        .collect();
    fx.data.batch_insert_items(&items).await.unwrap();
    let past = Utc::now() - Duration::hours(1);
    fx.data
        .batch_insert_feedback(
            &[
                Feedback::new("p", "0", "10", past),
                Feedback::new("n", "0", "9", past),
                Feedback::new("i", "0", "8", past),
            ],
            true,
            false,
            true,
        )
        .await
        .unwrap();

    let worker = fx.worker(cfg, None, Some(Arc::new(MockFactorizationMachine)));

    // 1. history fills an empty recommendation at raw model scores
    worker.recommend(vec![User::new("0")]).await;
    assert_eq!(
        recommends(fx.cache.as_ref(), "0", "", 2).await,
        scored(&[("10", 10.0), ("9", 9.0)])
    );

    // 2. history blends into a non-empty recommendation with anchored decay
    fx.cache
        .set_time(
            &CacheKey::key(LAST_UPDATE_USER_RECOMMEND_TIME, "0"),
            Utc::now() - Duration::days(365),
        )
        .await
        .unwrap();
    fx.cache
        .set_sorted(
            POPULAR_ITEMS,
            &scored(&[("7", 10.0), ("6", 9.0), ("5", 8.0)]),
        )
        .await
        .unwrap();
    worker.recommend(vec![User::new("0")]).await;
    assert_eq!(
        recommends(fx.cache.as_ref(), "0", "", 2).await,
        scored(&[("10", 9.0), ("9", 7.4), ("7", 7.0)])
    );
}

#[tokio::test]
async fn test_replacement_collaborative_filtering() {
    let fx = Fixture::new();
    let mut cfg = test_config();
    cfg.recommend.data_source.positive_feedback_types = vec!["p".to_string()];
    cfg.recommend.data_source.read_feedback_types = vec!["n".to_string()];
    cfg.recommend.offline.enable_popular = true;
    cfg.recommend.replacement.enable_replacement = true;

    let items: Vec<Item> = [5, 6, 7, 8, 9, 10]
        .iter()
        .map(|i| Item::new(i.to_string()))
        .collect();
    fx.data.batch_insert_items(&items).await.unwrap();
    let past = Utc::now() - Duration::hours(1);
    fx.data
        .batch_insert_feedback(
            &[
                Feedback::new("p", "0", "10", past),
                Feedback::new("n", "0", "9", past),
                Feedback::new("i", "0", "8", past),
            ],
            true,
            false,
            true,
        )
        .await
        .unwrap();

    let worker = fx.worker(
        cfg,
        Some(Arc::new(MockRankingModel {
            num_users: 1,
            num_items: 10,
        })),
        None,
    );

    worker.recommend(vec![User::new("0")]).await;
    assert_eq!(
        recommends(fx.cache.as_ref(), "0", "", 2).await,
        scored(&[("10", 10.0), ("9", 9.0)])
    );

    fx.cache
        .set_time(
            &CacheKey::key(LAST_UPDATE_USER_RECOMMEND_TIME, "0"),
            Utc::now() - Duration::days(365),
        )
        .await
        .unwrap();
    fx.cache
        .set_sorted(
            POPULAR_ITEMS,
            &scored(&[("7", 10.0), ("6", 9.0), ("5", 8.0)]),
        )
        .await
        .unwrap();
    worker.recommend(vec![User::new("0")]).await;
    assert_eq!(
        recommends(fx.cache.as_ref(), "0", "", 2).await,
        scored(&[("10", 9.0), ("9", 7.4), ("7", 7.0)])
    );
}

#[tokio::test]
async fn test_digest_change_forces_rebuild() {
    let fx = Fixture::new();
    let mut cfg = test_config();
    cfg.recommend.offline.enable_popular = true;

    fx.cache
        .set_sorted(POPULAR_ITEMS, &scored(&[("1", 1.0), ("2", 2.0)]))
        .await
        .unwrap();
    fx.data
        .batch_insert_items(&[Item::new("1"), Item::new("2")])
        .await
        .unwrap();

    let worker = fx.worker(
        cfg.clone(),
        Some(Arc::new(MockRankingModel {
            num_users: 1,
            num_items: 10,
        })),
        None,
    );
    worker.recommend(vec![User::new("0")]).await;
    assert!(!worker.check_recommend_timeout("0").await.unwrap());

    // same stores, different positive types: the digest no longer matches
    let mut changed = cfg.clone();
    changed.recommend.data_source.positive_feedback_types = vec!["star".to_string()];
    let changed_worker = fx.worker(
        changed,
        Some(Arc::new(MockRankingModel {
            num_users: 1,
            num_items: 10,
        })),
        None,
    );
    assert!(changed_worker.check_recommend_timeout("0").await.unwrap());
}

#[tokio::test]
async fn test_advisory_lock_skips_concurrent_rebuild() {
    let fx = Fixture::new();
    let mut cfg = test_config();
    cfg.recommend.offline.enable_popular = true;

    fx.cache
        .set_sorted(POPULAR_ITEMS, &scored(&[("1", 1.0)]))
        .await
        .unwrap();
    fx.data.batch_insert_items(&[Item::new("1")]).await.unwrap();

    let worker = fx.worker(
        cfg,
        Some(Arc::new(MockRankingModel {
            num_users: 1,
            num_items: 10,
        })),
        None,
    );

    // another holder owns the per-user flag
    assert!(fx
        .cache
        .set_if_absent(&CacheKey::key(RECOMMEND_LOCK, "0"), "other", 60)
        .await
        .unwrap());
    worker.recommend(vec![User::new("0")]).await;
    assert!(recommends(fx.cache.as_ref(), "0", "", -1).await.is_empty());

    // released: the rebuild goes through
    fx.cache
        .del(&CacheKey::key(RECOMMEND_LOCK, "0"))
        .await
        .unwrap();
    worker.recommend(vec![User::new("0")]).await;
    assert_eq!(
        remove_scores(&recommends(fx.cache.as_ref(), "0", "", -1).await),
        vec!["1"]
    );
}

#[tokio::test]
async fn test_update_time_is_monotonic() {
    let fx = Fixture::new();
    let mut cfg = test_config();
    cfg.recommend.offline.enable_popular = true;

    fx.cache
        .set_sorted(POPULAR_ITEMS, &scored(&[("1", 1.0)]))
        .await
        .unwrap();
    fx.data.batch_insert_items(&[Item::new("1")]).await.unwrap();

    let worker = fx.worker(
        cfg,
        Some(Arc::new(MockRankingModel {
            num_users: 1,
            num_items: 10,
        })),
        None,
    );
    worker.recommend(vec![User::new("0")]).await;
    let first = fx
        .cache
        .get_time(&CacheKey::key(LAST_UPDATE_USER_RECOMMEND_TIME, "0"))
        .await
        .unwrap();

    // a user event staler than nothing forces the next cycle through
    fx.cache
        .set_time(&CacheKey::key(LAST_MODIFY_USER_TIME, "0"), Utc::now())
        .await
        .unwrap();
    worker.recommend(vec![User::new("0")]).await;
    let second = fx
        .cache
        .get_time(&CacheKey::key(LAST_UPDATE_USER_RECOMMEND_TIME, "0"))
        .await
        .unwrap();
    assert!(second >= first);
}
