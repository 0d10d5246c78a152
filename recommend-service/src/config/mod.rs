use std::collections::BTreeMap;
use std::env;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub cache: CacheConfig,
    pub recommend: RecommendConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub service_name: String,
    /// Concurrent user pipelines per process.
    pub jobs: usize,
    pub health_check_period_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecommendConfig {
    /// Per-list cap for materialized rankings.
    pub cache_size: usize,
    pub data_source: DataSourceConfig,
    pub offline: OfflineConfig,
    #[serde(skip)]
    pub online: OnlineConfig,
    pub replacement: ReplacementConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataSourceConfig {
    /// Feedback types treated as positive signal. Empty means every type.
    pub positive_feedback_types: Vec<String>,
    /// Feedback types recording that the user saw the item.
    pub read_feedback_types: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OfflineConfig {
    pub enable_collaborative: bool,
    pub enable_item_based: bool,
    pub enable_user_based: bool,
    pub enable_latest: bool,
    pub enable_popular: bool,
    pub enable_click_through_prediction: bool,
    /// Recent positive items used as item-based seeds.
    pub num_feedback_item_based: usize,
    /// Explore fractions per source (`popular`, `latest`).
    pub explore_recommend: BTreeMap<String, f64>,
    pub check_recommend_period_secs: u64,
    /// A fresh list older than this is stale regardless of modify times.
    pub refresh_recommend_period_secs: u64,
    /// Lifetime of served-item ignore entries.
    pub ignore_ttl_secs: u64,
    /// Wall-clock budget for one user's pipeline; also the advisory lock TTL.
    pub pipeline_budget_secs: u64,
    /// Seed for the explore/shuffle generator.
    pub seed: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OnlineConfig {
    /// Fallback chain consulted when the offline list runs short.
    pub fallback_recommend: Vec<String>,
    /// Recent positive items used as seeds by the item-based fallback.
    pub num_feedback_fallback_item_based: usize,
    /// Snapshot lifetime of the in-process popular-items cache.
    pub popular_window_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplacementConfig {
    pub enable_replacement: bool,
    pub positive_replacement_decay: f64,
    pub read_replacement_decay: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                service_name: "recommend-service".to_string(),
                jobs: std::thread::available_parallelism().map_or(1, |n| n.get()),
                health_check_period_secs: 60,
            },
            cache: CacheConfig {
                url: "redis://localhost:6379".to_string(),
            },
            recommend: RecommendConfig::default(),
        }
    }
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            cache_size: 100,
            data_source: DataSourceConfig {
                positive_feedback_types: Vec::new(),
                read_feedback_types: Vec::new(),
            },
            offline: OfflineConfig {
                enable_collaborative: false,
                enable_item_based: false,
                enable_user_based: false,
                enable_latest: false,
                enable_popular: false,
                enable_click_through_prediction: false,
                num_feedback_item_based: 4,
                explore_recommend: BTreeMap::new(),
                check_recommend_period_secs: 60,
                refresh_recommend_period_secs: 24 * 60 * 60,
                ignore_ttl_secs: 24 * 60 * 60,
                pipeline_budget_secs: 60,
                seed: 0,
            },
            online: OnlineConfig {
                fallback_recommend: Vec::new(),
                num_feedback_fallback_item_based: 10,
                popular_window_secs: 10 * 60,
            },
            replacement: ReplacementConfig {
                enable_replacement: false,
                positive_replacement_decay: 0.8,
                read_replacement_decay: 0.6,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = Config::default();

        Config {
            service: ServiceConfig {
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or(defaults.service.service_name),
                jobs: parse_env("RECOMMEND_JOBS", defaults.service.jobs),
                health_check_period_secs: parse_env(
                    "HEALTH_CHECK_PERIOD_SECS",
                    defaults.service.health_check_period_secs,
                ),
            },
            cache: CacheConfig {
                url: env::var("CACHE_URL").unwrap_or(defaults.cache.url),
            },
            recommend: RecommendConfig {
                cache_size: parse_env("RECOMMEND_CACHE_SIZE", defaults.recommend.cache_size),
                data_source: DataSourceConfig {
                    positive_feedback_types: parse_list("POSITIVE_FEEDBACK_TYPES"),
                    read_feedback_types: parse_list("READ_FEEDBACK_TYPES"),
                },
                offline: OfflineConfig {
                    enable_collaborative: parse_env("ENABLE_COLLABORATIVE", false),
                    enable_item_based: parse_env("ENABLE_ITEM_BASED", false),
                    enable_user_based: parse_env("ENABLE_USER_BASED", false),
                    enable_latest: parse_env("ENABLE_LATEST", false),
                    enable_popular: parse_env("ENABLE_POPULAR", false),
                    enable_click_through_prediction: parse_env("ENABLE_CTR_PREDICTION", false),
                    num_feedback_item_based: parse_env(
                        "NUM_FEEDBACK_ITEM_BASED",
                        defaults.recommend.offline.num_feedback_item_based,
                    ),
                    explore_recommend: parse_explore("EXPLORE_RECOMMEND"),
                    check_recommend_period_secs: parse_env(
                        "CHECK_RECOMMEND_PERIOD_SECS",
                        defaults.recommend.offline.check_recommend_period_secs,
                    ),
                    refresh_recommend_period_secs: parse_env(
                        "REFRESH_RECOMMEND_PERIOD_SECS",
                        defaults.recommend.offline.refresh_recommend_period_secs,
                    ),
                    ignore_ttl_secs: parse_env(
                        "IGNORE_TTL_SECS",
                        defaults.recommend.offline.ignore_ttl_secs,
                    ),
                    pipeline_budget_secs: parse_env(
                        "PIPELINE_BUDGET_SECS",
                        defaults.recommend.offline.pipeline_budget_secs,
                    ),
                    seed: parse_env("RECOMMEND_SEED", defaults.recommend.offline.seed),
                },
                online: OnlineConfig {
                    fallback_recommend: parse_list("FALLBACK_RECOMMEND"),
                    num_feedback_fallback_item_based: parse_env(
                        "NUM_FEEDBACK_FALLBACK_ITEM_BASED",
                        defaults.recommend.online.num_feedback_fallback_item_based,
                    ),
                    popular_window_secs: parse_env(
                        "POPULAR_WINDOW_SECS",
                        defaults.recommend.online.popular_window_secs,
                    ),
                },
                replacement: ReplacementConfig {
                    enable_replacement: parse_env("ENABLE_REPLACEMENT", false),
                    positive_replacement_decay: parse_env(
                        "POSITIVE_REPLACEMENT_DECAY",
                        defaults.recommend.replacement.positive_replacement_decay,
                    ),
                    read_replacement_decay: parse_env(
                        "READ_REPLACEMENT_DECAY",
                        defaults.recommend.replacement.read_replacement_decay,
                    ),
                },
            },
        }
    }
}

impl RecommendConfig {
    /// Digest of every setting that shapes an offline recommendation. Stored
    /// alongside each materialized list; a mismatch forces a rebuild.
    pub fn recommend_digest(&self) -> String {
        let payload =
            serde_json::to_vec(self).expect("recommend config is always serializable");
        let mut hasher = Sha256::new();
        hasher.update(&payload);
        hex::encode(hasher.finalize())
    }

    /// Whether `feedback_type` counts as positive signal.
    pub fn is_positive(&self, feedback_type: &str) -> bool {
        self.data_source.positive_feedback_types.is_empty()
            || self
                .data_source
                .positive_feedback_types
                .iter()
                .any(|t| t == feedback_type)
    }

    /// Whether `feedback_type` records a read.
    pub fn is_read(&self, feedback_type: &str) -> bool {
        self.data_source
            .read_feedback_types
            .iter()
            .any(|t| t == feedback_type)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{} must be a valid {}", name, std::any::type_name::<T>())),
        Err(_) => default,
    }
}

fn parse_list(name: &str) -> Vec<String> {
    env::var(name)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// `EXPLORE_RECOMMEND=popular:0.3,latest:0.2`
fn parse_explore(name: &str) -> BTreeMap<String, f64> {
    env::var(name)
        .map(|raw| {
            raw.split(',')
                .filter_map(|pair| {
                    let (source, fraction) = pair.split_once(':')?;
                    Some((source.trim().to_string(), fraction.trim().parse().ok()?))
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_changes_with_positive_types() {
        let base = RecommendConfig::default();
        let mut changed = base.clone();
        changed.data_source.positive_feedback_types = vec!["star".to_string()];
        assert_ne!(base.recommend_digest(), changed.recommend_digest());
    }

    #[test]
    fn test_digest_stable_for_equal_configs() {
        let a = RecommendConfig::default();
        let b = RecommendConfig::default();
        assert_eq!(a.recommend_digest(), b.recommend_digest());
    }

    #[test]
    fn test_digest_ignores_online_settings() {
        let base = RecommendConfig::default();
        let mut changed = base.clone();
        changed.online.fallback_recommend = vec!["popular".to_string()];
        assert_eq!(base.recommend_digest(), changed.recommend_digest());
    }

    #[test]
    fn test_empty_positive_types_match_everything() {
        let cfg = RecommendConfig::default();
        assert!(cfg.is_positive("anything"));

        let mut narrowed = cfg.clone();
        narrowed.data_source.positive_feedback_types = vec!["like".to_string()];
        assert!(narrowed.is_positive("like"));
        assert!(!narrowed.is_positive("view"));
    }

    #[test]
    fn test_explore_env_format() {
        env::set_var("EXPLORE_RECOMMEND_TEST_KEY", "popular:0.3,latest:0.2");
        let parsed = parse_explore("EXPLORE_RECOMMEND_TEST_KEY");
        assert_eq!(parsed.get("popular"), Some(&0.3));
        assert_eq!(parsed.get("latest"), Some(&0.2));
        env::remove_var("EXPLORE_RECOMMEND_TEST_KEY");
    }
}
