//! Stable cache key schema
//!
//! Every service must build keys through these helpers; the layout is part of
//! the compatibility surface. Format: `{prefix}:{identifier}[:{category}]`,
//! category suffix only when non-empty. The empty category denotes the global
//! view; `"*"` is an ordinary category value at this layer.

/// Per-user ranked list produced by the offline pipeline.
pub const OFFLINE_RECOMMEND: &str = "offline_recommend";
/// Configuration digest the offline list was produced under.
pub const OFFLINE_RECOMMEND_DIGEST: &str = "offline_recommend_digest";
/// Per-user served-item sorted set; score is the entry's expiry epoch.
pub const IGNORE_ITEMS: &str = "ignore_items";
/// Item-to-item similarity table.
pub const ITEM_NEIGHBORS: &str = "item_neighbors";
/// User-to-user similarity table.
pub const USER_NEIGHBORS: &str = "user_neighbors";
/// Newest items, scored by timestamp.
pub const LATEST_ITEMS: &str = "latest_items";
/// Long-horizon popular items.
pub const POPULAR_ITEMS: &str = "popular_items";
/// Hidden item markers, global and per category.
pub const HIDDEN_ITEMS: &str = "hidden_items";
/// Known category strings.
pub const ITEM_CATEGORIES: &str = "item_categories";
/// Latest event affecting a user.
pub const LAST_MODIFY_USER_TIME: &str = "last_modify_user_time";
/// Last completed rebuild for a user.
pub const LAST_UPDATE_USER_RECOMMEND_TIME: &str = "last_update_user_recommend_time";
/// Precomputed collaborative-filtering list.
pub const COLLABORATIVE_RECOMMEND: &str = "collaborative_recommend";
/// Bounded time series, one key per measurement name.
pub const MEASUREMENTS: &str = "measurements";
/// Per-user rebuild advisory lock.
pub const RECOMMEND_LOCK: &str = "recommend_lock";

/// Cache key builder.
pub struct CacheKey;

impl CacheKey {
    /// `{prefix}:{id}`
    pub fn key(prefix: &str, id: &str) -> String {
        format!("{}:{}", prefix, id)
    }

    /// `{prefix}:{id}[:{category}]`; no suffix for the global view.
    pub fn key_in(prefix: &str, id: &str, category: &str) -> String {
        if category.is_empty() {
            Self::key(prefix, id)
        } else {
            format!("{}:{}:{}", prefix, id, category)
        }
    }

    /// `{prefix}[:{category}]` for the global tables (latest, popular, hidden).
    pub fn table(prefix: &str, category: &str) -> String {
        if category.is_empty() {
            prefix.to_string()
        } else {
            format!("{}:{}", prefix, category)
        }
    }
}
