//! Candidate generators
//!
//! Each signal produces an ordered id list for one `(user, category)` pair.
//! Generators are stateless and read-only against cache and storage; the
//! per-batch [`ItemCache`](super::item_cache::ItemCache) and the per-user
//! exclude set arrive through [`CandidateContext`]. A generator with nothing
//! to say returns an empty list, never an error the orchestrator has to
//! unwind.

mod cached;
mod collaborative;
mod item_based;
mod user_based;

pub use cached::CachedListSource;
pub use collaborative::CollaborativeSource;
pub use item_based::{accumulate_neighbors, ItemBasedSource};
pub use user_based::{accumulate_from_user_neighbors, UserBasedSource};

use std::collections::HashSet;

use async_trait::async_trait;
use quasar_data::User;

use crate::error::Result;
use crate::services::hidden::HiddenItemsManager;
use crate::services::item_cache::ItemCache;

/// Shared read-only state for one user's candidate collection.
pub struct CandidateContext<'a> {
    pub items: &'a ItemCache,
    /// Items the user has already seen or that are pending re-show expiry.
    pub exclude: &'a HashSet<String>,
    /// The user's recent positive items, newest first.
    pub positive_items: &'a [String],
    /// Per-list cap.
    pub cache_size: usize,
    /// Process-wide hide markers, honored on top of the item snapshot.
    pub hidden: Option<&'a HiddenItemsManager>,
}

impl CandidateContext<'_> {
    /// Eligible for a category view: unseen, present, not hidden, in category.
    pub fn eligible(&self, item_id: &str, category: &str) -> bool {
        !self.exclude.contains(item_id)
            && self.items.visible(item_id, category)
            && !self
                .hidden
                .map_or(false, |h| h.is_hidden_one(item_id, category))
    }
}

#[async_trait]
pub trait CandidateSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Ordered candidate ids for one user and category view.
    async fn generate(
        &self,
        user: &User,
        category: &str,
        ctx: &CandidateContext<'_>,
    ) -> Result<Vec<String>>;
}
