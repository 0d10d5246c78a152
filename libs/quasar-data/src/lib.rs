//! Canonical entities and the storage seam
//!
//! The truth store owns users, items and feedback; everything ranked lives in
//! the cache layer. This crate defines the entities, their patch types and
//! the [`DataStore`] trait the engine consumes. Only the in-memory reference
//! implementation ships here; SQL/NoSQL adapters plug into the same trait.
//!
//! Feedback identity is the `(type, user, item)` triple. Future-dated
//! feedback is stored verbatim; honoring `timestamp <= now` is the reader's
//! responsibility.

mod error;
mod memory;

pub use error::{DataError, DataResult};
pub use memory::MemoryData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub comment: String,
}

impl User {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub item_id: String,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub categories: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub comment: String,
}

impl Item {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            is_hidden: false,
            categories: Vec::new(),
            timestamp: DateTime::<Utc>::MIN_UTC,
            labels: Vec::new(),
            comment: String::new(),
        }
    }

    pub fn hidden(mut self) -> Self {
        self.is_hidden = true;
        self
    }

    pub fn with_categories(mut self, categories: &[&str]) -> Self {
        self.categories = categories.iter().map(|c| c.to_string()).collect();
        self
    }
}

/// Identity of a feedback row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedbackKey {
    pub feedback_type: String,
    pub user_id: String,
    pub item_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(flatten)]
    pub key: FeedbackKey,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub comment: String,
}

impl Feedback {
    pub fn new(
        feedback_type: impl Into<String>,
        user_id: impl Into<String>,
        item_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            key: FeedbackKey {
                feedback_type: feedback_type.into(),
                user_id: user_id.into(),
                item_id: item_id.into(),
            },
            timestamp,
            comment: String::new(),
        }
    }
}

/// Partial update for a user; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub labels: Option<Vec<String>>,
    pub comment: Option<String>,
}

/// Partial update for an item; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemPatch {
    pub is_hidden: Option<bool>,
    pub categories: Option<Vec<String>>,
    pub timestamp: Option<DateTime<Utc>>,
    pub labels: Option<Vec<String>>,
    pub comment: Option<String>,
}

/// Storage operations the engine consumes.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn batch_insert_users(&self, users: &[User]) -> DataResult<()>;
    async fn batch_insert_items(&self, items: &[Item]) -> DataResult<()>;
    async fn modify_user(&self, user_id: &str, patch: UserPatch) -> DataResult<()>;
    async fn modify_item(&self, item_id: &str, patch: ItemPatch) -> DataResult<()>;
    async fn get_user(&self, user_id: &str) -> DataResult<User>;
    async fn get_item(&self, item_id: &str) -> DataResult<Item>;
    async fn delete_user(&self, user_id: &str) -> DataResult<()>;
    async fn delete_item(&self, item_id: &str) -> DataResult<()>;

    /// Page through users in ascending id order. `cursor` is the last id of
    /// the previous page; the returned cursor is empty on the final page.
    async fn list_users(&self, cursor: &str, n: usize) -> DataResult<(Vec<User>, String)>;
    async fn list_items(&self, cursor: &str, n: usize) -> DataResult<(Vec<Item>, String)>;

    /// Insert feedback rows. `insert_user`/`insert_item` upsert missing
    /// endpoints; `overwrite` selects upsert versus insert-if-absent for
    /// existing `(type, user, item)` rows. Returns the number of rows taken.
    async fn batch_insert_feedback(
        &self,
        feedback: &[Feedback],
        insert_user: bool,
        insert_item: bool,
        overwrite: bool,
    ) -> DataResult<usize>;

    /// Feedback of a user, optionally bounded by `timestamp <= before` and
    /// restricted to `types` (empty = all types).
    async fn get_user_feedback(
        &self,
        user_id: &str,
        before: Option<DateTime<Utc>>,
        types: &[String],
    ) -> DataResult<Vec<Feedback>>;

    /// Feedback on an item, restricted to `types` (empty = all types).
    async fn get_item_feedback(&self, item_id: &str, types: &[String]) -> DataResult<Vec<Feedback>>;

    /// Delete a user's feedback, optionally restricted to one item.
    async fn delete_user_feedback(&self, user_id: &str, item_id: Option<&str>) -> DataResult<usize>;

    async fn count_users(&self) -> DataResult<usize>;
    async fn count_items(&self) -> DataResult<usize>;

    /// Drop everything. Test and maintenance use only.
    async fn purge(&self) -> DataResult<()>;

    /// Liveness probe; maps backend failures to `DataError::Unavailable`.
    async fn ping(&self) -> DataResult<()>;
}
