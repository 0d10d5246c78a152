//! In-memory reference store
//!
//! Dashmap-backed implementation of [`DataStore`] for tests and single-node
//! deployments. Feedback rows are keyed by the `(type, user, item)` triple.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::error::{DataError, DataResult};
use crate::{DataStore, Feedback, FeedbackKey, Item, ItemPatch, User, UserPatch};

#[derive(Default)]
pub struct MemoryData {
    users: DashMap<String, User>,
    items: DashMap<String, Item>,
    feedback: DashMap<FeedbackKey, Feedback>,
}

impl MemoryData {
    pub fn new() -> Self {
        Self::default()
    }
}

fn page<T: Clone>(
    mut rows: Vec<(String, T)>,
    cursor: &str,
    n: usize,
) -> (Vec<T>, String) {
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    let rows: Vec<(String, T)> = rows
        .into_iter()
        .filter(|(id, _)| cursor.is_empty() || id.as_str() > cursor)
        .collect();
    let has_more = rows.len() > n;
    let taken: Vec<(String, T)> = rows.into_iter().take(n).collect();
    let next = if has_more {
        taken.last().map(|(id, _)| id.clone()).unwrap_or_default()
    } else {
        String::new()
    };
    (taken.into_iter().map(|(_, row)| row).collect(), next)
}

#[async_trait]
impl DataStore for MemoryData {
    async fn batch_insert_users(&self, users: &[User]) -> DataResult<()> {
        for user in users {
            self.users.insert(user.user_id.clone(), user.clone());
        }
        Ok(())
    }

    async fn batch_insert_items(&self, items: &[Item]) -> DataResult<()> {
        for item in items {
            self.items.insert(item.item_id.clone(), item.clone());
        }
        Ok(())
    }

    async fn modify_user(&self, user_id: &str, patch: UserPatch) -> DataResult<()> {
        let mut user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| DataError::NotFound(user_id.to_string()))?;
        if let Some(labels) = patch.labels {
            user.labels = labels;
        }
        if let Some(comment) = patch.comment {
            user.comment = comment;
        }
        Ok(())
    }

    async fn modify_item(&self, item_id: &str, patch: ItemPatch) -> DataResult<()> {
        let mut item = self
            .items
            .get_mut(item_id)
            .ok_or_else(|| DataError::NotFound(item_id.to_string()))?;
        if let Some(is_hidden) = patch.is_hidden {
            item.is_hidden = is_hidden;
        }
        if let Some(categories) = patch.categories {
            item.categories = categories;
        }
        if let Some(timestamp) = patch.timestamp {
            item.timestamp = timestamp;
        }
        if let Some(labels) = patch.labels {
            item.labels = labels;
        }
        if let Some(comment) = patch.comment {
            item.comment = comment;
        }
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> DataResult<User> {
        self.users
            .get(user_id)
            .map(|u| u.clone())
            .ok_or_else(|| DataError::NotFound(user_id.to_string()))
    }

    async fn get_item(&self, item_id: &str) -> DataResult<Item> {
        self.items
            .get(item_id)
            .map(|i| i.clone())
            .ok_or_else(|| DataError::NotFound(item_id.to_string()))
    }

    async fn delete_user(&self, user_id: &str) -> DataResult<()> {
        self.users
            .remove(user_id)
            .ok_or_else(|| DataError::NotFound(user_id.to_string()))?;
        self.feedback.retain(|key, _| key.user_id != user_id);
        Ok(())
    }

    async fn delete_item(&self, item_id: &str) -> DataResult<()> {
        self.items
            .remove(item_id)
            .ok_or_else(|| DataError::NotFound(item_id.to_string()))?;
        self.feedback.retain(|key, _| key.item_id != item_id);
        Ok(())
    }

    async fn list_users(&self, cursor: &str, n: usize) -> DataResult<(Vec<User>, String)> {
        let rows: Vec<(String, User)> = self
            .users
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        Ok(page(rows, cursor, n))
    }

    async fn list_items(&self, cursor: &str, n: usize) -> DataResult<(Vec<Item>, String)> {
        let rows: Vec<(String, Item)> = self
            .items
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        Ok(page(rows, cursor, n))
    }

    async fn batch_insert_feedback(
        &self,
        feedback: &[Feedback],
        insert_user: bool,
        insert_item: bool,
        overwrite: bool,
    ) -> DataResult<usize> {
        let mut affected = 0;
        for row in feedback {
            if insert_user && !self.users.contains_key(&row.key.user_id) {
                self.users
                    .insert(row.key.user_id.clone(), User::new(row.key.user_id.clone()));
            }
            if insert_item && !self.items.contains_key(&row.key.item_id) {
                self.items
                    .insert(row.key.item_id.clone(), Item::new(row.key.item_id.clone()));
            }
            if overwrite {
                self.feedback.insert(row.key.clone(), row.clone());
                affected += 1;
            } else if !self.feedback.contains_key(&row.key) {
                self.feedback.insert(row.key.clone(), row.clone());
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn get_user_feedback(
        &self,
        user_id: &str,
        before: Option<DateTime<Utc>>,
        types: &[String],
    ) -> DataResult<Vec<Feedback>> {
        let mut rows: Vec<Feedback> = self
            .feedback
            .iter()
            .filter(|e| e.key().user_id == user_id)
            .filter(|e| before.map_or(true, |bound| e.value().timestamp <= bound))
            .filter(|e| types.is_empty() || types.contains(&e.key().feedback_type))
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.key.item_id.cmp(&b.key.item_id)));
        Ok(rows)
    }

    async fn get_item_feedback(&self, item_id: &str, types: &[String]) -> DataResult<Vec<Feedback>> {
        let mut rows: Vec<Feedback> = self
            .feedback
            .iter()
            .filter(|e| e.key().item_id == item_id)
            .filter(|e| types.is_empty() || types.contains(&e.key().feedback_type))
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by(|a, b| a.key.user_id.cmp(&b.key.user_id));
        Ok(rows)
    }

    async fn delete_user_feedback(&self, user_id: &str, item_id: Option<&str>) -> DataResult<usize> {
        let before = self.feedback.len();
        self.feedback.retain(|key, _| {
            !(key.user_id == user_id && item_id.map_or(true, |item| key.item_id == item))
        });
        Ok(before - self.feedback.len())
    }

    async fn count_users(&self) -> DataResult<usize> {
        Ok(self.users.len())
    }

    async fn count_items(&self) -> DataResult<usize> {
        Ok(self.items.len())
    }

    async fn purge(&self) -> DataResult<()> {
        self.users.clear();
        self.items.clear();
        self.feedback.clear();
        Ok(())
    }

    async fn ping(&self) -> DataResult<()> {
        Ok(())
    }
}
