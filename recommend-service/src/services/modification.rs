//! Cache modification transaction
//!
//! Builder staging visibility edits so downstream filters observe one
//! consistent snapshot. Commit order is fixed: cache markers first, then the
//! in-process hidden manager. A crash between the two leaves the manager
//! lagging behind a safe cache state; the periodic reconciler repairs it.

use std::sync::Arc;

use chrono::Utc;
use quasar_cache::{CacheKey, CacheStore, Scored, HIDDEN_ITEMS, ITEM_CATEGORIES};
use tracing::debug;

use crate::error::Result;
use crate::services::hidden::HiddenItemsManager;

enum Edit {
    HideItem(String),
    UnhideItem(String),
    HideCategory(String, String),
    UnhideCategory(String, String),
    AddCategory(String, String),
    RemoveCategory(String, String),
}

pub struct CacheModification {
    cache: Arc<dyn CacheStore>,
    hidden: Arc<HiddenItemsManager>,
    edits: Vec<Edit>,
}

impl CacheModification {
    pub fn new(cache: Arc<dyn CacheStore>, hidden: Arc<HiddenItemsManager>) -> Self {
        Self {
            cache,
            hidden,
            edits: Vec::new(),
        }
    }

    /// Hide an item from every ranked view.
    pub fn hide_item(mut self, item_id: impl Into<String>) -> Self {
        self.edits.push(Edit::HideItem(item_id.into()));
        self
    }

    pub fn unhide_item(mut self, item_id: impl Into<String>) -> Self {
        self.edits.push(Edit::UnhideItem(item_id.into()));
        self
    }

    /// Hide an item from one category view only.
    pub fn hide_category(mut self, item_id: impl Into<String>, category: impl Into<String>) -> Self {
        self.edits
            .push(Edit::HideCategory(item_id.into(), category.into()));
        self
    }

    pub fn unhide_category(
        mut self,
        item_id: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        self.edits
            .push(Edit::UnhideCategory(item_id.into(), category.into()));
        self
    }

    /// Attach an item to a category: registers the category and clears any
    /// per-category hide marker.
    pub fn add_category(mut self, item_id: impl Into<String>, category: impl Into<String>) -> Self {
        self.edits
            .push(Edit::AddCategory(item_id.into(), category.into()));
        self
    }

    /// Detach an item from a category; the item stops surfacing in that
    /// category's views on the next read.
    pub fn remove_category(
        mut self,
        item_id: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        self.edits
            .push(Edit::RemoveCategory(item_id.into(), category.into()));
        self
    }

    /// Apply all staged edits: cache first, then the in-process manager.
    pub async fn exec(self) -> Result<()> {
        let now = Utc::now().timestamp() as f64;

        for edit in &self.edits {
            match edit {
                Edit::HideItem(item) => {
                    self.cache
                        .add_sorted(HIDDEN_ITEMS, &[Scored::new(item.clone(), now)])
                        .await?;
                }
                Edit::UnhideItem(item) => {
                    self.cache.rem_sorted(HIDDEN_ITEMS, item).await?;
                }
                Edit::HideCategory(item, category) | Edit::RemoveCategory(item, category) => {
                    self.cache
                        .add_sorted(
                            &CacheKey::table(HIDDEN_ITEMS, category),
                            &[Scored::new(item.clone(), now)],
                        )
                        .await?;
                }
                Edit::UnhideCategory(item, category) => {
                    self.cache
                        .rem_sorted(&CacheKey::table(HIDDEN_ITEMS, category), item)
                        .await?;
                }
                Edit::AddCategory(item, category) => {
                    self.cache
                        .add_set(ITEM_CATEGORIES, &[category.clone()])
                        .await?;
                    self.cache
                        .rem_sorted(&CacheKey::table(HIDDEN_ITEMS, category), item)
                        .await?;
                }
            }
        }

        for edit in &self.edits {
            match edit {
                Edit::HideItem(item) => self.hidden.hide(item),
                Edit::UnhideItem(item) => self.hidden.unhide(item),
                Edit::HideCategory(item, category) | Edit::RemoveCategory(item, category) => {
                    self.hidden.hide_in(item, category)
                }
                Edit::UnhideCategory(item, category) | Edit::AddCategory(item, category) => {
                    self.hidden.unhide_in(item, category)
                }
            }
        }

        debug!(edits = self.edits.len(), "cache modification committed");
        Ok(())
    }
}
