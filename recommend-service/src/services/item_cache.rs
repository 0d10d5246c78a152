//! Per-batch item snapshot
//!
//! One worker pass loads the item table once and answers hidden/category
//! questions from memory instead of hitting storage per candidate. Items
//! missing from the snapshot are treated as deleted, which means hidden.

use std::collections::HashMap;

use quasar_data::{DataStore, Item};

use crate::error::Result;

const LIST_PAGE_SIZE: usize = 1024;

pub struct ItemCache {
    items: HashMap<String, Item>,
}

impl ItemCache {
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
        }
    }

    /// Snapshot every item in the store.
    pub async fn load(data: &dyn DataStore) -> Result<Self> {
        let mut items = HashMap::new();
        let mut cursor = String::new();
        loop {
            let (page, next) = data.list_items(&cursor, LIST_PAGE_SIZE).await?;
            for item in page {
                items.insert(item.item_id.clone(), item);
            }
            if next.is_empty() {
                break;
            }
            cursor = next;
        }
        Ok(Self { items })
    }

    pub fn insert(&mut self, item: Item) {
        self.items.insert(item.item_id.clone(), item);
    }

    pub fn get(&self, item_id: &str) -> Option<&Item> {
        self.items.get(item_id)
    }

    /// Deleted and hidden items are invisible everywhere.
    pub fn is_hidden(&self, item_id: &str) -> bool {
        self.items.get(item_id).map_or(true, |item| item.is_hidden)
    }

    /// Category membership; the empty category matches everything.
    pub fn in_category(&self, item_id: &str, category: &str) -> bool {
        if category.is_empty() {
            return self.items.contains_key(item_id);
        }
        self.items
            .get(item_id)
            .map_or(false, |item| item.categories.iter().any(|c| c == category))
    }

    /// Visible in a ranked view: present, not hidden, carries the category.
    pub fn visible(&self, item_id: &str, category: &str) -> bool {
        !self.is_hidden(item_id) && self.in_category(item_id, category)
    }

    /// Every category carried by any item in the snapshot, sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self
            .items
            .values()
            .flat_map(|item| item.categories.iter().cloned())
            .collect();
        categories.sort();
        categories.dedup();
        categories
    }

    pub fn labels(&self, item_id: &str) -> &[String] {
        self.items
            .get(item_id)
            .map_or(&[] as &[String], |item| &item.labels)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for ItemCache {
    fn default() -> Self {
        Self::new()
    }
}
