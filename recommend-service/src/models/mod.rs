//! Model capabilities consumed by the pipeline
//!
//! The engine never trains or deserializes models; it consumes two
//! capabilities behind traits. A model reporting `invalid()` is not an
//! error, it means "skip this generator or re-ranker". Loaded models are
//! read-only; a version swap replaces the slot's pointer under a write lock,
//! and a pipeline holds one `Arc` for its whole run so it always sees a
//! consistent model.

use std::sync::{Arc, RwLock};

/// Matrix-factorization ranking capability.
pub trait RankingModel: Send + Sync {
    /// True while the model is absent, un-fitted or being replaced.
    fn invalid(&self) -> bool;
    fn predict(&self, user_id: &str, item_id: &str) -> f32;
    /// Whether the model's index covers this user.
    fn user_predictable(&self, user_id: &str) -> bool;
    /// Whether the model's index covers this item.
    fn item_predictable(&self, item_id: &str) -> bool;
    fn user_factor(&self, user_id: &str) -> Option<Vec<f32>>;
    fn item_factor(&self, item_id: &str) -> Option<Vec<f32>>;
    /// Item ids covered by the model's index, for candidate enumeration.
    fn items(&self) -> Vec<String>;
}

/// Click-through-rate capability (factorization machine or similar).
pub trait CtrModel: Send + Sync {
    fn invalid(&self) -> bool;
    fn predict(
        &self,
        user_id: &str,
        item_id: &str,
        user_labels: &[String],
        item_labels: &[String],
    ) -> f32;
}

/// Process-wide slot holding the current model version.
pub struct ModelSlot<M: ?Sized> {
    inner: RwLock<Option<Arc<M>>>,
}

impl<M: ?Sized> ModelSlot<M> {
    pub fn empty() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    pub fn with(model: Arc<M>) -> Self {
        Self {
            inner: RwLock::new(Some(model)),
        }
    }

    /// Swap in a new model version.
    pub fn swap(&self, model: Arc<M>) {
        *self.inner.write().expect("model slot poisoned") = Some(model);
    }

    pub fn clear(&self) {
        *self.inner.write().expect("model slot poisoned") = None;
    }

    /// Clone out the current version, if any.
    pub fn load(&self) -> Option<Arc<M>> {
        self.inner.read().expect("model slot poisoned").clone()
    }
}

impl<M: ?Sized> Default for ModelSlot<M> {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(f32);

    impl CtrModel for Fixed {
        fn invalid(&self) -> bool {
            false
        }
        fn predict(&self, _: &str, _: &str, _: &[String], _: &[String]) -> f32 {
            self.0
        }
    }

    #[test]
    fn test_slot_swap_and_load() {
        let slot: ModelSlot<dyn CtrModel> = ModelSlot::empty();
        assert!(slot.load().is_none());

        slot.swap(Arc::new(Fixed(0.5)));
        let model = slot.load().unwrap();
        assert_eq!(model.predict("u", "i", &[], &[]), 0.5);

        slot.swap(Arc::new(Fixed(0.9)));
        // the first handle still sees its own version
        assert_eq!(model.predict("u", "i", &[], &[]), 0.5);
        assert_eq!(slot.load().unwrap().predict("u", "i", &[], &[]), 0.9);

        slot.clear();
        assert!(slot.load().is_none());
    }
}
