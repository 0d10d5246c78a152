//! Collaborative-filtering candidates
//!
//! Brute-force scan over the ranking model's item index, scored by
//! `predict(user, item)`. Empty when the model is absent, invalid, or does
//! not cover the user; the orchestrator falls back to other signals.

use async_trait::async_trait;
use quasar_cache::{remove_scores, sort_scored, Scored};
use quasar_data::User;
use std::sync::Arc;
use tracing::debug;

use super::{CandidateContext, CandidateSource};
use crate::error::Result;
use crate::models::{ModelSlot, RankingModel};

pub struct CollaborativeSource {
    model: Arc<ModelSlot<dyn RankingModel>>,
}

impl CollaborativeSource {
    pub fn new(model: Arc<ModelSlot<dyn RankingModel>>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl CandidateSource for CollaborativeSource {
    fn name(&self) -> &'static str {
        "collaborative"
    }

    async fn generate(
        &self,
        user: &User,
        category: &str,
        ctx: &CandidateContext<'_>,
    ) -> Result<Vec<String>> {
        let model = match self.model.load() {
            Some(model) if !model.invalid() => model,
            _ => return Ok(Vec::new()),
        };
        if !model.user_predictable(&user.user_id) {
            debug!(user_id = %user.user_id, "user not predictable, skipping collaborative");
            return Ok(Vec::new());
        }

        let mut scored: Vec<Scored> = model
            .items()
            .into_iter()
            .filter(|item_id| model.item_predictable(item_id))
            .filter(|item_id| ctx.eligible(item_id, category))
            .map(|item_id| {
                let score = model.predict(&user.user_id, &item_id) as f64;
                Scored::new(item_id, score)
            })
            .collect();
        sort_scored(&mut scored);
        scored.truncate(ctx.cache_size);
        Ok(remove_scores(&scored))
    }
}
