//! Filtering and ranking
//!
//! Candidate lists carry ids only; this module decides the final scores.
//! Preference order in the pipeline: click-through prediction when a valid
//! CTR model is loaded, then collaborative scoring when the ranking model
//! covers the user, then a seeded merge-and-shuffle that interleaves the
//! generator lists without pretending their native scores are comparable.

use std::collections::HashSet;

use quasar_cache::{sort_scored, Scored};
use quasar_data::User;
use rand::rngs::StdRng;
use rand::Rng;

use crate::error::Result;
use crate::models::{CtrModel, RankingModel};
use crate::services::item_cache::ItemCache;

/// Deduplicated union of candidate lists, first occurrence wins.
fn unique_candidates(candidates: &[Vec<String>]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for list in candidates {
        for id in list {
            if seen.insert(id.clone()) {
                unique.push(id.clone());
            }
        }
    }
    unique
}

/// Score candidates with the ranking model, descending.
pub fn rank_by_collaborative(
    model: &dyn RankingModel,
    user: &User,
    candidates: &[Vec<String>],
) -> Result<Vec<Scored>> {
    let mut scored: Vec<Scored> = unique_candidates(candidates)
        .into_iter()
        .map(|id| {
            let score = model.predict(&user.user_id, &id) as f64;
            Scored::new(id, score)
        })
        .collect();
    sort_scored(&mut scored);
    Ok(scored)
}

/// Score candidates with the click-through model, descending. Deterministic
/// under a fixed model and inputs.
pub fn rank_by_click_through_rate(
    model: &dyn CtrModel,
    user: &User,
    candidates: &[Vec<String>],
    items: &ItemCache,
) -> Result<Vec<Scored>> {
    let mut scored: Vec<Scored> = unique_candidates(candidates)
        .into_iter()
        .map(|id| {
            let score = model.predict(&user.user_id, &id, &user.labels, items.labels(&id)) as f64;
            Scored::new(id, score)
        })
        .collect();
    sort_scored(&mut scored);
    Ok(scored)
}

/// Cold path: no usable model. Interleave the lists by random round-robin,
/// dedupe, and assign position scores `exp(-rank)` so the committed sorted
/// set preserves the interleaved order.
pub fn merge_and_shuffle(rng: &mut StdRng, candidates: &[Vec<String>]) -> Vec<Scored> {
    let mut positions = vec![0usize; candidates.len()];
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    loop {
        let open: Vec<usize> = (0..candidates.len())
            .filter(|&i| positions[i] < candidates[i].len())
            .collect();
        if open.is_empty() {
            break;
        }
        let pick = open[rng.gen_range(0..open.len())];
        let id = &candidates[pick][positions[pick]];
        positions[pick] += 1;
        if seen.insert(id.clone()) {
            let score = (-(merged.len() as f64)).exp();
            merged.push(Scored::new(id.clone(), score));
        }
    }
    merged
}
