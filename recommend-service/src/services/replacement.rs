//! Replacement engine
//!
//! Keeps a user's visible list stable across rebuilds. Items the user
//! positively fed back or read re-enter the fresh list with decayed scores
//! instead of vanishing, so fresh signal displaces served entries gradually.
//!
//! Decay is anchored to the fresh list: with `lower` the minimum score of
//! the freshly computed candidates, a history item scoring `s` re-enters at
//! `lower + (s - lower) * decay`. An empty fresh list skips the anchor and
//! keeps raw scores. Positive and read feedback use separate decay factors;
//! feedback of any other type does not re-enter at all.

use std::collections::HashMap;

use quasar_cache::{sort_scored, Scored};

use crate::config::ReplacementConfig;

/// Blend scored history items into the freshly computed list. Per id the
/// higher score wins.
pub fn blend(
    cfg: &ReplacementConfig,
    fresh: Vec<Scored>,
    positive_history: Vec<Scored>,
    read_history: Vec<Scored>,
) -> Vec<Scored> {
    let lower = fresh
        .iter()
        .map(|s| s.score)
        .fold(f64::INFINITY, f64::min);
    let anchored = lower.is_finite();
    let decay = |score: f64, factor: f64| {
        if anchored {
            lower + (score - lower) * factor
        } else {
            score
        }
    };

    let mut merged: HashMap<String, f64> = HashMap::new();
    for entry in fresh {
        merged.insert(entry.id, entry.score);
    }
    for entry in positive_history {
        let decayed = decay(entry.score, cfg.positive_replacement_decay);
        merged
            .entry(entry.id)
            .and_modify(|s| *s = s.max(decayed))
            .or_insert(decayed);
    }
    for entry in read_history {
        let decayed = decay(entry.score, cfg.read_replacement_decay);
        merged
            .entry(entry.id)
            .and_modify(|s| *s = s.max(decayed))
            .or_insert(decayed);
    }

    let mut blended: Vec<Scored> = merged
        .into_iter()
        .map(|(id, score)| Scored { id, score })
        .collect();
    sort_scored(&mut blended);
    blended
}
