//! Merging and the explore layer
//!
//! Two jobs live here. `concat_fallbacks` backs the online read path: the
//! primary list is consumed in order and fallback lists are appended in
//! chain priority, deduplicating already-emitted ids, until the requested
//! window is filled. `explore_recommend` backs the offline pipeline: with the
//! configured probability a position is substituted with the next unemitted
//! popular/latest item. Substituted entries take a score just below the
//! previously emitted one, so the committed sorted set reproduces emission
//! order while primary items keep their own scores.

use std::collections::HashSet;

use quasar_cache::Scored;
use rand::rngs::StdRng;
use rand::Rng;

const EXPLORE_SCORE_STEP: f64 = 1e-5;

/// Explore fractions for one pipeline run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExploreFractions {
    pub popular: f64,
    pub latest: f64,
}

/// Fill `n` slots starting at `offset`: primary first, then each fallback in
/// order, skipping ids already emitted.
pub fn concat_fallbacks(
    primary: Vec<Scored>,
    fallbacks: Vec<Vec<Scored>>,
    n: usize,
    offset: usize,
) -> Vec<Scored> {
    let want = offset + n;
    let mut emitted: HashSet<String> = HashSet::new();
    let mut merged: Vec<Scored> = Vec::new();

    for entry in primary {
        if merged.len() >= want {
            break;
        }
        if emitted.insert(entry.id.clone()) {
            merged.push(entry);
        }
    }
    for fallback in fallbacks {
        if merged.len() >= want {
            break;
        }
        for entry in fallback {
            if merged.len() >= want {
                break;
            }
            if emitted.insert(entry.id.clone()) {
                merged.push(entry);
            }
        }
    }

    if offset >= merged.len() {
        return Vec::new();
    }
    merged.drain(..offset);
    merged
}

/// Probabilistic substitution of explore items into a ranked list.
///
/// The output has the same length as the input. Exploit entries keep their
/// scores and relative order; substitutions consume the explore sources in
/// their own order and never repeat an id already present.
pub fn explore_recommend(
    rng: &mut StdRng,
    exploit: Vec<Scored>,
    popular: &[Scored],
    latest: &[Scored],
    fractions: ExploreFractions,
) -> Vec<Scored> {
    if exploit.is_empty() {
        return exploit;
    }
    let popular_threshold = fractions.popular;
    let latest_threshold = popular_threshold + fractions.latest;

    let mut taken: HashSet<String> = exploit.iter().map(|s| s.id.clone()).collect();
    let mut popular_queue: std::collections::VecDeque<String> = popular
        .iter()
        .filter(|s| !taken.contains(&s.id))
        .map(|s| s.id.clone())
        .collect();
    let mut latest_queue: std::collections::VecDeque<String> = latest
        .iter()
        .filter(|s| !taken.contains(&s.id))
        .map(|s| s.id.clone())
        .collect();

    let slots = exploit.len();
    let mut exploit = exploit.into_iter();
    let mut output: Vec<Scored> = Vec::with_capacity(slots);
    // start just above the head so substitutions sort ahead of what follows
    let mut score = 1.0 + exploit.as_slice().first().map_or(0.0, |s| s.score);

    for _ in 0..slots {
        let dice: f64 = rng.gen();
        let substituted = if dice < popular_threshold {
            next_unseen(&mut popular_queue, &taken)
        } else if dice < latest_threshold {
            next_unseen(&mut latest_queue, &taken)
        } else {
            None
        };
        match substituted {
            Some(id) => {
                score -= EXPLORE_SCORE_STEP;
                taken.insert(id.clone());
                output.push(Scored::new(id, score));
            }
            None => match exploit.next() {
                Some(entry) => {
                    score = entry.score;
                    output.push(entry);
                }
                None => break,
            },
        }
    }
    output
}

fn next_unseen(
    queue: &mut std::collections::VecDeque<String>,
    taken: &HashSet<String>,
) -> Option<String> {
    while let Some(id) = queue.pop_front() {
        if !taken.contains(&id) {
            return Some(id);
        }
    }
    None
}
