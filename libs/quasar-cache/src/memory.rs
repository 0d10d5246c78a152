//! In-memory cache backend
//!
//! Dashmap-backed implementation of [`CacheStore`] used by tests and
//! single-node deployments. Per-key atomicity comes from the dashmap entry
//! locks; `set_sorted` replaces the whole value under one entry lock, which
//! gives the observable-atomic replace the contract requires.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::error::{CacheError, CacheResult};
use crate::metrics::CacheMetrics;
use crate::{sort_scored, CacheStore, Scored};

#[derive(Default)]
pub struct MemoryCache {
    strings: DashMap<String, String>,
    sorted: DashMap<String, HashMap<String, f64>>,
    sets: DashMap<String, HashSet<String>>,
    guards: DashMap<String, (String, Instant)>,
    metrics: CacheMetrics,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn set_string(&self, key: &str, value: &str) -> CacheResult<()> {
        self.strings.insert(key.to_string(), value.to_string());
        self.metrics.record_write(key);
        Ok(())
    }

    async fn get_string(&self, key: &str) -> CacheResult<String> {
        match self.strings.get(key) {
            Some(value) => {
                self.metrics.record_hit(key);
                Ok(value.clone())
            }
            None => {
                self.metrics.record_miss(key);
                Err(CacheError::NotFound(key.to_string()))
            }
        }
    }

    async fn set_time(&self, key: &str, value: DateTime<Utc>) -> CacheResult<()> {
        self.set_string(key, &value.to_rfc3339()).await
    }

    async fn get_time(&self, key: &str) -> CacheResult<DateTime<Utc>> {
        let raw = self.get_string(key).await?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| CacheError::InvalidData(format!("{}: {}", key, e)))
    }

    async fn set_int(&self, key: &str, value: i64) -> CacheResult<()> {
        self.set_string(key, &value.to_string()).await
    }

    async fn get_int(&self, key: &str) -> CacheResult<i64> {
        let raw = self.get_string(key).await?;
        raw.parse()
            .map_err(|e| CacheError::InvalidData(format!("{}: {}", key, e)))
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        let mut entry = self.strings.entry(key.to_string()).or_insert_with(|| "0".to_string());
        let next = entry
            .parse::<i64>()
            .map_err(|e| CacheError::InvalidData(format!("{}: {}", key, e)))?
            + 1;
        *entry = next.to_string();
        Ok(next)
    }

    async fn add_sorted(&self, key: &str, scored: &[Scored]) -> CacheResult<()> {
        if scored.is_empty() {
            return Ok(());
        }
        let mut entry = self.sorted.entry(key.to_string()).or_default();
        for s in scored {
            entry.insert(s.id.clone(), s.score);
        }
        self.metrics.record_write(key);
        Ok(())
    }

    async fn set_sorted(&self, key: &str, scored: &[Scored]) -> CacheResult<()> {
        let members: HashMap<String, f64> =
            scored.iter().map(|s| (s.id.clone(), s.score)).collect();
        self.sorted.insert(key.to_string(), members);
        self.metrics.record_write(key);
        Ok(())
    }

    async fn get_sorted(&self, key: &str, begin: isize, end: isize) -> CacheResult<Vec<Scored>> {
        let members = match self.sorted.get(key) {
            Some(entry) => entry.clone(),
            None => return Ok(Vec::new()),
        };
        let mut scored: Vec<Scored> = members
            .into_iter()
            .map(|(id, score)| Scored { id, score })
            .collect();
        sort_scored(&mut scored);

        let len = scored.len() as isize;
        let end = if end < 0 || end >= len { len - 1 } else { end };
        if begin > end || begin >= len {
            return Ok(Vec::new());
        }
        Ok(scored[begin as usize..=end as usize].to_vec())
    }

    async fn rem_sorted(&self, key: &str, id: &str) -> CacheResult<()> {
        if let Some(mut entry) = self.sorted.get_mut(key) {
            entry.remove(id);
        }
        Ok(())
    }

    async fn trim_sorted(&self, key: &str, n: usize) -> CacheResult<()> {
        if let Some(mut entry) = self.sorted.get_mut(key) {
            if entry.len() > n {
                let mut scored: Vec<Scored> = entry
                    .iter()
                    .map(|(id, score)| Scored::new(id.clone(), *score))
                    .collect();
                sort_scored(&mut scored);
                for dropped in &scored[n..] {
                    entry.remove(&dropped.id);
                }
            }
        }
        Ok(())
    }

    async fn add_set(&self, key: &str, members: &[String]) -> CacheResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut entry = self.sets.entry(key.to_string()).or_default();
        for m in members {
            entry.insert(m.clone());
        }
        Ok(())
    }

    async fn get_set(&self, key: &str) -> CacheResult<Vec<String>> {
        let mut members: Vec<String> = match self.sets.get(key) {
            Some(entry) => entry.iter().cloned().collect(),
            None => Vec::new(),
        };
        members.sort();
        Ok(members)
    }

    async fn rem_set(&self, key: &str, member: &str) -> CacheResult<()> {
        if let Some(mut entry) = self.sets.get_mut(key) {
            entry.remove(member);
        }
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<bool> {
        let now = Instant::now();
        let deadline = now + Duration::from_secs(ttl_secs);
        match self.guards.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut held) => {
                if held.get().1 <= now {
                    held.insert((value.to_string(), deadline));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert((value.to_string(), deadline));
                Ok(true)
            }
        }
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        self.strings.remove(key);
        self.sorted.remove(key);
        self.sets.remove(key);
        self.guards.remove(key);
        Ok(())
    }

    async fn purge(&self) -> CacheResult<()> {
        self.strings.clear();
        self.sorted.clear();
        self.sets.clear();
        self.guards.clear();
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }
}
