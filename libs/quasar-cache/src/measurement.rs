//! Bounded-history time series
//!
//! Measurements are named series stored one sorted set per name, scored by
//! epoch seconds with a JSON member payload. Inserts trim each series to the
//! configured retention, keeping the newest entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CacheResult;
use crate::keys::{CacheKey, MEASUREMENTS};
use crate::{CacheStore, Scored};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Measurement {
    pub fn new(name: impl Into<String>, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            name: name.into(),
            timestamp,
            value,
        }
    }
}

/// Insert measurements, trimming each touched series to `keep` entries.
pub async fn insert_measurements(
    cache: &dyn CacheStore,
    measurements: &[Measurement],
    keep: usize,
) -> CacheResult<()> {
    for m in measurements {
        let key = CacheKey::key(MEASUREMENTS, &m.name);
        let member = Scored::new(serde_json::to_string(m)?, m.timestamp.timestamp() as f64);
        cache.add_sorted(&key, &[member]).await?;
        cache.trim_sorted(&key, keep).await?;
    }
    Ok(())
}

/// Read the newest `n` measurements of a series, newest first.
pub async fn get_measurements(
    cache: &dyn CacheStore,
    name: &str,
    n: usize,
) -> CacheResult<Vec<Measurement>> {
    if n == 0 {
        return Ok(Vec::new());
    }
    let key = CacheKey::key(MEASUREMENTS, name);
    let entries = cache.get_sorted(&key, 0, n as isize - 1).await?;
    let mut measurements = Vec::with_capacity(entries.len());
    for entry in entries {
        measurements.push(serde_json::from_str(&entry.id)?);
    }
    Ok(measurements)
}
