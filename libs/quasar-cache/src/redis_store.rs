//! Redis cache backend
//!
//! Production implementation of [`CacheStore`] over a shared
//! `ConnectionManager`. Sorted reads are re-sorted client-side so the
//! contract's tie-break (ascending id) holds regardless of Redis' own
//! reverse-lexicographic tie order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::metrics::CacheMetrics;
use crate::{sort_scored, CacheStore, Scored};

pub struct RedisCache {
    conn: ConnectionManager,
    metrics: CacheMetrics,
}

impl RedisCache {
    /// Connect to a Redis instance, e.g. `redis://localhost:6379`.
    pub async fn open(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::Unavailable(format!("invalid redis url: {}", e)))?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            metrics: CacheMetrics::new(),
        })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn set_string(&self, key: &str, value: &str) -> CacheResult<()> {
        let mut conn = self.conn();
        conn.set::<_, _, ()>(key, value).await?;
        self.metrics.record_write(key);
        Ok(())
    }

    async fn get_string(&self, key: &str) -> CacheResult<String> {
        let mut conn = self.conn();
        let value: Option<String> = conn.get(key).await?;
        match value {
            Some(v) => {
                self.metrics.record_hit(key);
                Ok(v)
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
        let mut conn = self.conn();
        let next: i64 = conn.incr(key, 1).await?;
        Ok(next)
    }

    async fn add_sorted(&self, key: &str, scored: &[Scored]) -> CacheResult<()> {
        if scored.is_empty() {
            return Ok(());
        }
        let members: Vec<(f64, &str)> = scored.iter().map(|s| (s.score, s.id.as_str())).collect();
        let mut conn = self.conn();
        conn.zadd_multiple::<_, _, _, ()>(key, &members).await?;
        self.metrics.record_write(key);
        Ok(())
    }

    async fn set_sorted(&self, key: &str, scored: &[Scored]) -> CacheResult<()> {
        // DEL + ZADD in one MULTI block so readers see old or new, not both.
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.del(key);
        for s in scored {
            pipe.zadd(key, s.id.as_str(), s.score);
        }
        let mut conn = self.conn();
        pipe.query_async::<_, ()>(&mut conn).await?;
        self.metrics.record_write(key);
        Ok(())
    }

    async fn get_sorted(&self, key: &str, begin: isize, end: isize) -> CacheResult<Vec<Scored>> {
        let mut conn = self.conn();
        let members: Vec<(String, f64)> = conn.zrevrange_withscores(key, 0, -1).await?;
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
        let mut conn = self.conn();
        conn.zrem::<_, _, ()>(key, id).await?;
        Ok(())
    }

    async fn trim_sorted(&self, key: &str, n: usize) -> CacheResult<()> {
        let mut conn = self.conn();
        // Remove everything below the top-n ranks.
        conn.zremrangebyrank::<_, ()>(key, 0, -(n as isize) - 1).await?;
        Ok(())
    }

    async fn add_set(&self, key: &str, members: &[String]) -> CacheResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn();
        conn.sadd::<_, _, ()>(key, members).await?;
        Ok(())
    }

    async fn get_set(&self, key: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.conn();
        let mut members: Vec<String> = conn.smembers(key).await?;
        members.sort();
        Ok(members)
    }

    async fn rem_set(&self, key: &str, member: &str) -> CacheResult<()> {
        let mut conn = self.conn();
        conn.srem::<_, _, ()>(key, member).await?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<bool> {
        let mut conn = self.conn();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn purge(&self) -> CacheResult<()> {
        let mut conn = self.conn();
        redis::cmd("FLUSHDB").query_async::<_, ()>(&mut conn).await?;
        debug!("cache purged");
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.conn();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await?;
        Ok(())
    }
}
