// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Concrete `RateLimiter` backends: a bounded in-process fixed-window
//! counter (`dashmap`) and a Redis-backed distributed counter that
//! degrades to the fallback on backend error. Both implement the same
//! `INCR`-against-the-current-window semantics so `peek` reports genuine
//! remaining capacity on either backend.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use tracing::warn;

use crate::domain::rate_limiter::{RateLimitDecision, RateLimiter};

fn window_start(now: DateTime<Utc>, window_seconds: u64) -> i64 {
    let now_secs = now.timestamp();
    now_secs - now_secs.rem_euclid(window_seconds as i64)
}

struct CounterCell {
    window_start: i64,
    count: u64,
    last_touch: i64,
}

/// Bounded in-process fallback: a fixed-window counter per distinct
/// `(identity, window_seconds)` key, capped by eviction of the
/// least-recently-touched entries so a hot-key flood cannot grow memory
/// unbounded.
pub struct LocalRateLimiter {
    cells: DashMap<String, CounterCell>,
    max_cells: usize,
}

impl LocalRateLimiter {
    pub fn new(max_cells: usize) -> Self {
        Self { cells: DashMap::new(), max_cells }
    }

    fn evict_if_needed(&self) {
        if self.cells.len() > self.max_cells {
            if let Some(entry) = self.cells.iter().min_by_key(|e| e.value().last_touch) {
                let key = entry.key().clone();
                drop(entry);
                self.cells.remove(&key);
            }
        }
    }

    fn key(identity: &str, window_seconds: u64) -> String {
        format!("{identity}:{window_seconds}")
    }
}

#[async_trait]
impl RateLimiter for LocalRateLimiter {
    async fn check(&self, identity: &str, limit: u32, window_seconds: u64) -> RateLimitDecision {
        let now = Utc::now();
        let window = window_start(now, window_seconds);
        let key = Self::key(identity, window_seconds);

        let count = {
            let mut cell = self
                .cells
                .entry(key)
                .or_insert_with(|| CounterCell { window_start: window, count: 0, last_touch: now.timestamp() });
            if cell.window_start != window {
                cell.window_start = window;
                cell.count = 0;
            }
            cell.count += 1;
            cell.last_touch = now.timestamp();
            cell.count
        };
        self.evict_if_needed();

        let allowed = count <= limit as u64;
        RateLimitDecision {
            allowed,
            remaining: (limit as u64).saturating_sub(count) as u32,
            reset_at: now + chrono::Duration::seconds(window_seconds as i64 - (now.timestamp() - window)),
        }
    }

    async fn peek(&self, identity: &str, limit: u32, window_seconds: u64) -> bool {
        let now = Utc::now();
        let window = window_start(now, window_seconds);
        let key = Self::key(identity, window_seconds);
        match self.cells.get(&key) {
            Some(cell) if cell.window_start == window => cell.count < limit as u64,
            _ => limit > 0,
        }
    }
}

/// Distributed fixed-window counter over Redis `INCR`+`EXPIRE`, falling back
/// to `LocalRateLimiter` on backend error — the fallback never raises to
/// the caller, it only relaxes guarantees.
pub struct RedisRateLimiter {
    conn: ConnectionManager,
    fallback: Arc<LocalRateLimiter>,
}

impl RedisRateLimiter {
    pub fn new(conn: ConnectionManager, fallback: Arc<LocalRateLimiter>) -> Self {
        Self { conn, fallback }
    }

    async fn incr_and_expire(&self, redis_key: &str, window_seconds: u64) -> redis::RedisResult<u64> {
        let mut conn = self.conn.clone();
        let count: u64 = redis::cmd("INCR").arg(redis_key).query_async(&mut conn).await?;
        if count == 1 {
            let _: () = redis::cmd("EXPIRE")
                .arg(redis_key)
                .arg(window_seconds)
                .query_async(&mut conn)
                .await?;
        }
        Ok(count)
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, identity: &str, limit: u32, window_seconds: u64) -> RateLimitDecision {
        let now = Utc::now();
        let window = window_start(now, window_seconds);
        let redis_key = format!("ratelimit:{identity}:{window}");

        match self.incr_and_expire(&redis_key, window_seconds).await {
            Ok(count) => {
                let allowed = count <= limit as u64;
                RateLimitDecision {
                    allowed,
                    remaining: (limit as u64).saturating_sub(count) as u32,
                    reset_at: now + chrono::Duration::seconds(window_seconds as i64 - (now.timestamp() - window)),
                }
            }
            Err(err) => {
                warn!(error = %err, "redis rate limiter unavailable, falling back to local limiter");
                self.fallback.check(identity, limit, window_seconds).await
            }
        }
    }

    async fn peek(&self, identity: &str, limit: u32, window_seconds: u64) -> bool {
        let now = Utc::now();
        let window = window_start(now, window_seconds);
        let redis_key = format!("ratelimit:{identity}:{window}");
        let mut conn = self.conn.clone();
        match redis::cmd("GET").arg(&redis_key).query_async::<Option<u64>>(&mut conn).await {
            Ok(count) => count.unwrap_or(0) < limit as u64,
            Err(err) => {
                warn!(error = %err, "redis rate limiter unavailable during peek, falling back to local limiter");
                self.fallback.peek(identity, limit, window_seconds).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_limiter_denies_after_limit_reached() {
        let limiter = LocalRateLimiter::new(1024);
        let allowed: Vec<bool> = futures::future::join_all((0..3).map(|_| limiter.check("agent-1", 2, 60)))
            .await
            .into_iter()
            .map(|d| d.allowed)
            .collect();

        assert_eq!(allowed.iter().filter(|a| **a).count(), 2);
        assert_eq!(allowed.iter().filter(|a| !**a).count(), 1);
    }

    #[tokio::test]
    async fn local_limiter_evicts_least_recently_touched_cell() {
        let limiter = LocalRateLimiter::new(1);
        limiter.check("agent-1", 10, 60).await;
        limiter.check("agent-2", 10, 60).await;
        assert_eq!(limiter.cells.len(), 1);
    }
}
