// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Port for fixed-window rate limiting. `check` is the hot-path
//! atomic increment-and-decide; `peek` is a non-mutating read used by the
//! `PolicyEngine` to evaluate `max_requests_per_day` without side effects.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, identity: &str, limit: u32, window_seconds: u64) -> RateLimitDecision;
    async fn peek(&self, identity: &str, limit: u32, window_seconds: u64) -> bool;
}
