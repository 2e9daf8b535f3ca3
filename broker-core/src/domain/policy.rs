// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Policy aggregate and the pure, side-effect-free parts of condition
//! matching (time windows, roles, IP ranges). The quota axis
//! (`max_requests_per_day`) is intentionally NOT evaluated here — it needs
//! the `RateLimiter`, which lives in the application layer per the engine's
//! "no side effects from within Evaluate" rule (only a peek is allowed, and
//! even that is orchestrated above this module).

use std::collections::HashSet;
use std::net::IpAddr;

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::agent::{Agent, AgentId};
use crate::domain::tool::ToolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyId(pub Uuid);

impl PolicyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for PolicyId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PolicyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("invalid allowed_hours time '{0}', expected HH:MM")]
    InvalidTime(String),
    #[error("unknown IANA timezone '{0}'")]
    InvalidTimezone(String),
    #[error("invalid CIDR '{0}'")]
    InvalidCidr(String),
    #[error("allowed_days entries must be in 0..=6 (0=Mon), got {0}")]
    InvalidDay(u8),
}

/// Minute-of-day window, inclusive of `start`, exclusive of `end`. Wraps past
/// midnight when `end <= start` (undocumented in the source; this is the
/// specification's fixed behavior for that case).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedHours {
    pub start: (u8, u8),
    pub end: (u8, u8),
    pub tz: String,
}

impl AllowedHours {
    pub fn new(start: (u8, u8), end: (u8, u8), tz: impl Into<String>) -> Result<Self, PolicyError> {
        let tz = tz.into();
        tz.parse::<Tz>().map_err(|_| PolicyError::InvalidTimezone(tz.clone()))?;
        Ok(Self { start, end, tz })
    }

    fn minute_of_day(h: u8, m: u8) -> u32 {
        h as u32 * 60 + m as u32
    }

    /// Evaluated against the tool-side instant `now`, converted into the
    /// policy's declared zone. Converting an unambiguous UTC instant into
    /// local wall-clock time is always well-defined — it has exactly one
    /// answer — so DST gaps/overlaps (which only arise when mapping a local
    /// wall-clock time back to an instant) never surface on this path.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let tz: Tz = match self.tz.parse() {
            Ok(tz) => tz,
            Err(_) => return false,
        };
        let local = tz.from_utc_datetime(&now.naive_utc());
        let minute = Self::minute_of_day(local.hour() as u8, local.minute() as u8);
        let start = Self::minute_of_day(self.start.0, self.start.1);
        let end = Self::minute_of_day(self.end.0, self.end.1);

        if end > start {
            minute >= start && minute < end
        } else if end == start {
            // Zero-width window per spec (`end <= start` wraps); a window
            // with equal bounds never contains a point.
            false
        } else {
            minute >= start || minute < end
        }
    }
}

/// Recognized condition keys. Unknown keys in the wire
/// representation are dropped (and logged once per policy load) by the
/// deserialization boundary in infrastructure, not here — this struct is
/// already closed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyConditions {
    #[serde(default)]
    pub max_requests_per_day: Option<u32>,
    #[serde(default)]
    pub allowed_hours: Option<AllowedHours>,
    #[serde(default)]
    pub allowed_days: Option<HashSet<u8>>,
    #[serde(default)]
    pub required_roles: Option<HashSet<String>>,
    #[serde(default)]
    pub any_roles: Option<HashSet<String>>,
    #[serde(default)]
    pub ip_cidrs: Option<Vec<String>>,
}

impl PolicyConditions {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if let Some(days) = &self.allowed_days {
            for &d in days {
                if d > 6 {
                    return Err(PolicyError::InvalidDay(d));
                }
            }
        }
        if let Some(cidrs) = &self.ip_cidrs {
            for c in cidrs {
                c.parse::<IpNetwork>().map_err(|_| PolicyError::InvalidCidr(c.clone()))?;
            }
        }
        Ok(())
    }

    /// Every declared axis must hold; missing keys impose no constraint.
    /// Does not consult `max_requests_per_day` — see module docs.
    pub fn matches(&self, agent: &Agent, ctx: &RequestContext) -> bool {
        if let Some(required) = &self.required_roles {
            if !agent.has_all_roles(required) {
                return false;
            }
        }
        if let Some(any) = &self.any_roles {
            if !any.is_empty() && !agent.has_any_role(any) {
                return false;
            }
        }
        if let Some(hours) = &self.allowed_hours {
            if !hours.contains(ctx.now) {
                return false;
            }
        }
        if let Some(days) = &self.allowed_days {
            let weekday = ctx.now.weekday().num_days_from_monday() as u8;
            if !days.contains(&weekday) {
                return false;
            }
        }
        if let Some(cidrs) = &self.ip_cidrs {
            match ctx.remote_ip {
                Some(ip) => {
                    let in_any = cidrs.iter().any(|c| {
                        c.parse::<IpNetwork>().map(|n| n.contains(ip)).unwrap_or(false)
                    });
                    if !in_any {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitKey {
    Agent,
    Ip,
    AgentTool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyRules {
    #[serde(default)]
    pub require_approval: bool,
    #[serde(default = "default_true")]
    pub log_usage: bool,
    #[serde(default)]
    pub max_credential_lifetime_seconds: Option<u64>,
    #[serde(default)]
    pub rate_limit_key: Option<RateLimitKey>,
}

fn default_true() -> bool {
    true
}

/// Request-time facts needed to evaluate conditions; deliberately excludes
/// anything persistence-derived (that stays in the application layer).
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub now: DateTime<Utc>,
    pub remote_ip: Option<IpAddr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub name: String,
    /// `None` applies to all tools.
    pub tool_id: Option<ToolId>,
    pub created_by: AgentId,
    pub allowed_scopes: HashSet<String>,
    pub conditions: PolicyConditions,
    pub rules: PolicyRules,
    pub priority: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Policy {
    pub fn new(
        name: impl Into<String>,
        tool_id: Option<ToolId>,
        created_by: AgentId,
        allowed_scopes: HashSet<String>,
        conditions: PolicyConditions,
        rules: PolicyRules,
        priority: i32,
        now: DateTime<Utc>,
    ) -> Result<Self, PolicyError> {
        conditions.validate()?;
        Ok(Self {
            id: PolicyId::new(),
            name: name.into(),
            tool_id,
            created_by,
            allowed_scopes,
            conditions,
            rules,
            priority,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn ctx_at(hour: u32, minute: u32) -> RequestContext {
        RequestContext {
            now: Utc.with_ymd_and_hms(2026, 8, 3, hour, minute, 0).unwrap(), // Monday
            remote_ip: None,
        }
    }

    #[test]
    fn allowed_hours_non_wrapping_window() {
        let hours = AllowedHours::new((9, 0), (17, 0), "UTC").unwrap();
        assert!(hours.contains(ctx_at(9, 0).now));
        assert!(hours.contains(ctx_at(16, 59).now));
        assert!(!hours.contains(ctx_at(17, 0).now));
        assert!(!hours.contains(ctx_at(8, 59).now));
    }

    #[test]
    fn allowed_hours_wrapping_window_past_midnight() {
        let hours = AllowedHours::new((22, 0), (6, 0), "UTC").unwrap();
        assert!(hours.contains(ctx_at(23, 0).now));
        assert!(hours.contains(ctx_at(0, 30).now));
        assert!(hours.contains(ctx_at(5, 59).now));
        assert!(!hours.contains(ctx_at(6, 0).now));
        assert!(!hours.contains(ctx_at(21, 59).now));
    }

    #[test]
    fn required_roles_needs_strict_subset() {
        let conditions = PolicyConditions {
            required_roles: Some(HashSet::from(["tool_user".to_string()])),
            ..Default::default()
        };
        let agent = Agent::new("a", "d", HashSet::from(["tool_user".to_string()]), Utc::now());
        assert!(conditions.matches(&agent, &ctx_at(10, 0)));

        let guest = Agent::new("g", "d", HashSet::from(["guest".to_string()]), Utc::now());
        assert!(!conditions.matches(&guest, &ctx_at(10, 0)));
    }

    #[test]
    fn missing_condition_keys_impose_no_constraint() {
        let conditions = PolicyConditions::default();
        let agent = Agent::new("a", "d", HashSet::new(), Utc::now());
        assert!(conditions.matches(&agent, &ctx_at(3, 0)));
    }

    #[test]
    fn ip_cidrs_require_membership_in_at_least_one_range() {
        let conditions = PolicyConditions {
            ip_cidrs: Some(vec!["10.0.0.0/8".to_string()]),
            ..Default::default()
        };
        let agent = Agent::new("a", "d", HashSet::new(), Utc::now());

        let mut ctx = ctx_at(10, 0);
        ctx.remote_ip = Some("10.1.2.3".parse().unwrap());
        assert!(conditions.matches(&agent, &ctx));

        ctx.remote_ip = Some("192.168.1.1".parse().unwrap());
        assert!(!conditions.matches(&agent, &ctx));

        ctx.remote_ip = None;
        assert!(!conditions.matches(&agent, &ctx));
    }

    #[test]
    fn allowed_days_uses_monday_as_zero() {
        let conditions = PolicyConditions {
            allowed_days: Some(HashSet::from([0u8])), // Monday
            ..Default::default()
        };
        let agent = Agent::new("a", "d", HashSet::new(), Utc::now());
        assert!(conditions.matches(&agent, &ctx_at(10, 0))); // 2026-08-03 is a Monday
    }
}
