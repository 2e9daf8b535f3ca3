// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::agent::AgentId;
use crate::domain::policy::PolicyId;
use crate::domain::tool::ToolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessRequestId(pub Uuid);

impl AccessRequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for AccessRequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AccessRequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessRequestStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

/// Pending human-in-the-loop decision created when a matching policy sets
/// `rules.require_approval`. Unresolved requests expire after 7 days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub id: AccessRequestId,
    pub agent_id: AgentId,
    pub tool_id: ToolId,
    pub requested_scopes: HashSet<String>,
    pub justification: Option<String>,
    pub status: AccessRequestStatus,
    pub matched_policy_id: Option<PolicyId>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolver_id: Option<AgentId>,
}

pub const PENDING_REQUEST_TTL_DAYS: i64 = 7;

impl AccessRequest {
    pub fn new_pending(
        agent_id: AgentId,
        tool_id: ToolId,
        requested_scopes: HashSet<String>,
        justification: Option<String>,
        matched_policy_id: Option<PolicyId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AccessRequestId::new(),
            agent_id,
            tool_id,
            requested_scopes,
            justification,
            status: AccessRequestStatus::Pending,
            matched_policy_id,
            created_at: now,
            resolved_at: None,
            resolver_id: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == AccessRequestStatus::Pending
            && now - self.created_at >= Duration::days(PENDING_REQUEST_TTL_DAYS)
    }

    pub fn resolve(&mut self, status: AccessRequestStatus, resolver_id: AgentId, now: DateTime<Utc>) {
        debug_assert!(matches!(
            status,
            AccessRequestStatus::Approved | AccessRequestStatus::Rejected
        ));
        self.status = status;
        self.resolver_id = Some(resolver_id);
        self.resolved_at = Some(now);
    }

    pub fn expire(&mut self, now: DateTime<Utc>) {
        self.status = AccessRequestStatus::Expired;
        self.resolved_at = Some(now);
    }
}
