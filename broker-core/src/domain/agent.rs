// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A non-human caller identity known to the broker.
///
/// `agent_id` is immutable once assigned. Agents are never deleted while
/// referenced by access logs — deactivation is the only destructive state
/// transition, so historical decisions stay attributable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub description: String,
    /// Opaque role strings consumed by policy conditions (`required_roles`,
    /// `any_roles`). The domain does not interpret their meaning.
    pub roles: HashSet<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(name: impl Into<String>, description: impl Into<String>, roles: HashSet<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: AgentId::new(),
            name: name.into(),
            description: description.into(),
            roles,
            is_active: true,
            created_at: now,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_all_roles<'a>(&self, required: impl IntoIterator<Item = &'a String>) -> bool {
        required.into_iter().all(|r| self.roles.contains(r))
    }

    pub fn has_any_role<'a>(&self, any: impl IntoIterator<Item = &'a String>) -> bool {
        let mut any = any.into_iter().peekable();
        if any.peek().is_none() {
            // An empty `any_roles` set is "no constraint", matched elsewhere;
            // here we only report literal intersection.
            return false;
        }
        any.into_iter().any(|r| self.roles.contains(r))
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent_with_roles(roles: &[&str]) -> Agent {
        Agent::new(
            "test-agent",
            "agent for unit tests",
            roles.iter().map(|r| r.to_string()).collect(),
            Utc::now(),
        )
    }

    #[test]
    fn has_all_roles_requires_every_role() {
        let agent = agent_with_roles(&["tool_user", "reader"]);
        let required = vec!["tool_user".to_string(), "reader".to_string()];
        assert!(agent.has_all_roles(&required));

        let missing = vec!["tool_user".to_string(), "admin".to_string()];
        assert!(!agent.has_all_roles(&missing));
    }

    #[test]
    fn has_any_role_requires_non_empty_intersection() {
        let agent = agent_with_roles(&["guest"]);
        let any = vec!["tool_user".to_string(), "guest".to_string()];
        assert!(agent.has_any_role(&any));
        assert!(!agent.has_any_role(&Vec::<String>::new()));
    }

    #[test]
    fn deactivate_flips_status_without_clearing_history_fields() {
        let mut agent = agent_with_roles(&["tool_user"]);
        let id = agent.id;
        agent.deactivate();
        assert!(!agent.is_active);
        assert_eq!(agent.id, id);
    }
}
