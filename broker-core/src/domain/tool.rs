// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::agent::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolId(pub Uuid);

impl ToolId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ToolId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ToolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered third-party capability the broker can mint credentials for.
///
/// `allowed_scopes` is the universe of scopes the tool advertises — any
/// policy scope outside this set is ignored when computing grants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub id: ToolId,
    pub name: String,
    pub description: String,
    pub version: String,
    pub owner_id: AgentId,
    pub allowed_scopes: HashSet<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        version: impl Into<String>,
        owner_id: AgentId,
        allowed_scopes: HashSet<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ToolId::new(),
            name: name.into(),
            description: description.into(),
            version: version.into(),
            owner_id,
            allowed_scopes,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Case-folded name used for the uniqueness constraint on active tools.
    pub fn name_key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_key_is_case_folded() {
        let tool = Tool::new(
            "GitHub-API",
            "GitHub REST API",
            "1.0.0",
            AgentId::new(),
            HashSet::from(["read".to_string()]),
            Utc::now(),
        );
        assert_eq!(tool.name_key(), "github-api");
    }
}
