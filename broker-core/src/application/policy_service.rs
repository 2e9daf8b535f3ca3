// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Thin CRUD service over `PolicyRepository`.

use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::agent::AgentId;
use crate::domain::clock::Clock;
use crate::domain::error::BrokerError;
use crate::domain::policy::{Policy, PolicyConditions, PolicyId, PolicyRules};
use crate::domain::repository::PolicyRepository;
use crate::domain::tool::ToolId;

pub struct PolicyService {
    policies: Arc<dyn PolicyRepository>,
    clock: Arc<dyn Clock>,
}

impl PolicyService {
    pub fn new(policies: Arc<dyn PolicyRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { policies, clock }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        name: String,
        tool_id: Option<ToolId>,
        created_by: AgentId,
        allowed_scopes: HashSet<String>,
        conditions: PolicyConditions,
        rules: PolicyRules,
        priority: i32,
    ) -> Result<Policy, BrokerError> {
        let policy = Policy::new(name, tool_id, created_by, allowed_scopes, conditions, rules, priority, self.clock.now())
            .map_err(|err| BrokerError::InvalidInput(err.to_string()))?;
        self.policies.save(&policy).await?;
        Ok(policy)
    }

    pub async fn get(&self, id: PolicyId) -> Result<Policy, BrokerError> {
        self.policies.find_by_id(id).await?.ok_or_else(|| BrokerError::NotFound(format!("policy {id} not found")))
    }

    pub async fn list(&self) -> Result<Vec<Policy>, BrokerError> {
        Ok(self.policies.list_all().await?)
    }

    pub async fn deactivate(&self, id: PolicyId) -> Result<(), BrokerError> {
        let mut policy = self.get(id).await?;
        policy.deactivate(self.clock.now());
        self.policies.save(&policy).await?;
        Ok(())
    }
}
