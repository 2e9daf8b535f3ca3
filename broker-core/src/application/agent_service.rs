// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Thin CRUD service over `AgentRepository` — the "well-understood
//! plumbing" the core explicitly does not spend its complexity budget on.

use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::agent::{Agent, AgentId};
use crate::domain::clock::Clock;
use crate::domain::error::BrokerError;
use crate::domain::repository::AgentRepository;

pub struct AgentService {
    agents: Arc<dyn AgentRepository>,
    clock: Arc<dyn Clock>,
}

impl AgentService {
    pub fn new(agents: Arc<dyn AgentRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { agents, clock }
    }

    pub async fn create(&self, name: String, description: String, roles: HashSet<String>) -> Result<Agent, BrokerError> {
        if name.trim().is_empty() {
            return Err(BrokerError::InvalidInput("agent name must not be empty".to_string()));
        }
        if self.agents.find_by_name(&name).await?.is_some() {
            return Err(BrokerError::Conflict(format!("Agent with name '{name}' already exists")));
        }
        let agent = Agent::new(name, description, roles, self.clock.now());
        self.agents.save(&agent).await?;
        Ok(agent)
    }

    pub async fn get(&self, id: AgentId) -> Result<Agent, BrokerError> {
        self.agents.find_by_id(id).await?.ok_or_else(|| BrokerError::NotFound(format!("agent {id} not found")))
    }

    pub async fn list(&self) -> Result<Vec<Agent>, BrokerError> {
        Ok(self.agents.list_all().await?)
    }

    pub async fn deactivate(&self, id: AgentId) -> Result<(), BrokerError> {
        let mut agent = self.get(id).await?;
        agent.deactivate();
        self.agents.save(&agent).await?;
        Ok(())
    }
}
