// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Thin CRUD service over `ToolRepository`, enforcing the case-insensitive
//! unique-name invariant on create (`CreateTool` fails `AlreadyExists`).

use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::agent::AgentId;
use crate::domain::clock::Clock;
use crate::domain::error::BrokerError;
use crate::domain::repository::ToolRepository;
use crate::domain::tool::{Tool, ToolId};

pub struct ToolService {
    tools: Arc<dyn ToolRepository>,
    clock: Arc<dyn Clock>,
}

impl ToolService {
    pub fn new(tools: Arc<dyn ToolRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { tools, clock }
    }

    pub async fn create(
        &self,
        name: String,
        description: String,
        version: String,
        owner_id: AgentId,
        allowed_scopes: HashSet<String>,
    ) -> Result<Tool, BrokerError> {
        let tool = Tool::new(name, description, version, owner_id, allowed_scopes, self.clock.now());
        if self.tools.find_by_name_key(&tool.name_key()).await?.is_some() {
            return Err(BrokerError::Conflict(format!("Tool with name '{}' already exists", tool.name)));
        }
        self.tools.save(&tool).await?;
        Ok(tool)
    }

    pub async fn get(&self, id: ToolId) -> Result<Tool, BrokerError> {
        self.tools.find_by_id(id).await?.ok_or_else(|| BrokerError::NotFound(format!("tool {id} not found")))
    }

    pub async fn list(&self) -> Result<Vec<Tool>, BrokerError> {
        Ok(self.tools.list_all().await?)
    }

    pub async fn update_scopes(&self, id: ToolId, allowed_scopes: HashSet<String>) -> Result<Tool, BrokerError> {
        let mut tool = self.get(id).await?;
        tool.allowed_scopes = allowed_scopes;
        tool.updated_at = self.clock.now();
        self.tools.save(&tool).await?;
        Ok(tool)
    }

    pub async fn deactivate(&self, id: ToolId) -> Result<(), BrokerError> {
        let mut tool = self.get(id).await?;
        tool.deactivate(self.clock.now());
        self.tools.save(&tool).await?;
        Ok(())
    }
}
