// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! In-memory and PostgreSQL implementations of the domain repository
//! traits. The in-memory variants back local development and tests; the
//! PostgreSQL variants back production deployments.

pub mod postgres_agent;
pub mod postgres_tool;
pub mod postgres_policy;
pub mod postgres_access_request;
pub mod postgres_credential;
pub mod postgres_access_log;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::access_log::AccessLog;
use crate::domain::access_request::{AccessRequest, AccessRequestId, AccessRequestStatus};
use crate::domain::agent::{Agent, AgentId};
use crate::domain::credential::{Credential, CredentialId, TokenFingerprint};
use crate::domain::policy::{Policy, PolicyId};
use crate::domain::repository::{
    AccessLogRepository, AccessRequestRepository, AgentRepository, CredentialRepository, PolicyRepository,
    RepositoryError, ToolRepository,
};
use crate::domain::tool::{Tool, ToolId};

#[derive(Clone, Default)]
pub struct InMemoryAgentRepository {
    agents: Arc<RwLock<HashMap<AgentId, Agent>>>,
}

impl InMemoryAgentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentRepository for InMemoryAgentRepository {
    async fn save(&self, agent: &Agent) -> Result<(), RepositoryError> {
        self.agents.write().unwrap().insert(agent.id, agent.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: AgentId) -> Result<Option<Agent>, RepositoryError> {
        Ok(self.agents.read().unwrap().get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Agent>, RepositoryError> {
        Ok(self.agents.read().unwrap().values().find(|a| a.name == name).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Agent>, RepositoryError> {
        Ok(self.agents.read().unwrap().values().cloned().collect())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryToolRepository {
    tools: Arc<RwLock<HashMap<ToolId, Tool>>>,
}

impl InMemoryToolRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ToolRepository for InMemoryToolRepository {
    async fn save(&self, tool: &Tool) -> Result<(), RepositoryError> {
        self.tools.write().unwrap().insert(tool.id, tool.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ToolId) -> Result<Option<Tool>, RepositoryError> {
        Ok(self.tools.read().unwrap().get(&id).cloned())
    }

    async fn find_by_name_key(&self, name_key: &str) -> Result<Option<Tool>, RepositoryError> {
        Ok(self.tools.read().unwrap().values().find(|t| t.is_active && t.name_key() == name_key).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Tool>, RepositoryError> {
        Ok(self.tools.read().unwrap().values().cloned().collect())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryPolicyRepository {
    policies: Arc<RwLock<HashMap<PolicyId, Policy>>>,
}

impl InMemoryPolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyRepository for InMemoryPolicyRepository {
    async fn save(&self, policy: &Policy) -> Result<(), RepositoryError> {
        self.policies.write().unwrap().insert(policy.id, policy.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: PolicyId) -> Result<Option<Policy>, RepositoryError> {
        Ok(self.policies.read().unwrap().get(&id).cloned())
    }

    async fn list_for_tool(&self, tool_id: ToolId) -> Result<Vec<Policy>, RepositoryError> {
        let mut matching: Vec<Policy> = self
            .policies
            .read()
            .unwrap()
            .values()
            .filter(|p| p.is_active && (p.tool_id == Some(tool_id) || p.tool_id.is_none()))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));
        Ok(matching)
    }

    async fn list_all(&self) -> Result<Vec<Policy>, RepositoryError> {
        Ok(self.policies.read().unwrap().values().cloned().collect())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAccessRequestRepository {
    requests: Arc<RwLock<HashMap<AccessRequestId, AccessRequest>>>,
}

impl InMemoryAccessRequestRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccessRequestRepository for InMemoryAccessRequestRepository {
    async fn save(&self, request: &AccessRequest) -> Result<(), RepositoryError> {
        self.requests.write().unwrap().insert(request.id, request.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: AccessRequestId) -> Result<Option<AccessRequest>, RepositoryError> {
        Ok(self.requests.read().unwrap().get(&id).cloned())
    }

    async fn list_pending(&self) -> Result<Vec<AccessRequest>, RepositoryError> {
        Ok(self
            .requests
            .read()
            .unwrap()
            .values()
            .filter(|r| r.status == AccessRequestStatus::Pending)
            .cloned()
            .collect())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryCredentialRepository {
    credentials: Arc<RwLock<HashMap<CredentialId, Credential>>>,
}

impl InMemoryCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn save(&self, credential: &Credential) -> Result<(), RepositoryError> {
        self.credentials.write().unwrap().insert(credential.id, credential.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: CredentialId) -> Result<Option<Credential>, RepositoryError> {
        Ok(self.credentials.read().unwrap().get(&id).cloned())
    }

    async fn find_by_fingerprint(&self, fingerprint: &TokenFingerprint) -> Result<Option<Credential>, RepositoryError> {
        Ok(self.credentials.read().unwrap().values().find(|c| &c.fingerprint == fingerprint).cloned())
    }

    async fn delete_expired_before(&self, before: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut credentials = self.credentials.write().unwrap();
        let before_count = credentials.len();
        credentials.retain(|_, c| c.expires_at >= before);
        Ok((before_count - credentials.len()) as u64)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAccessLogRepository {
    logs: Arc<RwLock<Vec<AccessLog>>>,
}

impl InMemoryAccessLogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccessLogRepository for InMemoryAccessLogRepository {
    async fn append(&self, log: &AccessLog) -> Result<(), RepositoryError> {
        self.logs.write().unwrap().push(log.clone());
        Ok(())
    }

    async fn list_for_agent(&self, agent_id: AgentId, limit: usize) -> Result<Vec<AccessLog>, RepositoryError> {
        let logs = self.logs.read().unwrap();
        Ok(logs.iter().rev().filter(|l| l.agent_id == agent_id).take(limit).cloned().collect())
    }

    async fn list_for_tool(&self, tool_id: ToolId, limit: usize) -> Result<Vec<AccessLog>, RepositoryError> {
        let logs = self.logs.read().unwrap();
        Ok(logs.iter().rev().filter(|l| l.tool_id == tool_id).take(limit).cloned().collect())
    }
}
