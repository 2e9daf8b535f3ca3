// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Repository trait definitions, one per entity. Every trait object is
// `Send + Sync` and held as `Arc<dyn ...>` by application-layer services;
// `infrastructure::repositories` supplies the in-memory and Postgres
// implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::access_log::AccessLog;
use crate::domain::access_request::{AccessRequest, AccessRequestId};
use crate::domain::agent::{Agent, AgentId};
use crate::domain::credential::{Credential, CredentialId, TokenFingerprint};
use crate::domain::policy::PolicyId;
use crate::domain::policy::Policy;
use crate::domain::tool::{Tool, ToolId};

#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn save(&self, agent: &Agent) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: AgentId) -> Result<Option<Agent>, RepositoryError>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Agent>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Agent>, RepositoryError>;
}

#[async_trait]
pub trait ToolRepository: Send + Sync {
    async fn save(&self, tool: &Tool) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: ToolId) -> Result<Option<Tool>, RepositoryError>;

    /// Case-insensitive lookup on `Tool::name_key` — enforces the unique
    /// tool-name invariant at the application layer.
    async fn find_by_name_key(&self, name_key: &str) -> Result<Option<Tool>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Tool>, RepositoryError>;
}

#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn save(&self, policy: &Policy) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: PolicyId) -> Result<Option<Policy>, RepositoryError>;

    /// Active policies targeting `tool_id`, ordered `priority DESC,
    /// created_at ASC` — the evaluation order the policy engine relies on.
    async fn list_for_tool(&self, tool_id: ToolId) -> Result<Vec<Policy>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Policy>, RepositoryError>;
}

#[async_trait]
pub trait AccessRequestRepository: Send + Sync {
    async fn save(&self, request: &AccessRequest) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: AccessRequestId) -> Result<Option<AccessRequest>, RepositoryError>;
    async fn list_pending(&self) -> Result<Vec<AccessRequest>, RepositoryError>;
}

#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn save(&self, credential: &Credential) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: CredentialId) -> Result<Option<Credential>, RepositoryError>;

    /// O(1) lookup path `Validate` uses instead of scanning by bearer token.
    async fn find_by_fingerprint(
        &self,
        fingerprint: &TokenFingerprint,
    ) -> Result<Option<Credential>, RepositoryError>;

    /// Hard-deletes credentials that expired before `before`. Unlike the
    /// entity-registry traits above, credentials are bearer secrets with a
    /// bounded lifetime, not registry rows — once expired they carry no
    /// audit value beyond what the access log already retains, so the
    /// expiry sweeper is allowed to actually remove them.
    async fn delete_expired_before(&self, before: DateTime<Utc>) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait AccessLogRepository: Send + Sync {
    /// Append-only: no update/delete method exists on this trait by design.
    async fn append(&self, log: &AccessLog) -> Result<(), RepositoryError>;
    async fn list_for_agent(&self, agent_id: AgentId, limit: usize) -> Result<Vec<AccessLog>, RepositoryError>;
    async fn list_for_tool(&self, tool_id: ToolId, limit: usize) -> Result<Vec<AccessLog>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("entity not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".to_string()),
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                RepositoryError::Conflict(db_err.message().to_string())
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
