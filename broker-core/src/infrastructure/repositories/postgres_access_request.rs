// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! PostgreSQL `AccessRequestRepository`.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::access_request::{AccessRequest, AccessRequestId, AccessRequestStatus};
use crate::domain::agent::AgentId;
use crate::domain::policy::PolicyId;
use crate::domain::repository::{AccessRequestRepository, RepositoryError};
use crate::domain::tool::ToolId;

pub struct PostgresAccessRequestRepository {
    pool: PgPool,
}

impl PostgresAccessRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn from_row(row: sqlx::postgres::PgRow) -> Result<AccessRequest, RepositoryError> {
        let requested_scopes: serde_json::Value = row.get("requested_scopes");
        let requested_scopes: HashSet<String> = serde_json::from_value(requested_scopes)?;
        let status: String = row.get("status");
        let status = match status.as_str() {
            "PENDING" => AccessRequestStatus::Pending,
            "APPROVED" => AccessRequestStatus::Approved,
            "REJECTED" => AccessRequestStatus::Rejected,
            "EXPIRED" => AccessRequestStatus::Expired,
            other => return Err(RepositoryError::Serialization(format!("unknown access_request status '{other}'"))),
        };
        Ok(AccessRequest {
            id: AccessRequestId(row.get("id")),
            agent_id: AgentId(row.get("agent_id")),
            tool_id: ToolId(row.get("tool_id")),
            requested_scopes,
            justification: row.get("justification"),
            status,
            matched_policy_id: row.get::<Option<uuid::Uuid>, _>("matched_policy_id").map(PolicyId),
            created_at: row.get("created_at"),
            resolved_at: row.get("resolved_at"),
            resolver_id: row.get::<Option<uuid::Uuid>, _>("resolver_id").map(AgentId),
        })
    }
}

fn status_str(status: AccessRequestStatus) -> &'static str {
    match status {
        AccessRequestStatus::Pending => "PENDING",
        AccessRequestStatus::Approved => "APPROVED",
        AccessRequestStatus::Rejected => "REJECTED",
        AccessRequestStatus::Expired => "EXPIRED",
    }
}

const SELECT_COLUMNS: &str =
    "id, agent_id, tool_id, requested_scopes, justification, status, matched_policy_id, created_at, resolved_at, resolver_id";

#[async_trait]
impl AccessRequestRepository for PostgresAccessRequestRepository {
    async fn save(&self, request: &AccessRequest) -> Result<(), RepositoryError> {
        let requested_scopes = serde_json::to_value(&request.requested_scopes)?;
        sqlx::query(
            r#"
            INSERT INTO access_requests (id, agent_id, tool_id, requested_scopes, justification, status, matched_policy_id, created_at, resolved_at, resolver_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                resolved_at = EXCLUDED.resolved_at,
                resolver_id = EXCLUDED.resolver_id
            "#,
        )
        .bind(request.id.0)
        .bind(request.agent_id.0)
        .bind(request.tool_id.0)
        .bind(requested_scopes)
        .bind(&request.justification)
        .bind(status_str(request.status))
        .bind(request.matched_policy_id.map(|p| p.0))
        .bind(request.created_at)
        .bind(request.resolved_at)
        .bind(request.resolver_id.map(|a| a.0))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: AccessRequestId) -> Result<Option<AccessRequest>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM access_requests WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::from_row).transpose()
    }

    async fn list_pending(&self) -> Result<Vec<AccessRequest>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM access_requests WHERE status = 'PENDING' ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::from_row).collect()
    }
}
