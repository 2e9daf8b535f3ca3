// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! PostgreSQL `PolicyRepository`. `list_for_tool` pushes the evaluation
//! order (`priority DESC, created_at ASC`) down to `ORDER BY`, backed by
//! `idx_policies_evaluation_order`.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::agent::AgentId;
use crate::domain::policy::{Policy, PolicyConditions, PolicyId, PolicyRules};
use crate::domain::repository::{PolicyRepository, RepositoryError};
use crate::domain::tool::ToolId;

pub struct PostgresPolicyRepository {
    pool: PgPool,
}

impl PostgresPolicyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn from_row(row: sqlx::postgres::PgRow) -> Result<Policy, RepositoryError> {
        let allowed_scopes: serde_json::Value = row.get("allowed_scopes");
        let allowed_scopes: HashSet<String> = serde_json::from_value(allowed_scopes)?;
        let conditions: serde_json::Value = row.get("conditions");
        let conditions: PolicyConditions = serde_json::from_value(conditions)?;
        let rules: serde_json::Value = row.get("rules");
        let rules: PolicyRules = serde_json::from_value(rules)?;
        Ok(Policy {
            id: PolicyId(row.get("id")),
            name: row.get("name"),
            tool_id: row.get::<Option<uuid::Uuid>, _>("tool_id").map(ToolId),
            created_by: AgentId(row.get("created_by")),
            allowed_scopes,
            conditions,
            rules,
            priority: row.get("priority"),
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

const SELECT_COLUMNS: &str =
    "id, name, tool_id, created_by, allowed_scopes, conditions, rules, priority, is_active, created_at, updated_at";

#[async_trait]
impl PolicyRepository for PostgresPolicyRepository {
    async fn save(&self, policy: &Policy) -> Result<(), RepositoryError> {
        let allowed_scopes = serde_json::to_value(&policy.allowed_scopes)?;
        let conditions = serde_json::to_value(&policy.conditions)?;
        let rules = serde_json::to_value(&policy.rules)?;
        sqlx::query(
            r#"
            INSERT INTO policies (id, name, tool_id, created_by, allowed_scopes, conditions, rules, priority, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                allowed_scopes = EXCLUDED.allowed_scopes,
                conditions = EXCLUDED.conditions,
                rules = EXCLUDED.rules,
                priority = EXCLUDED.priority,
                is_active = EXCLUDED.is_active,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(policy.id.0)
        .bind(&policy.name)
        .bind(policy.tool_id.map(|t| t.0))
        .bind(policy.created_by.0)
        .bind(allowed_scopes)
        .bind(conditions)
        .bind(rules)
        .bind(policy.priority)
        .bind(policy.is_active)
        .bind(policy.created_at)
        .bind(policy.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: PolicyId) -> Result<Option<Policy>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM policies WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::from_row).transpose()
    }

    async fn list_for_tool(&self, tool_id: ToolId) -> Result<Vec<Policy>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM policies WHERE (tool_id = $1 OR tool_id IS NULL) AND is_active \
             ORDER BY priority DESC, created_at ASC"
        ))
        .bind(tool_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::from_row).collect()
    }

    async fn list_all(&self) -> Result<Vec<Policy>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM policies ORDER BY priority DESC, created_at ASC"))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::from_row).collect()
    }
}
