// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! PostgreSQL `ToolRepository`. `find_by_name_key` relies on the partial
//! unique index `idx_tools_name_key_active` (see migrations) to enforce the
//! case-insensitive uniqueness invariant on active tools at the database
//! layer too, not just in `ToolService`.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::agent::AgentId;
use crate::domain::repository::{RepositoryError, ToolRepository};
use crate::domain::tool::{Tool, ToolId};

pub struct PostgresToolRepository {
    pool: PgPool,
}

impl PostgresToolRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn from_row(row: sqlx::postgres::PgRow) -> Result<Tool, RepositoryError> {
        let allowed_scopes: serde_json::Value = row.get("allowed_scopes");
        let allowed_scopes: HashSet<String> = serde_json::from_value(allowed_scopes)?;
        Ok(Tool {
            id: ToolId(row.get("id")),
            name: row.get("name"),
            description: row.get("description"),
            version: row.get("version"),
            owner_id: AgentId(row.get("owner_id")),
            allowed_scopes,
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

const SELECT_COLUMNS: &str =
    "id, name, description, version, owner_id, allowed_scopes, is_active, created_at, updated_at";

#[async_trait]
impl ToolRepository for PostgresToolRepository {
    async fn save(&self, tool: &Tool) -> Result<(), RepositoryError> {
        let allowed_scopes = serde_json::to_value(&tool.allowed_scopes)?;
        sqlx::query(
            r#"
            INSERT INTO tools (id, name, description, version, owner_id, allowed_scopes, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                version = EXCLUDED.version,
                allowed_scopes = EXCLUDED.allowed_scopes,
                is_active = EXCLUDED.is_active,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(tool.id.0)
        .bind(&tool.name)
        .bind(&tool.description)
        .bind(&tool.version)
        .bind(tool.owner_id.0)
        .bind(allowed_scopes)
        .bind(tool.is_active)
        .bind(tool.created_at)
        .bind(tool.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: ToolId) -> Result<Option<Tool>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM tools WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::from_row).transpose()
    }

    async fn find_by_name_key(&self, name_key: &str) -> Result<Option<Tool>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM tools WHERE lower(name) = $1 AND is_active"))
            .bind(name_key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::from_row).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Tool>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM tools ORDER BY name ASC"))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::from_row).collect()
    }
}
