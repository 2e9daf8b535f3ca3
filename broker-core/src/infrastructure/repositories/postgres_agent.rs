// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! PostgreSQL `AgentRepository`, backed by the `agents` table.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::agent::{Agent, AgentId};
use crate::domain::repository::{AgentRepository, RepositoryError};

pub struct PostgresAgentRepository {
    pool: PgPool,
}

impl PostgresAgentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn from_row(row: sqlx::postgres::PgRow) -> Result<Agent, RepositoryError> {
        let roles: serde_json::Value = row.get("roles");
        let roles: HashSet<String> = serde_json::from_value(roles)?;
        Ok(Agent {
            id: AgentId(row.get("id")),
            name: row.get("name"),
            description: row.get("description"),
            roles,
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl AgentRepository for PostgresAgentRepository {
    async fn save(&self, agent: &Agent) -> Result<(), RepositoryError> {
        let roles = serde_json::to_value(&agent.roles)?;
        sqlx::query(
            r#"
            INSERT INTO agents (id, name, description, roles, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                roles = EXCLUDED.roles,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(agent.id.0)
        .bind(&agent.name)
        .bind(&agent.description)
        .bind(roles)
        .bind(agent.is_active)
        .bind(agent.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: AgentId) -> Result<Option<Agent>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, description, roles, is_active, created_at FROM agents WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::from_row).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Agent>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, description, roles, is_active, created_at FROM agents WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::from_row).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Agent>, RepositoryError> {
        let rows = sqlx::query("SELECT id, name, description, roles, is_active, created_at FROM agents ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::from_row).collect()
    }
}
