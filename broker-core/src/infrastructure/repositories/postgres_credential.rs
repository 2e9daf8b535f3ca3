// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! PostgreSQL `CredentialRepository`. `find_by_fingerprint` is the hot path
//! `Validate` relies on — backed by `idx_credentials_fingerprint`.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::access_request::AccessRequestId;
use crate::domain::agent::AgentId;
use crate::domain::credential::{Credential, CredentialId, TokenFingerprint};
use crate::domain::policy::PolicyId;
use crate::domain::repository::{CredentialRepository, RepositoryError};
use crate::domain::tool::ToolId;

pub struct PostgresCredentialRepository {
    pool: PgPool,
}

impl PostgresCredentialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn from_row(row: sqlx::postgres::PgRow) -> Result<Credential, RepositoryError> {
        let granted_scopes: serde_json::Value = row.get("granted_scopes");
        let granted_scopes: HashSet<String> = serde_json::from_value(granted_scopes)?;
        Ok(Credential {
            id: CredentialId(row.get("id")),
            agent_id: AgentId(row.get("agent_id")),
            tool_id: ToolId(row.get("tool_id")),
            granted_scopes,
            fingerprint: TokenFingerprint(row.get("fingerprint")),
            issued_at: row.get("issued_at"),
            expires_at: row.get("expires_at"),
            revoked_at: row.get("revoked_at"),
            source_policy_id: PolicyId(row.get("source_policy_id")),
            source_request_id: row.get::<Option<uuid::Uuid>, _>("source_request_id").map(AccessRequestId),
        })
    }
}

const SELECT_COLUMNS: &str =
    "id, agent_id, tool_id, granted_scopes, fingerprint, issued_at, expires_at, revoked_at, source_policy_id, source_request_id";

#[async_trait]
impl CredentialRepository for PostgresCredentialRepository {
    async fn save(&self, credential: &Credential) -> Result<(), RepositoryError> {
        let granted_scopes = serde_json::to_value(&credential.granted_scopes)?;
        sqlx::query(
            r#"
            INSERT INTO credentials (id, agent_id, tool_id, granted_scopes, fingerprint, issued_at, expires_at, revoked_at, source_policy_id, source_request_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET revoked_at = EXCLUDED.revoked_at
            "#,
        )
        .bind(credential.id.0)
        .bind(credential.agent_id.0)
        .bind(credential.tool_id.0)
        .bind(granted_scopes)
        .bind(&credential.fingerprint.0)
        .bind(credential.issued_at)
        .bind(credential.expires_at)
        .bind(credential.revoked_at)
        .bind(credential.source_policy_id.0)
        .bind(credential.source_request_id.map(|r| r.0))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: CredentialId) -> Result<Option<Credential>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM credentials WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::from_row).transpose()
    }

    async fn find_by_fingerprint(&self, fingerprint: &TokenFingerprint) -> Result<Option<Credential>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM credentials WHERE fingerprint = $1"))
            .bind(&fingerprint.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::from_row).transpose()
    }

    async fn delete_expired_before(&self, before: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM credentials WHERE expires_at < $1").bind(before).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
