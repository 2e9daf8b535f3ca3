// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! PostgreSQL `AccessLogRepository`. Append-only: this type exposes no
//! update/delete, matching the trait.

use std::collections::HashSet;
use std::net::IpAddr;

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::access_log::{AccessDecision, AccessEvent, AccessLog, AccessLogId, ReasonCode};
use crate::domain::agent::AgentId;
use crate::domain::credential::CredentialId;
use crate::domain::policy::PolicyId;
use crate::domain::repository::{AccessLogRepository, RepositoryError};
use crate::domain::tool::ToolId;

pub struct PostgresAccessLogRepository {
    pool: PgPool,
}

impl PostgresAccessLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn from_row(row: sqlx::postgres::PgRow) -> Result<AccessLog, RepositoryError> {
        let requested_scopes: serde_json::Value = row.get("requested_scopes");
        let requested_scopes: HashSet<String> = serde_json::from_value(requested_scopes)?;
        let granted_scopes: serde_json::Value = row.get("granted_scopes");
        let granted_scopes: HashSet<String> = serde_json::from_value(granted_scopes)?;
        let request_ip: Option<String> = row.get("request_ip");
        let request_ip = request_ip.and_then(|s| s.parse::<IpAddr>().ok());

        Ok(AccessLog {
            id: AccessLogId(row.get("id")),
            timestamp: row.get("timestamp"),
            request_id: row.get("request_id"),
            agent_id: AgentId(row.get("agent_id")),
            tool_id: ToolId(row.get("tool_id")),
            policy_id: row.get::<Option<uuid::Uuid>, _>("policy_id").map(PolicyId),
            credential_id: row.get::<Option<uuid::Uuid>, _>("credential_id").map(CredentialId),
            event: parse_event(row.get("event"))?,
            decision: parse_decision(row.get("decision"))?,
            reason_code: parse_reason_code(row.get("reason_code"))?,
            request_ip,
            user_agent: row.get("user_agent"),
            requested_scopes,
            granted_scopes,
        })
    }
}

fn event_str(event: AccessEvent) -> &'static str {
    match event {
        AccessEvent::RequestEvaluated => "REQUEST_EVALUATED",
        AccessEvent::CredentialIssued => "CREDENTIAL_ISSUED",
        AccessEvent::CredentialValidated => "CREDENTIAL_VALIDATED",
        AccessEvent::CredentialRevoked => "CREDENTIAL_REVOKED",
        AccessEvent::RateLimited => "RATE_LIMITED",
    }
}

fn parse_event(s: String) -> Result<AccessEvent, RepositoryError> {
    match s.as_str() {
        "REQUEST_EVALUATED" => Ok(AccessEvent::RequestEvaluated),
        "CREDENTIAL_ISSUED" => Ok(AccessEvent::CredentialIssued),
        "CREDENTIAL_VALIDATED" => Ok(AccessEvent::CredentialValidated),
        "CREDENTIAL_REVOKED" => Ok(AccessEvent::CredentialRevoked),
        "RATE_LIMITED" => Ok(AccessEvent::RateLimited),
        other => Err(RepositoryError::Serialization(format!("unknown access_log event '{other}'"))),
    }
}

fn decision_str(decision: AccessDecision) -> &'static str {
    match decision {
        AccessDecision::Allow => "ALLOW",
        AccessDecision::Deny => "DENY",
        AccessDecision::PendingApproval => "PENDING_APPROVAL",
    }
}

fn parse_decision(s: String) -> Result<AccessDecision, RepositoryError> {
    match s.as_str() {
        "ALLOW" => Ok(AccessDecision::Allow),
        "DENY" => Ok(AccessDecision::Deny),
        "PENDING_APPROVAL" => Ok(AccessDecision::PendingApproval),
        other => Err(RepositoryError::Serialization(format!("unknown access_log decision '{other}'"))),
    }
}

fn reason_code_str(reason_code: ReasonCode) -> &'static str {
    match reason_code {
        ReasonCode::Approved => "APPROVED",
        ReasonCode::NoPolicyMatch => "NO_POLICY_MATCH",
        ReasonCode::RequiresApproval => "REQUIRES_APPROVAL",
        ReasonCode::RateLimited => "RATE_LIMITED",
        ReasonCode::UnknownTarget => "UNKNOWN_TARGET",
        ReasonCode::StoreUnavailable => "STORE_UNAVAILABLE",
        ReasonCode::KeystoreUnavailable => "KEYSTORE_UNAVAILABLE",
        ReasonCode::Cancelled => "CANCELLED",
        ReasonCode::Internal => "INTERNAL",
        ReasonCode::Revoked => "REVOKED",
        ReasonCode::Expired => "EXPIRED",
        ReasonCode::SignatureInvalid => "SIGNATURE_INVALID",
        ReasonCode::InsufficientScope => "INSUFFICIENT_SCOPE",
        ReasonCode::NotFound => "NOT_FOUND",
    }
}

fn parse_reason_code(s: String) -> Result<ReasonCode, RepositoryError> {
    Ok(match s.as_str() {
        "APPROVED" => ReasonCode::Approved,
        "NO_POLICY_MATCH" => ReasonCode::NoPolicyMatch,
        "REQUIRES_APPROVAL" => ReasonCode::RequiresApproval,
        "RATE_LIMITED" => ReasonCode::RateLimited,
        "UNKNOWN_TARGET" => ReasonCode::UnknownTarget,
        "STORE_UNAVAILABLE" => ReasonCode::StoreUnavailable,
        "KEYSTORE_UNAVAILABLE" => ReasonCode::KeystoreUnavailable,
        "CANCELLED" => ReasonCode::Cancelled,
        "INTERNAL" => ReasonCode::Internal,
        "REVOKED" => ReasonCode::Revoked,
        "EXPIRED" => ReasonCode::Expired,
        "SIGNATURE_INVALID" => ReasonCode::SignatureInvalid,
        "INSUFFICIENT_SCOPE" => ReasonCode::InsufficientScope,
        "NOT_FOUND" => ReasonCode::NotFound,
        other => return Err(RepositoryError::Serialization(format!("unknown reason_code '{other}'"))),
    })
}

const SELECT_COLUMNS: &str = "id, \"timestamp\", request_id, agent_id, tool_id, policy_id, credential_id, event, decision, reason_code, request_ip, user_agent, requested_scopes, granted_scopes";

#[async_trait]
impl AccessLogRepository for PostgresAccessLogRepository {
    async fn append(&self, log: &AccessLog) -> Result<(), RepositoryError> {
        let requested_scopes = serde_json::to_value(&log.requested_scopes)?;
        let granted_scopes = serde_json::to_value(&log.granted_scopes)?;
        sqlx::query(
            r#"
            INSERT INTO access_logs (id, "timestamp", request_id, agent_id, tool_id, policy_id, credential_id, event, decision, reason_code, request_ip, user_agent, requested_scopes, granted_scopes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(log.id.0)
        .bind(log.timestamp)
        .bind(log.request_id)
        .bind(log.agent_id.0)
        .bind(log.tool_id.0)
        .bind(log.policy_id.map(|p| p.0))
        .bind(log.credential_id.map(|c| c.0))
        .bind(event_str(log.event))
        .bind(decision_str(log.decision))
        .bind(reason_code_str(log.reason_code))
        .bind(log.request_ip.map(|ip| ip.to_string()))
        .bind(&log.user_agent)
        .bind(requested_scopes)
        .bind(granted_scopes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_agent(&self, agent_id: AgentId, limit: usize) -> Result<Vec<AccessLog>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM access_logs WHERE agent_id = $1 ORDER BY \"timestamp\" DESC LIMIT $2"
        ))
        .bind(agent_id.0)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::from_row).collect()
    }

    async fn list_for_tool(&self, tool_id: ToolId, limit: usize) -> Result<Vec<AccessLog>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM access_logs WHERE tool_id = $1 ORDER BY \"timestamp\" DESC LIMIT $2"
        ))
        .bind(tool_id.0)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::from_row).collect()
    }
}
