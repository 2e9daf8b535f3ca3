// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Append-only audit trail entity. No updates, no deletes — see
//! [`crate::domain::repository::AccessLogRepository`].

use std::collections::HashSet;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::agent::AgentId;
use crate::domain::credential::CredentialId;
use crate::domain::policy::PolicyId;
use crate::domain::tool::ToolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessLogId(pub Uuid);

impl AccessLogId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AccessLogId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessEvent {
    RequestEvaluated,
    CredentialIssued,
    CredentialValidated,
    CredentialRevoked,
    RateLimited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessDecision {
    Allow,
    Deny,
    PendingApproval,
}

/// Machine-readable reason attached to every logged decision. Mirrors the
/// `reason_code` strings carried in every HTTP error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    Approved,
    NoPolicyMatch,
    RequiresApproval,
    RateLimited,
    UnknownTarget,
    StoreUnavailable,
    KeystoreUnavailable,
    Cancelled,
    Internal,
    Revoked,
    Expired,
    SignatureInvalid,
    InsufficientScope,
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLog {
    pub id: AccessLogId,
    pub timestamp: DateTime<Utc>,
    pub request_id: Uuid,
    pub agent_id: AgentId,
    pub tool_id: ToolId,
    pub policy_id: Option<PolicyId>,
    pub credential_id: Option<CredentialId>,
    pub event: AccessEvent,
    pub decision: AccessDecision,
    pub reason_code: ReasonCode,
    pub request_ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub requested_scopes: HashSet<String>,
    pub granted_scopes: HashSet<String>,
}

#[derive(Debug, Default, Clone)]
pub struct AccessLogBuilder {
    pub policy_id: Option<PolicyId>,
    pub credential_id: Option<CredentialId>,
    pub request_ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub requested_scopes: HashSet<String>,
    pub granted_scopes: HashSet<String>,
}

impl AccessLog {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        request_id: Uuid,
        agent_id: AgentId,
        tool_id: ToolId,
        event: AccessEvent,
        decision: AccessDecision,
        reason_code: ReasonCode,
        now: DateTime<Utc>,
        extra: AccessLogBuilder,
    ) -> Self {
        Self {
            id: AccessLogId::new(),
            timestamp: now,
            request_id,
            agent_id,
            tool_id,
            policy_id: extra.policy_id,
            credential_id: extra.credential_id,
            event,
            decision,
            reason_code,
            request_ip: extra.request_ip,
            user_agent: extra.user_agent,
            requested_scopes: extra.requested_scopes,
            granted_scopes: extra.granted_scopes,
        }
    }

    /// Required-field validation per event kind: a `CREDENTIAL_*`
    /// event must carry a `credential_id`; `REQUEST_EVALUATED` always needs
    /// a decision, which the type system already guarantees.
    pub fn validate(&self) -> Result<(), AccessLogError> {
        match self.event {
            AccessEvent::CredentialIssued
            | AccessEvent::CredentialValidated
            | AccessEvent::CredentialRevoked => {
                if self.credential_id.is_none() {
                    return Err(AccessLogError::MissingField {
                        event: self.event,
                        field: "credential_id",
                    });
                }
            }
            AccessEvent::RequestEvaluated | AccessEvent::RateLimited => {}
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AccessLogError {
    #[error("event {event:?} requires field '{field}'")]
    MissingField { event: AccessEvent, field: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_issued_requires_credential_id() {
        let log = AccessLog::new(
            Uuid::new_v4(),
            AgentId::new(),
            ToolId::new(),
            AccessEvent::CredentialIssued,
            AccessDecision::Allow,
            ReasonCode::Approved,
            Utc::now(),
            AccessLogBuilder::default(),
        );
        assert!(log.validate().is_err());
    }

    #[test]
    fn request_evaluated_has_no_required_extras() {
        let log = AccessLog::new(
            Uuid::new_v4(),
            AgentId::new(),
            ToolId::new(),
            AccessEvent::RequestEvaluated,
            AccessDecision::Deny,
            ReasonCode::NoPolicyMatch,
            Utc::now(),
            AccessLogBuilder::default(),
        );
        assert!(log.validate().is_ok());
    }
}
