// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for `POST /access/request`.
#[derive(Debug, Clone, Serialize)]
pub struct AccessRequest {
    pub agent_id: Uuid,
    pub tool_id: Uuid,
    pub requested_scopes: HashSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_lifetime_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssuedCredential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub granted_scopes: HashSet<String>,
    pub credential_id: String,
}

/// Response body for `POST /access/request`.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessDecision {
    pub status: String,
    #[serde(default)]
    pub credential: Option<IssuedCredential>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub matched_policy_id: Option<String>,
}

impl AccessDecision {
    pub fn is_approved(&self) -> bool {
        self.status == "APPROVED"
    }
}

/// Response body for `POST /access/validate`.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(default)]
    pub agent_id: Option<Uuid>,
    #[serde(default)]
    pub tool_id: Option<Uuid>,
    #[serde(default)]
    pub scopes: Option<HashSet<String>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
    pub reason_code: String,
    pub correlation_id: Uuid,
}
