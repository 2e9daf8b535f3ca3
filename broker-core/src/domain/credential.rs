// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::access_request::AccessRequestId;
use crate::domain::agent::AgentId;
use crate::domain::policy::PolicyId;
use crate::domain::tool::ToolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialId(pub Uuid);

impl CredentialId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for CredentialId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CredentialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// HMAC over the bearer token, hex-encoded. The plaintext bearer is never
/// persisted — only this fingerprint, used for O(1) lookup on validate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenFingerprint(pub String);

/// A short-lived bearer credential minted after a successful policy
/// decision. Invariants enforced at construction:
/// `expires_at > issued_at`; `revoked_at`, once set, is `>= issued_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub agent_id: AgentId,
    pub tool_id: ToolId,
    pub granted_scopes: HashSet<String>,
    pub fingerprint: TokenFingerprint,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub source_policy_id: PolicyId,
    pub source_request_id: Option<AccessRequestId>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("expires_at must be strictly after issued_at")]
    NonPositiveLifetime,
}

impl Credential {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent_id: AgentId,
        tool_id: ToolId,
        granted_scopes: HashSet<String>,
        fingerprint: TokenFingerprint,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        source_policy_id: PolicyId,
        source_request_id: Option<AccessRequestId>,
    ) -> Result<Self, CredentialError> {
        if expires_at <= issued_at {
            return Err(CredentialError::NonPositiveLifetime);
        }
        Ok(Self {
            id: CredentialId::new(),
            agent_id,
            tool_id,
            granted_scopes,
            fingerprint,
            issued_at,
            expires_at,
            revoked_at: None,
            source_policy_id,
            source_request_id,
        })
    }

    /// `now ∈ [issued_at, expires_at) AND revoked_at == None`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && now >= self.issued_at && now < self.expires_at
    }

    pub fn lifetime_seconds(&self) -> i64 {
        (self.expires_at - self.issued_at).num_seconds()
    }

    /// Idempotent: revoking an already-revoked credential is a no-op that
    /// keeps the first revocation timestamp.
    pub fn revoke(&mut self, at: DateTime<Utc>) {
        if self.revoked_at.is_none() {
            self.revoked_at = Some(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fresh(issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Result<Credential, CredentialError> {
        Credential::new(
            AgentId::new(),
            ToolId::new(),
            HashSet::from(["read".to_string()]),
            TokenFingerprint("abc".to_string()),
            issued_at,
            expires_at,
            PolicyId::new(),
            None,
        )
    }

    #[test]
    fn rejects_non_positive_lifetime() {
        let now = Utc::now();
        assert_eq!(fresh(now, now).unwrap_err(), CredentialError::NonPositiveLifetime);
        assert_eq!(fresh(now, now - Duration::seconds(1)).unwrap_err(), CredentialError::NonPositiveLifetime);
    }

    #[test]
    fn valid_only_within_half_open_window_and_unrevoked() {
        let issued_at = Utc::now();
        let expires_at = issued_at + Duration::seconds(3600);
        let cred = fresh(issued_at, expires_at).unwrap();

        assert!(!cred.is_valid_at(issued_at - Duration::seconds(1)));
        assert!(cred.is_valid_at(issued_at));
        assert!(cred.is_valid_at(expires_at - Duration::seconds(1)));
        assert!(!cred.is_valid_at(expires_at));
    }

    #[test]
    fn revoke_is_idempotent_and_invalidates() {
        let issued_at = Utc::now();
        let mut cred = fresh(issued_at, issued_at + Duration::seconds(3600)).unwrap();
        let revoke_at = issued_at + Duration::seconds(100);
        cred.revoke(revoke_at);
        cred.revoke(revoke_at + Duration::seconds(50));
        assert_eq!(cred.revoked_at, Some(revoke_at));
        assert!(!cred.is_valid_at(revoke_at + Duration::seconds(1)));
    }
}
