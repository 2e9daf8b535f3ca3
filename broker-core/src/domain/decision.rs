// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! The `PolicyEngine`'s return value. Kept free of any persistence or
//! side-effecting handles so `Evaluate` stays pure and deterministic
//! (testable property #1).

use std::collections::HashSet;

use crate::domain::access_log::ReasonCode;
use crate::domain::policy::PolicyId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOutcome {
    Allow,
    Deny,
    PendingApproval,
}

/// The quota identity `PolicyEngine::quota_satisfied` peeked at, surfaced so
/// the caller can perform the real increment at the moment it commits to
/// this policy (see `AccessBroker`'s allow path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaUsage {
    pub identity: String,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub outcome: DecisionOutcome,
    pub matched_policy_id: Option<PolicyId>,
    pub granted_scopes: HashSet<String>,
    pub credential_lifetime_seconds: Option<u64>,
    pub reason_code: ReasonCode,
    pub quota: Option<QuotaUsage>,
}

impl Decision {
    pub fn allow(
        matched_policy_id: PolicyId,
        granted_scopes: HashSet<String>,
        credential_lifetime_seconds: u64,
        quota: Option<QuotaUsage>,
    ) -> Self {
        Self {
            outcome: DecisionOutcome::Allow,
            matched_policy_id: Some(matched_policy_id),
            granted_scopes,
            credential_lifetime_seconds: Some(credential_lifetime_seconds),
            reason_code: ReasonCode::Approved,
            quota,
        }
    }

    pub fn pending_approval(matched_policy_id: PolicyId, requested_scopes: HashSet<String>) -> Self {
        Self {
            outcome: DecisionOutcome::PendingApproval,
            matched_policy_id: Some(matched_policy_id),
            granted_scopes: requested_scopes,
            credential_lifetime_seconds: None,
            reason_code: ReasonCode::RequiresApproval,
            quota: None,
        }
    }

    pub fn deny(reason_code: ReasonCode) -> Self {
        Self {
            outcome: DecisionOutcome::Deny,
            matched_policy_id: None,
            granted_scopes: HashSet::new(),
            credential_lifetime_seconds: None,
            reason_code,
            quota: None,
        }
    }
}
