// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Central decision function. Pure given its inputs plus one
//! non-mutating peek at the rate limiter for the `max_requests_per_day`
//! condition; never writes to the store itself.

use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::rate_limiter::RateLimiter;
use crate::domain::access_log::ReasonCode;
use crate::domain::agent::Agent;
use crate::domain::decision::{Decision, QuotaUsage};
use crate::domain::policy::{Policy, RateLimitKey, RequestContext};
use crate::domain::repository::{PolicyRepository, RepositoryError};
use crate::domain::tool::Tool;

pub const GLOBAL_MAX_CREDENTIAL_LIFETIME_SECONDS: u64 = 86_400;

pub struct PolicyEngine {
    policies: Arc<dyn PolicyRepository>,
    rate_limiter: Arc<dyn RateLimiter>,
    global_max_lifetime_seconds: u64,
}

impl PolicyEngine {
    pub fn new(
        policies: Arc<dyn PolicyRepository>,
        rate_limiter: Arc<dyn RateLimiter>,
        global_max_lifetime_seconds: u64,
    ) -> Self {
        Self { policies, rate_limiter, global_max_lifetime_seconds }
    }

    pub async fn evaluate(
        &self,
        ctx: &RequestContext,
        agent: &Agent,
        tool: &Tool,
        requested_scopes: &HashSet<String>,
        requested_lifetime_seconds: Option<u64>,
    ) -> Result<Decision, ReasonCode> {
        let candidates = match self.policies.list_for_tool(tool.id).await {
            Ok(policies) => policies,
            Err(RepositoryError::Database(_) | RepositoryError::Unknown(_)) => {
                return Err(ReasonCode::StoreUnavailable);
            }
            Err(_) => return Err(ReasonCode::Internal),
        };

        for policy in &candidates {
            if !policy.conditions.matches(agent, ctx) {
                continue;
            }
            let quota = match self.quota_usage(policy, agent, tool).await {
                Some(quota) if !self.quota_remaining(&quota).await => continue,
                quota => quota,
            };

            let granted_scopes: HashSet<String> = policy
                .allowed_scopes
                .intersection(&tool.allowed_scopes)
                .cloned()
                .collect::<HashSet<_>>()
                .intersection(requested_scopes)
                .cloned()
                .collect();

            if granted_scopes.is_empty() {
                continue;
            }

            if policy.rules.require_approval {
                return Ok(Decision::pending_approval(policy.id, granted_scopes));
            }

            let lifetime = self.credential_lifetime(policy, requested_lifetime_seconds);
            return Ok(Decision::allow(policy.id, granted_scopes, lifetime, quota));
        }

        Ok(Decision::deny(ReasonCode::NoPolicyMatch))
    }

    /// Finds the first candidate policy whose conditions match and returns
    /// the `rate_limit_key` strategy it declares for the outer (non-quota)
    /// rate limit, defaulting to `AgentTool` when nothing matches or no
    /// policy declares one. Deliberately does not consult quota or scope —
    /// this runs before the request-level rate-limit check, ahead of full
    /// evaluation.
    pub async fn resolve_rate_limit_key(&self, tool: &Tool, agent: &Agent, ctx: &RequestContext) -> RateLimitKey {
        let candidates = match self.policies.list_for_tool(tool.id).await {
            Ok(policies) => policies,
            Err(_) => return RateLimitKey::AgentTool,
        };
        candidates
            .iter()
            .find(|policy| policy.conditions.matches(agent, ctx))
            .and_then(|policy| policy.rules.rate_limit_key)
            .unwrap_or(RateLimitKey::AgentTool)
    }

    fn credential_lifetime(&self, policy: &Policy, requested: Option<u64>) -> u64 {
        let requested = requested.unwrap_or(self.global_max_lifetime_seconds);
        let mut lifetime = requested.min(self.global_max_lifetime_seconds);
        if let Some(policy_max) = policy.rules.max_credential_lifetime_seconds {
            lifetime = lifetime.min(policy_max);
        }
        lifetime
    }

    /// Builds the quota identity for `policy` against `agent`/`tool`, or
    /// `None` when the policy declares no daily cap (or declares `0`,
    /// meaning unlimited).
    async fn quota_usage(&self, policy: &Policy, agent: &Agent, tool: &Tool) -> Option<QuotaUsage> {
        let limit = policy.conditions.max_requests_per_day?;
        if limit == 0 {
            return None;
        }
        Some(QuotaUsage { identity: format!("quota:{}:{}:{}", agent.id, tool.id, policy.id), limit })
    }

    /// Non-mutating read of whether `quota`'s identity still has capacity
    /// left in its current day-long window.
    async fn quota_remaining(&self, quota: &QuotaUsage) -> bool {
        self.rate_limiter.peek(&quota.identity, quota.limit, 24 * 3600).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::domain::rate_limiter::RateLimitDecision;
use crate::infrastructure::rate_limit_backend::LocalRateLimiter;
    use crate::domain::agent::AgentId;
    use crate::domain::policy::{PolicyConditions, PolicyRules};
    use crate::domain::tool::ToolId;

    struct FakePolicyRepo(Vec<Policy>);

    #[async_trait]
    impl PolicyRepository for FakePolicyRepo {
        async fn save(&self, _policy: &Policy) -> Result<(), RepositoryError> {
            Ok(())
        }
        async fn find_by_id(&self, id: crate::domain::policy::PolicyId) -> Result<Option<Policy>, RepositoryError> {
            Ok(self.0.iter().find(|p| p.id == id).cloned())
        }
        async fn list_for_tool(&self, _tool_id: ToolId) -> Result<Vec<Policy>, RepositoryError> {
            Ok(self.0.clone())
        }
        async fn list_all(&self) -> Result<Vec<Policy>, RepositoryError> {
            Ok(self.0.clone())
        }
    }

    struct AlwaysLimiter(bool);

    #[async_trait]
    impl RateLimiter for AlwaysLimiter {
        async fn check(&self, _identity: &str, _limit: u32, _window_seconds: u64) -> RateLimitDecision {
            RateLimitDecision { allowed: self.0, remaining: 0, reset_at: Utc::now() }
        }
        async fn peek(&self, _identity: &str, _limit: u32, _window_seconds: u64) -> bool {
            self.0
        }
    }

    fn sample_tool() -> Tool {
        Tool::new(
            "github-api",
            "GitHub REST API",
            "1.0.0",
            AgentId::new(),
            HashSet::from(["read".to_string(), "write".to_string()]),
            Utc::now(),
        )
    }

    fn sample_agent(roles: &[&str]) -> Agent {
        Agent::new("a1", "test", roles.iter().map(|r| r.to_string()).collect(), Utc::now())
    }

    fn sample_policy(tool_id: ToolId, scopes: &[&str], priority: i32) -> Policy {
        Policy::new(
            "p1",
            Some(tool_id),
            AgentId::new(),
            scopes.iter().map(|s| s.to_string()).collect(),
            PolicyConditions { required_roles: Some(HashSet::from(["tool_user".to_string()])), ..Default::default() },
            PolicyRules { max_credential_lifetime_seconds: Some(3600), ..Default::default() },
            priority,
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn happy_path_grants_narrowed_scope_and_bounded_lifetime() {
        let tool = sample_tool();
        let policy = sample_policy(tool.id, &["read", "write"], 10);
        let engine = PolicyEngine::new(Arc::new(FakePolicyRepo(vec![policy.clone()])), Arc::new(AlwaysLimiter(true)), GLOBAL_MAX_CREDENTIAL_LIFETIME_SECONDS);
        let agent = sample_agent(&["tool_user"]);
        let ctx = RequestContext { now: Utc::now(), remote_ip: None };

        let decision = engine
            .evaluate(&ctx, &agent, &tool, &HashSet::from(["read".to_string()]), Some(7200))
            .await
            .unwrap();

        assert_eq!(decision.outcome, crate::domain::decision::DecisionOutcome::Allow);
        assert_eq!(decision.granted_scopes, HashSet::from(["read".to_string()]));
        assert_eq!(decision.credential_lifetime_seconds, Some(3600));
    }

    #[tokio::test]
    async fn deny_by_role_yields_no_policy_match() {
        let tool = sample_tool();
        let policy = sample_policy(tool.id, &["read"], 10);
        let engine = PolicyEngine::new(Arc::new(FakePolicyRepo(vec![policy])), Arc::new(AlwaysLimiter(true)), GLOBAL_MAX_CREDENTIAL_LIFETIME_SECONDS);
        let agent = sample_agent(&["guest"]);
        let ctx = RequestContext { now: Utc::now(), remote_ip: None };

        let decision = engine
            .evaluate(&ctx, &agent, &tool, &HashSet::from(["read".to_string()]), None)
            .await
            .unwrap();

        assert_eq!(decision.outcome, crate::domain::decision::DecisionOutcome::Deny);
        assert_eq!(decision.reason_code, ReasonCode::NoPolicyMatch);
    }

    #[tokio::test]
    async fn quota_exhaustion_skips_to_next_policy() {
        let tool = sample_tool();
        let mut exhausted = sample_policy(tool.id, &["read"], 20);
        exhausted.conditions.max_requests_per_day = Some(10);
        let fallback = sample_policy(tool.id, &["read"], 5);
        let engine = PolicyEngine::new(
            Arc::new(FakePolicyRepo(vec![exhausted, fallback.clone()])),
            Arc::new(AlwaysLimiter(false)),
            GLOBAL_MAX_CREDENTIAL_LIFETIME_SECONDS,
        );
        let agent = sample_agent(&["tool_user"]);
        let ctx = RequestContext { now: Utc::now(), remote_ip: None };

        let decision = engine
            .evaluate(&ctx, &agent, &tool, &HashSet::from(["read".to_string()]), None)
            .await
            .unwrap();

        assert_eq!(decision.matched_policy_id, Some(fallback.id));
    }

    #[tokio::test]
    async fn resolve_rate_limit_key_uses_matched_policys_declared_key() {
        let tool = sample_tool();
        let mut policy = sample_policy(tool.id, &["read"], 10);
        policy.rules.rate_limit_key = Some(RateLimitKey::Agent);
        let engine = PolicyEngine::new(Arc::new(FakePolicyRepo(vec![policy])), Arc::new(AlwaysLimiter(true)), GLOBAL_MAX_CREDENTIAL_LIFETIME_SECONDS);
        let agent = sample_agent(&["tool_user"]);
        let ctx = RequestContext { now: Utc::now(), remote_ip: None };

        assert_eq!(engine.resolve_rate_limit_key(&tool, &agent, &ctx).await, RateLimitKey::Agent);
    }

    #[tokio::test]
    async fn resolve_rate_limit_key_defaults_to_agent_tool_when_nothing_matches() {
        let tool = sample_tool();
        let policy = sample_policy(tool.id, &["read"], 10);
        let engine = PolicyEngine::new(Arc::new(FakePolicyRepo(vec![policy])), Arc::new(AlwaysLimiter(true)), GLOBAL_MAX_CREDENTIAL_LIFETIME_SECONDS);
        let agent = sample_agent(&["guest"]); // fails required_roles
        let ctx = RequestContext { now: Utc::now(), remote_ip: None };

        assert_eq!(engine.resolve_rate_limit_key(&tool, &agent, &ctx).await, RateLimitKey::AgentTool);
    }

    #[tokio::test]
    async fn store_unavailable_denies_without_fail_open() {
        struct ErrRepo;
        #[async_trait]
        impl PolicyRepository for ErrRepo {
            async fn save(&self, _p: &Policy) -> Result<(), RepositoryError> {
                Ok(())
            }
            async fn find_by_id(&self, _id: crate::domain::policy::PolicyId) -> Result<Option<Policy>, RepositoryError> {
                Ok(None)
            }
            async fn list_for_tool(&self, _tool_id: ToolId) -> Result<Vec<Policy>, RepositoryError> {
                Err(RepositoryError::Database("connection reset".into()))
            }
            async fn list_all(&self) -> Result<Vec<Policy>, RepositoryError> {
                Ok(vec![])
            }
        }

        let tool = sample_tool();
        let engine = PolicyEngine::new(Arc::new(ErrRepo), Arc::new(LocalRateLimiter::new(16)), GLOBAL_MAX_CREDENTIAL_LIFETIME_SECONDS);
        let agent = sample_agent(&["tool_user"]);
        let ctx = RequestContext { now: Utc::now(), remote_ip: None };

        let err = engine
            .evaluate(&ctx, &agent, &tool, &HashSet::from(["read".to_string()]), None)
            .await
            .unwrap_err();
        assert_eq!(err, ReasonCode::StoreUnavailable);
    }
}
