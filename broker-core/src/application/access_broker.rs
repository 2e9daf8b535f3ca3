// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Orchestrates RateLimiter → PolicyEngine → CredentialVendor, appending
//! audit log entries at each step, for every access request — the hot
//! path of the broker.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::application::credential_vendor::CredentialVendor;
use crate::application::policy_engine::PolicyEngine;
use crate::domain::rate_limiter::RateLimiter;
use crate::domain::access_log::{AccessDecision, AccessEvent, AccessLogBuilder, ReasonCode};
use crate::domain::access_request::{AccessRequest, AccessRequestId};
use crate::domain::agent::AgentId;
use crate::domain::clock::Clock;
use crate::domain::credential::CredentialId;
use crate::domain::decision::DecisionOutcome;
use crate::domain::error::BrokerError;
use crate::domain::policy::{PolicyId, RateLimitKey, RequestContext};
use crate::domain::repository::{AccessLogRepository, AccessRequestRepository, AgentRepository, ToolRepository};
use crate::domain::tool::ToolId;

pub struct RequestAccessInput {
    pub agent_id: AgentId,
    pub tool_id: ToolId,
    pub requested_scopes: HashSet<String>,
    pub requested_lifetime_seconds: Option<u64>,
    pub justification: Option<String>,
    pub idempotency_key: Option<String>,
    pub remote_ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IssuedCredential {
    pub credential_id: CredentialId,
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub granted_scopes: HashSet<String>,
}

#[derive(Debug, Clone)]
pub struct RequestAccessOutput {
    pub status: DecisionOutcome,
    pub credential: Option<IssuedCredential>,
    pub request_id: Option<AccessRequestId>,
    pub matched_policy_id: Option<PolicyId>,
    pub reason_code: ReasonCode,
    pub retry_after_seconds: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ValidateOutput {
    pub valid: bool,
    pub agent_id: Option<AgentId>,
    pub tool_id: Option<ToolId>,
    pub scopes: Option<HashSet<String>>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

const IDEMPOTENCY_WINDOW_SECONDS: i64 = 600;
const DEFAULT_RATE_LIMIT: u32 = 100;
const DEFAULT_RATE_LIMIT_WINDOW_SECONDS: u64 = 60;

pub struct AccessBroker {
    agents: Arc<dyn AgentRepository>,
    tools: Arc<dyn ToolRepository>,
    access_requests: Arc<dyn AccessRequestRepository>,
    access_logs: Arc<dyn AccessLogRepository>,
    rate_limiter: Arc<dyn RateLimiter>,
    policy_engine: Arc<PolicyEngine>,
    credential_vendor: Arc<CredentialVendor>,
    clock: Arc<dyn Clock>,
    idempotency_cache: DashMap<String, (RequestAccessOutput, chrono::DateTime<chrono::Utc>)>,
    rate_limit: u32,
    rate_limit_window_seconds: u64,
}

impl AccessBroker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        tools: Arc<dyn ToolRepository>,
        access_requests: Arc<dyn AccessRequestRepository>,
        access_logs: Arc<dyn AccessLogRepository>,
        rate_limiter: Arc<dyn RateLimiter>,
        policy_engine: Arc<PolicyEngine>,
        credential_vendor: Arc<CredentialVendor>,
        clock: Arc<dyn Clock>,
        rate_limit: u32,
        rate_limit_window_seconds: u64,
    ) -> Self {
        Self {
            agents,
            tools,
            access_requests,
            access_logs,
            rate_limiter,
            policy_engine,
            credential_vendor,
            clock,
            idempotency_cache: DashMap::new(),
            rate_limit: if rate_limit == 0 { DEFAULT_RATE_LIMIT } else { rate_limit },
            rate_limit_window_seconds: if rate_limit_window_seconds == 0 {
                DEFAULT_RATE_LIMIT_WINDOW_SECONDS
            } else {
                rate_limit_window_seconds
            },
        }
    }

    pub async fn request_access(&self, input: RequestAccessInput) -> Result<RequestAccessOutput, BrokerError> {
        if let Some(key) = &input.idempotency_key {
            self.evict_expired_idempotency_entries();
            if let Some(entry) = self.idempotency_cache.get(key) {
                return Ok(entry.0.clone());
            }
        }

        let request_id = Uuid::new_v4();
        let output = self.run_pipeline(request_id, &input).await?;

        if let Some(key) = input.idempotency_key {
            self.idempotency_cache.insert(key, (output.clone(), self.clock.now()));
        }
        Ok(output)
    }

    async fn run_pipeline(&self, request_id: Uuid, input: &RequestAccessInput) -> Result<RequestAccessOutput, BrokerError> {
        let agent = self.agents.find_by_id(input.agent_id).await?;
        let tool = self.tools.find_by_id(input.tool_id).await?;

        let (agent, tool) = match (agent, tool) {
            (Some(agent), Some(tool)) if agent.is_active && tool.is_active => (agent, tool),
            _ => {
                return self
                    .deny(request_id, input.agent_id, input.tool_id, ReasonCode::UnknownTarget, None)
                    .await;
            }
        };

        let ctx = RequestContext { now: self.clock.now(), remote_ip: input.remote_ip };

        let rate_limit_key = self.policy_engine.resolve_rate_limit_key(&tool, &agent, &ctx).await;
        let identity = match rate_limit_key {
            RateLimitKey::Agent => format!("agent:{}", agent.id),
            RateLimitKey::Ip => format!("ip:{}", input.remote_ip.map(|ip| ip.to_string()).unwrap_or_else(|| "unknown".to_string())),
            RateLimitKey::AgentTool => format!("{}:{}", agent.id, tool.id),
        };
        let rl = self.rate_limiter.check(&identity, self.rate_limit, self.rate_limit_window_seconds).await;
        if !rl.allowed {
            self.audit(
                request_id,
                agent.id,
                tool.id,
                AccessEvent::RateLimited,
                AccessDecision::Deny,
                ReasonCode::RateLimited,
                AccessLogBuilder::default(),
            )
            .await?;
            let retry_after = (rl.reset_at - self.clock.now()).num_seconds().max(0) as u64;
            return Ok(RequestAccessOutput {
                status: DecisionOutcome::Deny,
                credential: None,
                request_id: None,
                matched_policy_id: None,
                reason_code: ReasonCode::RateLimited,
                retry_after_seconds: Some(retry_after),
            });
        }

        let decision = match self
            .policy_engine
            .evaluate(&ctx, &agent, &tool, &input.requested_scopes, input.requested_lifetime_seconds)
            .await
        {
            Ok(decision) => decision,
            Err(reason_code) => {
                return self.deny(request_id, agent.id, tool.id, reason_code, None).await;
            }
        };

        match decision.outcome {
            DecisionOutcome::Deny => {
                self.audit(
                    request_id,
                    agent.id,
                    tool.id,
                    AccessEvent::RequestEvaluated,
                    AccessDecision::Deny,
                    decision.reason_code,
                    AccessLogBuilder { requested_scopes: input.requested_scopes.clone(), ..Default::default() },
                )
                .await?;
                Ok(RequestAccessOutput {
                    status: DecisionOutcome::Deny,
                    credential: None,
                    request_id: None,
                    matched_policy_id: decision.matched_policy_id,
                    reason_code: decision.reason_code,
                    retry_after_seconds: None,
                })
            }
            DecisionOutcome::PendingApproval => {
                let access_request = AccessRequest::new_pending(
                    agent.id,
                    tool.id,
                    decision.granted_scopes.clone(),
                    input.justification.clone(),
                    decision.matched_policy_id,
                    self.clock.now(),
                );
                self.access_requests.save(&access_request).await?;
                self.audit(
                    request_id,
                    agent.id,
                    tool.id,
                    AccessEvent::RequestEvaluated,
                    AccessDecision::PendingApproval,
                    ReasonCode::RequiresApproval,
                    AccessLogBuilder {
                        requested_scopes: input.requested_scopes.clone(),
                        granted_scopes: decision.granted_scopes,
                        policy_id: decision.matched_policy_id,
                        ..Default::default()
                    },
                )
                .await?;
                Ok(RequestAccessOutput {
                    status: DecisionOutcome::PendingApproval,
                    credential: None,
                    request_id: Some(access_request.id),
                    matched_policy_id: decision.matched_policy_id,
                    reason_code: ReasonCode::RequiresApproval,
                    retry_after_seconds: None,
                })
            }
            DecisionOutcome::Allow => {
                let matched_policy_id = decision.matched_policy_id.expect("Allow decisions always carry a matched policy");
                let lifetime = decision.credential_lifetime_seconds.expect("Allow decisions always carry a lifetime");

                if let Some(quota) = &decision.quota {
                    self.rate_limiter.check(&quota.identity, quota.limit, 24 * 3600).await;
                }

                self.audit(
                    request_id,
                    agent.id,
                    tool.id,
                    AccessEvent::RequestEvaluated,
                    AccessDecision::Allow,
                    ReasonCode::Approved,
                    AccessLogBuilder {
                        requested_scopes: input.requested_scopes.clone(),
                        granted_scopes: decision.granted_scopes.clone(),
                        policy_id: Some(matched_policy_id),
                        request_ip: input.remote_ip,
                        user_agent: input.user_agent.clone(),
                        ..Default::default()
                    },
                )
                .await?;

                let issued = self
                    .credential_vendor
                    .issue(request_id, agent.id, tool.id, decision.granted_scopes.clone(), lifetime, matched_policy_id, None)
                    .await
                    .map_err(|_| BrokerError::Unavailable("credential vendor".to_string()))?;

                Ok(RequestAccessOutput {
                    status: DecisionOutcome::Allow,
                    credential: Some(IssuedCredential {
                        credential_id: issued.credential_id,
                        token: issued.token,
                        expires_at: issued.expires_at,
                        granted_scopes: decision.granted_scopes,
                    }),
                    request_id: None,
                    matched_policy_id: Some(matched_policy_id),
                    reason_code: ReasonCode::Approved,
                    retry_after_seconds: None,
                })
            }
        }
    }

    pub async fn validate(&self, token: &str, required_scope: Option<&str>) -> ValidateOutput {
        let outcome = self.credential_vendor.validate(Uuid::new_v4(), token, required_scope).await;
        ValidateOutput {
            valid: outcome.valid,
            agent_id: outcome.agent_id,
            tool_id: outcome.tool_id,
            scopes: outcome.scopes,
            expires_at: outcome.expires_at,
        }
    }

    pub async fn revoke(&self, credential_id: CredentialId) -> Result<(), BrokerError> {
        self.credential_vendor
            .revoke(Uuid::new_v4(), credential_id)
            .await
            .map_err(|_| BrokerError::Unavailable("credential vendor".to_string()))
    }

    async fn deny(
        &self,
        request_id: Uuid,
        agent_id: AgentId,
        tool_id: ToolId,
        reason_code: ReasonCode,
        matched_policy_id: Option<PolicyId>,
    ) -> Result<RequestAccessOutput, BrokerError> {
        self.audit(request_id, agent_id, tool_id, AccessEvent::RequestEvaluated, AccessDecision::Deny, reason_code, AccessLogBuilder::default())
            .await?;
        Ok(RequestAccessOutput {
            status: DecisionOutcome::Deny,
            credential: None,
            request_id: None,
            matched_policy_id,
            reason_code,
            retry_after_seconds: None,
        })
    }

    async fn audit(
        &self,
        request_id: Uuid,
        agent_id: AgentId,
        tool_id: ToolId,
        event: AccessEvent,
        decision: AccessDecision,
        reason_code: ReasonCode,
        extra: AccessLogBuilder,
    ) -> Result<(), BrokerError> {
        metrics::counter!(
            "toolbroker_access_decisions_total",
            "decision" => decision_label(decision),
            "reason_code" => reason_code_label(reason_code),
        )
        .increment(1);

        let entry = crate::domain::access_log::AccessLog::new(request_id, agent_id, tool_id, event, decision, reason_code, self.clock.now(), extra);
        entry.validate().map_err(|e| BrokerError::Internal(e.to_string()))?;
        self.access_logs.append(&entry).await.map_err(BrokerError::from)
    }

    fn evict_expired_idempotency_entries(&self) {
        let now = self.clock.now();
        self.idempotency_cache.retain(|_, (_, inserted_at)| now - *inserted_at < chrono::Duration::seconds(IDEMPOTENCY_WINDOW_SECONDS));
    }
}

fn decision_label(decision: AccessDecision) -> &'static str {
    match decision {
        AccessDecision::Allow => "allow",
        AccessDecision::Deny => "deny",
        AccessDecision::PendingApproval => "pending_approval",
    }
}

fn reason_code_label(reason_code: ReasonCode) -> &'static str {
    match reason_code {
        ReasonCode::Approved => "approved",
        ReasonCode::NoPolicyMatch => "no_policy_match",
        ReasonCode::RequiresApproval => "requires_approval",
        ReasonCode::RateLimited => "rate_limited",
        ReasonCode::UnknownTarget => "unknown_target",
        ReasonCode::StoreUnavailable => "store_unavailable",
        ReasonCode::KeystoreUnavailable => "keystore_unavailable",
        ReasonCode::Cancelled => "cancelled",
        ReasonCode::Internal => "internal",
        ReasonCode::Revoked => "revoked",
        ReasonCode::Expired => "expired",
        ReasonCode::SignatureInvalid => "signature_invalid",
        ReasonCode::InsufficientScope => "insufficient_scope",
        ReasonCode::NotFound => "not_found",
    }
}
