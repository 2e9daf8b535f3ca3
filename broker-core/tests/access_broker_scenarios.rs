// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! End-to-end scenarios and property tests for the `AccessBroker` pipeline,
//! built against in-memory repositories so no database is required.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use toolbroker_core::application::access_broker::{AccessBroker, RequestAccessInput};
use toolbroker_core::application::credential_vendor::CredentialVendor;
use toolbroker_core::application::policy_engine::PolicyEngine;
use toolbroker_core::domain::access_log::ReasonCode;
use toolbroker_core::domain::agent::{Agent, AgentId};
use toolbroker_core::domain::clock::{Clock, TestClock};
use toolbroker_core::domain::decision::DecisionOutcome;
use toolbroker_core::domain::policy::{Policy, PolicyConditions, PolicyRules};
use toolbroker_core::domain::repository::{
    AccessLogRepository, AccessRequestRepository, AgentRepository, PolicyRepository, ToolRepository,
};
use toolbroker_core::domain::secret_store::{SecretStore, SecretStoreError, SigningAlgorithm, SigningKey};
use toolbroker_core::domain::tool::Tool;
use toolbroker_core::infrastructure::rate_limit_backend::LocalRateLimiter;
use toolbroker_core::infrastructure::repositories::{
    InMemoryAccessLogRepository, InMemoryAccessRequestRepository, InMemoryAgentRepository,
    InMemoryCredentialRepository, InMemoryPolicyRepository, InMemoryToolRepository,
};

/// Fixed-material signing key so tests never depend on process environment.
struct TestSecretStore {
    key: SigningKey,
}

impl TestSecretStore {
    fn new() -> Self {
        Self { key: SigningKey { kid: "test-1".to_string(), algorithm: SigningAlgorithm::Hs256, material: vec![7u8; 32] } }
    }
}

#[async_trait]
impl SecretStore for TestSecretStore {
    async fn active_signing_key(&self) -> Result<SigningKey, SecretStoreError> {
        Ok(self.key.clone())
    }

    async fn signing_key(&self, kid: &str) -> Result<SigningKey, SecretStoreError> {
        if kid == self.key.kid {
            Ok(self.key.clone())
        } else {
            Err(SecretStoreError::UnknownKeyId(kid.to_string()))
        }
    }
}

fn scopes(values: &[&str]) -> HashSet<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// A harness that exposes every repository so scenarios can seed fixtures
/// and inspect post-conditions.
struct FullHarness {
    broker: AccessBroker,
    agents: Arc<InMemoryAgentRepository>,
    tools: Arc<InMemoryToolRepository>,
    policies: Arc<InMemoryPolicyRepository>,
    access_requests: Arc<InMemoryAccessRequestRepository>,
    access_logs: Arc<InMemoryAccessLogRepository>,
    clock: Arc<TestClock>,
}

fn full_harness(rate_limit: u32, rate_limit_window_seconds: u64) -> FullHarness {
    let agents = Arc::new(InMemoryAgentRepository::new());
    let tools = Arc::new(InMemoryToolRepository::new());
    let policies = Arc::new(InMemoryPolicyRepository::new());
    let access_requests = Arc::new(InMemoryAccessRequestRepository::new());
    let access_logs = Arc::new(InMemoryAccessLogRepository::new());
    let clock = Arc::new(TestClock::at(Utc::now()));

    let rate_limiter = Arc::new(LocalRateLimiter::new(1024));
    let policy_engine = Arc::new(PolicyEngine::new(policies.clone() as Arc<dyn PolicyRepository>, rate_limiter.clone(), 86_400));
    let credential_vendor = Arc::new(CredentialVendor::new(
        Arc::new(InMemoryCredentialRepository::new()),
        access_logs.clone() as Arc<dyn AccessLogRepository>,
        Arc::new(TestSecretStore::new()),
        clock.clone(),
    ));

    let broker = AccessBroker::new(
        agents.clone() as Arc<dyn AgentRepository>,
        tools.clone() as Arc<dyn ToolRepository>,
        access_requests.clone() as Arc<dyn AccessRequestRepository>,
        access_logs.clone() as Arc<dyn AccessLogRepository>,
        rate_limiter,
        policy_engine,
        credential_vendor,
        clock.clone(),
        rate_limit,
        rate_limit_window_seconds,
    );

    FullHarness { broker, agents, tools, policies, access_requests, access_logs, clock }
}

fn make_tool(now: chrono::DateTime<Utc>, owner: AgentId) -> Tool {
    Tool::new("T1", "a tool", "1.0.0", owner, scopes(&["read", "write"]), now)
}

fn make_policy(tool_id: toolbroker_core::domain::tool::ToolId, created_by: AgentId, now: chrono::DateTime<Utc>) -> Policy {
    Policy::new(
        "P1",
        Some(tool_id),
        created_by,
        scopes(&["read", "write"]),
        PolicyConditions { required_roles: Some(scopes(&["tool_user"])), ..Default::default() },
        PolicyRules { max_credential_lifetime_seconds: Some(3600), ..Default::default() },
        10,
        now,
    )
    .unwrap()
}

#[tokio::test]
async fn s1_happy_path() {
    let h = full_harness(100, 60);
    let owner = Agent::new("owner", "owner", scopes(&[]), h.clock.now());
    let agent = Agent::new("A1", "agent one", scopes(&["tool_user"]), h.clock.now());
    h.agents.save(&owner).await.unwrap();
    h.agents.save(&agent).await.unwrap();

    let tool = make_tool(h.clock.now(), owner.id);
    h.tools.save(&tool).await.unwrap();

    let policy = make_policy(tool.id, owner.id, h.clock.now());
    h.policies.save(&policy).await.unwrap();

    let output = h
        .broker
        .request_access(RequestAccessInput {
            agent_id: agent.id,
            tool_id: tool.id,
            requested_scopes: scopes(&["read"]),
            requested_lifetime_seconds: Some(7200),
            justification: None,
            idempotency_key: None,
            remote_ip: None,
            user_agent: None,
        })
        .await
        .unwrap();

    assert_eq!(output.status, DecisionOutcome::Allow);
    let credential = output.credential.expect("allow must carry a credential");
    assert_eq!(credential.granted_scopes, scopes(&["read"]));
    assert_eq!((credential.expires_at - h.clock.now()).num_seconds(), 3600);

    let logs = h.access_logs.list_for_agent(agent.id, 10).await.unwrap();
    let issued = logs.iter().filter(|l| l.event == toolbroker_core::domain::access_log::AccessEvent::CredentialIssued).count();
    assert_eq!(issued, 1);
}

#[tokio::test]
async fn s2_deny_by_role() {
    let h = full_harness(100, 60);
    let owner = Agent::new("owner", "owner", scopes(&[]), h.clock.now());
    let agent = Agent::new("A2", "agent two", scopes(&["guest"]), h.clock.now());
    h.agents.save(&owner).await.unwrap();
    h.agents.save(&agent).await.unwrap();

    let tool = make_tool(h.clock.now(), owner.id);
    h.tools.save(&tool).await.unwrap();
    let policy = make_policy(tool.id, owner.id, h.clock.now());
    h.policies.save(&policy).await.unwrap();

    let output = h
        .broker
        .request_access(RequestAccessInput {
            agent_id: agent.id,
            tool_id: tool.id,
            requested_scopes: scopes(&["read"]),
            requested_lifetime_seconds: None,
            justification: None,
            idempotency_key: None,
            remote_ip: None,
            user_agent: None,
        })
        .await
        .unwrap();

    assert_eq!(output.status, DecisionOutcome::Deny);
    assert_eq!(output.reason_code, ReasonCode::NoPolicyMatch);
    assert!(output.credential.is_none());

    let logs = h.access_logs.list_for_agent(agent.id, 10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].decision, toolbroker_core::domain::access_log::AccessDecision::Deny);
}

#[tokio::test]
async fn s3_scope_narrowing() {
    let h = full_harness(100, 60);
    let owner = Agent::new("owner", "owner", scopes(&[]), h.clock.now());
    let agent = Agent::new("A1", "agent", scopes(&["tool_user"]), h.clock.now());
    h.agents.save(&owner).await.unwrap();
    h.agents.save(&agent).await.unwrap();

    let tool = make_tool(h.clock.now(), owner.id);
    h.tools.save(&tool).await.unwrap();

    let policy = Policy::new(
        "P-narrow",
        Some(tool.id),
        owner.id,
        scopes(&["read"]),
        PolicyConditions { required_roles: Some(scopes(&["tool_user"])), ..Default::default() },
        PolicyRules::default(),
        10,
        h.clock.now(),
    )
    .unwrap();
    h.policies.save(&policy).await.unwrap();

    let output = h
        .broker
        .request_access(RequestAccessInput {
            agent_id: agent.id,
            tool_id: tool.id,
            requested_scopes: scopes(&["read", "write"]),
            requested_lifetime_seconds: None,
            justification: None,
            idempotency_key: None,
            remote_ip: None,
            user_agent: None,
        })
        .await
        .unwrap();

    assert_eq!(output.status, DecisionOutcome::Allow);
    assert_eq!(output.credential.unwrap().granted_scopes, scopes(&["read"]));
}

#[tokio::test]
async fn s4_approval_required() {
    let h = full_harness(100, 60);
    let owner = Agent::new("owner", "owner", scopes(&[]), h.clock.now());
    let agent = Agent::new("A1", "agent", scopes(&["tool_user"]), h.clock.now());
    h.agents.save(&owner).await.unwrap();
    h.agents.save(&agent).await.unwrap();

    let tool = make_tool(h.clock.now(), owner.id);
    h.tools.save(&tool).await.unwrap();

    let policy = Policy::new(
        "P-approval",
        Some(tool.id),
        owner.id,
        scopes(&["read"]),
        PolicyConditions { required_roles: Some(scopes(&["tool_user"])), ..Default::default() },
        PolicyRules { require_approval: true, ..Default::default() },
        10,
        h.clock.now(),
    )
    .unwrap();
    h.policies.save(&policy).await.unwrap();

    let output = h
        .broker
        .request_access(RequestAccessInput {
            agent_id: agent.id,
            tool_id: tool.id,
            requested_scopes: scopes(&["read"]),
            requested_lifetime_seconds: None,
            justification: None,
            idempotency_key: None,
            remote_ip: None,
            user_agent: None,
        })
        .await
        .unwrap();

    assert_eq!(output.status, DecisionOutcome::PendingApproval);
    assert!(output.credential.is_none());
    let request_id = output.request_id.expect("pending approval must return a request id");

    let stored = h.access_requests.find_by_id(request_id).await.unwrap().expect("request must be retrievable");
    assert_eq!(stored.status, toolbroker_core::domain::access_request::AccessRequestStatus::Pending);
}

#[tokio::test]
async fn s5_rate_limit() {
    let h = full_harness(2, 60);
    let owner = Agent::new("owner", "owner", scopes(&[]), h.clock.now());
    let agent = Agent::new("A1", "agent", scopes(&["tool_user"]), h.clock.now());
    h.agents.save(&owner).await.unwrap();
    h.agents.save(&agent).await.unwrap();

    let tool = make_tool(h.clock.now(), owner.id);
    h.tools.save(&tool).await.unwrap();
    let policy = make_policy(tool.id, owner.id, h.clock.now());
    h.policies.save(&policy).await.unwrap();

    let mut outcomes = Vec::new();
    for _ in 0..3 {
        let out = h
            .broker
            .request_access(RequestAccessInput {
                agent_id: agent.id,
                tool_id: tool.id,
                requested_scopes: scopes(&["read"]),
                requested_lifetime_seconds: None,
                justification: None,
                idempotency_key: None,
                remote_ip: None,
                user_agent: None,
            })
            .await
            .unwrap();
        outcomes.push(out);
    }

    assert_eq!(outcomes[0].status, DecisionOutcome::Allow);
    assert_eq!(outcomes[1].status, DecisionOutcome::Allow);
    assert_eq!(outcomes[2].status, DecisionOutcome::Deny);
    assert_eq!(outcomes[2].reason_code, ReasonCode::RateLimited);
    assert!(outcomes[2].retry_after_seconds.unwrap() > 0);

    let logs = h.access_logs.list_for_agent(agent.id, 10).await.unwrap();
    let rate_limited = logs.iter().filter(|l| l.reason_code == ReasonCode::RateLimited).count();
    assert_eq!(rate_limited, 1);
}

#[tokio::test]
async fn s6_revocation() {
    let h = full_harness(100, 60);
    let owner = Agent::new("owner", "owner", scopes(&[]), h.clock.now());
    let agent = Agent::new("A1", "agent", scopes(&["tool_user"]), h.clock.now());
    h.agents.save(&owner).await.unwrap();
    h.agents.save(&agent).await.unwrap();

    let tool = make_tool(h.clock.now(), owner.id);
    h.tools.save(&tool).await.unwrap();
    let policy = make_policy(tool.id, owner.id, h.clock.now());
    h.policies.save(&policy).await.unwrap();

    let issued = h
        .broker
        .request_access(RequestAccessInput {
            agent_id: agent.id,
            tool_id: tool.id,
            requested_scopes: scopes(&["read"]),
            requested_lifetime_seconds: Some(3600),
            justification: None,
            idempotency_key: None,
            remote_ip: None,
            user_agent: None,
        })
        .await
        .unwrap()
        .credential
        .unwrap();

    h.clock.advance(chrono::Duration::seconds(100));
    let first = h.broker.validate(&issued.token, None).await;
    assert!(first.valid);

    h.clock.advance(chrono::Duration::seconds(100));
    h.broker.revoke(issued.credential_id).await.unwrap();

    h.clock.advance(chrono::Duration::seconds(100));
    let second = h.broker.validate(&issued.token, None).await;
    assert!(!second.valid);
}

// Property tests (spec section 8)

#[tokio::test]
async fn property_deterministic_evaluation() {
    let h = full_harness(100, 60);
    let owner = Agent::new("owner", "owner", scopes(&[]), h.clock.now());
    let agent = Agent::new("A1", "agent", scopes(&["tool_user"]), h.clock.now());
    h.agents.save(&owner).await.unwrap();
    h.agents.save(&agent).await.unwrap();
    let tool = make_tool(h.clock.now(), owner.id);
    h.tools.save(&tool).await.unwrap();
    let policy = make_policy(tool.id, owner.id, h.clock.now());
    h.policies.save(&policy).await.unwrap();

    let mut last = None;
    for _ in 0..5 {
        let out = h
            .broker
            .request_access(RequestAccessInput {
                agent_id: agent.id,
                tool_id: tool.id,
                requested_scopes: scopes(&["read"]),
                requested_lifetime_seconds: Some(1800),
                justification: None,
                idempotency_key: None,
                remote_ip: None,
                user_agent: None,
            })
            .await
            .unwrap();
        if let Some(prev) = &last {
            assert_eq!(format!("{:?}", prev), format!("{:?}", out.status));
        }
        last = Some(out.status);
    }
}

#[tokio::test]
async fn property_scope_intersection_never_exceeds_bounds() {
    let h = full_harness(100, 60);
    let owner = Agent::new("owner", "owner", scopes(&[]), h.clock.now());
    let agent = Agent::new("A1", "agent", scopes(&["tool_user"]), h.clock.now());
    h.agents.save(&owner).await.unwrap();
    h.agents.save(&agent).await.unwrap();
    let tool = make_tool(h.clock.now(), owner.id); // tool.allowed_scopes = {read, write}
    h.tools.save(&tool).await.unwrap();
    let policy = Policy::new(
        "P1",
        Some(tool.id),
        owner.id,
        scopes(&["read"]), // policy only allows read
        PolicyConditions { required_roles: Some(scopes(&["tool_user"])), ..Default::default() },
        PolicyRules::default(),
        10,
        h.clock.now(),
    )
    .unwrap();
    h.policies.save(&policy).await.unwrap();

    let out = h
        .broker
        .request_access(RequestAccessInput {
            agent_id: agent.id,
            tool_id: tool.id,
            requested_scopes: scopes(&["read", "write", "admin"]),
            requested_lifetime_seconds: None,
            justification: None,
            idempotency_key: None,
            remote_ip: None,
            user_agent: None,
        })
        .await
        .unwrap();

    let granted = out.credential.unwrap().granted_scopes;
    assert!(granted.is_subset(&scopes(&["read"])));
}

#[tokio::test]
async fn property_credential_lifetime_bound() {
    let h = full_harness(100, 60);
    let owner = Agent::new("owner", "owner", scopes(&[]), h.clock.now());
    let agent = Agent::new("A1", "agent", scopes(&["tool_user"]), h.clock.now());
    h.agents.save(&owner).await.unwrap();
    h.agents.save(&agent).await.unwrap();
    let tool = make_tool(h.clock.now(), owner.id);
    h.tools.save(&tool).await.unwrap();
    let policy = make_policy(tool.id, owner.id, h.clock.now()); // max 3600
    h.policies.save(&policy).await.unwrap();

    let out = h
        .broker
        .request_access(RequestAccessInput {
            agent_id: agent.id,
            tool_id: tool.id,
            requested_scopes: scopes(&["read"]),
            requested_lifetime_seconds: Some(999_999),
            justification: None,
            idempotency_key: None,
            remote_ip: None,
            user_agent: None,
        })
        .await
        .unwrap();

    let credential = out.credential.unwrap();
    assert!((credential.expires_at - h.clock.now()).num_seconds() <= 3600);
}

#[tokio::test]
async fn property_idempotency_returns_same_credential() {
    let h = full_harness(100, 60);
    let owner = Agent::new("owner", "owner", scopes(&[]), h.clock.now());
    let agent = Agent::new("A1", "agent", scopes(&["tool_user"]), h.clock.now());
    h.agents.save(&owner).await.unwrap();
    h.agents.save(&agent).await.unwrap();
    let tool = make_tool(h.clock.now(), owner.id);
    h.tools.save(&tool).await.unwrap();
    let policy = make_policy(tool.id, owner.id, h.clock.now());
    h.policies.save(&policy).await.unwrap();

    let input = || RequestAccessInput {
        agent_id: agent.id,
        tool_id: tool.id,
        requested_scopes: scopes(&["read"]),
        requested_lifetime_seconds: Some(1800),
        justification: None,
        idempotency_key: Some("key-1".to_string()),
        remote_ip: None,
        user_agent: None,
    };

    let first = h.broker.request_access(input()).await.unwrap();
    let second = h.broker.request_access(input()).await.unwrap();

    assert_eq!(
        first.credential.unwrap().credential_id,
        second.credential.unwrap().credential_id,
        "same idempotency key must not mint a second credential"
    );
}
