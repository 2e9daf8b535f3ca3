// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HTTP surface for the broker's hot path: `RequestAccess`, `Validate`,
//! credential revocation, and the access-log query.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::application::access_broker::{AccessBroker, RequestAccessInput};
use crate::domain::access_log::{AccessDecision, AccessEvent};
use crate::domain::access_request::AccessRequestId;
use crate::domain::agent::AgentId;
use crate::domain::clock::Clock;
use crate::domain::credential::CredentialId;
use crate::domain::decision::DecisionOutcome;
use crate::domain::error::BrokerError;
use crate::domain::repository::{AccessLogRepository, AccessRequestRepository};
use crate::domain::tool::ToolId;
use crate::presentation::error::ApiError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ApiState {
    pub broker: Arc<AccessBroker>,
    pub access_requests: Arc<dyn AccessRequestRepository>,
    pub access_logs: Arc<dyn AccessLogRepository>,
    pub clock: Arc<dyn Clock>,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/access/request", post(request_access))
        .route("/access/validate", post(validate))
        .route("/access/requests/{id}", get(get_access_request))
        .route("/credentials/{id}/revoke", post(revoke_credential))
        .route("/access/logs", get(list_access_logs))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(TimeoutLayer::new(REQUEST_TIMEOUT)).layer(CorsLayer::permissive()))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct RequestAccessBody {
    agent_id: String,
    tool_id: String,
    requested_scopes: HashSet<String>,
    requested_lifetime_seconds: Option<u64>,
    justification: Option<String>,
    idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct CredentialBody {
    token: String,
    expires_at: DateTime<Utc>,
    granted_scopes: HashSet<String>,
    credential_id: String,
}

#[derive(Debug, Serialize)]
struct RequestAccessBody2 {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    credential: Option<CredentialBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    matched_policy_id: Option<String>,
}

fn outcome_str(outcome: DecisionOutcome) -> &'static str {
    match outcome {
        DecisionOutcome::Allow => "APPROVED",
        DecisionOutcome::Deny => "DENIED",
        DecisionOutcome::PendingApproval => "PENDING_APPROVAL",
    }
}

fn remote_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers.get("x-forwarded-for")?.to_str().ok()?.split(',').next()?.trim().parse().ok()
}

async fn request_access(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<RequestAccessBody>,
) -> Result<impl IntoResponse, ApiError> {
    let agent_id = AgentId::from_string(&body.agent_id).map_err(|_| BrokerError::InvalidInput("agent_id".to_string()))?;
    let tool_id = ToolId::from_string(&body.tool_id).map_err(|_| BrokerError::InvalidInput("tool_id".to_string()))?;
    let user_agent = headers.get(axum::http::header::USER_AGENT).and_then(|v| v.to_str().ok()).map(|s| s.to_string());

    let input = RequestAccessInput {
        agent_id,
        tool_id,
        requested_scopes: body.requested_scopes,
        requested_lifetime_seconds: body.requested_lifetime_seconds,
        justification: body.justification,
        idempotency_key: body.idempotency_key,
        remote_ip: remote_ip(&headers),
        user_agent,
    };

    let output = state.broker.request_access(input).await?;

    if output.status == DecisionOutcome::Deny {
        if let Some(retry_after_seconds) = output.retry_after_seconds {
            return Err(BrokerError::RateLimited { retry_after_seconds }.into());
        }
        return Err(BrokerError::Denied(output.reason_code).into());
    }

    let body = RequestAccessBody2 {
        status: outcome_str(output.status),
        credential: output.credential.map(|c| CredentialBody {
            token: c.token,
            expires_at: c.expires_at,
            granted_scopes: c.granted_scopes,
            credential_id: c.credential_id.0.to_string(),
        }),
        request_id: output.request_id.map(|r| r.0.to_string()),
        matched_policy_id: output.matched_policy_id.map(|p| p.0.to_string()),
    };
    Ok((StatusCode::OK, Json(body)))
}

#[derive(Debug, Deserialize)]
struct ValidateQuery {
    scope: Option<String>,
}

#[derive(Debug, Serialize)]
struct ValidateBody {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scopes: Option<HashSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

async fn validate(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ValidateQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(BrokerError::Unauthorized)?;

    let outcome = state.broker.validate(token, query.scope.as_deref()).await;
    if !outcome.valid {
        return Err(BrokerError::Unauthorized.into());
    }

    Ok((
        StatusCode::OK,
        Json(ValidateBody {
            valid: true,
            agent_id: outcome.agent_id.map(|a| a.0.to_string()),
            tool_id: outcome.tool_id.map(|t| t.0.to_string()),
            scopes: outcome.scopes,
            expires_at: outcome.expires_at,
        }),
    ))
}

async fn revoke_credential(State(state): State<Arc<ApiState>>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let credential_id = CredentialId::from_string(&id).map_err(|_| BrokerError::InvalidInput("credential id".to_string()))?;
    state.broker.revoke(credential_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_access_request(State(state): State<Arc<ApiState>>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let request_id = AccessRequestId::from_string(&id).map_err(|_| BrokerError::InvalidInput("request id".to_string()))?;
    let mut request = state
        .access_requests
        .find_by_id(request_id)
        .await
        .map_err(BrokerError::from)?
        .ok_or_else(|| BrokerError::NotFound(format!("access request {request_id} not found")))?;

    let now = state.clock.now();
    if request.is_expired(now) {
        request.expire(now);
        state.access_requests.save(&request).await.map_err(BrokerError::from)?;
    }

    Ok((StatusCode::OK, Json(request)))
}

#[derive(Debug, Deserialize)]
struct AccessLogQuery {
    agent_id: Option<String>,
    tool_id: Option<String>,
    event: Option<String>,
    decision: Option<String>,
    limit: Option<usize>,
}

async fn list_access_logs(State(state): State<Arc<ApiState>>, Query(query): Query<AccessLogQuery>) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(50).min(500);

    let mut items = if let Some(agent_id) = &query.agent_id {
        let agent_id = AgentId::from_string(agent_id).map_err(|_| BrokerError::InvalidInput("agent_id".to_string()))?;
        state.access_logs.list_for_agent(agent_id, limit).await.map_err(BrokerError::from)?
    } else if let Some(tool_id) = &query.tool_id {
        let tool_id = ToolId::from_string(tool_id).map_err(|_| BrokerError::InvalidInput("tool_id".to_string()))?;
        state.access_logs.list_for_tool(tool_id, limit).await.map_err(BrokerError::from)?
    } else {
        return Err(BrokerError::InvalidInput("one of agent_id or tool_id is required".to_string()).into());
    };

    if let Some(event) = &query.event {
        items.retain(|log| format!("{:?}", log.event) == *event || matches_access_event(log.event, event));
    }
    if let Some(decision) = &query.decision {
        items.retain(|log| matches_access_decision(log.decision, decision));
    }

    Ok((StatusCode::OK, Json(serde_json::json!({ "items": items, "next_cursor": serde_json::Value::Null }))))
}

fn matches_access_event(event: AccessEvent, wanted: &str) -> bool {
    let wanted = wanted.to_uppercase();
    match event {
        AccessEvent::RequestEvaluated => wanted == "REQUEST_EVALUATED",
        AccessEvent::CredentialIssued => wanted == "CREDENTIAL_ISSUED",
        AccessEvent::CredentialValidated => wanted == "CREDENTIAL_VALIDATED",
        AccessEvent::CredentialRevoked => wanted == "CREDENTIAL_REVOKED",
        AccessEvent::RateLimited => wanted == "RATE_LIMITED",
    }
}

fn matches_access_decision(decision: AccessDecision, wanted: &str) -> bool {
    let wanted = wanted.to_uppercase();
    match decision {
        AccessDecision::Allow => wanted == "ALLOW",
        AccessDecision::Deny => wanted == "DENY",
        AccessDecision::PendingApproval => wanted == "PENDING_APPROVAL",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::credential_vendor::CredentialVendor;
    use crate::application::policy_engine::PolicyEngine;
    use crate::domain::clock::{Clock, TestClock};
    use crate::domain::secret_store::{SecretStore, SecretStoreError, SigningAlgorithm, SigningKey};
    use crate::infrastructure::rate_limit_backend::LocalRateLimiter;
    use crate::infrastructure::repositories::{
        InMemoryAccessLogRepository, InMemoryAccessRequestRepository, InMemoryAgentRepository, InMemoryCredentialRepository,
        InMemoryPolicyRepository, InMemoryToolRepository,
    };
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct StubSecretStore;

    #[async_trait]
    impl SecretStore for StubSecretStore {
        async fn active_signing_key(&self) -> Result<SigningKey, SecretStoreError> {
            Ok(SigningKey { kid: "stub".to_string(), algorithm: SigningAlgorithm::Hs256, material: vec![9u8; 32] })
        }
        async fn signing_key(&self, kid: &str) -> Result<SigningKey, SecretStoreError> {
            if kid == "stub" {
                self.active_signing_key().await
            } else {
                Err(SecretStoreError::UnknownKeyId(kid.to_string()))
            }
        }
    }

    fn test_state() -> Arc<ApiState> {
        let agents: Arc<InMemoryAgentRepository> = Arc::new(InMemoryAgentRepository::new());
        let tools: Arc<InMemoryToolRepository> = Arc::new(InMemoryToolRepository::new());
        let policies: Arc<InMemoryPolicyRepository> = Arc::new(InMemoryPolicyRepository::new());
        let access_requests: Arc<InMemoryAccessRequestRepository> = Arc::new(InMemoryAccessRequestRepository::new());
        let access_logs: Arc<InMemoryAccessLogRepository> = Arc::new(InMemoryAccessLogRepository::new());
        let credentials: Arc<InMemoryCredentialRepository> = Arc::new(InMemoryCredentialRepository::new());
        let clock: Arc<TestClock> = Arc::new(TestClock::at(chrono::Utc::now()));
        let rate_limiter = Arc::new(LocalRateLimiter::new(1_000));

        let policy_engine = Arc::new(PolicyEngine::new(policies.clone(), rate_limiter.clone(), 86_400));
        let credential_vendor =
            Arc::new(CredentialVendor::new(credentials, access_logs.clone(), Arc::new(StubSecretStore), clock.clone() as Arc<dyn Clock>));

        let broker = Arc::new(AccessBroker::new(
            agents,
            tools,
            access_requests.clone(),
            access_logs.clone(),
            rate_limiter,
            policy_engine,
            credential_vendor,
            clock.clone(),
            100,
            60,
        ));

        Arc::new(ApiState { broker, access_requests, access_logs, clock })
    }

    #[tokio::test]
    async fn validate_without_bearer_token_is_unauthorized() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().method("POST").uri("/access/validate").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn validate_with_garbage_token_is_unauthorized() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/access/validate")
                    .header("authorization", "Bearer not-a-real-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
