// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HTTP client for the broker's hot path: `RequestAccess` and `Validate`.
//! CRUD (`/agents`, `/tools`, `/policies`) is deliberately out of scope for
//! the agent-facing SDK — that surface belongs to operator tooling.

use std::collections::HashSet;

use reqwest::Client;
use uuid::Uuid;

use crate::types::{AccessDecision, AccessRequest, ErrorBody, ValidateResponse};

#[derive(Debug, thiserror::Error)]
pub enum BrokerClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("access denied: {detail} ({reason_code})")]
    Denied { detail: String, reason_code: String },
    #[error("rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },
    #[error("unexpected response ({status}): {body}")]
    Unexpected { status: u16, body: String },
}

/// Thin wrapper over the broker's `/access/*` endpoints.
pub struct ToolBrokerClient {
    base_url: String,
    client: Client,
}

impl ToolBrokerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), client: Client::new() }
    }

    pub async fn request_access(
        &self,
        agent_id: Uuid,
        tool_id: Uuid,
        requested_scopes: HashSet<String>,
        requested_lifetime_seconds: Option<u64>,
    ) -> Result<AccessDecision, BrokerClientError> {
        let body = AccessRequest {
            agent_id,
            tool_id,
            requested_scopes,
            requested_lifetime_seconds,
            justification: None,
            idempotency_key: None,
        };

        let response = self.client.post(format!("{}/access/request", self.base_url)).json(&body).send().await?;
        self.decode(response).await
    }

    pub async fn validate(&self, token: &str, scope: Option<&str>) -> Result<ValidateResponse, BrokerClientError> {
        let mut url = format!("{}/access/validate", self.base_url);
        if let Some(scope) = scope {
            url.push_str(&format!("?scope={scope}"));
        }

        let response = self.client.post(url).bearer_auth(token).send().await?;
        self.decode(response).await
    }

    pub async fn revoke(&self, credential_id: Uuid) -> Result<(), BrokerClientError> {
        let response = self.client.post(format!("{}/credentials/{}/revoke", self.base_url, credential_id)).send().await?;
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(BrokerClientError::Unexpected { status, body })
    }

    async fn decode<T: serde::de::DeserializeOwned>(&self, response: reqwest::Response) -> Result<T, BrokerClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let retry_after_seconds = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        let body = response.json::<ErrorBody>().await.ok();
        match (status.as_u16(), retry_after_seconds, body) {
            (429, Some(retry_after_seconds), _) => Err(BrokerClientError::RateLimited { retry_after_seconds }),
            (_, _, Some(err)) => Err(BrokerClientError::Denied { detail: err.detail, reason_code: err.reason_code }),
            (status, _, None) => Err(BrokerClientError::Unexpected { status, body: String::new() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn request_access_decodes_an_approved_decision() {
        let server = MockServer::start().await;
        let credential_id = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path("/access/request"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "APPROVED",
                "credential": {
                    "token": "signed.jwt.token",
                    "expires_at": "2026-01-01T00:10:00Z",
                    "granted_scopes": ["read"],
                    "credential_id": credential_id.to_string(),
                },
                "request_id": null,
                "matched_policy_id": null,
            })))
            .mount(&server)
            .await;

        let client = ToolBrokerClient::new(server.uri());
        let decision = client
            .request_access(Uuid::new_v4(), Uuid::new_v4(), HashSet::from(["read".to_string()]), None)
            .await
            .unwrap();

        assert!(decision.is_approved());
        assert_eq!(decision.credential.unwrap().token, "signed.jwt.token");
    }

    #[tokio::test]
    async fn request_access_rate_limited_surfaces_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/access/request"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "30")
                    .set_body_json(json!({"detail": "rate limited", "reason_code": "RATE_LIMITED", "correlation_id": Uuid::new_v4().to_string()})),
            )
            .mount(&server)
            .await;

        let client = ToolBrokerClient::new(server.uri());
        let err = client.request_access(Uuid::new_v4(), Uuid::new_v4(), HashSet::new(), None).await.unwrap_err();

        match err {
            BrokerClientError::RateLimited { retry_after_seconds } => assert_eq!(retry_after_seconds, 30),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn request_access_denied_surfaces_reason_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/access/request"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "detail": "no policy matched",
                "reason_code": "NO_POLICY_MATCH",
                "correlation_id": Uuid::new_v4().to_string(),
            })))
            .mount(&server)
            .await;

        let client = ToolBrokerClient::new(server.uri());
        let err = client.request_access(Uuid::new_v4(), Uuid::new_v4(), HashSet::new(), None).await.unwrap_err();

        match err {
            BrokerClientError::Denied { reason_code, .. } => assert_eq!(reason_code, "NO_POLICY_MATCH"),
            other => panic!("expected Denied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn validate_sends_bearer_token_and_decodes_response() {
        let server = MockServer::start().await;
        let agent_id = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path("/access/validate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "valid": true,
                "agent_id": agent_id,
                "tool_id": null,
                "scopes": ["read"],
                "expires_at": null,
            })))
            .mount(&server)
            .await;

        let client = ToolBrokerClient::new(server.uri());
        let result = client.validate("some.jwt.token", Some("read")).await.unwrap();

        assert!(result.valid);
        assert_eq!(result.agent_id, Some(agent_id));
    }

    #[tokio::test]
    async fn revoke_succeeds_on_2xx() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(204)).mount(&server).await;

        let client = ToolBrokerClient::new(server.uri());
        client.revoke(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn revoke_propagates_unexpected_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(500).set_body_string("boom")).mount(&server).await;

        let client = ToolBrokerClient::new(server.uri());
        let err = client.revoke(Uuid::new_v4()).await.unwrap_err();

        match err {
            BrokerClientError::Unexpected { status, .. } => assert_eq!(status, 500),
            other => panic!("expected Unexpected, got {other:?}"),
        }
    }
}
