// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Issues, validates and revokes short-lived JWS bearer credentials.

use std::collections::HashSet;
use std::sync::Arc;

use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::warn;

use crate::domain::access_log::{AccessDecision, AccessEvent, AccessLogBuilder, ReasonCode};
use crate::domain::agent::AgentId;
use crate::domain::clock::Clock;
use crate::domain::credential::{Credential, CredentialId, TokenFingerprint};
use crate::domain::policy::PolicyId;
use crate::domain::repository::{AccessLogRepository, CredentialRepository};
use crate::domain::secret_store::{SecretStore, SigningAlgorithm, SigningKey};
use crate::domain::tool::ToolId;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    aud: String,
    scopes: Vec<String>,
    jti: String,
    iat: i64,
    exp: i64,
}

pub struct IssueOutput {
    pub credential_id: CredentialId,
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct ValidateOutcome {
    pub valid: bool,
    pub credential_id: Option<CredentialId>,
    pub agent_id: Option<AgentId>,
    pub tool_id: Option<ToolId>,
    pub scopes: Option<HashSet<String>>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub reason_code: ReasonCode,
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialVendorError {
    #[error("keystore unavailable")]
    KeystoreUnavailable,
    #[error("store unavailable")]
    StoreUnavailable,
    #[error("audit log entry failed validation: {0}")]
    InvalidAuditLog(String),
}

pub struct CredentialVendor {
    credentials: Arc<dyn CredentialRepository>,
    access_logs: Arc<dyn AccessLogRepository>,
    secrets: Arc<dyn SecretStore>,
    clock: Arc<dyn Clock>,
}

impl CredentialVendor {
    pub fn new(
        credentials: Arc<dyn CredentialRepository>,
        access_logs: Arc<dyn AccessLogRepository>,
        secrets: Arc<dyn SecretStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { credentials, access_logs, secrets, clock }
    }

    pub async fn issue(
        &self,
        request_id: uuid::Uuid,
        agent_id: AgentId,
        tool_id: ToolId,
        scopes: HashSet<String>,
        lifetime_seconds: u64,
        source_policy_id: PolicyId,
        source_request_id: Option<crate::domain::access_request::AccessRequestId>,
    ) -> Result<IssueOutput, CredentialVendorError> {
        let key = self.secrets.active_signing_key().await.map_err(|_| CredentialVendorError::KeystoreUnavailable)?;

        let mut raw = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut raw);

        let issued_at = self.clock.now();
        let expires_at = issued_at + chrono::Duration::seconds(lifetime_seconds as i64);
        let credential_id = CredentialId::new();

        let claims = Claims {
            sub: agent_id.0.to_string(),
            aud: tool_id.0.to_string(),
            scopes: scopes.iter().cloned().collect(),
            jti: credential_id.0.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = sign(&key, &claims).map_err(|_| CredentialVendorError::KeystoreUnavailable)?;
        let fingerprint = fingerprint_of(&key, &token);

        let credential = Credential {
            id: credential_id,
            agent_id,
            tool_id,
            granted_scopes: scopes.clone(),
            fingerprint,
            issued_at,
            expires_at,
            revoked_at: None,
            source_policy_id,
            source_request_id,
        };

        self.credentials.save(&credential).await.map_err(|_| CredentialVendorError::StoreUnavailable)?;

        let log = crate::domain::access_log::AccessLog::new(
            request_id,
            agent_id,
            tool_id,
            AccessEvent::CredentialIssued,
            AccessDecision::Allow,
            ReasonCode::Approved,
            issued_at,
            AccessLogBuilder { credential_id: Some(credential_id), granted_scopes: scopes, policy_id: Some(source_policy_id), ..Default::default() },
        );
        log.validate().map_err(|e| CredentialVendorError::InvalidAuditLog(e.to_string()))?;
        self.access_logs.append(&log).await.map_err(|_| CredentialVendorError::StoreUnavailable)?;

        Ok(IssueOutput { credential_id, token, expires_at })
    }

    pub async fn validate(&self, request_id: uuid::Uuid, token: &str, required_scope: Option<&str>) -> ValidateOutcome {
        let outcome = self.validate_inner(token, required_scope).await;

        if let (Some(agent_id), Some(tool_id)) = (outcome.agent_id, outcome.tool_id) {
            let log = crate::domain::access_log::AccessLog::new(
                request_id,
                agent_id,
                tool_id,
                AccessEvent::CredentialValidated,
                if outcome.valid { AccessDecision::Allow } else { AccessDecision::Deny },
                outcome.reason_code,
                self.clock.now(),
                AccessLogBuilder {
                    credential_id: outcome.credential_id,
                    granted_scopes: outcome.scopes.clone().unwrap_or_default(),
                    ..Default::default()
                },
            );
            if let Err(e) = log.validate() {
                warn!(error = %e, "dropping invalid audit log entry for credential validation");
            } else {
                let _ = self.access_logs.append(&log).await;
            }
        }

        outcome
    }

    async fn validate_inner(&self, token: &str, required_scope: Option<&str>) -> ValidateOutcome {
        let invalid = |reason_code: ReasonCode| ValidateOutcome {
            valid: false,
            credential_id: None,
            agent_id: None,
            tool_id: None,
            scopes: None,
            expires_at: None,
            reason_code,
        };

        let Ok(header) = decode_header(token) else {
            return invalid(ReasonCode::SignatureInvalid);
        };
        let Some(kid) = header.kid.clone() else {
            return invalid(ReasonCode::SignatureInvalid);
        };
        let Ok(key) = self.secrets.signing_key(&kid).await else {
            return invalid(ReasonCode::KeystoreUnavailable);
        };

        let Ok(claims) = verify(&key, token) else {
            return invalid(ReasonCode::SignatureInvalid);
        };

        let fingerprint = fingerprint_of(&key, token);
        let credential = match self.credentials.find_by_fingerprint(&fingerprint).await {
            Ok(Some(c)) => c,
            Ok(None) => return invalid(ReasonCode::NotFound),
            Err(_) => return invalid(ReasonCode::StoreUnavailable),
        };

        if credential.revoked_at.is_some() {
            return invalid(ReasonCode::Revoked);
        }
        let now = self.clock.now();
        if !credential.is_valid_at(now) {
            return invalid(ReasonCode::Expired);
        }
        if let Some(scope) = required_scope {
            if !credential.granted_scopes.contains(scope) {
                return invalid(ReasonCode::InsufficientScope);
            }
        }

        let _ = claims;
        ValidateOutcome {
            valid: true,
            credential_id: Some(credential.id),
            agent_id: Some(credential.agent_id),
            tool_id: Some(credential.tool_id),
            scopes: Some(credential.granted_scopes),
            expires_at: Some(credential.expires_at),
            reason_code: ReasonCode::Approved,
        }
    }

    pub async fn revoke(&self, request_id: uuid::Uuid, credential_id: CredentialId) -> Result<(), CredentialVendorError> {
        let Some(mut credential) = self
            .credentials
            .find_by_id(credential_id)
            .await
            .map_err(|_| CredentialVendorError::StoreUnavailable)?
        else {
            return Ok(()); // revoking an unknown id is treated as already-gone, idempotent
        };

        if credential.revoked_at.is_none() {
            credential.revoke(self.clock.now());
            self.credentials.save(&credential).await.map_err(|_| CredentialVendorError::StoreUnavailable)?;

            let log = crate::domain::access_log::AccessLog::new(
                request_id,
                credential.agent_id,
                credential.tool_id,
                AccessEvent::CredentialRevoked,
                AccessDecision::Allow,
                ReasonCode::Revoked,
                self.clock.now(),
                AccessLogBuilder { credential_id: Some(credential.id), ..Default::default() },
            );
            log.validate().map_err(|e| CredentialVendorError::InvalidAuditLog(e.to_string()))?;
            self.access_logs.append(&log).await.map_err(|_| CredentialVendorError::StoreUnavailable)?;
        }
        Ok(())
    }
}

fn sign(key: &SigningKey, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
    let mut header = Header::new(algorithm(key.algorithm));
    header.kid = Some(key.kid.clone());
    let encoding_key = match key.algorithm {
        SigningAlgorithm::Hs256 => EncodingKey::from_secret(&key.material),
        SigningAlgorithm::EdDsa => EncodingKey::from_ed_der(&key.material),
    };
    encode(&header, claims, &encoding_key)
}

fn verify(key: &SigningKey, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let alg = algorithm(key.algorithm);
    let decoding_key = match key.algorithm {
        SigningAlgorithm::Hs256 => DecodingKey::from_secret(&key.material),
        SigningAlgorithm::EdDsa => DecodingKey::from_ed_der(&key.material),
    };
    let mut validation = Validation::new(alg);
    validation.algorithms = vec![alg]; // reject `alg=none` and any algorithm confusion
    Ok(decode::<Claims>(token, &decoding_key, &validation)?.claims)
}

fn algorithm(alg: SigningAlgorithm) -> Algorithm {
    match alg {
        SigningAlgorithm::Hs256 => Algorithm::HS256,
        SigningAlgorithm::EdDsa => Algorithm::EdDSA,
    }
}

fn fingerprint_of(key: &SigningKey, token: &str) -> TokenFingerprint {
    let mut mac = HmacSha256::new_from_slice(&key.material).expect("HMAC accepts key of any length");
    mac.update(token.as_bytes());
    let computed = mac.finalize().into_bytes();
    TokenFingerprint(hex::encode(computed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::TestClock;
    use crate::infrastructure::repositories::{InMemoryAccessLogRepository, InMemoryCredentialRepository};
    use async_trait::async_trait;

    struct FixedSecretStore(SigningKey);

    #[async_trait]
    impl SecretStore for FixedSecretStore {
        async fn active_signing_key(&self) -> Result<SigningKey, crate::domain::secret_store::SecretStoreError> {
            Ok(self.0.clone())
        }
        async fn signing_key(&self, kid: &str) -> Result<SigningKey, crate::domain::secret_store::SecretStoreError> {
            if kid == self.0.kid {
                Ok(self.0.clone())
            } else {
                Err(crate::domain::secret_store::SecretStoreError::UnknownKeyId(kid.to_string()))
            }
        }
    }

    fn vendor(clock: Arc<TestClock>) -> CredentialVendor {
        let key = SigningKey { kid: "k1".to_string(), algorithm: SigningAlgorithm::Hs256, material: b"test-signing-key-material".to_vec() };
        CredentialVendor::new(
            Arc::new(InMemoryCredentialRepository::new()),
            Arc::new(InMemoryAccessLogRepository::new()),
            Arc::new(FixedSecretStore(key)),
            clock,
        )
    }

    #[tokio::test]
    async fn issue_then_validate_round_trips_granted_scopes() {
        let clock = Arc::new(TestClock::at(chrono::Utc::now()));
        let vendor = vendor(clock.clone());
        let agent_id = AgentId::new();
        let tool_id = ToolId::new();
        let scopes = HashSet::from(["read".to_string()]);

        let issued = vendor
            .issue(uuid::Uuid::new_v4(), agent_id, tool_id, scopes.clone(), 3600, PolicyId::new(), None)
            .await
            .unwrap();

        let outcome = vendor.validate(uuid::Uuid::new_v4(), &issued.token, None).await;
        assert!(outcome.valid);
        assert_eq!(outcome.scopes, Some(scopes));
    }

    #[tokio::test]
    async fn revoked_credential_fails_subsequent_validation() {
        let clock = Arc::new(TestClock::at(chrono::Utc::now()));
        let vendor = vendor(clock.clone());
        let issued = vendor
            .issue(uuid::Uuid::new_v4(), AgentId::new(), ToolId::new(), HashSet::from(["read".to_string()]), 3600, PolicyId::new(), None)
            .await
            .unwrap();

        clock.advance(chrono::Duration::seconds(100));
        assert!(vendor.validate(uuid::Uuid::new_v4(), &issued.token, None).await.valid);

        clock.advance(chrono::Duration::seconds(100));
        vendor.revoke(uuid::Uuid::new_v4(), issued.credential_id).await.unwrap();

        clock.advance(chrono::Duration::seconds(100));
        let outcome = vendor.validate(uuid::Uuid::new_v4(), &issued.token, None).await;
        assert!(!outcome.valid);
        assert_eq!(outcome.reason_code, ReasonCode::Revoked);
    }

    #[tokio::test]
    async fn missing_required_scope_is_rejected() {
        let clock = Arc::new(TestClock::at(chrono::Utc::now()));
        let vendor = vendor(clock.clone());
        let issued = vendor
            .issue(uuid::Uuid::new_v4(), AgentId::new(), ToolId::new(), HashSet::from(["read".to_string()]), 3600, PolicyId::new(), None)
            .await
            .unwrap();

        let outcome = vendor.validate(uuid::Uuid::new_v4(), &issued.token, Some("write")).await;
        assert!(!outcome.valid);
        assert_eq!(outcome.reason_code, ReasonCode::InsufficientScope);
    }
}
