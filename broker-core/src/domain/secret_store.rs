// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Port for the signing keys behind minted credentials. Kept in the
//! domain layer alongside [`crate::domain::repository`] since both are
//! contracts the application layer depends on and infrastructure fulfills.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    Hs256,
    EdDsa,
}

#[derive(Debug, Clone)]
pub struct SigningKey {
    pub kid: String,
    pub algorithm: SigningAlgorithm,
    pub material: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum SecretStoreError {
    #[error("no active signing key configured")]
    NoActiveKey,
    #[error("unknown key id '{0}'")]
    UnknownKeyId(String),
    #[error("secret store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn active_signing_key(&self) -> Result<SigningKey, SecretStoreError>;
    async fn signing_key(&self, kid: &str) -> Result<SigningKey, SecretStoreError>;
}
