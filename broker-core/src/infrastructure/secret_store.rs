// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `SecretStore` backends. `EnvSecretStore` bootstraps a single
//! HS256 key from `JWT_SECRET_KEY` for local/dev deployments.
//! `VaultSecretStore` fetches signing material from a KV v2 mount, keyed by
//! `kid`, for production deployments that rotate keys.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::Deserialize;
use vaultrs::client::VaultClient;
use vaultrs::kv2;

use crate::domain::secret_store::{SecretStore, SecretStoreError, SigningAlgorithm, SigningKey};

const ENV_KEY_ID: &str = "env-1";

/// Single static HS256 key read once from the environment at startup. No
/// rotation support — matches the spec's Phase 1 "environment variables
/// only" posture for local and CI deployments.
pub struct EnvSecretStore {
    key: SigningKey,
}

impl EnvSecretStore {
    pub fn from_env(var_name: &str) -> Result<Self, SecretStoreError> {
        let secret = std::env::var(var_name).map_err(|_| SecretStoreError::NoActiveKey)?;
        if secret.len() < 32 {
            return Err(SecretStoreError::Unavailable(format!("{var_name} must be at least 32 bytes")));
        }
        Ok(Self {
            key: SigningKey { kid: ENV_KEY_ID.to_string(), algorithm: SigningAlgorithm::Hs256, material: secret.into_bytes() },
        })
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
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

#[derive(Debug, Deserialize)]
struct VaultSigningKeyEntry {
    algorithm: String,
    /// Base64-encoded key material, matching how Vault KV stores opaque
    /// secret bytes as a string field.
    material_b64: String,
}

/// Backed by a KV v2 mount. The entry at `<mount>/active` names the
/// currently active `kid`; each key's material lives at `<mount>/keys/<kid>`.
/// Active-key lookups are cached for the process lifetime since rotation
/// requires a deploy in this design.
pub struct VaultSecretStore {
    client: VaultClient,
    mount: String,
    cache: RwLock<HashMap<String, SigningKey>>,
}

impl VaultSecretStore {
    pub fn new(client: VaultClient, mount: impl Into<String>) -> Self {
        Self { client, mount: mount.into(), cache: RwLock::new(HashMap::new()) }
    }

    async fn fetch(&self, kid: &str) -> Result<SigningKey, SecretStoreError> {
        if let Some(key) = self.cache.read().unwrap().get(kid) {
            return Ok(key.clone());
        }

        let path = format!("keys/{kid}");
        let entry: VaultSigningKeyEntry = kv2::read(&self.client, &self.mount, &path)
            .await
            .map_err(|err| SecretStoreError::Unavailable(err.to_string()))?;

        let algorithm = match entry.algorithm.as_str() {
            "HS256" => SigningAlgorithm::Hs256,
            "EdDSA" => SigningAlgorithm::EdDsa,
            other => return Err(SecretStoreError::Unavailable(format!("unsupported algorithm '{other}'"))),
        };
        let material = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &entry.material_b64)
            .map_err(|err| SecretStoreError::Unavailable(err.to_string()))?;

        let key = SigningKey { kid: kid.to_string(), algorithm, material };
        self.cache.write().unwrap().insert(kid.to_string(), key.clone());
        Ok(key)
    }
}

#[async_trait]
impl SecretStore for VaultSecretStore {
    async fn active_signing_key(&self) -> Result<SigningKey, SecretStoreError> {
        #[derive(Deserialize)]
        struct ActivePointer {
            kid: String,
        }
        let pointer: ActivePointer = kv2::read(&self.client, &self.mount, "active")
            .await
            .map_err(|err| SecretStoreError::Unavailable(err.to_string()))?;
        self.fetch(&pointer.kid).await
    }

    async fn signing_key(&self, kid: &str) -> Result<SigningKey, SecretStoreError> {
        self.fetch(kid).await
    }
}
