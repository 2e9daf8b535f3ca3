// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Thin HTTP client over the daemon's CRUD surface (`/agents`, `/tools`,
//! `/policies`). The hot path (`/access/*`) is handled by `toolbroker-sdk`'s
//! `ToolBrokerClient` instead — operator CRUD and agent-runtime access
//! requests are different enough clients that sharing one felt forced.

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;

pub struct DaemonClient {
    base_url: String,
    client: Client,
}

impl DaemonClient {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}:{port}")
        } else {
            format!("http://{host}:{port}")
        };
        Ok(Self { base_url, client: Client::new() })
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        let response = self.client.get(format!("{}{}", self.base_url, path)).send().await?;
        decode(response).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self.client.post(format!("{}{}", self.base_url, path)).json(body).send().await?;
        decode(response).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self.client.put(format!("{}{}", self.base_url, path)).json(body).send().await?;
        decode(response).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let response = self.client.delete(format!("{}{}", self.base_url, path)).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("request failed ({}): {}", status, body)
    }
}

async fn decode(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body = response.text().await.context("failed to read response body")?;
    if !status.is_success() {
        anyhow::bail!("request failed ({}): {}", status, body)
    }
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).context("failed to parse response as JSON")
}
