// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Declarative `tool.yaml` manifest for registering a tool with the broker,
//! mirroring how an operator would otherwise build the `POST /tools` body
//! by hand.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolManifest {
    #[serde(default = "default_version")]
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tool_version: String,
    pub owner_id: String,
    #[serde(default)]
    pub allowed_scopes: HashSet<String>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl ToolManifest {
    pub fn from_yaml_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_yaml_str(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
