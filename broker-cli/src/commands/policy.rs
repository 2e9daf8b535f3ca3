// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde_json::{json, Value};

use crate::daemon::DaemonClient;

#[derive(Subcommand)]
pub enum PolicyCommand {
    /// List registered policies
    List,

    /// Create a new policy
    Create {
        /// Policy name
        name: String,

        /// Agent ID that owns this policy
        #[arg(long)]
        created_by: String,

        /// Tool this policy applies to (omit for an agent-wide policy)
        #[arg(long)]
        tool_id: Option<String>,

        /// Scopes this policy grants (repeatable)
        #[arg(long = "scope")]
        allowed_scopes: Vec<String>,

        /// Evaluation order; lower runs first
        #[arg(long, default_value = "0")]
        priority: i32,

        /// Inline JSON for `PolicyConditions`, or a path to a JSON file
        #[arg(long)]
        conditions: Option<String>,

        /// Inline JSON for `PolicyRules`, or a path to a JSON file
        #[arg(long)]
        rules: Option<String>,
    },

    /// Show a single policy
    Show {
        /// Policy ID
        policy_id: String,
    },

    /// Deactivate a policy
    Deactivate {
        /// Policy ID
        policy_id: String,
    },
}

pub async fn handle_command(command: PolicyCommand, host: &str, port: u16) -> Result<()> {
    let client = DaemonClient::new(host, port)?;

    match command {
        PolicyCommand::List => list(&client).await,
        PolicyCommand::Create { name, created_by, tool_id, allowed_scopes, priority, conditions, rules } => {
            create(&client, name, created_by, tool_id, allowed_scopes, priority, conditions, rules).await
        }
        PolicyCommand::Show { policy_id } => show(&client, &policy_id).await,
        PolicyCommand::Deactivate { policy_id } => deactivate(&client, &policy_id).await,
    }
}

/// Accepts either a literal JSON object or a path to a file containing one.
fn parse_json_arg(arg: Option<String>) -> Result<Value> {
    let Some(raw) = arg else {
        return Ok(json!({}));
    };
    let content = if raw.trim_start().starts_with('{') {
        raw
    } else {
        std::fs::read_to_string(&raw).with_context(|| format!("failed to read {raw}"))?
    };
    serde_json::from_str(&content).context("failed to parse JSON")
}

#[allow(clippy::too_many_arguments)]
async fn create(
    client: &DaemonClient,
    name: String,
    created_by: String,
    tool_id: Option<String>,
    allowed_scopes: Vec<String>,
    priority: i32,
    conditions: Option<String>,
    rules: Option<String>,
) -> Result<()> {
    let conditions = parse_json_arg(conditions)?;
    let rules = parse_json_arg(rules)?;

    let body = json!({
        "name": name,
        "tool_id": tool_id,
        "created_by": created_by,
        "allowed_scopes": allowed_scopes,
        "conditions": conditions,
        "rules": rules,
        "priority": priority,
    });
    let policy = client.post("/policies", &body).await?;
    println!("{}", "✓ Policy created".green());
    println!("{}", serde_json::to_string_pretty(&policy)?);
    Ok(())
}

async fn list(client: &DaemonClient) -> Result<()> {
    let policies = client.get("/policies").await?;
    println!("{}", serde_json::to_string_pretty(&policies)?);
    Ok(())
}

async fn show(client: &DaemonClient, policy_id: &str) -> Result<()> {
    let policy = client.get(&format!("/policies/{policy_id}")).await?;
    println!("{}", serde_json::to_string_pretty(&policy)?);
    Ok(())
}

async fn deactivate(client: &DaemonClient, policy_id: &str) -> Result<()> {
    client.delete(&format!("/policies/{policy_id}")).await?;
    println!("{}", format!("✓ Policy {policy_id} deactivated").green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_arg_defaults_to_empty_object() {
        let value = parse_json_arg(None).unwrap();
        assert_eq!(value, json!({}));
    }

    #[test]
    fn inline_json_is_parsed_directly() {
        let value = parse_json_arg(Some(r#"{"require_approval": true}"#.to_string())).unwrap();
        assert_eq!(value, json!({"require_approval": true}));
    }

    #[test]
    fn path_argument_is_read_and_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_requests_per_day": 10}}"#).unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let value = parse_json_arg(Some(path)).unwrap();
        assert_eq!(value, json!({"max_requests_per_day": 10}));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let result = parse_json_arg(Some("{not json".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn missing_path_is_an_error() {
        let result = parse_json_arg(Some("/no/such/file.json".to_string()));
        assert!(result.is_err());
    }
}
