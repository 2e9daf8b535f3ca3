// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pass-through to the hot path: `RequestAccess`, `Validate`, revoke —
//! useful for poking the broker by hand without writing an agent integration.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use uuid::Uuid;

use toolbroker_sdk::ToolBrokerClient;

#[derive(Subcommand)]
pub enum AccessCommand {
    /// Request access to a tool on behalf of an agent
    Request {
        /// Agent ID
        agent_id: Uuid,

        /// Tool ID
        tool_id: Uuid,

        /// Scopes to request (repeatable)
        #[arg(long = "scope")]
        requested_scopes: Vec<String>,

        /// Requested credential lifetime, in seconds
        #[arg(long)]
        lifetime_seconds: Option<u64>,
    },

    /// Validate a bearer credential
    Validate {
        /// The bearer token
        token: String,

        /// Required scope, if any
        #[arg(long)]
        scope: Option<String>,
    },

    /// Revoke a previously issued credential
    Revoke {
        /// Credential ID
        credential_id: Uuid,
    },
}

pub async fn handle_command(command: AccessCommand, host: &str, port: u16) -> Result<()> {
    let base_url = if host.starts_with("http://") || host.starts_with("https://") {
        format!("{host}:{port}")
    } else {
        format!("http://{host}:{port}")
    };
    let client = ToolBrokerClient::new(base_url);

    match command {
        AccessCommand::Request { agent_id, tool_id, requested_scopes, lifetime_seconds } => {
            request(&client, agent_id, tool_id, requested_scopes, lifetime_seconds).await
        }
        AccessCommand::Validate { token, scope } => validate(&client, &token, scope).await,
        AccessCommand::Revoke { credential_id } => revoke(&client, credential_id).await,
    }
}

async fn request(
    client: &ToolBrokerClient,
    agent_id: Uuid,
    tool_id: Uuid,
    requested_scopes: Vec<String>,
    lifetime_seconds: Option<u64>,
) -> Result<()> {
    let decision = client
        .request_access(agent_id, tool_id, requested_scopes.into_iter().collect(), lifetime_seconds)
        .await
        .context("access request failed")?;

    if decision.is_approved() {
        println!("{}", format!("✓ Access approved ({})", decision.status).green());
        if let Some(credential) = &decision.credential {
            println!("  credential_id: {}", credential.credential_id);
            println!("  expires_at: {}", credential.expires_at);
            println!("  token: {}", credential.token);
        }
    } else {
        println!("{}", format!("✗ Access denied ({})", decision.status).red());
    }

    Ok(())
}

async fn validate(client: &ToolBrokerClient, token: &str, scope: Option<String>) -> Result<()> {
    let result = client.validate(token, scope.as_deref()).await.context("validation failed")?;

    if result.valid {
        println!("{}", "✓ Credential valid".green());
        if let Some(agent_id) = result.agent_id {
            println!("  agent_id: {agent_id}");
        }
        if let Some(tool_id) = result.tool_id {
            println!("  tool_id: {tool_id}");
        }
        if let Some(scopes) = &result.scopes {
            println!("  scopes: {}", scopes.iter().cloned().collect::<Vec<_>>().join(", "));
        }
    } else {
        println!("{}", "✗ Credential invalid".red());
    }

    Ok(())
}

async fn revoke(client: &ToolBrokerClient, credential_id: Uuid) -> Result<()> {
    client.revoke(credential_id).await.context("revoke failed")?;
    println!("{}", format!("✓ Credential {credential_id} revoked").green());
    Ok(())
}
