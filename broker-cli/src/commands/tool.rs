// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use serde_json::json;

use crate::daemon::DaemonClient;

#[derive(Subcommand)]
pub enum ToolCommand {
    /// List registered tools
    List,

    /// Register a new tool
    Create {
        /// Tool name
        name: String,

        /// Tool version
        version: String,

        /// Owning agent ID
        #[arg(long)]
        owner_id: String,

        /// Human-readable description
        #[arg(long, default_value = "")]
        description: String,

        /// Scopes this tool accepts (repeatable)
        #[arg(long = "scope")]
        allowed_scopes: Vec<String>,
    },

    /// Show a single tool
    Show {
        /// Tool ID
        tool_id: String,
    },

    /// Replace a tool's allowed scopes
    SetScopes {
        /// Tool ID
        tool_id: String,

        /// Scopes this tool accepts (repeatable)
        #[arg(long = "scope")]
        allowed_scopes: Vec<String>,
    },

    /// Deactivate a tool
    Deactivate {
        /// Tool ID
        tool_id: String,
    },
}

pub async fn handle_command(command: ToolCommand, host: &str, port: u16) -> Result<()> {
    let client = DaemonClient::new(host, port)?;

    match command {
        ToolCommand::List => list(&client).await,
        ToolCommand::Create { name, version, owner_id, description, allowed_scopes } => {
            create(&client, name, version, owner_id, description, allowed_scopes).await
        }
        ToolCommand::Show { tool_id } => show(&client, &tool_id).await,
        ToolCommand::SetScopes { tool_id, allowed_scopes } => set_scopes(&client, &tool_id, allowed_scopes).await,
        ToolCommand::Deactivate { tool_id } => deactivate(&client, &tool_id).await,
    }
}

async fn list(client: &DaemonClient) -> Result<()> {
    let tools = client.get("/tools").await?;
    println!("{}", serde_json::to_string_pretty(&tools)?);
    Ok(())
}

async fn create(
    client: &DaemonClient,
    name: String,
    version: String,
    owner_id: String,
    description: String,
    allowed_scopes: Vec<String>,
) -> Result<()> {
    let body = json!({
        "name": name,
        "description": description,
        "version": version,
        "owner_id": owner_id,
        "allowed_scopes": allowed_scopes,
    });
    let tool = client.post("/tools", &body).await?;
    println!("{}", "✓ Tool created".green());
    println!("{}", serde_json::to_string_pretty(&tool)?);
    Ok(())
}

async fn show(client: &DaemonClient, tool_id: &str) -> Result<()> {
    let tool = client.get(&format!("/tools/{tool_id}")).await?;
    println!("{}", serde_json::to_string_pretty(&tool)?);
    Ok(())
}

async fn set_scopes(client: &DaemonClient, tool_id: &str, allowed_scopes: Vec<String>) -> Result<()> {
    let body = json!({ "allowed_scopes": allowed_scopes });
    let tool = client.put(&format!("/tools/{tool_id}"), &body).await?;
    println!("{}", "✓ Tool scopes updated".green());
    println!("{}", serde_json::to_string_pretty(&tool)?);
    Ok(())
}

async fn deactivate(client: &DaemonClient, tool_id: &str) -> Result<()> {
    client.delete(&format!("/tools/{tool_id}")).await?;
    println!("{}", format!("✓ Tool {tool_id} deactivated").green());
    Ok(())
}
