// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use serde_json::json;

use crate::daemon::DaemonClient;

#[derive(Subcommand)]
pub enum AgentCommand {
    /// List registered agents
    List,

    /// Register a new agent
    Create {
        /// Agent name
        name: String,

        /// Human-readable description
        #[arg(long, default_value = "")]
        description: String,

        /// Roles granted to this agent (repeatable)
        #[arg(long = "role")]
        roles: Vec<String>,
    },

    /// Show a single agent
    Show {
        /// Agent ID
        agent_id: String,
    },

    /// Deactivate an agent
    Deactivate {
        /// Agent ID
        agent_id: String,
    },
}

pub async fn handle_command(command: AgentCommand, host: &str, port: u16) -> Result<()> {
    let client = DaemonClient::new(host, port)?;

    match command {
        AgentCommand::List => list(&client).await,
        AgentCommand::Create { name, description, roles } => create(&client, name, description, roles).await,
        AgentCommand::Show { agent_id } => show(&client, &agent_id).await,
        AgentCommand::Deactivate { agent_id } => deactivate(&client, &agent_id).await,
    }
}

async fn list(client: &DaemonClient) -> Result<()> {
    let agents = client.get("/agents").await?;
    println!("{}", serde_json::to_string_pretty(&agents)?);
    Ok(())
}

async fn create(client: &DaemonClient, name: String, description: String, roles: Vec<String>) -> Result<()> {
    let body = json!({ "name": name, "description": description, "roles": roles });
    let agent = client.post("/agents", &body).await?;
    println!("{}", "✓ Agent created".green());
    println!("{}", serde_json::to_string_pretty(&agent)?);
    Ok(())
}

async fn show(client: &DaemonClient, agent_id: &str) -> Result<()> {
    let agent = client.get(&format!("/agents/{agent_id}")).await?;
    println!("{}", serde_json::to_string_pretty(&agent)?);
    Ok(())
}

async fn deactivate(client: &DaemonClient, agent_id: &str) -> Result<()> {
    client.delete(&format!("/agents/{agent_id}")).await?;
    println!("{}", format!("✓ Agent {agent_id} deactivated").green());
    Ok(())
}
