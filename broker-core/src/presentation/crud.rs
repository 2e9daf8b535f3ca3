// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! REST CRUD for Tool, Agent, Policy — well-understood plumbing,
//! deliberately outside the authorization core's complexity.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::application::agent_service::AgentService;
use crate::application::policy_service::PolicyService;
use crate::application::tool_service::ToolService;
use crate::domain::agent::AgentId;
use crate::domain::error::BrokerError;
use crate::domain::policy::{PolicyConditions, PolicyRules};
use crate::domain::tool::ToolId;
use crate::presentation::error::ApiError;

pub struct CrudState {
    pub agents: Arc<AgentService>,
    pub tools: Arc<ToolService>,
    pub policies: Arc<PolicyService>,
}

pub fn router(state: Arc<CrudState>) -> Router {
    Router::new()
        .route("/agents", post(create_agent).get(list_agents))
        .route("/agents/{id}", get(get_agent).delete(deactivate_agent))
        .route("/tools", post(create_tool).get(list_tools))
        .route("/tools/{id}", get(get_tool).put(update_tool).delete(deactivate_tool))
        .route("/policies", post(create_policy).get(list_policies))
        .route("/policies/{id}", get(get_policy).delete(deactivate_policy))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default = "default_page")]
    page: usize,
    #[serde(default = "default_page_size")]
    page_size: usize,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    50
}

fn paginate<T>(items: Vec<T>, page: &Page) -> Vec<T> {
    let start = page.page.saturating_sub(1) * page.page_size;
    items.into_iter().skip(start).take(page.page_size).collect()
}

#[derive(Debug, Deserialize)]
struct CreateAgentBody {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    roles: HashSet<String>,
}

async fn create_agent(State(state): State<Arc<CrudState>>, Json(body): Json<CreateAgentBody>) -> Result<impl IntoResponse, ApiError> {
    let agent = state.agents.create(body.name, body.description, body.roles).await?;
    Ok((StatusCode::CREATED, Json(agent)))
}

async fn list_agents(State(state): State<Arc<CrudState>>, Query(page): Query<Page>) -> Result<impl IntoResponse, ApiError> {
    let agents = state.agents.list().await?;
    Ok(Json(paginate(agents, &page)))
}

async fn get_agent(State(state): State<Arc<CrudState>>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let id = AgentId::from_string(&id).map_err(|_| BrokerError::InvalidInput("agent id".to_string()))?;
    Ok(Json(state.agents.get(id).await?))
}

async fn deactivate_agent(State(state): State<Arc<CrudState>>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let id = AgentId::from_string(&id).map_err(|_| BrokerError::InvalidInput("agent id".to_string()))?;
    state.agents.deactivate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct CreateToolBody {
    name: String,
    #[serde(default)]
    description: String,
    version: String,
    owner_id: String,
    #[serde(default)]
    allowed_scopes: HashSet<String>,
}

async fn create_tool(State(state): State<Arc<CrudState>>, Json(body): Json<CreateToolBody>) -> Result<impl IntoResponse, ApiError> {
    let owner_id = AgentId::from_string(&body.owner_id).map_err(|_| BrokerError::InvalidInput("owner_id".to_string()))?;
    let tool = state.tools.create(body.name, body.description, body.version, owner_id, body.allowed_scopes).await?;
    Ok((StatusCode::CREATED, Json(tool)))
}

async fn list_tools(State(state): State<Arc<CrudState>>, Query(page): Query<Page>) -> Result<impl IntoResponse, ApiError> {
    let tools = state.tools.list().await?;
    Ok(Json(paginate(tools, &page)))
}

async fn get_tool(State(state): State<Arc<CrudState>>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let id = ToolId::from_string(&id).map_err(|_| BrokerError::InvalidInput("tool id".to_string()))?;
    Ok(Json(state.tools.get(id).await?))
}

#[derive(Debug, Deserialize)]
struct UpdateToolBody {
    allowed_scopes: HashSet<String>,
}

async fn update_tool(
    State(state): State<Arc<CrudState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateToolBody>,
) -> Result<impl IntoResponse, ApiError> {
    let id = ToolId::from_string(&id).map_err(|_| BrokerError::InvalidInput("tool id".to_string()))?;
    Ok(Json(state.tools.update_scopes(id, body.allowed_scopes).await?))
}

async fn deactivate_tool(State(state): State<Arc<CrudState>>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let id = ToolId::from_string(&id).map_err(|_| BrokerError::InvalidInput("tool id".to_string()))?;
    state.tools.deactivate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct CreatePolicyBody {
    name: String,
    tool_id: Option<String>,
    created_by: String,
    #[serde(default)]
    allowed_scopes: HashSet<String>,
    #[serde(default)]
    conditions: PolicyConditions,
    #[serde(default)]
    rules: PolicyRules,
    #[serde(default)]
    priority: i32,
}

async fn create_policy(State(state): State<Arc<CrudState>>, Json(body): Json<CreatePolicyBody>) -> Result<impl IntoResponse, ApiError> {
    let tool_id = body
        .tool_id
        .map(|id| ToolId::from_string(&id))
        .transpose()
        .map_err(|_| BrokerError::InvalidInput("tool_id".to_string()))?;
    let created_by = AgentId::from_string(&body.created_by).map_err(|_| BrokerError::InvalidInput("created_by".to_string()))?;
    let policy = state
        .policies
        .create(body.name, tool_id, created_by, body.allowed_scopes, body.conditions, body.rules, body.priority)
        .await?;
    Ok((StatusCode::CREATED, Json(policy)))
}

async fn list_policies(State(state): State<Arc<CrudState>>, Query(page): Query<Page>) -> Result<impl IntoResponse, ApiError> {
    let policies = state.policies.list().await?;
    Ok(Json(paginate(policies, &page)))
}

async fn get_policy(State(state): State<Arc<CrudState>>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let id = crate::domain::policy::PolicyId::from_string(&id).map_err(|_| BrokerError::InvalidInput("policy id".to_string()))?;
    Ok(Json(state.policies.get(id).await?))
}

async fn deactivate_policy(State(state): State<Arc<CrudState>>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let id = crate::domain::policy::PolicyId::from_string(&id).map_err(|_| BrokerError::InvalidInput("policy id".to_string()))?;
    state.policies.deactivate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
