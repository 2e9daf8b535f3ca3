// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Daemon HTTP server implementation

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use redis::aio::ConnectionManager;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};

use toolbroker_core::application::access_broker::AccessBroker;
use toolbroker_core::application::agent_service::AgentService;
use toolbroker_core::application::credential_vendor::CredentialVendor;
use toolbroker_core::application::policy_engine::PolicyEngine;
use toolbroker_core::application::policy_service::PolicyService;
use toolbroker_core::application::tool_service::ToolService;
use toolbroker_core::config::BrokerConfig;
use toolbroker_core::domain::clock::{Clock, SystemClock};
use toolbroker_core::domain::rate_limiter::RateLimiter;
use toolbroker_core::domain::repository::{
    AccessLogRepository, AccessRequestRepository, AgentRepository, CredentialRepository, PolicyRepository, ToolRepository,
};
use toolbroker_core::domain::secret_store::SecretStore;
use toolbroker_core::infrastructure::db::Database;
use toolbroker_core::infrastructure::rate_limit_backend::{LocalRateLimiter, RedisRateLimiter};
use toolbroker_core::infrastructure::repositories::{
    postgres_access_log::PostgresAccessLogRepository, postgres_access_request::PostgresAccessRequestRepository,
    postgres_agent::PostgresAgentRepository, postgres_credential::PostgresCredentialRepository,
    postgres_policy::PostgresPolicyRepository, postgres_tool::PostgresToolRepository,
};
use toolbroker_core::infrastructure::secret_store::{EnvSecretStore, VaultSecretStore};
use toolbroker_core::presentation::api::{self, ApiState};
use toolbroker_core::presentation::crud::{self, CrudState};

use super::{remove_pid_file, write_pid_file};

const LOCAL_RATE_LIMIT_MAX_CELLS: usize = 100_000;
const CREDENTIAL_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);
const ACCESS_REQUEST_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

pub async fn start_daemon(host: String, port: u16) -> Result<()> {
    let pid = std::process::id();
    write_pid_file(pid)?;
    let _guard = PidFileGuard;

    info!("toolbroker daemon starting (PID: {})", pid);

    let config = BrokerConfig::from_env().context("failed to load configuration from environment")?;

    let metrics_addr: std::net::SocketAddr =
        format!("0.0.0.0:{}", config.metrics_port).parse().context("invalid METRICS_PORT")?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("failed to install Prometheus metrics exporter")?;
    info!("metrics exposed on {}", metrics_addr);

    let database = Database::new(&config.database_url).await.context("failed to connect to PostgreSQL")?;
    let pool = database.get_pool().clone();

    static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../broker-core/migrations");

    let total_known = MIGRATOR.iter().count();
    if total_known == 0 {
        panic!("CRITICAL: no migrations found in binary; check the build");
    }

    let applied_count = sqlx::query("SELECT version FROM _sqlx_migrations")
        .fetch_all(&pool)
        .await
        .map(|rows| rows.len())
        .unwrap_or(0);

    info!("database has {}/{} applied migrations", applied_count, total_known);
    if applied_count < total_known {
        info!("applying pending migrations...");
        if let Err(e) = MIGRATOR.run(&pool).await {
            panic!("failed to apply migrations: {e}");
        }
        info!("migrations applied");
    }

    let agents: Arc<dyn AgentRepository> = Arc::new(PostgresAgentRepository::new(pool.clone()));
    let tools: Arc<dyn ToolRepository> = Arc::new(PostgresToolRepository::new(pool.clone()));
    let policies: Arc<dyn PolicyRepository> = Arc::new(PostgresPolicyRepository::new(pool.clone()));
    let access_requests: Arc<dyn AccessRequestRepository> = Arc::new(PostgresAccessRequestRepository::new(pool.clone()));
    let credentials: Arc<dyn CredentialRepository> = Arc::new(PostgresCredentialRepository::new(pool.clone()));
    let access_logs: Arc<dyn AccessLogRepository> = Arc::new(PostgresAccessLogRepository::new(pool.clone()));

    let secrets: Arc<dyn SecretStore> = match std::env::var("VAULT_ADDR") {
        Ok(addr) => {
            info!("using VaultSecretStore ({})", addr);
            let token = std::env::var("VAULT_TOKEN").context("VAULT_ADDR set but VAULT_TOKEN missing")?;
            let mount = std::env::var("VAULT_MOUNT").unwrap_or_else(|_| "toolbroker".to_string());
            let settings = VaultClientSettingsBuilder::default()
                .address(addr)
                .token(token)
                .build()
                .context("invalid Vault client settings")?;
            let client = VaultClient::new(settings).context("failed to build Vault client")?;
            Arc::new(VaultSecretStore::new(client, mount))
        }
        Err(_) => {
            info!("VAULT_ADDR not set, using EnvSecretStore ({})", config.jwt_secret_key_env);
            Arc::new(EnvSecretStore::from_env(&config.jwt_secret_key_env).context("failed to load JWT signing key")?)
        }
    };

    let local_limiter = Arc::new(LocalRateLimiter::new(LOCAL_RATE_LIMIT_MAX_CELLS));
    let rate_limiter: Arc<dyn RateLimiter> = match &config.redis_url {
        Some(url) => {
            info!("using RedisRateLimiter ({})", url);
            let redis_client = redis::Client::open(url.as_str()).context("invalid REDIS_URL")?;
            let conn = ConnectionManager::new(redis_client).await.context("failed to connect to Redis")?;
            Arc::new(RedisRateLimiter::new(conn, local_limiter))
        }
        None => {
            warn!("REDIS_URL not set, rate limiting is process-local only");
            local_limiter
        }
    };

    let clock = Arc::new(SystemClock);

    let credentials_for_sweep = credentials.clone();
    let access_requests_for_sweep = access_requests.clone();

    let policy_engine = Arc::new(PolicyEngine::new(policies.clone(), rate_limiter.clone(), config.global_max_credential_lifetime_seconds));
    let credential_vendor = Arc::new(CredentialVendor::new(credentials, access_logs.clone(), secrets, clock.clone()));

    let broker = Arc::new(AccessBroker::new(
        agents.clone(),
        tools.clone(),
        access_requests.clone(),
        access_logs.clone(),
        rate_limiter,
        policy_engine,
        credential_vendor,
        clock.clone(),
        config.rate_limit,
        config.rate_limit_window_seconds,
    ));

    let agent_service = Arc::new(AgentService::new(agents, clock.clone()));
    let tool_service = Arc::new(ToolService::new(tools, clock.clone()));
    let policy_service = Arc::new(PolicyService::new(policies, clock.clone()));

    spawn_credential_sweeper(credentials_for_sweep, clock.clone());
    spawn_access_request_sweeper(access_requests_for_sweep, clock.clone());

    let api_state = Arc::new(ApiState { broker, access_requests, access_logs, clock });
    let crud_state = Arc::new(CrudState { agents: agent_service, tools: tool_service, policies: policy_service });

    let start_time = std::time::Instant::now();
    let app = Router::new()
        .route("/health", get(move || health_handler(start_time)))
        .merge(api::router(api_state))
        .merge(crud::router(crud_state));

    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr).await.with_context(|| format!("failed to bind to {addr}"))?;

    info!("daemon listening on {}", addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.context("HTTP server failed")?;

    info!("daemon shutting down");

    Ok(())
}

/// Background task: removes expired credentials on a fixed interval so
/// revoked/expired bearer secrets don't accumulate indefinitely.
fn spawn_credential_sweeper(credentials: Arc<dyn CredentialRepository>, clock: Arc<dyn Clock>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CREDENTIAL_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match credentials.delete_expired_before(clock.now()).await {
                Ok(count) if count > 0 => info!("credential sweep: removed {} expired credential(s)", count),
                Ok(_) => {}
                Err(e) => error!("credential sweep failed: {}", e),
            }
        }
    });
}

/// Background task: marks pending access requests older than the
/// approval TTL as expired so stale requests stop showing up as pending.
fn spawn_access_request_sweeper(access_requests: Arc<dyn AccessRequestRepository>, clock: Arc<dyn Clock>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ACCESS_REQUEST_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let now = clock.now();
            let pending = match access_requests.list_pending().await {
                Ok(pending) => pending,
                Err(e) => {
                    error!("access request sweep failed to list pending requests: {}", e);
                    continue;
                }
            };

            let mut expired_count = 0;
            for mut request in pending.into_iter().filter(|r| r.is_expired(now)) {
                request.expire(now);
                match access_requests.save(&request).await {
                    Ok(()) => expired_count += 1,
                    Err(e) => error!("access request sweep failed to save {}: {}", request.id, e),
                }
            }
            if expired_count > 0 {
                info!("access request sweep: expired {} pending request(s)", expired_count);
            }
        }
    });
}

async fn health_handler(start_time: std::time::Instant) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "uptime_seconds": start_time.elapsed().as_secs(),
    }))
}

struct PidFileGuard;

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        let _ = remove_pid_file();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C signal");
        },
        _ = terminate => {
            info!("received SIGTERM signal");
        },
    }
}
