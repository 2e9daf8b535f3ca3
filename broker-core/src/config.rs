// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Environment-variable configuration. No config file format — every
//! knob the broker needs is a single env var with a documented default.

/// `REDIS_URL` absent switches [`crate::infrastructure::rate_limit_backend`]
/// to in-memory only; everything else always has a default.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub jwt_secret_key_env: String,
    pub access_token_expire_seconds: u64,
    pub global_max_credential_lifetime_seconds: u64,
    pub rate_limit: u32,
    pub rate_limit_window_seconds: u64,
    pub log_level: String,
    pub metrics_port: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for environment variable {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

impl BrokerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let redis_url = std::env::var("REDIS_URL").ok().filter(|s| !s.is_empty());

        Ok(Self {
            database_url,
            redis_url,
            jwt_secret_key_env: "JWT_SECRET_KEY".to_string(),
            access_token_expire_seconds: env_u64("ACCESS_TOKEN_EXPIRE_SECONDS", 1800)?,
            global_max_credential_lifetime_seconds: env_u64("GLOBAL_MAX_CREDENTIAL_LIFETIME_SECONDS", 86_400)?,
            rate_limit: env_u32("RATE_LIMIT", 100)?,
            rate_limit_window_seconds: env_u64("RATE_LIMIT_WINDOW_SECONDS", 60)?,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            metrics_port: env_u32("METRICS_PORT", 9090)? as u16,
        })
    }
}

fn env_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

fn env_u32(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_apply_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("DATABASE_URL", "postgres://localhost/test");
        std::env::remove_var("REDIS_URL");
        std::env::remove_var("RATE_LIMIT");
        let config = BrokerConfig::from_env().unwrap();
        assert_eq!(config.rate_limit, 100);
        assert_eq!(config.rate_limit_window_seconds, 60);
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn missing_database_url_errors() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("DATABASE_URL");
        assert!(matches!(BrokerConfig::from_env(), Err(ConfigError::Missing("DATABASE_URL"))));
    }
}
