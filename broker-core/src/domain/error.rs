// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Top-level error type the application layer returns and the
//! presentation layer maps to HTTP status + `reason_code`.

use crate::domain::access_log::ReasonCode;
use crate::domain::repository::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("inactive: {0}")]
    Inactive(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("insufficient scope: {0}")]
    InsufficientScope(String),

    #[error("rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("denied: {0:?}")]
    Denied(ReasonCode),

    #[error("dependency unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BrokerError {
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            BrokerError::InvalidInput(_) | BrokerError::Conflict(_) => ReasonCode::Internal,
            BrokerError::NotFound(_) => ReasonCode::NotFound,
            BrokerError::Inactive(_) => ReasonCode::UnknownTarget,
            BrokerError::Unauthorized | BrokerError::InsufficientScope(_) => ReasonCode::InsufficientScope,
            BrokerError::RateLimited { .. } => ReasonCode::RateLimited,
            BrokerError::Denied(code) => *code,
            BrokerError::Unavailable(_) => ReasonCode::StoreUnavailable,
            BrokerError::Internal(_) => ReasonCode::Internal,
        }
    }
}

impl From<RepositoryError> for BrokerError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => BrokerError::NotFound(msg),
            RepositoryError::Conflict(msg) => BrokerError::Conflict(msg),
            RepositoryError::Database(msg) | RepositoryError::Unknown(msg) => BrokerError::Unavailable(msg),
            RepositoryError::Serialization(msg) => BrokerError::Internal(msg),
        }
    }
}
