// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Maps `BrokerError` to an HTTP status and the `{detail, reason_code,
//! correlation_id}` body every 4xx/5xx response carries.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::error::BrokerError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
    pub reason_code: String,
    pub correlation_id: Uuid,
}

pub struct ApiError(pub BrokerError);

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BrokerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            BrokerError::NotFound(_) | BrokerError::Inactive(_) => StatusCode::NOT_FOUND,
            BrokerError::Conflict(_) => StatusCode::CONFLICT,
            BrokerError::Unauthorized => StatusCode::UNAUTHORIZED,
            BrokerError::InsufficientScope(_) => StatusCode::FORBIDDEN,
            BrokerError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            BrokerError::Denied(_) => StatusCode::FORBIDDEN,
            BrokerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            BrokerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let detail = match &self.0 {
            // Internal errors never leak verbatim downstream details.
            BrokerError::Internal(_) | BrokerError::Unavailable(_) => "internal error".to_string(),
            other => other.to_string(),
        };

        let body = ErrorBody { detail, reason_code: format!("{:?}", self.0.reason_code()), correlation_id: Uuid::new_v4() };

        let mut response = (status, Json(body)).into_response();
        if let BrokerError::RateLimited { retry_after_seconds } = &self.0 {
            if let Ok(value) = axum::http::HeaderValue::from_str(&retry_after_seconds.to_string()) {
                response.headers_mut().insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}
