// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # broker-core
//!
//! Authorization core of the Tool Access Broker: mediates access between
//! agents and registered tools, evaluates layered policies, mints short-lived
//! signed credentials, and records every decision to an append-only log.
//!
//! ## Layer structure
//!
//! ```text
//! presentation/   ← HTTP API (axum): the hot path plus CRUD
//!     ↓
//! application/    ← AccessBroker, PolicyEngine, CredentialVendor
//!     ↓
//! domain/         ← Agent, Tool, Policy, Credential, AccessLog, repository traits
//!     ↓
//! infrastructure/ ← Postgres repositories, SecretStore backends, rate limiter backends
//! ```
//!
//! The central operation is `RequestAccess`: [`application::access_broker::AccessBroker`]
//! orchestrates the rate limiter, policy engine, and credential vendor for
//! every request (`RateLimiter → PolicyEngine → CredentialVendor`), appending
//! an audit log entry at each step.

pub mod config;
pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
