// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Tool Access Broker Rust SDK
//!
//! Gives agent runtimes and tool integrations a typed client for the
//! broker's hot path (`RequestAccess`, `Validate`, credential revocation)
//! plus a declarative manifest format for describing a tool ahead of
//! registration.

pub mod client;
pub mod manifest;
pub mod types;

pub use client::{BrokerClientError, ToolBrokerClient};
pub use manifest::ToolManifest;
pub use types::*;
