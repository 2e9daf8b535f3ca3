// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod policy_engine;
pub mod credential_vendor;
pub mod access_broker;
pub mod agent_service;
pub mod tool_service;
pub mod policy_service;

pub use access_broker::{AccessBroker, RequestAccessInput, RequestAccessOutput, ValidateOutput};
pub use policy_engine::PolicyEngine;
pub use credential_vendor::CredentialVendor;
