// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the toolbroker CLI

pub mod access;
pub mod agent;
pub mod daemon;
pub mod policy;
pub mod tool;

pub use self::access::AccessCommand;
pub use self::agent::AgentCommand;
pub use self::daemon::DaemonCommand;
pub use self::policy::PolicyCommand;
pub use self::tool::ToolCommand;
