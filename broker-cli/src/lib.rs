// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Tool Access Broker CLI and daemon — exposes testable components

pub mod commands;
pub mod daemon;
