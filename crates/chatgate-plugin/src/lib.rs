// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin-runtime integration: pipeline event emission and the tool-call
//! proxy plugins use to act on live queries.

pub mod bridge;
pub mod runtime;

pub use bridge::{ActionResponse, PluginBridge, ToolAction};
pub use runtime::{PluginRuntime, RuntimeEvent, RuntimeEventAck};
