// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The opaque plugin-runtime peer.
//!
//! The actual transport (control-channel RPC) is an external collaborator;
//! the gateway only depends on this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use chatgate_core::GateError;

/// One pipeline event serialized for the runtime.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeEvent {
    pub name: String,
    pub query_id: u64,
    pub launcher_key: String,
    pub sender_id: String,
    pub payload: serde_json::Value,
}

/// The runtime's verdict on an event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeEventAck {
    /// The plugin produced the reply itself; the pipeline must not.
    #[serde(default)]
    pub prevent_default: bool,
}

/// RPC peer hosting the plugin ecosystem.
#[async_trait]
pub trait PluginRuntime: Send + Sync {
    async fn emit_event(&self, event: RuntimeEvent) -> Result<RuntimeEventAck, GateError>;
}
