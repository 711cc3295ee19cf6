// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repository trait for pipeline/bot metadata and binary blobs.
//!
//! Persistence is an external collaborator: the gateway only ever sees this
//! interface plus the two record types below. Definition `config` blobs stay
//! untyped here; `chatgate-config` parses them into typed snapshots.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GateError;

/// A stored pipeline definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub uuid: Uuid,
    pub name: String,
    /// Ordered stage names; empty means the default stage order.
    #[serde(default)]
    pub stages: Vec<String>,
    /// Nested config map (`trigger.*`, `safety.*`, `ai.*`, `output.*`).
    #[serde(default)]
    pub config: serde_json::Value,
    /// Per-pipeline plugin/extension preferences, passed through opaquely.
    #[serde(default)]
    pub extensions_preferences: serde_json::Value,
}

/// A stored bot record binding an adapter to a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotDefinition {
    pub uuid: Uuid,
    pub name: String,
    /// Adapter name this bot receives events from.
    pub adapter: String,
    pub pipeline_uuid: Uuid,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Opaque metadata/blob store backing the gateway.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_pipelines(&self) -> Result<Vec<PipelineDefinition>, GateError>;

    async fn get_bot_by_uuid(&self, id: Uuid) -> Result<Option<BotDefinition>, GateError>;

    async fn set_binary(&self, key: &str, owner: &str, data: Vec<u8>) -> Result<(), GateError>;

    async fn get_binary(&self, key: &str, owner: &str) -> Result<Option<Vec<u8>>, GateError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_definition_defaults_optional_fields() {
        let json = serde_json::json!({
            "uuid": "7f1f3df4-9d9b-4e0f-8b8a-1c2d3e4f5a6b",
            "name": "default",
        });
        let def: PipelineDefinition = serde_json::from_value(json).unwrap();
        assert!(def.stages.is_empty());
        assert!(def.config.is_null());
    }

    #[test]
    fn bot_definition_enabled_defaults_true() {
        let json = serde_json::json!({
            "uuid": "7f1f3df4-9d9b-4e0f-8b8a-1c2d3e4f5a6b",
            "name": "support-bot",
            "adapter": "aibot",
            "pipeline_uuid": "0f1f3df4-9d9b-4e0f-8b8a-1c2d3e4f5a6b",
        });
        let bot: BotDefinition = serde_json::from_value(json).unwrap();
        assert!(bot.enabled);
    }
}
