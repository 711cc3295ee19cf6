// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named events the pipeline emits to the plugin runtime between stages.
//!
//! The sink is a seam: `chatgate-plugin` bridges it to the external plugin
//! runtime; [`NoopEventSink`] serves processes running without one.

use async_trait::async_trait;

use crate::query::Query;

/// Emission points during one pipeline execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum PipelineEventName {
    InboundMessage,
    PreRunner,
    PostRunner,
    OutboundMessage,
}

/// One emitted event with its query context.
#[derive(Debug, Clone)]
pub struct PipelineEvent {
    pub name: PipelineEventName,
    pub query_id: u64,
    pub launcher_key: String,
    pub sender_id: String,
    /// Event-specific payload (inbound text, outbound reply text, variables).
    pub payload: serde_json::Value,
}

impl PipelineEvent {
    pub fn for_query(name: PipelineEventName, query: &Query, payload: serde_json::Value) -> Self {
        Self {
            name,
            query_id: query.query_id,
            launcher_key: query.launcher_key(),
            sender_id: query.sender_id.clone(),
            payload,
        }
    }
}

/// What the plugin runtime decided about an event.
#[derive(Debug, Clone, Default)]
pub struct EventContext {
    /// The plugin already produced the reply; the pipeline stops without
    /// sending anything itself.
    pub prevent_default: bool,
}

/// Receiver of pipeline events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: PipelineEvent) -> EventContext;
}

/// Sink for processes without a plugin runtime: every event proceeds.
#[derive(Debug, Default)]
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn emit(&self, _event: PipelineEvent) -> EventContext {
        EventContext::default()
    }
}
