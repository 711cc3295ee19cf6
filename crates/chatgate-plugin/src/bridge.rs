// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event emission to the plugin runtime and the tool-call proxy.
//!
//! Runtime failures never break a pipeline run: a failed event emission
//! logs and proceeds as if the runtime had no opinion. Tool calls arriving
//! from the runtime resolve their query through the pool and answer an
//! error action response when it is gone.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use chatgate_core::{MessageChain, TargetKind};
use chatgate_pipeline::{EventContext, EventSink, PipelineEvent, QueryPool};

use crate::runtime::{PluginRuntime, RuntimeEvent};

/// An action the plugin runtime requests against a live query.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolAction {
    /// Snapshot of the query's identity fields.
    QueryInfo,
    /// Reply to the query's originating event.
    ReplyMessage { chain: MessageChain },
    /// Out-of-band push through the query's adapter.
    SendMessage {
        target_type: String,
        target_id: String,
        chain: MessageChain,
    },
}

/// What goes back to the runtime for one tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionResponse {
    Ok { data: serde_json::Value },
    Error { message: String },
}

/// Connects the pipeline's event stream to the runtime and serves the
/// runtime's tool calls.
pub struct PluginBridge {
    runtime: Option<Arc<dyn PluginRuntime>>,
    pool: Arc<QueryPool>,
}

impl PluginBridge {
    pub fn new(runtime: Arc<dyn PluginRuntime>, pool: Arc<QueryPool>) -> Self {
        Self {
            runtime: Some(runtime),
            pool,
        }
    }

    /// Bridge for processes running without a plugin runtime.
    pub fn disconnected(pool: Arc<QueryPool>) -> Self {
        Self {
            runtime: None,
            pool,
        }
    }

    /// Serves one tool call from the runtime.
    pub async fn handle_tool_call(&self, query_id: u64, action: ToolAction) -> ActionResponse {
        let handle = match self.pool.get(query_id) {
            Ok(handle) => handle,
            Err(e) => {
                debug!(query_id, error = %e, "tool call for unknown query");
                return ActionResponse::Error {
                    message: e.to_string(),
                };
            }
        };

        match action {
            ToolAction::QueryInfo => ActionResponse::Ok {
                data: serde_json::json!({
                    "query_id": handle.query_id,
                    "launcher_type": handle.launcher_type.to_string(),
                    "launcher_id": handle.launcher_id,
                    "sender_id": handle.sender_id,
                }),
            },
            ToolAction::ReplyMessage { chain } => {
                match handle
                    .adapter
                    .reply_message(&handle.message_event, chain, false)
                    .await
                {
                    Ok(()) => ActionResponse::Ok {
                        data: serde_json::Value::Null,
                    },
                    Err(e) => ActionResponse::Error {
                        message: e.to_string(),
                    },
                }
            }
            ToolAction::SendMessage {
                target_type,
                target_id,
                chain,
            } => {
                let target = match target_type.as_str() {
                    "person" => TargetKind::Person,
                    "group" => TargetKind::Group,
                    other => {
                        return ActionResponse::Error {
                            message: format!("unknown target type: {other}"),
                        };
                    }
                };
                match handle.adapter.send_message(target, &target_id, chain).await {
                    Ok(()) => ActionResponse::Ok {
                        data: serde_json::Value::Null,
                    },
                    Err(e) => ActionResponse::Error {
                        message: e.to_string(),
                    },
                }
            }
        }
    }
}

#[async_trait]
impl EventSink for PluginBridge {
    async fn emit(&self, event: PipelineEvent) -> EventContext {
        let Some(runtime) = &self.runtime else {
            return EventContext::default();
        };

        let outgoing = RuntimeEvent {
            name: event.name.to_string(),
            query_id: event.query_id,
            launcher_key: event.launcher_key,
            sender_id: event.sender_id,
            payload: event.payload,
        };
        match runtime.emit_event(outgoing).await {
            Ok(ack) => EventContext {
                prevent_default: ack.prevent_default,
            },
            Err(e) => {
                warn!(error = %e, "plugin runtime event emission failed");
                EventContext::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RuntimeEventAck;
    use chatgate_core::{EventKind, GateError};
    use chatgate_pipeline::PipelineEventName;
    use chatgate_test_utils::{MockAdapter, query_fixture_on_adapter};
    use std::sync::Mutex;

    struct RecordingRuntime {
        seen: Mutex<Vec<String>>,
        prevent: bool,
    }

    #[async_trait]
    impl PluginRuntime for RecordingRuntime {
        async fn emit_event(&self, event: RuntimeEvent) -> Result<RuntimeEventAck, GateError> {
            self.seen.lock().unwrap().push(event.name);
            Ok(RuntimeEventAck {
                prevent_default: self.prevent,
            })
        }
    }

    struct BrokenRuntime;

    #[async_trait]
    impl PluginRuntime for BrokenRuntime {
        async fn emit_event(&self, _event: RuntimeEvent) -> Result<RuntimeEventAck, GateError> {
            Err(GateError::Internal("runtime down".into()))
        }
    }

    fn pipeline_event(query_id: u64) -> PipelineEvent {
        PipelineEvent {
            name: PipelineEventName::InboundMessage,
            query_id,
            launcher_key: "person_u1".into(),
            sender_id: "u1".into(),
            payload: serde_json::json!({"text": "hi"}),
        }
    }

    #[tokio::test]
    async fn emit_forwards_and_honors_prevent_default() {
        let runtime = Arc::new(RecordingRuntime {
            seen: Mutex::new(Vec::new()),
            prevent: true,
        });
        let bridge = PluginBridge::new(runtime.clone(), Arc::new(QueryPool::new()));

        let ctx = bridge.emit(pipeline_event(1)).await;
        assert!(ctx.prevent_default);
        assert_eq!(*runtime.seen.lock().unwrap(), vec!["inbound_message"]);
    }

    #[tokio::test]
    async fn runtime_failure_does_not_prevent_default() {
        let bridge = PluginBridge::new(Arc::new(BrokenRuntime), Arc::new(QueryPool::new()));
        let ctx = bridge.emit(pipeline_event(1)).await;
        assert!(!ctx.prevent_default);
    }

    #[tokio::test]
    async fn disconnected_bridge_is_a_noop() {
        let bridge = PluginBridge::disconnected(Arc::new(QueryPool::new()));
        let ctx = bridge.emit(pipeline_event(1)).await;
        assert!(!ctx.prevent_default);
    }

    #[tokio::test]
    async fn tool_call_for_unknown_query_errors() {
        let bridge = PluginBridge::disconnected(Arc::new(QueryPool::new()));
        let response = bridge.handle_tool_call(42, ToolAction::QueryInfo).await;
        assert!(matches!(response, ActionResponse::Error { .. }));
    }

    #[tokio::test]
    async fn tool_call_replies_through_the_query_adapter() {
        let pool = Arc::new(QueryPool::new());
        let adapter = Arc::new(MockAdapter::new("mock", false));
        let query = query_fixture_on_adapter(
            EventKind::Friend,
            Arc::new(chatgate_config::PipelineConfig::default()),
            adapter.clone(),
        );
        pool.register(&query);

        let bridge = PluginBridge::disconnected(pool);
        let response = bridge
            .handle_tool_call(
                query.query_id,
                ToolAction::ReplyMessage {
                    chain: MessageChain::from_text("from plugin"),
                },
            )
            .await;

        assert!(matches!(response, ActionResponse::Ok { .. }));
        assert_eq!(adapter.sent_messages()[0].plain_text(), "from plugin");
    }

    #[tokio::test]
    async fn tool_action_deserializes_tagged_json() {
        let action: ToolAction = serde_json::from_value(serde_json::json!({
            "type": "send_message",
            "target_type": "group",
            "target_id": "g1",
            "chain": [{"type": "text", "text": "hello"}],
        }))
        .unwrap();
        assert!(matches!(action, ToolAction::SendMessage { .. }));
    }
}
