// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query and event fixtures shared across crate test suites.

use std::sync::Arc;

use uuid::Uuid;

use chatgate_config::PipelineConfig;
use chatgate_core::{
    Adapter, EventKind, GroupInfo, MessageChain, MessageEvent, Sender,
};
use chatgate_pipeline::{Query, QueryPool};

use crate::mock_adapter::MockAdapter;

/// A minimal inbound event: sender `u1`, group `g1` for group events,
/// chain `"hi"`, `msg_id` `M1` in the platform ref.
pub fn event_fixture(kind: EventKind) -> MessageEvent {
    MessageEvent {
        kind,
        sender: Sender {
            id: "u1".into(),
            nickname: Some("User One".into()),
            group: matches!(kind, EventKind::Group).then(|| GroupInfo {
                id: "g1".into(),
                name: Some("Group One".into()),
            }),
        },
        chain: MessageChain::from_text("hi"),
        time: chrono::Utc::now(),
        platform_ref: serde_json::json!({ "msg_id": "M1" }),
    }
}

/// Query on a fresh non-streaming mock adapter with default config.
pub fn query_fixture(kind: EventKind) -> Query {
    query_fixture_with_config(kind, Arc::new(PipelineConfig::default()))
}

/// Query on a fresh non-streaming mock adapter with the given config.
pub fn query_fixture_with_config(kind: EventKind, config: Arc<PipelineConfig>) -> Query {
    query_fixture_on_adapter(kind, config, Arc::new(MockAdapter::new("mock", false)))
}

/// Query bound to a specific adapter; the bot's account id is `bot`.
pub fn query_fixture_on_adapter(
    kind: EventKind,
    config: Arc<PipelineConfig>,
    adapter: Arc<dyn Adapter>,
) -> Query {
    let pool = QueryPool::new();
    Query::new(
        pool.next_query_id(),
        event_fixture(kind),
        Uuid::new_v4(),
        "bot",
        config,
        adapter,
    )
}
