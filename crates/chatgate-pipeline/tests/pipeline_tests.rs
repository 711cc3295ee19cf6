// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end pipeline tests against mock adapters, runners, and sinks.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use chatgate_config::PipelineConfig;
use chatgate_core::{BotDefinition, EventKind, MemoryRepository, PipelineDefinition};
use chatgate_pipeline::{
    EventSink, NoopEventSink, PipelineEventName, PipelineManager, RunnerRegistry,
};
use chatgate_test_utils::{MockAdapter, MockRunner, RecordingEventSink, event_fixture};

const PIPELINE_UUID: &str = "7f1f3df4-9d9b-4e0f-8b8a-1c2d3e4f5a6b";
const BOT_UUID: &str = "17a2b3c4-d5e6-4f70-8192-a3b4c5d6e7f8";

fn definition(config: serde_json::Value) -> PipelineDefinition {
    PipelineDefinition {
        uuid: PIPELINE_UUID.parse().unwrap(),
        name: "default".into(),
        stages: vec![],
        config,
        extensions_preferences: serde_json::Value::Null,
    }
}

fn bot() -> BotDefinition {
    BotDefinition {
        uuid: BOT_UUID.parse().unwrap(),
        name: "bot".into(),
        adapter: "mock".into(),
        pipeline_uuid: PIPELINE_UUID.parse().unwrap(),
        enabled: true,
    }
}

fn manager_with(
    config: serde_json::Value,
    runner: MockRunner,
    events: Arc<dyn EventSink>,
) -> Arc<PipelineManager> {
    let repository = Arc::new(MemoryRepository::seeded(vec![definition(config)], vec![bot()]));
    let mut runners = RunnerRegistry::new();
    runners.register(Arc::new(runner));
    Arc::new(PipelineManager::new(
        repository,
        Arc::new(runners),
        events,
        Arc::new(chatgate_pipeline::QueryPool::new()),
    ))
}

async fn settle() {
    // Dispatch spawns the pipeline task; give it time to finish.
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn happy_path_streams_chunks_and_cleans_up() {
    let manager = manager_with(
        serde_json::Value::Null,
        MockRunner::scripted(
            "local-agent",
            vec![
                ("Hel".into(), false),
                ("lo".into(), false),
                ("".into(), true),
            ],
        ),
        Arc::new(NoopEventSink),
    );
    manager.load_pipelines().await.unwrap();

    let adapter = Arc::new(MockAdapter::new("mock", true));
    let query_id = manager
        .dispatch(event_fixture(EventKind::Friend), &bot(), adapter.clone())
        .unwrap();
    settle().await;

    let chunks = adapter.sent_chunks();
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].0.plain_text(), "Hel");
    assert_eq!(chunks[1].0.plain_text(), "lo");
    assert!(chunks[2].1);

    // The finally path removed the query from the pool.
    assert!(manager.pool().get(query_id).is_err());
    assert!(manager.pool().is_empty());
}

#[tokio::test]
async fn group_at_mention_strips_and_runs() {
    let manager = manager_with(
        serde_json::Value::Null,
        MockRunner::scripted("local-agent", vec![("reply".into(), true)]),
        Arc::new(NoopEventSink),
    );
    manager.load_pipelines().await.unwrap();

    let adapter = Arc::new(MockAdapter::new("mock", true));
    let mut event = event_fixture(EventKind::Group);
    event.chain = chatgate_core::MessageChain(vec![
        chatgate_core::MessageComponent::At { target: "bot".into() },
        chatgate_core::MessageComponent::Text { text: "hi".into() },
    ]);
    manager.dispatch(event, &bot(), adapter.clone()).unwrap();
    settle().await;

    assert_eq!(adapter.sent_chunks().len(), 1);
}

#[tokio::test]
async fn group_without_match_is_interrupted_silently() {
    let manager = manager_with(
        serde_json::Value::Null,
        MockRunner::scripted("local-agent", vec![("reply".into(), true)]),
        Arc::new(NoopEventSink),
    );
    manager.load_pipelines().await.unwrap();

    let adapter = Arc::new(MockAdapter::new("mock", true));
    manager
        .dispatch(event_fixture(EventKind::Group), &bot(), adapter.clone())
        .unwrap();
    settle().await;

    assert!(adapter.sent_chunks().is_empty());
    assert!(adapter.sent_messages().is_empty());
    assert!(manager.pool().is_empty());
}

#[tokio::test]
async fn rate_limit_drop_notifies_second_query() {
    let config = serde_json::json!({
        "safety": {
            "rate-limit": {"algo": "fixwin", "window-length": 10, "limitation": 1, "strategy": "drop"}
        }
    });
    let manager = manager_with(
        config,
        MockRunner::scripted("local-agent", vec![("ok".into(), true)]),
        Arc::new(NoopEventSink),
    );
    manager.load_pipelines().await.unwrap();

    let adapter = Arc::new(MockAdapter::new("mock", true));
    manager
        .dispatch(event_fixture(EventKind::Friend), &bot(), adapter.clone())
        .unwrap();
    settle().await;
    manager
        .dispatch(event_fixture(EventKind::Friend), &bot(), adapter.clone())
        .unwrap();
    settle().await;

    // First query streamed its reply; second got the denial notice whole.
    assert_eq!(adapter.sent_chunks().len(), 1);
    let messages = adapter.sent_messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].plain_text().contains("too quickly"));
    assert!(manager.pool().is_empty());
}

#[tokio::test]
async fn whitelist_blocks_unlisted_launcher() {
    let config = serde_json::json!({
        "trigger": {
            "access-control": {"mode": "whitelist", "whitelist": ["person_someone-else"]}
        }
    });
    let manager = manager_with(
        config,
        MockRunner::scripted("local-agent", vec![("ok".into(), true)]),
        Arc::new(NoopEventSink),
    );
    manager.load_pipelines().await.unwrap();

    let adapter = Arc::new(MockAdapter::new("mock", true));
    manager
        .dispatch(event_fixture(EventKind::Friend), &bot(), adapter.clone())
        .unwrap();
    settle().await;

    assert!(adapter.sent_chunks().is_empty());
    assert!(adapter.sent_messages().is_empty());
}

#[tokio::test]
async fn runner_failure_sends_single_error_notice() {
    let manager = manager_with(
        serde_json::Value::Null,
        MockRunner::failing(
            "local-agent",
            chatgate_core::RunnerErrorKind::Upstream,
            "upstream 503",
        ),
        Arc::new(NoopEventSink),
    );
    manager.load_pipelines().await.unwrap();

    let adapter = Arc::new(MockAdapter::new("mock", true));
    manager
        .dispatch(event_fixture(EventKind::Friend), &bot(), adapter.clone())
        .unwrap();
    settle().await;

    // The error notice goes out exactly once and never through the chunk path.
    assert!(adapter.sent_chunks().is_empty());
    assert_eq!(adapter.sent_messages().len(), 1);
    assert!(manager.pool().is_empty());
}

#[tokio::test]
async fn plugin_events_fire_in_order() {
    let sink = Arc::new(RecordingEventSink::new());
    let manager = manager_with(
        serde_json::Value::Null,
        MockRunner::scripted("local-agent", vec![("ok".into(), true)]),
        sink.clone(),
    );
    manager.load_pipelines().await.unwrap();

    let adapter = Arc::new(MockAdapter::new("mock", true));
    manager
        .dispatch(event_fixture(EventKind::Friend), &bot(), adapter)
        .unwrap();
    settle().await;

    assert_eq!(
        sink.names(),
        vec![
            PipelineEventName::InboundMessage,
            PipelineEventName::PreRunner,
            PipelineEventName::OutboundMessage,
            PipelineEventName::PostRunner,
        ]
    );
}

#[tokio::test]
async fn prevent_default_on_inbound_skips_all_stages() {
    let sink = Arc::new(RecordingEventSink::preventing(
        PipelineEventName::InboundMessage,
    ));
    let manager = manager_with(
        serde_json::Value::Null,
        MockRunner::scripted("local-agent", vec![("ok".into(), true)]),
        sink.clone(),
    );
    manager.load_pipelines().await.unwrap();

    let adapter = Arc::new(MockAdapter::new("mock", true));
    manager
        .dispatch(event_fixture(EventKind::Friend), &bot(), adapter.clone())
        .unwrap();
    settle().await;

    assert!(adapter.sent_chunks().is_empty());
    assert_eq!(sink.names(), vec![PipelineEventName::InboundMessage]);
    assert!(manager.pool().is_empty());
}

#[tokio::test]
async fn dispatch_to_unknown_pipeline_is_not_found() {
    let manager = manager_with(
        serde_json::Value::Null,
        MockRunner::scripted("local-agent", vec![("ok".into(), true)]),
        Arc::new(NoopEventSink),
    );
    // Definitions intentionally not loaded.

    let adapter = Arc::new(MockAdapter::new("mock", true));
    let err = manager
        .dispatch(event_fixture(EventKind::Friend), &bot(), adapter)
        .unwrap_err();
    assert!(matches!(err, chatgate_core::GateError::NotFound { .. }));
}

#[tokio::test]
async fn reload_drops_removed_definitions() {
    let repository = Arc::new(MemoryRepository::seeded(
        vec![definition(serde_json::Value::Null)],
        vec![bot()],
    ));
    let mut runners = RunnerRegistry::new();
    runners.register(Arc::new(MockRunner::scripted(
        "local-agent",
        vec![("ok".into(), true)],
    )));
    let manager = Arc::new(PipelineManager::new(
        repository.clone(),
        Arc::new(runners),
        Arc::new(NoopEventSink),
        Arc::new(chatgate_pipeline::QueryPool::new()),
    ));
    manager.load_pipelines().await.unwrap();
    assert_eq!(manager.len(), 1);

    // Add a second definition and reload: both live.
    let second = Uuid::new_v4();
    repository.add_pipeline(PipelineDefinition {
        uuid: second,
        name: "secondary".into(),
        stages: vec![],
        config: serde_json::Value::Null,
        extensions_preferences: serde_json::Value::Null,
    });
    assert_eq!(manager.reload().await.unwrap(), 2);
    assert!(manager.get_by_uuid(second).is_some());

    // get_bot resolves enabled bots only.
    let found = manager.get_bot(BOT_UUID.parse().unwrap()).await.unwrap();
    assert_eq!(found.name, "bot");
    let missing = manager.get_bot(Uuid::new_v4()).await;
    assert!(missing.is_err());
}

#[tokio::test]
async fn disabled_bot_is_not_resolvable() {
    let mut disabled = bot();
    disabled.enabled = false;
    let repository = Arc::new(MemoryRepository::seeded(
        vec![definition(serde_json::Value::Null)],
        vec![disabled],
    ));
    let manager = Arc::new(PipelineManager::new(
        repository,
        Arc::new(RunnerRegistry::new()),
        Arc::new(NoopEventSink),
        Arc::new(chatgate_pipeline::QueryPool::new()),
    ));
    assert!(manager.get_bot(BOT_UUID.parse().unwrap()).await.is_err());
}
