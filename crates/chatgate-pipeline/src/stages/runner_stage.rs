// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The runner stage: invokes the configured runner and fans its chunks out
//! to the adapter.
//!
//! Streaming adapters receive every chunk as it is produced; synchronous
//! adapters get one `reply_message` with the buffered whole once the final
//! chunk arrives. Chunk order per query is preserved end to end (single
//! producer, single consumer). Each chunk's text passes the post-runner
//! content filters before it leaves the process.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use chatgate_config::PipelineConfig;
use chatgate_core::{GateError, MessageChain, MessageComponent, ReplyMeta, RunnerErrorKind};

use crate::events::{EventSink, PipelineEvent, PipelineEventName};
use crate::query::Query;
use crate::runner::RunnerRegistry;
use crate::stage::{Stage, StageResult};
use crate::stages::filters::{self, ContentFilterStage, FilterOutcome};

const RUNNER_FAILED_NOTICE: &str = "Something went wrong while generating the reply.";
const RUNNER_TIMEOUT_NOTICE: &str = "The reply took too long to generate.";

pub struct RunnerStage {
    runners: Arc<RunnerRegistry>,
    events: Arc<dyn EventSink>,
    post_filter: ContentFilterStage,
}

impl RunnerStage {
    pub fn new(
        runners: Arc<RunnerRegistry>,
        events: Arc<dyn EventSink>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            runners,
            events,
            post_filter: ContentFilterStage::post(config),
        }
    }

    /// Delivers `notice` as the single, terminal reply for the query.
    async fn send_notice(&self, query: &Query, notice: &str) {
        if let Err(e) = query
            .adapter
            .reply_message(&query.message_event, MessageChain::from_text(notice), false)
            .await
        {
            warn!(query_id = query.query_id, error = %e, "failed to deliver notice");
        }
    }
}

#[async_trait]
impl Stage for RunnerStage {
    async fn process(&self, query: &mut Query, stage_name: &str) -> StageResult {
        let pre = self
            .events
            .emit(PipelineEvent::for_query(
                PipelineEventName::PreRunner,
                query,
                serde_json::json!({
                    "text": query.message_chain.plain_text(),
                    "variables": query.variables,
                }),
            ))
            .await;
        if pre.prevent_default {
            debug!(query_id = query.query_id, "pre_runner prevented default");
            return StageResult::interrupt();
        }

        let runner_name = query.pipeline_config.ai.runner.clone();
        let runner = match self.runners.get(&runner_name) {
            Ok(runner) => runner,
            Err(e) => {
                error!(stage = stage_name, runner = runner_name.as_str(), error = %e, "runner missing");
                return StageResult::error(RUNNER_FAILED_NOTICE)
                    .with_console(format!("runner {runner_name} not found"));
            }
        };

        let remove_think = query.pipeline_config.output.misc.remove_think;
        let streaming = query.adapter.is_stream_output_supported();
        let deadline =
            Instant::now() + std::time::Duration::from_secs(query.pipeline_config.ai.timeout_secs);

        let mut stream = match tokio::time::timeout_at(deadline, runner.run(query)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                error!(query_id = query.query_id, error = %e, "runner start failed");
                return StageResult::error(RUNNER_FAILED_NOTICE).with_console(e.to_string());
            }
            Err(_) => {
                let e = GateError::Runner {
                    kind: RunnerErrorKind::Timeout,
                    message: format!("runner {runner_name} start timed out"),
                };
                error!(query_id = query.query_id, error = %e, "runner timed out");
                return StageResult::error(RUNNER_TIMEOUT_NOTICE).with_console(e.to_string());
            }
        };

        let mut sequence: u64 = 0;
        let mut delivered_any = false;
        let mut buffer_text = String::new();
        let mut buffer_rest: Vec<MessageComponent> = Vec::new();
        let mut outbound_emitted = false;

        loop {
            let item = match tokio::time::timeout_at(deadline, stream.next()).await {
                Ok(item) => item,
                Err(_) => {
                    let e = GateError::Runner {
                        kind: RunnerErrorKind::Timeout,
                        message: format!("runner {runner_name} chunk timed out"),
                    };
                    error!(query_id = query.query_id, error = %e, "runner timed out");
                    return StageResult::error(RUNNER_TIMEOUT_NOTICE).with_console(e.to_string());
                }
            };

            let Some(item) = item else { break };
            let chunk = match item {
                Ok(chunk) => chunk,
                Err(e) => {
                    error!(query_id = query.query_id, error = %e, "runner stream failed");
                    return StageResult::error(RUNNER_FAILED_NOTICE).with_console(e.to_string());
                }
            };

            let original = chunk.content.plain_text();
            let mut text = original.clone();
            if remove_think {
                text = filters::strip_think(&text).to_string();
            }

            let content = match self.post_filter.screen(&text) {
                FilterOutcome::Blocked {
                    user_notice,
                    console_notice,
                } => {
                    if let Some(notice) = console_notice {
                        warn!(query_id = query.query_id, notice = notice.as_str(), "output blocked");
                    }
                    match user_notice {
                        Some(notice) => self.send_notice(query, &notice).await,
                        // Terminate an already-started stream so the
                        // platform stops polling.
                        None if streaming && delivered_any => {
                            let meta = ReplyMeta {
                                message_id: None,
                                sequence,
                            };
                            let _ = query
                                .adapter
                                .reply_message_chunk(
                                    &query.message_event,
                                    &meta,
                                    MessageChain::new(),
                                    false,
                                    true,
                                )
                                .await;
                        }
                        None => {}
                    }
                    return StageResult::interrupt()
                        .with_console("post-runner filter blocked output");
                }
                FilterOutcome::Passed { text, changed } => {
                    if changed || text != original {
                        MessageChain::from_text(text)
                    } else {
                        chunk.content
                    }
                }
            };

            if !outbound_emitted {
                outbound_emitted = true;
                let outbound = self
                    .events
                    .emit(PipelineEvent::for_query(
                        PipelineEventName::OutboundMessage,
                        query,
                        serde_json::json!({ "text": content.plain_text() }),
                    ))
                    .await;
                if outbound.prevent_default {
                    debug!(query_id = query.query_id, "outbound_message prevented default");
                    return StageResult::interrupt();
                }
            }

            query.resp_messages.push(content.clone());

            if streaming {
                let meta = ReplyMeta {
                    message_id: None,
                    sequence,
                };
                sequence += 1;
                if let Err(e) = query
                    .adapter
                    .reply_message_chunk(
                        &query.message_event,
                        &meta,
                        content,
                        false,
                        chunk.is_final,
                    )
                    .await
                {
                    // No retry at this layer; the runner's retry is the
                    // authoritative one.
                    warn!(query_id = query.query_id, error = %e, "chunk delivery failed");
                }
                delivered_any = true;
                if chunk.is_final {
                    break;
                }
            } else {
                for part in content {
                    match part {
                        MessageComponent::Text { text } => {
                            buffer_text.push_str(&text)
                        }
                        other => buffer_rest.push(other),
                    }
                }
                if chunk.is_final {
                    let mut full = MessageChain::new();
                    if !buffer_text.is_empty() {
                        full.push(MessageComponent::Text {
                            text: std::mem::take(&mut buffer_text),
                        });
                    }
                    for part in buffer_rest.drain(..) {
                        full.push(part);
                    }
                    if !full.is_empty()
                        && let Err(e) = query
                            .adapter
                            .reply_message(&query.message_event, full, false)
                            .await
                    {
                        warn!(query_id = query.query_id, error = %e, "reply delivery failed");
                    }
                    break;
                }
            }
        }

        self.events
            .emit(PipelineEvent::for_query(
                PipelineEventName::PostRunner,
                query,
                serde_json::json!({ "replies": query.resp_messages.len() }),
            ))
            .await;

        StageResult::proceed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{Runner, RunnerStream};
    use crate::stage::ResultKind;
    use chatgate_config::{ContentFilterConfig, FilterAction};
    use chatgate_core::EventKind;
    use chatgate_test_utils::{MockAdapter, MockRunner, query_fixture_on_adapter};
    use futures::stream;

    fn stage_with(
        runner: Arc<dyn Runner>,
        config: &PipelineConfig,
    ) -> RunnerStage {
        let mut registry = RunnerRegistry::new();
        registry.register(runner);
        RunnerStage::new(
            Arc::new(registry),
            Arc::new(crate::events::NoopEventSink),
            config,
        )
    }

    fn chunked_runner(chunks: Vec<(&str, bool)>) -> Arc<MockRunner> {
        Arc::new(MockRunner::scripted(
            "local-agent",
            chunks
                .into_iter()
                .map(|(text, is_final)| (text.to_string(), is_final))
                .collect(),
        ))
    }

    #[tokio::test]
    async fn streaming_adapter_receives_chunks_in_order() {
        let adapter = Arc::new(MockAdapter::new("mock", true));
        let config = Arc::new(PipelineConfig::default());
        let stage = stage_with(
            chunked_runner(vec![("Hel", false), ("lo", false), ("", true)]),
            &config,
        );
        let mut query = query_fixture_on_adapter(EventKind::Friend, config, adapter.clone());

        let result = stage.process(&mut query, "Runner").await;
        assert_eq!(result.kind, ResultKind::Continue);

        let chunks = adapter.sent_chunks();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].0.plain_text(), "Hel");
        assert_eq!(chunks[1].0.plain_text(), "lo");
        assert!(chunks[2].1, "last chunk must be final");
        assert!(adapter.sent_messages().is_empty());
        assert_eq!(query.resp_messages.len(), 3);
    }

    #[tokio::test]
    async fn synchronous_adapter_gets_one_buffered_reply() {
        let adapter = Arc::new(MockAdapter::new("mock", false));
        let config = Arc::new(PipelineConfig::default());
        let stage = stage_with(
            chunked_runner(vec![("Hel", false), ("lo", false), ("", true)]),
            &config,
        );
        let mut query = query_fixture_on_adapter(EventKind::Friend, config, adapter.clone());

        let result = stage.process(&mut query, "Runner").await;
        assert_eq!(result.kind, ResultKind::Continue);

        assert!(adapter.sent_chunks().is_empty());
        let messages = adapter.sent_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].plain_text(), "Hello");
    }

    #[tokio::test]
    async fn post_filter_block_sends_notice_once_and_no_chunks() {
        let adapter = Arc::new(MockAdapter::new("mock", true));
        let mut config = PipelineConfig::default();
        config.safety.content_filter = ContentFilterConfig {
            ban_words: vec!["banned".into()],
            action: FilterAction::Block,
            ..ContentFilterConfig::default()
        };
        let config = Arc::new(config);
        let stage = stage_with(chunked_runner(vec![("<banned>", true)]), &config);
        let mut query = query_fixture_on_adapter(EventKind::Friend, config, adapter.clone());

        let result = stage.process(&mut query, "Runner").await;
        assert_eq!(result.kind, ResultKind::Interrupt);

        assert!(adapter.sent_chunks().is_empty(), "no chunks delivered");
        let messages = adapter.sent_messages();
        assert_eq!(messages.len(), 1, "notice sent exactly once");
        assert!(query.resp_messages.is_empty());
    }

    #[tokio::test]
    async fn missing_runner_is_an_error_result() {
        let adapter = Arc::new(MockAdapter::new("mock", true));
        let mut config = PipelineConfig::default();
        config.ai.runner = "no-such-runner".into();
        let config = Arc::new(config);
        let stage = stage_with(chunked_runner(vec![("x", true)]), &config);
        let mut query = query_fixture_on_adapter(EventKind::Friend, config, adapter);

        let result = stage.process(&mut query, "Runner").await;
        assert_eq!(result.kind, ResultKind::Error);
        assert!(result.error_notice.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_runner_times_out_with_error() {
        struct Stalled;

        #[async_trait]
        impl Runner for Stalled {
            fn name(&self) -> &str {
                "local-agent"
            }
            async fn run(&self, _query: &Query) -> Result<RunnerStream, GateError> {
                Ok(Box::pin(stream::pending()))
            }
        }

        let adapter = Arc::new(MockAdapter::new("mock", true));
        let mut config = PipelineConfig::default();
        config.ai.timeout_secs = 5;
        let config = Arc::new(config);
        let stage = stage_with(Arc::new(Stalled), &config);
        let mut query = query_fixture_on_adapter(EventKind::Friend, config, adapter);

        let result = stage.process(&mut query, "Runner").await;
        assert_eq!(result.kind, ResultKind::Error);
        assert_eq!(result.error_notice.as_deref(), Some(RUNNER_TIMEOUT_NOTICE));
    }

    #[tokio::test]
    async fn remove_think_strips_model_reasoning() {
        let adapter = Arc::new(MockAdapter::new("mock", false));
        let mut config = PipelineConfig::default();
        config.output.misc.remove_think = true;
        let config = Arc::new(config);
        let stage = stage_with(
            chunked_runner(vec![("<think>mull it over</think>the answer", true)]),
            &config,
        );
        let mut query = query_fixture_on_adapter(EventKind::Friend, config, adapter.clone());

        stage.process(&mut query, "Runner").await;
        let messages = adapter.sent_messages();
        assert_eq!(messages[0].plain_text(), "the answer");
    }
}
