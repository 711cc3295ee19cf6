// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Enterprise-IM AI-bot adapter.
//!
//! The platform delivers one user message as a sequence of HTTP POSTs: the
//! first announces the message and must be answered immediately with a new
//! stream id; subsequent POSTs poll that stream for reply chunks until a
//! final one arrives. This adapter terminates that protocol, normalizes
//! inbound payloads into events for its registered listeners, and feeds
//! pipeline output back through the per-message [`StreamRegistry`].
//!
//! [`StreamRegistry`]: chatgate_stream::StreamRegistry

pub mod convert;
pub mod handler;
pub mod server;
pub mod wire;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use chatgate_codec::CallbackCrypto;
use chatgate_config::{AibotConfig, ServerConfig};
use chatgate_core::{
    Adapter, EventKind, EventListener, GateError, MessageChain, MessageEvent, NotFoundKind,
    ReplyMeta, TargetKind,
};
use chatgate_stream::{StreamChunk, StreamRegistry};

use crate::convert::yiri2target;

/// Redeliveries of one msg_id tolerated before the adapter answers a final
/// empty chunk to stop the platform's retries.
pub(crate) const REDELIVERY_THRESHOLD: u32 = 3;

struct DeliveryRecord {
    count: u32,
    last_seen: Instant,
}

pub struct AibotAdapter {
    config: AibotConfig,
    server: ServerConfig,
    crypto: CallbackCrypto,
    registry: StreamRegistry,
    dedup: Mutex<HashMap<String, DeliveryRecord>>,
    listeners: Mutex<Vec<(EventKind, EventListener)>>,
    kill_token: CancellationToken,
    media_client: reqwest::Client,
    /// Back-reference for handing `Arc<Self>` to the HTTP server state.
    self_ref: Weak<AibotAdapter>,
}

impl AibotAdapter {
    pub fn new(config: AibotConfig, server: ServerConfig) -> Result<Arc<Self>, GateError> {
        let crypto = CallbackCrypto::new(
            config.token.clone(),
            &config.aes_key,
            config.receive_id.clone(),
        )?;
        let registry = StreamRegistry::new(
            Duration::from_secs(config.session_ttl_secs),
            config.queue_capacity,
        );
        Ok(Arc::new_cyclic(|weak| Self {
            config,
            server,
            crypto,
            registry,
            dedup: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
            kill_token: CancellationToken::new(),
            media_client: reqwest::Client::new(),
            self_ref: weak.clone(),
        }))
    }

    /// The owning `Arc`, alive for as long as the adapter itself is.
    pub(crate) fn strong(&self) -> Arc<AibotAdapter> {
        self.self_ref
            .upgrade()
            .expect("adapter outlives its own Arc")
    }

    pub(crate) fn crypto(&self) -> &CallbackCrypto {
        &self.crypto
    }

    pub(crate) fn config(&self) -> &AibotConfig {
        &self.config
    }

    pub(crate) fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    pub(crate) fn media_client(&self) -> &reqwest::Client {
        &self.media_client
    }

    pub(crate) fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.config.poll_timeout_ms)
    }

    /// Bumps and returns the delivery count for one msg_id.
    pub(crate) fn record_delivery(&self, msg_id: &str) -> u32 {
        let mut dedup = self.dedup.lock().expect("dedup lock poisoned");
        let record = dedup.entry(msg_id.to_string()).or_insert(DeliveryRecord {
            count: 0,
            last_seen: Instant::now(),
        });
        record.count += 1;
        record.last_seen = Instant::now();
        record.count
    }

    /// Sweeps expired stream sessions and dedup records.
    ///
    /// Runs at the start of every first-POST handling, giving the sweep
    /// amortized constant overhead.
    pub(crate) fn sweep(&self) {
        let removed = self.registry.cleanup();
        if removed > 0 {
            debug!(removed, "expired stream sessions swept");
        }
        let ttl = Duration::from_secs(self.config.session_ttl_secs);
        self.dedup
            .lock()
            .expect("dedup lock poisoned")
            .retain(|_, record| record.last_seen.elapsed() <= ttl);
    }

    /// Feeds a normalized event to every listener of its kind.
    pub(crate) async fn dispatch_event(&self, event: MessageEvent) {
        let listeners: Vec<EventListener> = self
            .listeners
            .lock()
            .expect("listeners lock poisoned")
            .iter()
            .filter(|(kind, _)| *kind == event.kind)
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(event.clone()).await;
        }
    }

    /// Publishes one chunk onto the event's stream session.
    async fn publish_for_event(
        &self,
        event: &MessageEvent,
        content: String,
        is_final: bool,
    ) -> Result<(), GateError> {
        let msg_id = event
            .platform_str("msg_id")
            .ok_or_else(|| GateError::AdapterSend {
                message: "event carries no msg_id".to_string(),
                source: None,
            })?;
        let session =
            self.registry
                .get_by_msg_id(msg_id)
                .ok_or_else(|| GateError::NotFound {
                    kind: NotFoundKind::StreamSession,
                    id: msg_id.to_string(),
                })?;
        if !self
            .registry
            .publish(session.stream_id(), StreamChunk::text(content, is_final))
            .await
        {
            return Err(GateError::AdapterSend {
                message: format!("stream session {msg_id} vanished during publish"),
                source: None,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Adapter for AibotAdapter {
    fn name(&self) -> &str {
        "aibot"
    }

    fn is_stream_output_supported(&self) -> bool {
        true
    }

    fn register_listener(&self, kind: EventKind, listener: EventListener) {
        self.listeners
            .lock()
            .expect("listeners lock poisoned")
            .push((kind, listener));
    }

    /// A whole reply becomes a single final chunk on the stream.
    async fn reply_message(
        &self,
        event: &MessageEvent,
        chain: MessageChain,
        _quote_origin: bool,
    ) -> Result<(), GateError> {
        self.publish_for_event(event, yiri2target(&chain), true).await
    }

    async fn reply_message_chunk(
        &self,
        event: &MessageEvent,
        _meta: &ReplyMeta,
        chain: MessageChain,
        _quote_origin: bool,
        is_final: bool,
    ) -> Result<(), GateError> {
        self.publish_for_event(event, yiri2target(&chain), is_final)
            .await
    }

    /// The callback protocol is poll-only; there is no out-of-band push.
    async fn send_message(
        &self,
        _target: TargetKind,
        target_id: &str,
        _chain: MessageChain,
    ) -> Result<(), GateError> {
        Err(GateError::AdapterSend {
            message: format!("aibot adapter cannot push to {target_id}: protocol is poll-only"),
            source: None,
        })
    }

    async fn run_until(&self, cancel: CancellationToken) -> Result<(), GateError> {
        let stop = CancellationToken::new();
        let stop_on_cancel = stop.clone();
        let kill = self.kill_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = kill.cancelled() => {}
            }
            stop_on_cancel.cancel();
        });
        server::serve(self.strong(), &self.server.host, self.server.port, stop).await
    }

    async fn kill(&self) -> Result<(), GateError> {
        self.kill_token.cancel();
        Ok(())
    }
}
