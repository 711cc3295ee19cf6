// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording adapter double.
//!
//! `MockAdapter` implements [`Adapter`] with in-memory capture of every
//! outbound call, enabling fast CI-runnable tests of the pipeline's output
//! path without a platform.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use chatgate_core::{
    Adapter, EventKind, EventListener, GateError, MessageChain, MessageEvent, ReplyMeta,
    TargetKind,
};

pub struct MockAdapter {
    name: String,
    streaming: bool,
    kill_token: CancellationToken,
    replies: Mutex<Vec<MessageChain>>,
    chunks: Mutex<Vec<(MessageChain, bool)>>,
    pushes: Mutex<Vec<(TargetKind, String, MessageChain)>>,
    listeners: Mutex<Vec<(EventKind, EventListener)>>,
}

impl MockAdapter {
    /// `streaming` controls what `is_stream_output_supported` reports, and
    /// with it which delivery path the pipeline takes.
    pub fn new(name: impl Into<String>, streaming: bool) -> Self {
        Self {
            name: name.into(),
            streaming,
            kill_token: CancellationToken::new(),
            replies: Mutex::new(Vec::new()),
            chunks: Mutex::new(Vec::new()),
            pushes: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Whole replies delivered via `reply_message`, in order.
    pub fn sent_messages(&self) -> Vec<MessageChain> {
        self.replies.lock().expect("replies lock poisoned").clone()
    }

    /// Chunks delivered via `reply_message_chunk`, in order, with finality.
    pub fn sent_chunks(&self) -> Vec<(MessageChain, bool)> {
        self.chunks.lock().expect("chunks lock poisoned").clone()
    }

    /// Out-of-band pushes delivered via `send_message`.
    pub fn sent_pushes(&self) -> Vec<(TargetKind, String, MessageChain)> {
        self.pushes.lock().expect("pushes lock poisoned").clone()
    }

    /// Feeds an event to every listener registered for its kind, as the
    /// real inbound I/O task would.
    pub async fn emit(&self, event: MessageEvent) {
        let listeners: Vec<EventListener> = self
            .listeners
            .lock()
            .expect("listeners lock poisoned")
            .iter()
            .filter(|(kind, _)| *kind == event.kind)
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(event.clone()).await;
        }
    }

    pub fn was_killed(&self) -> bool {
        self.kill_token.is_cancelled()
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_stream_output_supported(&self) -> bool {
        self.streaming
    }

    fn register_listener(&self, kind: EventKind, listener: EventListener) {
        self.listeners
            .lock()
            .expect("listeners lock poisoned")
            .push((kind, listener));
    }

    async fn reply_message(
        &self,
        _event: &MessageEvent,
        chain: MessageChain,
        _quote_origin: bool,
    ) -> Result<(), GateError> {
        self.replies.lock().expect("replies lock poisoned").push(chain);
        Ok(())
    }

    async fn reply_message_chunk(
        &self,
        _event: &MessageEvent,
        _meta: &ReplyMeta,
        chain: MessageChain,
        _quote_origin: bool,
        is_final: bool,
    ) -> Result<(), GateError> {
        self.chunks
            .lock()
            .expect("chunks lock poisoned")
            .push((chain, is_final));
        Ok(())
    }

    async fn send_message(
        &self,
        target: TargetKind,
        target_id: &str,
        chain: MessageChain,
    ) -> Result<(), GateError> {
        self.pushes
            .lock()
            .expect("pushes lock poisoned")
            .push((target, target_id.to_string(), chain));
        Ok(())
    }

    async fn run_until(&self, cancel: CancellationToken) -> Result<(), GateError> {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = self.kill_token.cancelled() => {}
        }
        Ok(())
    }

    async fn kill(&self) -> Result<(), GateError> {
        self.kill_token.cancel();
        Ok(())
    }
}
