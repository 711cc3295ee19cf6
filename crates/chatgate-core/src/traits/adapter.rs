// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform adapter trait.
//!
//! An adapter owns one platform integration end to end: it terminates the
//! platform's inbound protocol, emits normalized [`MessageEvent`]s to its
//! registered listeners, and translates reply chains back into platform
//! payloads.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::GateError;
use crate::event::{EventKind, MessageEvent, TargetKind};
use crate::message::MessageChain;

/// Callback invoked for every normalized inbound event of a registered kind.
pub type EventListener =
    Arc<dyn Fn(MessageEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Metadata identifying the bot-side message a chunk belongs to.
#[derive(Debug, Clone, Default)]
pub struct ReplyMeta {
    /// Platform message id of the reply being assembled, when the platform
    /// assigns one.
    pub message_id: Option<String>,
    /// Monotonic chunk index within one logical reply.
    pub sequence: u64,
}

/// A platform integration.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Stable adapter name used in bot bindings and logs.
    fn name(&self) -> &str;

    /// Whether the platform can receive incremental reply chunks.
    fn is_stream_output_supported(&self) -> bool {
        false
    }

    /// Registers a listener for inbound events of `kind`.
    fn register_listener(&self, kind: EventKind, listener: EventListener);

    /// Sends one complete reply for `event`.
    async fn reply_message(
        &self,
        event: &MessageEvent,
        chain: MessageChain,
        quote_origin: bool,
    ) -> Result<(), GateError>;

    /// Forwards one reply chunk for `event`.
    ///
    /// Adapters without streaming support keep this default, which delivers
    /// only the final chunk as a whole reply.
    async fn reply_message_chunk(
        &self,
        event: &MessageEvent,
        _meta: &ReplyMeta,
        chain: MessageChain,
        quote_origin: bool,
        is_final: bool,
    ) -> Result<(), GateError> {
        if is_final {
            self.reply_message(event, chain, quote_origin).await
        } else {
            Ok(())
        }
    }

    /// Out-of-band push to a person or group, outside any inbound event.
    async fn send_message(
        &self,
        target: TargetKind,
        target_id: &str,
        chain: MessageChain,
    ) -> Result<(), GateError>;

    /// Runs the long-lived inbound I/O task until `cancel` fires.
    async fn run_until(&self, cancel: CancellationToken) -> Result<(), GateError>;

    /// Cooperative shutdown: cancels the inbound task started by `run_until`.
    async fn kill(&self) -> Result<(), GateError>;
}
