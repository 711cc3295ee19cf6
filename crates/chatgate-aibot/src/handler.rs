// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Callback request handling: the verification GET, first POSTs, and polls.
//!
//! The first POST for a message must be answered immediately with a fresh
//! stream header while the pipeline is scheduled in the background; polls
//! wait on the stream queue for up to the configured timeout. Redelivered
//! first POSTs never re-invoke the pipeline: within the threshold they
//! re-issue the current stream header, beyond it they answer a final empty
//! chunk to stop the platform's retries.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use chatgate_core::GateError;
use chatgate_stream::MsgInfo;

use crate::AibotAdapter;
use crate::convert::{ConvertContext, target2yiri};
use crate::wire::{CallbackParams, EncryptedBody, InboundPayload, StreamReply};

/// Handles the GET verification handshake, returning the echo plaintext.
pub fn handle_verify(adapter: &AibotAdapter, params: &CallbackParams) -> Result<String, GateError> {
    let echostr = params
        .echostr
        .as_deref()
        .ok_or_else(|| GateError::Malformed("missing echostr".to_string()))?;
    adapter.crypto().verify_url(
        &params.msg_signature,
        &params.timestamp,
        &params.nonce,
        echostr,
    )
}

/// Handles one callback POST end to end: decrypt, route, encrypt the reply.
pub async fn handle_callback(
    adapter: &Arc<AibotAdapter>,
    params: &CallbackParams,
    body: &str,
) -> Result<EncryptedBody, GateError> {
    let envelope: EncryptedBody = serde_json::from_str(body)
        .map_err(|e| GateError::Malformed(format!("invalid request body: {e}")))?;

    let plaintext = adapter.crypto().decrypt(
        &envelope.encrypt,
        &params.msg_signature,
        &params.timestamp,
        &params.nonce,
    )?;
    let payload: InboundPayload = serde_json::from_slice(&plaintext)
        .map_err(|e| GateError::Malformed(format!("invalid payload: {e}")))?;

    let reply = match payload.stream.clone() {
        Some(stream) => handle_poll(adapter, &stream.id).await,
        None => handle_first_post(adapter, payload).await?,
    };

    let reply_json = serde_json::to_vec(&reply)
        .map_err(|e| GateError::Internal(format!("reply serialization failed: {e}")))?;
    let sealed = adapter
        .crypto()
        .encrypt(&reply_json, &params.nonce, &params.timestamp)?;
    Ok(EncryptedBody {
        encrypt: sealed.encrypt,
    })
}

/// A poll for an existing stream.
///
/// Missing or empty stream ids answer a final empty chunk; an empty queue
/// on a live session answers an empty non-final chunk that keeps the
/// platform polling.
async fn handle_poll(adapter: &Arc<AibotAdapter>, stream_id: &str) -> StreamReply {
    // Empty ids fail to parse and land here too.
    let Ok(uuid) = Uuid::parse_str(stream_id) else {
        debug!(stream_id, "poll with unparseable stream id");
        return StreamReply::new(stream_id, true, "");
    };
    if adapter.registry().get(uuid).is_none() {
        debug!(stream_id, "poll for unknown stream");
        return StreamReply::new(stream_id, true, "");
    }

    match adapter.registry().consume(uuid, adapter.poll_timeout()).await {
        Some(chunk) => StreamReply::new(stream_id, chunk.is_final, chunk.content),
        None => StreamReply::new(stream_id, false, ""),
    }
}

/// A first POST announcing a new message.
async fn handle_first_post(
    adapter: &Arc<AibotAdapter>,
    payload: InboundPayload,
) -> Result<StreamReply, GateError> {
    adapter.sweep();

    if payload.msgid.is_empty() {
        return Err(GateError::Malformed("message without msgid".to_string()));
    }

    let deliveries = adapter.record_delivery(&payload.msgid);
    if deliveries > crate::REDELIVERY_THRESHOLD {
        warn!(msg_id = payload.msgid.as_str(), deliveries, "redelivery storm, answering final");
        return Ok(StreamReply::new("", true, ""));
    }

    let user_id = payload
        .from
        .as_ref()
        .map(|f| f.userid.clone())
        .unwrap_or_default();
    let (session, is_new) = adapter.registry().create_or_get(MsgInfo {
        msg_id: payload.msgid.clone(),
        chat_id: payload.chatid.clone(),
        user_id,
    });
    let stream_id = session.stream_id().to_string();

    if deliveries > 1 || !is_new {
        debug!(
            msg_id = payload.msgid.as_str(),
            deliveries, "redelivered first post, reusing stream"
        );
        return Ok(StreamReply::new(stream_id, false, ""));
    }

    // Normalize and schedule the pipeline without awaiting it; the HTTP
    // response must carry the stream header immediately.
    let bot_name = adapter.config().bot_name.clone();
    let ctx = ConvertContext {
        bot_name: &bot_name,
        media_key: adapter.crypto().key(),
        client: adapter.media_client(),
    };
    let event = target2yiri(&payload, &ctx).await?;
    {
        let adapter = adapter.clone();
        tokio::spawn(async move {
            adapter.dispatch_event(event).await;
        });
    }

    Ok(StreamReply::new(stream_id, false, ""))
}
