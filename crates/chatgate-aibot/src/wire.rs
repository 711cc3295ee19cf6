// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire shapes of the AI-bot callback protocol.
//!
//! Every request body is `{"encrypt": …}` with `msg_signature`, `timestamp`
//! and `nonce` as query parameters; the decrypted plaintext carries the
//! structures below.

use serde::{Deserialize, Serialize};

/// Query parameters on every callback request.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackParams {
    pub msg_signature: String,
    pub timestamp: String,
    pub nonce: String,
    /// Present on GET verification handshakes only.
    #[serde(default)]
    pub echostr: Option<String>,
}

/// Encrypted request/response body envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedBody {
    pub encrypt: String,
}

/// Decrypted inbound message payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundPayload {
    #[serde(default)]
    pub msgid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aibotid: Option<String>,
    /// `single` or `group`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chattype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chatid: Option<String>,
    /// `text`, `image`, `mixed`, or `stream` for poll requests.
    #[serde(default)]
    pub msgtype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<FromUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<Box<QuotedMessage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FromUser {
    pub userid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A quoted earlier message, parsed recursively into the event chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotedMessage {
    #[serde(default)]
    pub msgid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userid: Option<String>,
    #[serde(default)]
    pub msgtype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<Box<QuotedMessage>>,
}

/// Poll requests reference the stream by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRef {
    #[serde(default)]
    pub id: String,
}

/// Outbound stream reply plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamReply {
    pub msgtype: String,
    pub stream: StreamState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamState {
    pub id: String,
    pub finish: bool,
    pub content: String,
}

impl StreamReply {
    pub fn new(id: impl Into<String>, finish: bool, content: impl Into<String>) -> Self {
        Self {
            msgtype: "stream".to_string(),
            stream: StreamState {
                id: id.into(),
                finish,
                content: content.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_text_payload_parses() {
        let payload: InboundPayload = serde_json::from_value(serde_json::json!({
            "chattype": "single",
            "msgtype": "text",
            "msgid": "M1",
            "from": {"userid": "U"},
            "text": {"content": "hi"},
        }))
        .unwrap();
        assert_eq!(payload.msgid, "M1");
        assert_eq!(payload.chattype.as_deref(), Some("single"));
        assert_eq!(payload.text.unwrap().content, "hi");
        assert!(payload.stream.is_none());
    }

    #[test]
    fn poll_payload_carries_stream_id() {
        let payload: InboundPayload = serde_json::from_value(serde_json::json!({
            "msgtype": "stream",
            "stream": {"id": "abc-123"},
        }))
        .unwrap();
        assert_eq!(payload.stream.unwrap().id, "abc-123");
    }

    #[test]
    fn stream_reply_serializes_protocol_shape() {
        let reply = StreamReply::new("S1", false, "");
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["msgtype"], "stream");
        assert_eq!(json["stream"]["id"], "S1");
        assert_eq!(json["stream"]["finish"], false);
        assert_eq!(json["stream"]["content"], "");
    }

    #[test]
    fn nested_quote_parses() {
        let payload: InboundPayload = serde_json::from_value(serde_json::json!({
            "chattype": "group",
            "chatid": "G",
            "msgtype": "text",
            "msgid": "M2",
            "from": {"userid": "U"},
            "text": {"content": "see above"},
            "quote": {
                "msgid": "M0",
                "userid": "V",
                "msgtype": "text",
                "text": {"content": "the original"},
            },
        }))
        .unwrap();
        let quote = payload.quote.unwrap();
        assert_eq!(quote.userid.as_deref(), Some("V"));
        assert_eq!(quote.text.unwrap().content, "the original");
    }
}
