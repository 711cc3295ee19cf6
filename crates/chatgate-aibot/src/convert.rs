// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion between AI-bot wire payloads and the internal event model.
//!
//! `target2yiri` normalizes a decrypted inbound payload into a
//! [`MessageEvent`]; `yiri2target` renders a reply chain into the text the
//! stream protocol carries. Textual at-mentions (`@BotName`) become `At`
//! parts; quotes parse recursively into nested chains; encrypted media
//! resolves to inline base64 when the download succeeds.

use chrono::Utc;
use tracing::warn;

use chatgate_core::{
    EventKind, GateError, GroupInfo, MessageChain, MessageComponent, MessageEvent, Sender,
};

use crate::wire::{InboundPayload, QuotedMessage};

/// Splits `text` into `Text` and `At` parts around `@{bot_name}` mentions.
///
/// An empty bot name disables mention detection.
pub fn parse_text_with_mentions(text: &str, bot_name: &str) -> Vec<MessageComponent> {
    if bot_name.is_empty() {
        if text.is_empty() {
            return Vec::new();
        }
        return vec![MessageComponent::Text { text: text.to_string() }];
    }

    let needle = format!("@{bot_name}");
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find(&needle) {
        if pos > 0 {
            parts.push(MessageComponent::Text {
                text: rest[..pos].to_string(),
            });
        }
        parts.push(MessageComponent::At {
            target: bot_name.to_string(),
        });
        rest = rest[pos + needle.len()..].trim_start();
    }
    if !rest.is_empty() {
        parts.push(MessageComponent::Text { text: rest.to_string() });
    }
    parts
}

fn quote_to_chain(quote: &QuotedMessage, bot_name: &str) -> MessageChain {
    let mut chain = MessageChain::new();
    if !quote.msgid.is_empty() {
        chain.push(MessageComponent::Source {
            id: quote.msgid.clone(),
            time: 0,
        });
    }
    if let Some(text) = &quote.text {
        for part in parse_text_with_mentions(&text.content, bot_name) {
            chain.push(part);
        }
    }
    if let Some(image) = &quote.image
        && let Some(url) = &image.url
    {
        chain.push(MessageComponent::Image {
            url: Some(url.clone()),
            base64: None,
            path: None,
        });
    }
    // A quote of a quote nests one level deeper.
    if let Some(inner) = &quote.quote {
        chain.push(MessageComponent::Quote {
            sender_id: inner.userid.clone().unwrap_or_default(),
            origin: quote_to_chain(inner, bot_name),
        });
    }
    chain
}

/// Context for inbound conversion.
pub struct ConvertContext<'a> {
    pub bot_name: &'a str,
    /// AES key for platform-hosted encrypted media.
    pub media_key: &'a [u8; 32],
    pub client: &'a reqwest::Client,
}

/// Normalizes one decrypted inbound payload into a [`MessageEvent`].
pub async fn target2yiri(
    payload: &InboundPayload,
    ctx: &ConvertContext<'_>,
) -> Result<MessageEvent, GateError> {
    let from = payload
        .from
        .as_ref()
        .ok_or_else(|| GateError::Malformed("payload has no sender".to_string()))?;

    let kind = match payload.chattype.as_deref() {
        Some("single") => EventKind::Friend,
        Some("group") => EventKind::Group,
        other => {
            return Err(GateError::Malformed(format!(
                "unknown chattype: {other:?}"
            )));
        }
    };

    let group = match kind {
        EventKind::Group => Some(GroupInfo {
            id: payload
                .chatid
                .clone()
                .ok_or_else(|| GateError::Malformed("group message without chatid".to_string()))?,
            name: None,
        }),
        EventKind::Friend => None,
    };

    let mut chain = MessageChain::new();
    chain.push(MessageComponent::Source {
        id: payload.msgid.clone(),
        time: Utc::now().timestamp(),
    });

    if let Some(quote) = &payload.quote {
        chain.push(MessageComponent::Quote {
            sender_id: quote.userid.clone().unwrap_or_default(),
            origin: quote_to_chain(quote, ctx.bot_name),
        });
    }

    match payload.msgtype.as_str() {
        "text" | "mixed" => {
            if let Some(text) = &payload.text {
                for part in parse_text_with_mentions(&text.content, ctx.bot_name) {
                    chain.push(part);
                }
            }
            if let Some(image) = &payload.image {
                chain.push(resolve_image(image.url.as_deref(), ctx).await);
            }
        }
        "image" => {
            let image = payload
                .image
                .as_ref()
                .ok_or_else(|| GateError::Malformed("image message without image".to_string()))?;
            chain.push(resolve_image(image.url.as_deref(), ctx).await);
        }
        other => {
            chain.push(MessageComponent::Unknown {
                raw: serde_json::json!({ "msgtype": other }),
            });
        }
    }

    Ok(MessageEvent {
        kind,
        sender: Sender {
            id: from.userid.clone(),
            nickname: from.name.clone(),
            group,
        },
        chain,
        time: Utc::now(),
        platform_ref: serde_json::json!({
            "msg_id": payload.msgid,
            "chat_id": payload.chatid,
            "aibot_id": payload.aibotid,
        }),
    })
}

/// Downloads and inlines platform media; falls back to the raw URL when the
/// download fails so the pipeline still sees the image part.
async fn resolve_image(url: Option<&str>, ctx: &ConvertContext<'_>) -> MessageComponent {
    let Some(url) = url else {
        return MessageComponent::Image {
            url: None,
            base64: None,
            path: None,
        };
    };
    match chatgate_codec::download_media(ctx.client, url, ctx.media_key).await {
        Ok((bytes, mime)) => MessageComponent::Image {
            url: None,
            base64: Some(format!(
                "data:{mime};base64,{}",
                base64_encode(&bytes)
            )),
            path: None,
        },
        Err(e) => {
            warn!(url, error = %e, "media download failed, keeping url");
            MessageComponent::Image {
                url: Some(url.to_string()),
                base64: None,
                path: None,
            }
        }
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Renders a reply chain as stream-protocol text.
///
/// Mentions render back to their textual form; media and cards degrade to
/// placeholders since the stream protocol carries text only.
pub fn yiri2target(chain: &MessageChain) -> String {
    let mut out = String::new();
    for part in chain.iter() {
        match part {
            MessageComponent::Text { text } => out.push_str(text),
            MessageComponent::At { target } => {
                out.push('@');
                out.push_str(target);
            }
            MessageComponent::AtAll => out.push_str("@all"),
            MessageComponent::Image { url: Some(url), .. } => {
                out.push_str(&format!("[image: {url}]"));
            }
            MessageComponent::Image { .. } => out.push_str("[image]"),
            MessageComponent::Card { title, content } => {
                out.push_str(title);
                out.push('\n');
                out.push_str(content);
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{FromUser, TextContent};

    fn ctx<'a>(client: &'a reqwest::Client, key: &'a [u8; 32]) -> ConvertContext<'a> {
        ConvertContext {
            bot_name: "Helper",
            media_key: key,
            client,
        }
    }

    fn text_payload(chattype: &str, content: &str) -> InboundPayload {
        InboundPayload {
            msgid: "M1".into(),
            chattype: Some(chattype.into()),
            chatid: (chattype == "group").then(|| "G".to_string()),
            msgtype: "text".into(),
            from: Some(FromUser {
                userid: "U".into(),
                name: None,
            }),
            text: Some(TextContent {
                content: content.into(),
            }),
            ..InboundPayload::default()
        }
    }

    #[test]
    fn mentions_split_into_at_parts() {
        let parts = parse_text_with_mentions("@Helper hi there", "Helper");
        assert_eq!(parts.len(), 2);
        assert!(matches!(&parts[0], MessageComponent::At { target } if target == "Helper"));
        assert!(matches!(&parts[1], MessageComponent::Text { text } if text == "hi there"));
    }

    #[test]
    fn mention_in_the_middle_keeps_surrounding_text() {
        let parts = parse_text_with_mentions("hey @Helper look", "Helper");
        assert_eq!(parts.len(), 3);
        assert!(matches!(&parts[0], MessageComponent::Text { text } if text == "hey "));
        assert!(matches!(&parts[2], MessageComponent::Text { text } if text == "look"));
    }

    #[test]
    fn no_mention_yields_single_text() {
        let parts = parse_text_with_mentions("plain message", "Helper");
        assert_eq!(parts.len(), 1);
    }

    #[tokio::test]
    async fn single_chat_becomes_friend_event() {
        let client = reqwest::Client::new();
        let key = [0u8; 32];
        let event = target2yiri(&text_payload("single", "hi"), &ctx(&client, &key))
            .await
            .unwrap();
        assert_eq!(event.kind, EventKind::Friend);
        assert_eq!(event.sender.id, "U");
        assert_eq!(event.chain.plain_text(), "hi");
        assert_eq!(event.platform_str("msg_id"), Some("M1"));
    }

    #[tokio::test]
    async fn group_chat_becomes_group_event_with_mention() {
        let client = reqwest::Client::new();
        let key = [0u8; 32];
        let event = target2yiri(&text_payload("group", "@Helper hi"), &ctx(&client, &key))
            .await
            .unwrap();
        assert_eq!(event.kind, EventKind::Group);
        assert_eq!(event.group_id(), Some("G"));
        assert!(event.chain.has_at("Helper"));
        assert_eq!(event.chain.plain_text(), "hi");
    }

    #[tokio::test]
    async fn missing_sender_is_malformed() {
        let client = reqwest::Client::new();
        let key = [0u8; 32];
        let mut payload = text_payload("single", "hi");
        payload.from = None;
        let err = target2yiri(&payload, &ctx(&client, &key)).await.unwrap_err();
        assert!(matches!(err, GateError::Malformed(_)));
    }

    #[tokio::test]
    async fn quote_parses_into_nested_chain() {
        let client = reqwest::Client::new();
        let key = [0u8; 32];
        let mut payload = text_payload("group", "what about this?");
        payload.quote = Some(Box::new(QuotedMessage {
            msgid: "M0".into(),
            userid: Some("V".into()),
            msgtype: "text".into(),
            text: Some(TextContent {
                content: "the original".into(),
            }),
            ..QuotedMessage::default()
        }));

        let event = target2yiri(&payload, &ctx(&client, &key)).await.unwrap();
        let (sender, origin) = event.chain.quote().expect("quote part");
        assert_eq!(sender, "V");
        assert_eq!(origin.plain_text(), "the original");
    }

    #[test]
    fn yiri2target_renders_text_and_mentions() {
        let chain = MessageChain(vec![
            MessageComponent::At { target: "U".into() },
            MessageComponent::Text { text: " sure thing".into() },
        ]);
        assert_eq!(yiri2target(&chain), "@U sure thing");
    }

    #[test]
    fn text_roundtrips_through_both_conversions() {
        // yiri2target(target2yiri(m)) preserves representable text content.
        let parts = parse_text_with_mentions("hello world", "Helper");
        let rendered = yiri2target(&MessageChain(parts));
        assert_eq!(rendered, "hello world");
    }
}
