// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The message interchange model: an ordered chain of typed parts.
//!
//! Every adapter converts its platform payloads into a [`MessageChain`] on
//! the way in and back out of one on the way out. The chain is the only
//! message representation the pipeline ever sees.

use serde::{Deserialize, Serialize};

/// A single typed part of a message.
///
/// Ownership keeps the model acyclic: nested chains in [`Quote`] and
/// [`Forward`] are owned values, never shared references.
///
/// [`Quote`]: MessageComponent::Quote
/// [`Forward`]: MessageComponent::Forward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageComponent {
    /// Plain text.
    Text { text: String },
    /// Mention of a single user.
    At { target: String },
    /// Mention of everyone in a group.
    AtAll,
    /// An image, carried as at most one of a URL, inline base64, or local path.
    Image {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base64: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    /// A voice clip.
    Voice {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base64: Option<String>,
    },
    /// A file attachment.
    File {
        url: String,
        name: String,
        size: u64,
    },
    /// A reply quoting an earlier message.
    Quote {
        sender_id: String,
        origin: MessageChain,
    },
    /// A forwarded bundle of messages.
    Forward { nodes: Vec<ForwardNode> },
    /// A rich card with a title and body.
    Card { title: String, content: String },
    /// Platform message identity (message id + timestamp), when known.
    Source { id: String, time: i64 },
    /// Anything the adapter could not map; kept verbatim for debugging.
    Unknown { raw: serde_json::Value },
}

/// One entry of a [`MessageComponent::Forward`] bundle.
///
/// The nested chain is a fresh owned value per node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardNode {
    pub sender_id: String,
    pub sender_name: String,
    pub chain: MessageChain,
}

/// An ordered, finite sequence of message parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageChain(pub Vec<MessageComponent>);

impl MessageChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Creates a chain with a single text part.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self(vec![MessageComponent::Text { text: text.into() }])
    }

    pub fn push(&mut self, part: MessageComponent) {
        self.0.push(part);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MessageComponent> {
        self.0.iter()
    }

    /// Concatenated text of all `Text` parts.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for part in &self.0 {
            if let MessageComponent::Text { text } = part {
                out.push_str(text);
            }
        }
        out
    }

    /// True if the chain carries no renderable content (text, media, card).
    ///
    /// `Source` and `At` parts alone do not count as content.
    pub fn is_blank(&self) -> bool {
        !self.0.iter().any(|part| match part {
            MessageComponent::Text { text } => !text.trim().is_empty(),
            MessageComponent::Image { .. }
            | MessageComponent::Voice { .. }
            | MessageComponent::File { .. }
            | MessageComponent::Forward { .. }
            | MessageComponent::Card { .. } => true,
            _ => false,
        })
    }

    /// True if any part mentions `target`.
    pub fn has_at(&self, target: &str) -> bool {
        self.0
            .iter()
            .any(|p| matches!(p, MessageComponent::At { target: t } if t == target))
    }

    /// Removes up to `max` mentions of `target`, returning how many were removed.
    ///
    /// Platforms sometimes double-insert the mention on replies, so callers
    /// pass `max = 2` rather than stripping all occurrences.
    pub fn remove_at(&mut self, target: &str, max: usize) -> usize {
        let mut removed = 0;
        self.0.retain(|p| {
            if removed < max
                && matches!(p, MessageComponent::At { target: t } if t == target)
            {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    /// Replaces the text of the first `Text` part, or appends one if none exists.
    pub fn set_first_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        for part in &mut self.0 {
            if let MessageComponent::Text { text: t } = part {
                *t = text;
                return;
            }
        }
        self.0.push(MessageComponent::Text { text });
    }

    /// The first `Quote` part, if any.
    pub fn quote(&self) -> Option<(&str, &MessageChain)> {
        self.0.iter().find_map(|p| match p {
            MessageComponent::Quote { sender_id, origin } => {
                Some((sender_id.as_str(), origin))
            }
            _ => None,
        })
    }
}

impl From<Vec<MessageComponent>> for MessageChain {
    fn from(parts: Vec<MessageComponent>) -> Self {
        Self(parts)
    }
}

impl IntoIterator for MessageChain {
    type Item = MessageComponent;
    type IntoIter = std::vec::IntoIter<MessageComponent>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(target: &str) -> MessageComponent {
        MessageComponent::At {
            target: target.into(),
        }
    }

    #[test]
    fn plain_text_concatenates_text_parts_only() {
        let chain = MessageChain(vec![
            MessageComponent::Source {
                id: "m1".into(),
                time: 1700000000,
            },
            MessageComponent::Text { text: "hello ".into() },
            at("bot"),
            MessageComponent::Text { text: "world".into() },
        ]);
        assert_eq!(chain.plain_text(), "hello world");
    }

    #[test]
    fn remove_at_strips_at_most_max() {
        let mut chain = MessageChain(vec![
            at("bot"),
            at("bot"),
            at("bot"),
            MessageComponent::Text { text: "hi".into() },
        ]);
        assert_eq!(chain.remove_at("bot", 2), 2);
        assert_eq!(chain.len(), 2);
        assert!(chain.has_at("bot"));
    }

    #[test]
    fn remove_at_ignores_other_targets() {
        let mut chain = MessageChain(vec![at("alice"), at("bot")]);
        assert_eq!(chain.remove_at("bot", 2), 1);
        assert!(chain.has_at("alice"));
        assert!(!chain.has_at("bot"));
    }

    #[test]
    fn blank_chain_detection() {
        assert!(MessageChain::new().is_blank());
        assert!(MessageChain::from_text("   ").is_blank());
        assert!(
            MessageChain(vec![MessageComponent::Source {
                id: "m".into(),
                time: 0
            }])
            .is_blank()
        );
        assert!(!MessageChain::from_text("hi").is_blank());
        assert!(
            !MessageChain(vec![MessageComponent::Image {
                url: Some("https://example.com/a.png".into()),
                base64: None,
                path: None,
            }])
            .is_blank()
        );
    }

    #[test]
    fn set_first_text_replaces_or_appends() {
        let mut chain = MessageChain(vec![at("bot"), MessageComponent::Text { text: "old".into() }]);
        chain.set_first_text("new");
        assert_eq!(chain.plain_text(), "new");

        let mut empty = MessageChain::new();
        empty.set_first_text("added");
        assert_eq!(empty.plain_text(), "added");
    }

    #[test]
    fn quote_carries_nested_chain() {
        let origin = MessageChain::from_text("original message");
        let chain = MessageChain(vec![
            MessageComponent::Quote {
                sender_id: "u1".into(),
                origin: origin.clone(),
            },
            MessageComponent::Text { text: "reply".into() },
        ]);
        let (sender, quoted) = chain.quote().expect("quote part present");
        assert_eq!(sender, "u1");
        assert_eq!(quoted, &origin);
    }

    #[test]
    fn serde_tagged_roundtrip() {
        let chain = MessageChain(vec![
            MessageComponent::Text { text: "hi".into() },
            at("bot"),
            MessageComponent::AtAll,
            MessageComponent::Image {
                url: None,
                base64: Some("aGk=".into()),
                path: None,
            },
            MessageComponent::Forward {
                nodes: vec![ForwardNode {
                    sender_id: "u2".into(),
                    sender_name: "Two".into(),
                    chain: MessageChain::from_text("inner"),
                }],
            },
        ]);
        let json = serde_json::to_string(&chain).unwrap();
        assert!(json.contains(r#""type":"text""#));
        assert!(json.contains(r#""type":"at_all""#));
        let back: MessageChain = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chain);
    }

    #[test]
    fn unknown_part_preserves_raw_value() {
        let raw = serde_json::json!({"weird": {"nested": [1, 2]}});
        let chain = MessageChain(vec![MessageComponent::Unknown { raw: raw.clone() }]);
        let json = serde_json::to_string(&chain).unwrap();
        let back: MessageChain = serde_json::from_str(&json).unwrap();
        match &back.0[0] {
            MessageComponent::Unknown { raw: r } => assert_eq!(r, &raw),
            other => panic!("expected Unknown, got {other:?}"),
        }
    }
}
