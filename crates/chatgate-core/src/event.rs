// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Normalized inbound message events.
//!
//! Adapters convert platform payloads into a [`MessageEvent`] before handing
//! them to the pipeline manager. Events are immutable once emitted; anything
//! platform-specific the typed fields cannot carry rides along in
//! [`MessageEvent::platform_ref`] for reply routing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::MessageChain;

/// Whether the message arrived from a direct chat or a group.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Friend,
    Group,
}

/// Target kind for out-of-band pushes via `Adapter::send_message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TargetKind {
    Person,
    Group,
}

/// Group context for messages arriving from a group chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// The message author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub id: String,
    #[serde(default)]
    pub nickname: Option<String>,
    /// Present iff the event kind is [`EventKind::Group`].
    #[serde(default)]
    pub group: Option<GroupInfo>,
}

/// A normalized inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub kind: EventKind,
    pub sender: Sender,
    pub chain: MessageChain,
    pub time: DateTime<Utc>,
    /// Opaque per-platform routing data (message id, chat id, stream id, …).
    ///
    /// Unknown platform fields are retained here and never promoted to
    /// typed fields.
    #[serde(default)]
    pub platform_ref: serde_json::Value,
}

impl MessageEvent {
    /// The group id for group events, `None` for direct chats.
    pub fn group_id(&self) -> Option<&str> {
        self.sender.group.as_ref().map(|g| g.id.as_str())
    }

    /// A string field from `platform_ref`, if present.
    pub fn platform_str(&self, key: &str) -> Option<&str> {
        self.platform_ref.get(key).and_then(|v| v.as_str())
    }
}
