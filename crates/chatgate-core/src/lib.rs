// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the chatgate gateway.
//!
//! Provides the message interchange model ([`MessageChain`]), normalized
//! inbound events ([`MessageEvent`]), the framework error type
//! ([`GateError`]), and the trait seams adapters and repositories implement.

pub mod error;
pub mod event;
pub mod message;
pub mod traits;

pub use error::{GateError, NotFoundKind, RunnerErrorKind};
pub use event::{EventKind, GroupInfo, MessageEvent, Sender, TargetKind};
pub use message::{ForwardNode, MessageChain, MessageComponent};
pub use traits::{
    Adapter, BotDefinition, EventListener, MemoryRepository, PipelineDefinition, ReplyMeta,
    Repository,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_construct() {
        let _sig = GateError::SignatureInvalid;
        let _dec = GateError::DecryptFailed("pad".into());
        let _mal = GateError::Malformed("body".into());
        let _nf = GateError::NotFound {
            kind: NotFoundKind::Bot,
            id: "b1".into(),
        };
        let _adm = GateError::AdmissionDenied {
            notice: "rate limited".into(),
        };
        let _blk = GateError::FilterBlocked {
            notice: "blocked".into(),
        };
        let _run = GateError::Runner {
            kind: RunnerErrorKind::Upstream,
            message: "503".into(),
        };
        let _send = GateError::AdapterSend {
            message: "refused".into(),
            source: None,
        };
        let _to = GateError::Timeout {
            duration: std::time::Duration::from_millis(500),
        };
        let _int = GateError::Internal("x".into());
    }

    #[test]
    fn chain_and_event_types_are_exported() {
        let chain = MessageChain::from_text("hi");
        let event = MessageEvent {
            kind: EventKind::Friend,
            sender: Sender {
                id: "u".into(),
                nickname: None,
                group: None,
            },
            chain,
            time: chrono::Utc::now(),
            platform_ref: serde_json::Value::Null,
        };
        assert_eq!(event.group_id(), None);
    }
}
