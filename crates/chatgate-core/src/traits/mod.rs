// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the gateway core and its external collaborators.

pub mod adapter;
pub mod memory;
pub mod repository;

pub use adapter::{Adapter, EventListener, ReplyMeta};
pub use memory::MemoryRepository;
pub use repository::{BotDefinition, PipelineDefinition, Repository};
