// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The staged, interruptible processing pipeline for chatgate.
//!
//! An inbound [`MessageEvent`] becomes a [`Query`], runs through the
//! ordered stages of a [`RuntimePipeline`] (access control, rate-limit
//! bracket, respond rules, content filters, runner), and its reply chunks
//! fan out through the originating adapter.
//!
//! [`MessageEvent`]: chatgate_core::MessageEvent

pub mod events;
pub mod manager;
pub mod pipeline;
pub mod query;
pub mod ratelimit;
pub mod runner;
pub mod stage;
pub mod stages;

pub use events::{EventContext, EventSink, NoopEventSink, PipelineEvent, PipelineEventName};
pub use manager::PipelineManager;
pub use pipeline::{DEFAULT_STAGE_ORDER, RuntimePipeline};
pub use query::{LauncherType, Query, QueryHandle, QueryPool};
pub use ratelimit::{AdmissionGuard, FixedWindowLimiter, RateLimiter};
pub use runner::{Runner, RunnerChunk, RunnerRegistry, RunnerStream};
pub use stage::{ResultKind, Stage, StageResult};
