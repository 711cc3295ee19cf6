// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stream sessions for poll-based reply protocols.
//!
//! A [`StreamSession`] bridges one pipeline execution (the producer) and the
//! platform's poll HTTP handler (the consumer) through a bounded FIFO queue.
//! The [`StreamRegistry`] owns all sessions under a single mutex, keyed both
//! by stream id and by the platform message id, and sweeps entries whose
//! last access is older than the TTL.

pub mod registry;

pub use registry::{MsgInfo, StreamChunk, StreamRegistry, StreamSession};
