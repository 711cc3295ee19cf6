// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in fallback runner.
//!
//! Vendor-backed runners register here from their own crates; `local-agent`
//! keeps a freshly seeded gateway answering without any of them configured.

use async_trait::async_trait;
use futures::stream;

use chatgate_core::{GateError, MessageChain};
use chatgate_pipeline::{Query, Runner, RunnerChunk, RunnerStream};

/// Acknowledges the inbound text back to the sender.
pub struct EchoRunner;

#[async_trait]
impl Runner for EchoRunner {
    fn name(&self) -> &str {
        "local-agent"
    }

    async fn run(&self, query: &Query) -> Result<RunnerStream, GateError> {
        let text = query.message_chain.plain_text();
        Ok(Box::pin(stream::iter(vec![Ok(RunnerChunk::assistant(
            MessageChain::from_text(format!("echo: {text}")),
            true,
        ))])))
    }
}
