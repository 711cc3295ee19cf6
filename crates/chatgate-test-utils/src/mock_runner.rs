// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted runner double.
//!
//! Yields a fixed chunk sequence per invocation, or a queued script per
//! call when runs must differ. An empty queue falls back to a single final
//! "mock response" chunk.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use chatgate_core::{GateError, MessageChain, RunnerErrorKind};
use chatgate_pipeline::{Query, Runner, RunnerChunk, RunnerStream};

type Script = Vec<(String, bool)>;

enum Behavior {
    /// The same chunk sequence for every run.
    Fixed(Script),
    /// One script per run, popped FIFO; empty queue yields the default.
    Queued(Mutex<VecDeque<Script>>),
    /// Every run fails.
    Failing(RunnerErrorKind, String),
}

pub struct MockRunner {
    name: String,
    behavior: Behavior,
}

impl MockRunner {
    pub fn scripted(name: impl Into<String>, chunks: Script) -> Self {
        Self {
            name: name.into(),
            behavior: Behavior::Fixed(chunks),
        }
    }

    pub fn with_scripts(name: impl Into<String>, scripts: Vec<Script>) -> Self {
        Self {
            name: name.into(),
            behavior: Behavior::Queued(Mutex::new(scripts.into())),
        }
    }

    pub fn failing(name: impl Into<String>, kind: RunnerErrorKind, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behavior: Behavior::Failing(kind, message.into()),
        }
    }

    fn next_script(&self) -> Result<Script, GateError> {
        match &self.behavior {
            Behavior::Fixed(script) => Ok(script.clone()),
            Behavior::Queued(queue) => Ok(queue
                .lock()
                .expect("script queue lock poisoned")
                .pop_front()
                .unwrap_or_else(|| vec![("mock response".to_string(), true)])),
            Behavior::Failing(kind, message) => Err(GateError::Runner {
                kind: *kind,
                message: message.clone(),
            }),
        }
    }
}

#[async_trait]
impl Runner for MockRunner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _query: &Query) -> Result<RunnerStream, GateError> {
        let script = self.next_script()?;
        let chunks: Vec<Result<RunnerChunk, GateError>> = script
            .into_iter()
            .map(|(text, is_final)| {
                Ok(RunnerChunk::assistant(MessageChain::from_text(text), is_final))
            })
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}
