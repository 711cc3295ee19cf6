// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The runner seam: the component that produces a (possibly chunked) reply.
//!
//! Concrete runners (vendor chat APIs, workflow engines, tool callers) live
//! outside this repo; the pipeline only depends on this trait. A runner
//! yields a stream of messages; when streaming, the last item of a logical
//! reply must carry `is_final = true`. Runners must not retain references to
//! the query after `run` returns.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;

use chatgate_core::{GateError, MessageChain, NotFoundKind};

use crate::query::Query;

/// One yielded unit of a runner reply.
#[derive(Debug, Clone)]
pub struct RunnerChunk {
    /// Message role; runners emit `assistant` unless proxying tool traffic.
    pub role: String,
    pub content: MessageChain,
    pub is_final: bool,
}

impl RunnerChunk {
    pub fn assistant(content: MessageChain, is_final: bool) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
            is_final,
        }
    }
}

/// The async sequence a runner produces.
pub type RunnerStream = Pin<Box<dyn Stream<Item = Result<RunnerChunk, GateError>> + Send>>;

/// Produces the reply for a query.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Name referenced by `ai.runner` in pipeline configs.
    fn name(&self) -> &str;

    async fn run(&self, query: &Query) -> Result<RunnerStream, GateError>;
}

/// Name-indexed set of available runners.
#[derive(Default)]
pub struct RunnerRegistry {
    runners: HashMap<String, Arc<dyn Runner>>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a runner under its own name; the last registration wins.
    pub fn register(&mut self, runner: Arc<dyn Runner>) {
        self.runners.insert(runner.name().to_string(), runner);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Runner>, GateError> {
        self.runners
            .get(name)
            .cloned()
            .ok_or_else(|| GateError::NotFound {
                kind: NotFoundKind::Runner,
                id: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.runners.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    struct Fixed;

    #[async_trait]
    impl Runner for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn run(&self, _query: &Query) -> Result<RunnerStream, GateError> {
            Ok(Box::pin(stream::iter(vec![Ok(RunnerChunk::assistant(
                MessageChain::from_text("ok"),
                true,
            ))])))
        }
    }

    #[test]
    fn registry_resolves_by_name() {
        let mut registry = RunnerRegistry::new();
        registry.register(Arc::new(Fixed));
        assert!(registry.get("fixed").is_ok());
        assert!(matches!(
            registry.get("missing"),
            Err(GateError::NotFound { kind: NotFoundKind::Runner, .. })
        ));
    }
}
