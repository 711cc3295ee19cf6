// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The stage contract: one cooperative pipeline step with a three-way result.
//!
//! Stages fold their own failures into [`StageResult`]; nothing a stage does
//! propagates as an `Err` across the pipeline boundary.

use async_trait::async_trait;

use crate::query::Query;

/// How the pipeline proceeds after a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultKind {
    /// Advance to the next stage.
    #[default]
    Continue,
    /// Stop the pipeline; not a failure.
    Interrupt,
    /// Stop the pipeline and surface `error_notice` to the user.
    Error,
}

/// Outcome of one stage invocation.
#[derive(Debug, Default)]
pub struct StageResult {
    pub kind: ResultKind,
    /// Sent back to the user when present (interrupt notices, mask notices).
    pub user_notice: Option<String>,
    /// Logged at info level.
    pub console_notice: Option<String>,
    /// Sent back to the user on [`ResultKind::Error`].
    pub error_notice: Option<String>,
    /// Logged at debug level.
    pub debug_notice: Option<String>,
}

impl StageResult {
    pub fn proceed() -> Self {
        Self::default()
    }

    pub fn interrupt() -> Self {
        Self {
            kind: ResultKind::Interrupt,
            ..Self::default()
        }
    }

    pub fn interrupt_with_notice(notice: impl Into<String>) -> Self {
        Self {
            kind: ResultKind::Interrupt,
            user_notice: Some(notice.into()),
            ..Self::default()
        }
    }

    pub fn error(notice: impl Into<String>) -> Self {
        Self {
            kind: ResultKind::Error,
            error_notice: Some(notice.into()),
            ..Self::default()
        }
    }

    pub fn with_console(mut self, notice: impl Into<String>) -> Self {
        self.console_notice = Some(notice.into());
        self
    }

    pub fn with_debug(mut self, notice: impl Into<String>) -> Self {
        self.debug_notice = Some(notice.into());
        self
    }
}

/// A single pipeline step.
///
/// One implementation may serve several named slots (the content filter runs
/// pre- and post-runner); `stage_name` tells it which slot invoked it.
/// Stages are stateless across queries except where a field says otherwise,
/// may suspend for I/O, and mutate the query in place; replacing it
/// wholesale (`*query = rewritten`) is the substitution mechanism.
#[async_trait]
pub trait Stage: Send + Sync {
    async fn process(&self, query: &mut Query, stage_name: &str) -> StageResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_result_continues() {
        let result = StageResult::proceed();
        assert_eq!(result.kind, ResultKind::Continue);
        assert!(result.user_notice.is_none());
    }

    #[test]
    fn interrupt_with_notice_carries_text() {
        let result = StageResult::interrupt_with_notice("rate limited");
        assert_eq!(result.kind, ResultKind::Interrupt);
        assert_eq!(result.user_notice.as_deref(), Some("rate limited"));
    }

    #[test]
    fn error_sets_error_notice() {
        let result = StageResult::error("runner failed").with_console("upstream 503");
        assert_eq!(result.kind, ResultKind::Error);
        assert_eq!(result.error_notice.as_deref(), Some("runner failed"));
        assert_eq!(result.console_notice.as_deref(), Some("upstream 503"));
    }
}
