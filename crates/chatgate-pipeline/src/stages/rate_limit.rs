// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The require/release bracket around the expensive stages.
//!
//! `RequireRateLimitStage` arms an [`AdmissionGuard`] on the query;
//! `ReleaseRateLimitStage` disarms it. The pipeline's finalization drops any
//! still-armed guard, so the release half of the bracket runs on interrupt
//! and error exits too.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::query::Query;
use crate::ratelimit::{self, RateLimiter};
use crate::stage::{Stage, StageResult};

const DENIED_NOTICE: &str = "You are sending messages too quickly. Please try again later.";

/// Admission at the head of the bracket.
pub struct RequireRateLimitStage {
    limiter: Arc<dyn RateLimiter>,
}

impl RequireRateLimitStage {
    pub fn new(limiter: Arc<dyn RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl Stage for RequireRateLimitStage {
    async fn process(&self, query: &mut Query, stage_name: &str) -> StageResult {
        let key = query.launcher_key();
        match ratelimit::acquire(&self.limiter, &key).await {
            Some(guard) => {
                query.admission = Some(guard);
                StageResult::proceed()
            }
            None => {
                info!(stage = stage_name, key = key.as_str(), "admission denied");
                StageResult::interrupt_with_notice(DENIED_NOTICE)
            }
        }
    }
}

/// Release at the tail of the bracket.
///
/// A distinct stage slot even though fixed windows release nothing, so
/// occupancy-based algorithms slot in without reordering the pipeline.
pub struct ReleaseRateLimitStage;

#[async_trait]
impl Stage for ReleaseRateLimitStage {
    async fn process(&self, query: &mut Query, _stage_name: &str) -> StageResult {
        query.release_admission();
        StageResult::proceed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::ResultKind;
    use chatgate_config::{RateLimitConfig, RateLimitStrategy};
    use chatgate_core::EventKind;
    use chatgate_test_utils::query_fixture;

    fn drop_limiter(limit: u32) -> Arc<dyn RateLimiter> {
        Arc::new(crate::ratelimit::FixedWindowLimiter::new(&RateLimitConfig {
            algo: "fixwin".into(),
            window_length: 10,
            limitation: limit,
            strategy: RateLimitStrategy::Drop,
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn require_arms_guard_and_denies_over_limit() {
        let limiter = drop_limiter(1);
        let require = RequireRateLimitStage::new(limiter);

        let mut first = query_fixture(EventKind::Friend);
        let result = require.process(&mut first, "RequireRateLimit").await;
        assert_eq!(result.kind, ResultKind::Continue);
        assert!(first.admission.is_some());

        let mut second = query_fixture(EventKind::Friend);
        let result = require.process(&mut second, "RequireRateLimit").await;
        assert_eq!(result.kind, ResultKind::Interrupt);
        assert!(result.user_notice.is_some());
        assert!(second.admission.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn release_disarms_the_guard() {
        let require = RequireRateLimitStage::new(drop_limiter(5));
        let release = ReleaseRateLimitStage;

        let mut query = query_fixture(EventKind::Friend);
        require.process(&mut query, "RequireRateLimit").await;
        assert!(query.admission.is_some());

        let result = release.process(&mut query, "ReleaseRateLimit").await;
        assert_eq!(result.kind, ResultKind::Continue);
        assert!(query.admission.is_none());
    }
}
