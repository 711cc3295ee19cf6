// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The runtime pipeline: ordered stage execution against one query.
//!
//! One execution owns its query for the whole run. Stages execute strictly
//! in order with no parallelism for a single query; the finalization path
//! (rate-limit release, pool removal) runs on every exit, including panics,
//! via drop guards.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use chatgate_config::PipelineConfig;
use chatgate_core::{GateError, MessageChain, PipelineDefinition};

use crate::events::{EventSink, PipelineEvent, PipelineEventName};
use crate::query::{Query, QueryPool};
use crate::ratelimit::FixedWindowLimiter;
use crate::runner::RunnerRegistry;
use crate::stage::{ResultKind, Stage};
use crate::stages::{
    AccessControlStage, ContentFilterStage, GroupRespondRulesStage, ReleaseRateLimitStage,
    RequireRateLimitStage, RunnerStage,
};

/// Stage names in their default execution order.
pub const DEFAULT_STAGE_ORDER: &[&str] = &[
    "AccessControlCheck",
    "RequireRateLimit",
    "GroupRespondRuleCheck",
    "PreContentFilter",
    "Runner",
    "ReleaseRateLimit",
];

/// Removes the pool entry on every exit path, panics included.
struct PoolGuard {
    pool: Arc<QueryPool>,
    query_id: u64,
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        self.pool.remove(self.query_id);
    }
}

/// An instantiated pipeline definition ready to run queries.
pub struct RuntimePipeline {
    uuid: Uuid,
    name: String,
    config: Arc<PipelineConfig>,
    stages: Vec<(String, Arc<dyn Stage>)>,
    pool: Arc<QueryPool>,
    events: Arc<dyn EventSink>,
}

impl RuntimePipeline {
    /// Builds the runtime pipeline from a stored definition.
    ///
    /// The definition's config blob becomes the immutable snapshot every
    /// stage reads; its stage list (default order when empty) must name
    /// known stages.
    pub fn from_definition(
        def: &PipelineDefinition,
        pool: Arc<QueryPool>,
        runners: Arc<RunnerRegistry>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, GateError> {
        let config = Arc::new(PipelineConfig::from_value(&def.config)?);
        let limiter = Arc::new(FixedWindowLimiter::new(&config.safety.rate_limit));

        let names: Vec<String> = if def.stages.is_empty() {
            DEFAULT_STAGE_ORDER.iter().map(|s| s.to_string()).collect()
        } else {
            def.stages.clone()
        };

        let mut stages: Vec<(String, Arc<dyn Stage>)> = Vec::with_capacity(names.len());
        for name in names {
            let stage: Arc<dyn Stage> = match name.as_str() {
                "AccessControlCheck" => Arc::new(AccessControlStage),
                "RequireRateLimit" => Arc::new(RequireRateLimitStage::new(limiter.clone())),
                "GroupRespondRuleCheck" => Arc::new(GroupRespondRulesStage::new(&config)),
                "PreContentFilter" => Arc::new(ContentFilterStage::pre(&config)),
                "PostContentFilter" => Arc::new(ContentFilterStage::post(&config)),
                "Runner" => Arc::new(RunnerStage::new(runners.clone(), events.clone(), &config)),
                "ReleaseRateLimit" => Arc::new(ReleaseRateLimitStage),
                other => {
                    return Err(GateError::Config(format!(
                        "pipeline {} names unknown stage {other}",
                        def.uuid
                    )));
                }
            };
            stages.push((name, stage));
        }

        Ok(Self {
            uuid: def.uuid,
            name: def.name.clone(),
            config,
            stages,
            pool,
            events,
        })
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> Arc<PipelineConfig> {
        self.config.clone()
    }

    /// Runs the query to completion.
    ///
    /// The loop advances on CONTINUE, stops on INTERRUPT, and surfaces
    /// `error_notice` on ERROR. Afterwards the rate-limit occupancy is
    /// released and the query leaves the pool, in that order.
    pub async fn run(&self, mut query: Query) {
        let _pool_guard = PoolGuard {
            pool: self.pool.clone(),
            query_id: query.query_id,
        };

        debug!(
            pipeline = self.name.as_str(),
            query_id = query.query_id,
            launcher = query.launcher_key().as_str(),
            "pipeline started"
        );

        let inbound = self
            .events
            .emit(PipelineEvent::for_query(
                PipelineEventName::InboundMessage,
                &query,
                serde_json::json!({
                    "text": query.message_chain.plain_text(),
                    "variables": query.variables,
                }),
            ))
            .await;

        if inbound.prevent_default {
            debug!(query_id = query.query_id, "inbound_message prevented default");
        } else {
            for (stage_name, stage) in &self.stages {
                let result = stage.process(&mut query, stage_name).await;

                if let Some(notice) = &result.console_notice {
                    info!(
                        stage = stage_name.as_str(),
                        query_id = query.query_id,
                        notice = notice.as_str(),
                        "stage notice"
                    );
                }
                if let Some(notice) = &result.debug_notice {
                    debug!(
                        stage = stage_name.as_str(),
                        query_id = query.query_id,
                        notice = notice.as_str(),
                        "stage debug"
                    );
                }
                if let Some(notice) = &result.user_notice {
                    self.send_text(&query, notice).await;
                }

                match result.kind {
                    ResultKind::Continue => {}
                    ResultKind::Interrupt => {
                        debug!(
                            stage = stage_name.as_str(),
                            query_id = query.query_id,
                            "pipeline interrupted"
                        );
                        break;
                    }
                    ResultKind::Error => {
                        error!(
                            stage = stage_name.as_str(),
                            query_id = query.query_id,
                            notice = result.error_notice.as_deref().unwrap_or(""),
                            "pipeline error"
                        );
                        if let Some(notice) = &result.error_notice {
                            // Error notices go out whole, never chunked.
                            self.send_text(&query, notice).await;
                        }
                        break;
                    }
                }
            }
        }

        query.release_admission();
        debug!(query_id = query.query_id, "pipeline finished");
        // _pool_guard removes the query from the pool here.
    }

    async fn send_text(&self, query: &Query, text: &str) {
        if let Err(e) = query
            .adapter
            .reply_message(&query.message_event, MessageChain::from_text(text), false)
            .await
        {
            warn!(query_id = query.query_id, error = %e, "failed to send notice");
        }
    }
}
