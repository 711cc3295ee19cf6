// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pipeline manager: loads definitions, owns the runtime pipelines, and
//! dispatches inbound events to the pipeline bound to the receiving bot.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{error, info, warn};
use uuid::Uuid;

use chatgate_core::{
    Adapter, BotDefinition, GateError, MessageEvent, NotFoundKind, PipelineDefinition, Repository,
};

use crate::events::EventSink;
use crate::pipeline::RuntimePipeline;
use crate::query::{Query, QueryPool};
use crate::runner::RunnerRegistry;

pub struct PipelineManager {
    pipelines: RwLock<HashMap<Uuid, Arc<RuntimePipeline>>>,
    pool: Arc<QueryPool>,
    runners: Arc<RunnerRegistry>,
    events: Arc<dyn EventSink>,
    repository: Arc<dyn Repository>,
}

impl PipelineManager {
    /// The pool is owned by the application root and shared with the
    /// plugin bridge's tool proxy.
    pub fn new(
        repository: Arc<dyn Repository>,
        runners: Arc<RunnerRegistry>,
        events: Arc<dyn EventSink>,
        pool: Arc<QueryPool>,
    ) -> Self {
        Self {
            pipelines: RwLock::new(HashMap::new()),
            pool,
            runners,
            events,
            repository,
        }
    }

    pub fn pool(&self) -> Arc<QueryPool> {
        self.pool.clone()
    }

    /// Instantiates one definition, replacing any pipeline with the same uuid.
    pub fn load_pipeline(&self, def: &PipelineDefinition) -> Result<(), GateError> {
        let pipeline = Arc::new(RuntimePipeline::from_definition(
            def,
            self.pool.clone(),
            self.runners.clone(),
            self.events.clone(),
        )?);
        self.pipelines
            .write()
            .expect("pipeline map lock poisoned")
            .insert(def.uuid, pipeline);
        info!(uuid = %def.uuid, name = def.name.as_str(), "pipeline loaded");
        Ok(())
    }

    /// Loads every definition from the repository at startup.
    ///
    /// A single bad definition is logged and skipped rather than failing
    /// the whole load.
    pub async fn load_pipelines(&self) -> Result<usize, GateError> {
        let defs = self.repository.get_pipelines().await?;
        let mut loaded = 0;
        for def in &defs {
            match self.load_pipeline(def) {
                Ok(()) => loaded += 1,
                Err(e) => error!(uuid = %def.uuid, error = %e, "failed to load pipeline"),
            }
        }
        Ok(loaded)
    }

    /// Re-reads definitions, replacing changed pipelines and dropping ones
    /// the repository no longer has. In-flight queries keep the snapshot
    /// they resolved at dispatch.
    pub async fn reload(&self) -> Result<usize, GateError> {
        let defs = self.repository.get_pipelines().await?;
        let keep: std::collections::HashSet<Uuid> = defs.iter().map(|d| d.uuid).collect();
        {
            let mut pipelines = self.pipelines.write().expect("pipeline map lock poisoned");
            pipelines.retain(|uuid, _| keep.contains(uuid));
        }
        let mut loaded = 0;
        for def in &defs {
            match self.load_pipeline(def) {
                Ok(()) => loaded += 1,
                Err(e) => error!(uuid = %def.uuid, error = %e, "failed to reload pipeline"),
            }
        }
        Ok(loaded)
    }

    pub fn get_by_uuid(&self, uuid: Uuid) -> Option<Arc<RuntimePipeline>> {
        self.pipelines
            .read()
            .expect("pipeline map lock poisoned")
            .get(&uuid)
            .cloned()
    }

    pub fn remove(&self, uuid: Uuid) -> bool {
        self.pipelines
            .write()
            .expect("pipeline map lock poisoned")
            .remove(&uuid)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.pipelines
            .read()
            .expect("pipeline map lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Routes an inbound event into the pipeline bound to `bot`.
    ///
    /// Creates and registers the query, then runs the pipeline on its own
    /// task; the caller (an adapter's inbound handler) never awaits the
    /// pipeline. Returns the query id.
    pub fn dispatch(
        &self,
        event: MessageEvent,
        bot: &BotDefinition,
        adapter: Arc<dyn Adapter>,
    ) -> Result<u64, GateError> {
        let pipeline = self
            .get_by_uuid(bot.pipeline_uuid)
            .ok_or_else(|| GateError::NotFound {
                kind: NotFoundKind::Pipeline,
                id: bot.pipeline_uuid.to_string(),
            })?;

        let query = Query::new(
            self.pool.next_query_id(),
            event,
            bot.uuid,
            bot.name.clone(),
            pipeline.config(),
            adapter,
        );
        let query_id = query.query_id;
        self.pool.register(&query);

        tokio::spawn(async move {
            pipeline.run(query).await;
        });

        Ok(query_id)
    }

    /// Resolves the bot record for a dispatching adapter.
    pub async fn get_bot(&self, uuid: Uuid) -> Result<BotDefinition, GateError> {
        match self.repository.get_bot_by_uuid(uuid).await? {
            Some(bot) if bot.enabled => Ok(bot),
            Some(bot) => {
                warn!(uuid = %bot.uuid, "bot is disabled");
                Err(GateError::NotFound {
                    kind: NotFoundKind::Bot,
                    id: uuid.to_string(),
                })
            }
            None => Err(GateError::NotFound {
                kind: NotFoundKind::Bot,
                id: uuid.to_string(),
            }),
        }
    }
}
