// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-flight request context and the active-query registry.
//!
//! A [`Query`] is owned by exactly one pipeline execution and mutated by its
//! stages. The [`QueryPool`] keeps an immutable [`QueryHandle`] snapshot per
//! active query so out-of-band callers (plugin tool callbacks) can resolve a
//! query id without touching pipeline-owned state.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use uuid::Uuid;

use chatgate_config::PipelineConfig;
use chatgate_core::{Adapter, EventKind, GateError, MessageChain, MessageEvent, NotFoundKind};

use crate::ratelimit::AdmissionGuard;

/// Which kind of conversation launched the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LauncherType {
    Person,
    Group,
}

impl From<EventKind> for LauncherType {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Friend => LauncherType::Person,
            EventKind::Group => LauncherType::Group,
        }
    }
}

/// One in-flight request's full execution context.
pub struct Query {
    pub query_id: u64,
    pub launcher_type: LauncherType,
    /// Group id for group queries, sender id for direct chats.
    pub launcher_id: String,
    pub sender_id: String,
    /// The bot record this query runs under.
    pub bot_uuid: Uuid,
    /// Platform account id of the bot itself, for at-mention handling.
    pub bot_account_id: String,
    /// The originating event, immutable once emitted.
    pub message_event: MessageEvent,
    /// Working copy of the inbound chain; stages may rewrite it.
    pub message_chain: MessageChain,
    /// Immutable snapshot of the pipeline config active at dispatch.
    pub pipeline_config: Arc<PipelineConfig>,
    /// Free-form per-query state shared between stages and plugin events.
    pub variables: HashMap<String, serde_json::Value>,
    /// Reply chains produced so far (one entry per logical reply).
    pub resp_messages: Vec<MessageChain>,
    /// The adapter the reply must go back through.
    pub adapter: Arc<dyn Adapter>,
    /// Armed by the rate-limit require stage; released exactly once.
    pub(crate) admission: Option<AdmissionGuard>,
}

impl Query {
    /// Builds the query for an inbound event under one bot binding.
    ///
    /// The launcher is the group for group events and the sender otherwise;
    /// the working chain starts as a copy of the event chain.
    pub fn new(
        query_id: u64,
        event: MessageEvent,
        bot_uuid: Uuid,
        bot_account_id: impl Into<String>,
        pipeline_config: Arc<PipelineConfig>,
        adapter: Arc<dyn Adapter>,
    ) -> Self {
        let launcher_type = LauncherType::from(event.kind);
        let launcher_id = match launcher_type {
            LauncherType::Group => event
                .group_id()
                .unwrap_or(event.sender.id.as_str())
                .to_string(),
            LauncherType::Person => event.sender.id.clone(),
        };
        Self {
            query_id,
            launcher_type,
            launcher_id,
            sender_id: event.sender.id.clone(),
            bot_uuid,
            bot_account_id: bot_account_id.into(),
            message_chain: event.chain.clone(),
            message_event: event,
            pipeline_config,
            variables: HashMap::new(),
            resp_messages: Vec::new(),
            adapter,
            admission: None,
        }
    }

    /// The access-control and rate-limit bucket:
    /// `"{launcher_type}_{launcher_id}"`.
    pub fn launcher_key(&self) -> String {
        format!("{}_{}", self.launcher_type, self.launcher_id)
    }

    /// Releases the rate-limit occupancy if still armed.
    ///
    /// Idempotent: the release stage calls this explicitly and the guard's
    /// `Drop` covers interrupt/error/panic exits.
    pub fn release_admission(&mut self) {
        if let Some(guard) = self.admission.take() {
            guard.release();
        }
    }
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("query_id", &self.query_id)
            .field("launcher_type", &self.launcher_type)
            .field("launcher_id", &self.launcher_id)
            .field("sender_id", &self.sender_id)
            .field("bot_uuid", &self.bot_uuid)
            .finish_non_exhaustive()
    }
}

/// Immutable per-query snapshot for out-of-band lookups.
#[derive(Clone)]
pub struct QueryHandle {
    pub query_id: u64,
    pub launcher_type: LauncherType,
    pub launcher_id: String,
    pub sender_id: String,
    pub message_event: MessageEvent,
    pub adapter: Arc<dyn Adapter>,
}

/// Registry of active queries keyed by query id.
#[derive(Default)]
pub struct QueryPool {
    active: DashMap<u64, QueryHandle>,
    next_id: AtomicU64,
}

impl QueryPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a process-unique query id.
    pub fn next_query_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers a query's handle for its lifetime in the pipeline.
    pub fn register(&self, query: &Query) {
        self.active.insert(
            query.query_id,
            QueryHandle {
                query_id: query.query_id,
                launcher_type: query.launcher_type,
                launcher_id: query.launcher_id.clone(),
                sender_id: query.sender_id.clone(),
                message_event: query.message_event.clone(),
                adapter: query.adapter.clone(),
            },
        );
    }

    pub fn get(&self, query_id: u64) -> Result<QueryHandle, GateError> {
        self.active
            .get(&query_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| GateError::NotFound {
                kind: NotFoundKind::Query,
                id: query_id.to_string(),
            })
    }

    /// Removes the entry; the same shard lock serves lookup and removal.
    pub fn remove(&self, query_id: u64) -> bool {
        self.active.remove(&query_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
