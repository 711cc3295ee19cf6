// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`Repository`] for seeded deployments and tests.
//!
//! The gateway treats persistence as an external collaborator; this
//! implementation backs processes that seed their definitions from a file
//! and keep binary state for the process lifetime only.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::GateError;
use crate::traits::repository::{BotDefinition, PipelineDefinition, Repository};

#[derive(Default)]
pub struct MemoryRepository {
    pipelines: Mutex<Vec<PipelineDefinition>>,
    bots: Mutex<HashMap<Uuid, BotDefinition>>,
    blobs: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(pipelines: Vec<PipelineDefinition>, bots: Vec<BotDefinition>) -> Self {
        let repo = Self::new();
        *repo.pipelines.lock().expect("pipeline seed lock poisoned") = pipelines;
        *repo.bots.lock().expect("bot seed lock poisoned") =
            bots.into_iter().map(|b| (b.uuid, b)).collect();
        repo
    }

    pub fn add_pipeline(&self, def: PipelineDefinition) {
        let mut pipelines = self.pipelines.lock().expect("pipeline seed lock poisoned");
        pipelines.retain(|p| p.uuid != def.uuid);
        pipelines.push(def);
    }

    pub fn add_bot(&self, bot: BotDefinition) {
        self.bots
            .lock()
            .expect("bot seed lock poisoned")
            .insert(bot.uuid, bot);
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_pipelines(&self) -> Result<Vec<PipelineDefinition>, GateError> {
        Ok(self.pipelines.lock().expect("pipeline seed lock poisoned").clone())
    }

    async fn get_bot_by_uuid(&self, id: Uuid) -> Result<Option<BotDefinition>, GateError> {
        Ok(self.bots.lock().expect("bot seed lock poisoned").get(&id).cloned())
    }

    async fn set_binary(&self, key: &str, owner: &str, data: Vec<u8>) -> Result<(), GateError> {
        self.blobs
            .lock()
            .expect("blob lock poisoned")
            .insert((key.to_string(), owner.to_string()), data);
        Ok(())
    }

    async fn get_binary(&self, key: &str, owner: &str) -> Result<Option<Vec<u8>>, GateError> {
        Ok(self
            .blobs
            .lock()
            .expect("blob lock poisoned")
            .get(&(key.to_string(), owner.to_string()))
            .cloned())
    }
}
