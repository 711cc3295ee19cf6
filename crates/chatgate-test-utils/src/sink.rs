// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording pipeline-event sink.

use std::sync::Mutex;

use async_trait::async_trait;

use chatgate_pipeline::{EventContext, EventSink, PipelineEvent, PipelineEventName};

/// Records every emitted event; optionally prevents default on one name.
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<PipelineEvent>>,
    prevent_on: Mutex<Option<PipelineEventName>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preventing(name: PipelineEventName) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            prevent_on: Mutex::new(Some(name)),
        }
    }

    pub fn names(&self) -> Vec<PipelineEventName> {
        self.events
            .lock()
            .expect("event log lock poisoned")
            .iter()
            .map(|e| e.name)
            .collect()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().expect("event log lock poisoned").clone()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn emit(&self, event: PipelineEvent) -> EventContext {
        let name = event.name;
        self.events.lock().expect("event log lock poisoned").push(event);
        EventContext {
            prevent_default: *self.prevent_on.lock().expect("prevent lock poisoned")
                == Some(name),
        }
    }
}
