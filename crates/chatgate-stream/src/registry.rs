// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The stream-session registry.
//!
//! Locking protocol: registry membership (both maps) lives under one
//! `std::sync::Mutex`, held only for O(1) lookups and never across an
//! await. Queue transfers use the session's own bounded channel endpoints,
//! cloned out under the lock. Per-session mutable state (last access,
//! finished flag, cached final chunk) sits behind a second short-lived
//! session-local mutex.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Default idle lifetime of a session before the sweep removes it.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Default bound of each session's chunk queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// One unit of streamed reply content.
#[derive(Debug, Clone, Default)]
pub struct StreamChunk {
    pub content: String,
    pub is_final: bool,
    pub meta: HashMap<String, serde_json::Value>,
}

impl StreamChunk {
    pub fn text(content: impl Into<String>, is_final: bool) -> Self {
        Self {
            content: content.into(),
            is_final,
            meta: HashMap::new(),
        }
    }

    /// The terminal empty chunk used for missing/expired sessions.
    pub fn final_empty() -> Self {
        Self::text("", true)
    }
}

/// Identity of the inbound platform message a session belongs to.
#[derive(Debug, Clone)]
pub struct MsgInfo {
    pub msg_id: String,
    pub chat_id: Option<String>,
    pub user_id: String,
}

struct SessionState {
    last_access: Instant,
    finished: bool,
    last_chunk: Option<StreamChunk>,
}

/// Producer/consumer context for one platform message.
pub struct StreamSession {
    stream_id: Uuid,
    msg_id: String,
    chat_id: Option<String>,
    user_id: String,
    created_at: Instant,
    tx: mpsc::Sender<StreamChunk>,
    rx: tokio::sync::Mutex<mpsc::Receiver<StreamChunk>>,
    state: Mutex<SessionState>,
    /// Fired when the registry sweep removes this session, waking any
    /// consumer parked on the queue.
    closed: CancellationToken,
}

impl StreamSession {
    pub fn stream_id(&self) -> Uuid {
        self.stream_id
    }

    pub fn msg_id(&self) -> &str {
        &self.msg_id
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().expect("session state lock poisoned").finished
    }

    fn touch(&self) {
        self.state.lock().expect("session state lock poisoned").last_access = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.state
            .lock()
            .expect("session state lock poisoned")
            .last_access
            .elapsed()
    }
}

struct RegistryMaps {
    by_stream_id: HashMap<Uuid, Arc<StreamSession>>,
    by_msg_id: HashMap<String, Uuid>,
}

/// All live stream sessions for one adapter.
pub struct StreamRegistry {
    maps: Mutex<RegistryMaps>,
    ttl: Duration,
    capacity: usize,
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_QUEUE_CAPACITY)
    }
}

impl StreamRegistry {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            maps: Mutex::new(RegistryMaps {
                by_stream_id: HashMap::new(),
                by_msg_id: HashMap::new(),
            }),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Returns the session for `info.msg_id`, creating it on first sight.
    ///
    /// The bool is `true` iff the session was created by this call; callers
    /// use it to decide whether to schedule pipeline execution.
    pub fn create_or_get(&self, info: MsgInfo) -> (Arc<StreamSession>, bool) {
        let mut maps = self.maps.lock().expect("registry lock poisoned");
        if let Some(stream_id) = maps.by_msg_id.get(&info.msg_id) {
            let session = maps
                .by_stream_id
                .get(stream_id)
                .expect("by_msg_id entry without by_stream_id entry")
                .clone();
            drop(maps);
            session.touch();
            return (session, false);
        }

        let (tx, rx) = mpsc::channel(self.capacity);
        let session = Arc::new(StreamSession {
            stream_id: Uuid::new_v4(),
            msg_id: info.msg_id.clone(),
            chat_id: info.chat_id,
            user_id: info.user_id,
            created_at: Instant::now(),
            tx,
            rx: tokio::sync::Mutex::new(rx),
            state: Mutex::new(SessionState {
                last_access: Instant::now(),
                finished: false,
                last_chunk: None,
            }),
            closed: CancellationToken::new(),
        });
        maps.by_msg_id.insert(info.msg_id, session.stream_id);
        maps.by_stream_id.insert(session.stream_id, session.clone());
        debug!(stream_id = %session.stream_id, msg_id = %session.msg_id, "stream session created");
        (session, true)
    }

    pub fn get(&self, stream_id: Uuid) -> Option<Arc<StreamSession>> {
        self.maps
            .lock()
            .expect("registry lock poisoned")
            .by_stream_id
            .get(&stream_id)
            .cloned()
    }

    pub fn get_by_msg_id(&self, msg_id: &str) -> Option<Arc<StreamSession>> {
        let maps = self.maps.lock().expect("registry lock poisoned");
        maps.by_msg_id
            .get(msg_id)
            .and_then(|id| maps.by_stream_id.get(id))
            .cloned()
    }

    /// Enqueues a chunk, suspending on a full queue (backpressure).
    ///
    /// Returns `false` if the session no longer exists; producers treat
    /// that as the consumer having abandoned the conversation.
    pub async fn publish(&self, stream_id: Uuid, chunk: StreamChunk) -> bool {
        let Some(session) = self.get(stream_id) else {
            return false;
        };

        if chunk.is_final {
            let mut state = session.state.lock().expect("session state lock poisoned");
            state.finished = true;
            state.last_chunk = Some(chunk.clone());
        }
        session.touch();

        if session.tx.send(chunk).await.is_err() {
            warn!(stream_id = %stream_id, "stream queue closed under producer");
            return false;
        }
        true
    }

    /// Dequeues the next chunk, waiting up to `timeout`.
    ///
    /// On timeout, a finished session answers its cached final chunk so
    /// redundant polls stay idempotent; an unfinished one answers `None`
    /// (the adapter turns that into an empty keep-polling chunk).
    pub async fn consume(&self, stream_id: Uuid, timeout: Duration) -> Option<StreamChunk> {
        let session = self.get(stream_id)?;
        session.touch();

        let mut rx = session.rx.lock().await;
        let chunk = tokio::select! {
            biased;
            _ = session.closed.cancelled() => None,
            chunk = rx.recv() => chunk,
            _ = tokio::time::sleep(timeout) => {
                let state = session.state.lock().expect("session state lock poisoned");
                if state.finished { state.last_chunk.clone() } else { None }
            }
        };
        drop(rx);
        session.touch();
        chunk
    }

    /// Marks the session finished without enqueuing a chunk.
    pub fn mark_finished(&self, stream_id: Uuid) -> bool {
        let Some(session) = self.get(stream_id) else {
            return false;
        };
        let mut state = session.state.lock().expect("session state lock poisoned");
        state.finished = true;
        true
    }

    /// Removes sessions idle past the TTL, waking parked consumers.
    ///
    /// Returns the number of removed sessions. Amortized by calling at the
    /// start of every first-POST handling.
    pub fn cleanup(&self) -> usize {
        let mut maps = self.maps.lock().expect("registry lock poisoned");
        let expired: Vec<Uuid> = maps
            .by_stream_id
            .values()
            .filter(|s| s.idle_for() > self.ttl)
            .map(|s| s.stream_id)
            .collect();
        for stream_id in &expired {
            if let Some(session) = maps.by_stream_id.remove(stream_id) {
                maps.by_msg_id.remove(&session.msg_id);
                session.closed.cancel();
                debug!(stream_id = %stream_id, msg_id = %session.msg_id, "stream session expired");
            }
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.maps.lock().expect("registry lock poisoned").by_stream_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
