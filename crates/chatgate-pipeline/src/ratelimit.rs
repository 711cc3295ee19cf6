// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rate-limit admission over launcher keys.
//!
//! The require stage acquires an [`AdmissionGuard`]; the release stage
//! disarms it explicitly. If the pipeline exits early on any other path the
//! guard's `Drop` performs the release, so every successful admission is
//! released exactly once regardless of stage ordering.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use chatgate_config::{RateLimitConfig, RateLimitStrategy};

/// Admission/release over `(launcher_type, launcher_id)` keys.
///
/// `release` is synchronous so the guard can call it from `Drop`; algorithms
/// needing async release bookkeeping must keep it internal.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Attempts admission for `key`, suspending if the algorithm waits for
    /// capacity. Returns `false` on rejection.
    async fn try_acquire(&self, key: &str) -> bool;

    /// Returns one unit of occupancy for `key`.
    fn release(&self, key: &str);
}

/// Acquires admission and arms a guard tied to `limiter` and `key`.
pub async fn acquire(limiter: &Arc<dyn RateLimiter>, key: &str) -> Option<AdmissionGuard> {
    if limiter.try_acquire(key).await {
        Some(AdmissionGuard {
            limiter: limiter.clone(),
            key: key.to_string(),
            armed: true,
        })
    } else {
        None
    }
}

/// Deferred release of one admission.
pub struct AdmissionGuard {
    limiter: Arc<dyn RateLimiter>,
    key: String,
    armed: bool,
}

impl AdmissionGuard {
    /// Explicit release; disarms the `Drop` fallback.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if std::mem::take(&mut self.armed) {
            self.limiter.release(&self.key);
        }
    }
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

struct WindowBucket {
    window_index: u64,
    count: u32,
}

/// Fixed-window counter per launcher key.
///
/// Window boundaries are derived from a process-local epoch so paused-clock
/// tests behave identically to wall time.
pub struct FixedWindowLimiter {
    window: Duration,
    limit: u32,
    strategy: RateLimitStrategy,
    epoch: Instant,
    buckets: Mutex<HashMap<String, WindowBucket>>,
}

impl FixedWindowLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            window: Duration::from_secs(config.window_length.max(1)),
            limit: config.limitation,
            strategy: config.strategy,
            epoch: Instant::now(),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    fn current_window(&self) -> u64 {
        (self.epoch.elapsed().as_secs()) / self.window.as_secs()
    }

    /// Duration until the next window boundary.
    fn until_next_window(&self) -> Duration {
        let elapsed = self.epoch.elapsed();
        let window_secs = self.window.as_secs();
        let into_window = Duration::from_secs(elapsed.as_secs() % window_secs)
            + Duration::from_nanos(elapsed.subsec_nanos() as u64);
        self.window - into_window
    }

    /// Single admission attempt for the current window.
    fn try_once(&self, key: &str) -> bool {
        let window_index = self.current_window();
        let mut buckets = self.buckets.lock().expect("rate-limit lock poisoned");
        let bucket = buckets.entry(key.to_string()).or_insert(WindowBucket {
            window_index,
            count: 0,
        });
        if bucket.window_index != window_index {
            bucket.window_index = window_index;
            bucket.count = 0;
        }
        if bucket.count < self.limit {
            bucket.count += 1;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn try_acquire(&self, key: &str) -> bool {
        loop {
            if self.try_once(key) {
                return true;
            }
            match self.strategy {
                RateLimitStrategy::Drop => return false,
                RateLimitStrategy::Wait => {
                    let wait = self.until_next_window();
                    debug!(key, wait_ms = wait.as_millis() as u64, "window full, waiting");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    fn release(&self, _key: &str) {
        // Fixed windows admit by counting, not occupancy; nothing to return.
        // The slot exists so occupancy-based algorithms can release here.
    }
}
