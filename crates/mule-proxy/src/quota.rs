//! Global upstream request budget.
//!
//! The upstream API throttles accounts that call it too often, so the relay
//! spends at most `limit` upstream requests per window across all
//! identifiers. Requests over budget are answered from the cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Fixed-window counter of upstream requests.
#[derive(Debug)]
pub struct QuotaGate {
    issued: AtomicU32,
    limit: u32,
}

impl QuotaGate {
    pub fn new(limit: u32) -> Self {
        Self {
            issued: AtomicU32::new(0),
            limit,
        }
    }

    /// Take one unit of budget. Returns `false`, leaving the counter
    /// untouched, once the window's limit has been reached.
    pub fn try_consume(&self) -> bool {
        self.issued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |issued| {
                (issued < self.limit).then_some(issued + 1)
            })
            .is_ok()
    }

    /// Start a new window. Returns how many requests the old one used.
    pub fn reset(&self) -> u32 {
        self.issued.swap(0, Ordering::AcqRel)
    }

    pub fn issued(&self) -> u32 {
        self.issued.load(Ordering::Acquire)
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.issued())
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Spawn the task that rolls the window over every `window`, whether or
    /// not any request arrived. It exits when `shutdown` is cancelled.
    pub fn spawn_reset(self: &Arc<Self>, window: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let gate = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + window, window);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("quota reset task shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let used = gate.reset();
                        if used > 0 {
                            debug!(used, limit = gate.limit, "quota window reset");
                        }
                    }
                }
            }
        })
    }
}
