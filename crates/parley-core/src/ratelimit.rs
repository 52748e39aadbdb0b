//! Fixed-window request rate limiter.
//!
//! `RateLimiter` is a concurrent map from a client key to its current window
//! backed by `DashMap`. Each decision is a single read-modify-write under the
//! entry lock, so concurrent requests for one key never both see a stale
//! count. Cloning produces a shared view of the same state (backed by `Arc`).
//!
//! A request that arrives right before a window boundary and another right
//! after it land in different windows, so up to `2 * limit` requests can be
//! admitted across a seam.
//!
//! `allow` and `sweep` read the Tokio clock, so paused test time applies.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    stale_after: Duration,
    windows: Arc<DashMap<String, Window>>,
}

impl RateLimiter {
    /// A limiter admitting `limit` requests per key per `window`.
    ///
    /// `stale_after` is how long an idle window is kept before [`sweep`](Self::sweep)
    /// drops it.
    pub fn new(limit: u32, window: Duration, stale_after: Duration) -> Self {
        Self {
            limit,
            window,
            stale_after,
            windows: Arc::new(DashMap::new()),
        }
    }

    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, now())
    }

    /// Decide whether a request for `key` at `now` is admitted.
    ///
    /// The count saturates at the limit: a rejected request does not
    /// increment it, which gives the same decisions as counting every
    /// request and admitting while the count is at most the limit.
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            started: now,
        });
        let window = entry.value_mut();

        if now.saturating_duration_since(window.started) > self.window {
            window.count = 1;
            window.started = now;
            return true;
        }

        if window.count < self.limit {
            window.count += 1;
            true
        } else {
            false
        }
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(now())
    }

    /// Drop every window that started more than `stale_after` before `now`.
    /// Returns the number of keys removed.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) <= self.stale_after);
        before.saturating_sub(self.windows.len())
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Run [`sweep`](Self::sweep) every `interval` until `cancel` fires.
    pub fn spawn_sweeper(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("rate limiter sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = limiter.sweep();
                        if removed > 0 {
                            debug!(removed, remaining = limiter.tracked_keys(), "swept stale rate limit windows");
                        }
                    }
                }
            }
        })
    }

    #[cfg(test)]
    fn count(&self, key: &str) -> Option<u32> {
        self.windows.get(key).map(|w| w.count)
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
