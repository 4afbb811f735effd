// ── Request admission ──
//
// `SlidingWindow` admits at most N calls per rolling window (registry
// lookups). `Pacer` spaces calls by a fixed interval (host-platform API).
// Both are single-instance helpers, not a general rate-limiting framework.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Rolling-window admission counter.
#[derive(Debug)]
pub struct SlidingWindow {
    max: usize,
    window: Duration,
    stamps: Mutex<VecDeque<Instant>>,
}

impl SlidingWindow {
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            max,
            window,
            stamps: Mutex::new(VecDeque::with_capacity(max)),
        }
    }

    /// Consume a slot now, or report how long until one frees up.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&self, now: Instant) -> Result<(), Duration> {
        let mut stamps = self.lock();
        Self::purge(&mut stamps, now, self.window);

        if stamps.len() >= self.max {
            let oldest = stamps.front().copied().unwrap_or(now);
            return Err((oldest + self.window).saturating_duration_since(now));
        }
        stamps.push_back(now);
        Ok(())
    }

    /// Calls admitted within the current window.
    pub fn in_window(&self) -> usize {
        self.in_window_at(Instant::now())
    }

    pub fn in_window_at(&self, now: Instant) -> usize {
        let mut stamps = self.lock();
        Self::purge(&mut stamps, now, self.window);
        stamps.len()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    fn purge(stamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while stamps
            .front()
            .is_some_and(|&t| now.saturating_duration_since(t) >= window)
        {
            stamps.pop_front();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Instant>> {
        // A poisoned window only loses bookkeeping; keep serving.
        self.stamps
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Keeps a fixed minimum gap between consecutive calls.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last: tokio::sync::Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: tokio::sync::Mutex::new(None),
        }
    }

    /// Wait until `interval` has passed since the previous call, then claim
    /// the slot. Concurrent callers are served one after another.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            tokio::time::sleep_until(prev + self.interval).await;
        }
        *last = Some(Instant::now());
    }
}
