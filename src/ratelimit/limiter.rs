//! Core rate limiter implementation.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::window::{Decision, WindowState};

/// Sliding-window rate limiter keyed by client identity.
///
/// Each key gets its own lock, so checks for unrelated clients never contend.
/// The map lock is only held long enough to fetch (or create) the key's entry.
///
/// This struct is thread-safe and can be shared across multiple tasks.
pub struct RateLimiter {
    /// Maximum accepted events per window
    capacity: usize,
    /// Trailing window length
    window: Duration,
    /// Event history indexed by identity key
    registry: DashMap<String, Arc<Mutex<WindowState>>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter that reads the system clock.
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self::with_clock(capacity, window, Arc::new(SystemClock))
    }

    /// Create a limiter with an explicit time source.
    pub fn with_clock(capacity: usize, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            capacity,
            window,
            registry: DashMap::new(),
            clock,
        }
    }

    /// Record an attempt for `key` if its window has room.
    ///
    /// Returns `true` if the attempt was accepted.
    pub fn allow(&self, key: &str) -> bool {
        self.check(key).is_allowed()
    }

    /// Record an attempt for `key` if its window has room, reporting how long
    /// a rejected caller should wait.
    pub fn check(&self, key: &str) -> Decision {
        loop {
            let entry = self.entry(key);
            let mut state = entry.lock();

            // Swept out between the lookup and the lock; go again so the
            // attempt lands in the live entry.
            if state.is_retired() {
                continue;
            }

            let now = self.clock.now();
            let decision = state.admit(now, self.window, self.capacity);

            trace!(
                key = %key,
                occupancy = state.len(),
                capacity = self.capacity,
                "Checked rate limit"
            );

            if let Decision::Rejected { retry_after } = decision {
                debug!(
                    key = %key,
                    retry_after_secs = retry_after.as_secs(),
                    "Rate limit exceeded"
                );
            }

            return decision;
        }
    }

    /// Number of events currently counted against `key`, without recording one.
    pub fn occupancy(&self, key: &str) -> usize {
        let Some(entry) = self.registry.get(key).map(|e| Arc::clone(e.value())) else {
            return 0;
        };

        let mut state = entry.lock();
        state.prune(self.clock.now(), self.window);
        state.len()
    }

    /// Remove keys whose window has emptied out.
    ///
    /// Returns the number of keys removed. Entries that are locked by an
    /// in-flight check are left for the next sweep.
    pub fn purge_idle(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;

        self.registry.retain(|_, entry| {
            let Some(mut state) = entry.try_lock() else {
                return true;
            };
            state.prune(now, self.window);
            if state.is_empty() {
                state.retire();
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            debug!(removed = removed, remaining = self.registry.len(), "Purged idle rate limit keys");
        }
        removed
    }

    /// Number of keys with state in the registry.
    pub fn tracked_keys(&self) -> usize {
        self.registry.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn entry(&self, key: &str) -> Arc<Mutex<WindowState>> {
        if let Some(entry) = self.registry.get(key) {
            return Arc::clone(entry.value());
        }

        let entry = self
            .registry
            .entry(key.to_string())
            .or_insert_with(|| {
                trace!(key = %key, "Creating rate limit window");
                Arc::new(Mutex::new(WindowState::new()))
            });
        Arc::clone(entry.value())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("capacity", &self.capacity)
            .field("window", &self.window)
            .field("tracked_keys", &self.registry.len())
            .finish()
    }
}
