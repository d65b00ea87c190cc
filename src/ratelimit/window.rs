//! Per-key sliding window state.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The event was accepted and recorded.
    Allowed,
    /// The window is full. Nothing was recorded.
    Rejected {
        /// Time until the oldest retained event ages out of the window.
        retry_after: Duration,
    },
}

impl Decision {
    /// Whether the event was accepted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Accepted-event history for a single identity key.
///
/// Timestamps are kept oldest first, so pruning only ever pops from the front.
#[derive(Debug, Default)]
pub struct WindowState {
    timestamps: VecDeque<Instant>,
    /// Set once the entry has been swept out of the registry. A caller that
    /// still holds a handle must look the key up again instead of recording here.
    retired: bool,
}

impl WindowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every timestamp at or before `now - window`.
    pub fn prune(&mut self, now: Instant, window: Duration) {
        let Some(cutoff) = now.checked_sub(window) else {
            // The process has not been alive for a whole window yet.
            return;
        };

        while let Some(&oldest) = self.timestamps.front() {
            if oldest > cutoff {
                break;
            }
            self.timestamps.pop_front();
        }
    }

    /// Prune, then record `now` if fewer than `capacity` events remain.
    pub fn admit(&mut self, now: Instant, window: Duration, capacity: usize) -> Decision {
        self.prune(now, window);

        if self.timestamps.len() >= capacity {
            let retry_after = match self.timestamps.front() {
                Some(&oldest) => (oldest + window).saturating_duration_since(now),
                None => window,
            };
            return Decision::Rejected { retry_after };
        }

        self.timestamps.push_back(now);
        Decision::Allowed
    }

    /// Number of retained timestamps.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub fn retire(&mut self) {
        self.retired = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(900);

    fn at(base: Instant, secs: u64) -> Instant {
        base + Duration::from_secs(secs)
    }

    #[test]
    fn test_admit_up_to_capacity() {
        let base = Instant::now();
        let mut state = WindowState::new();

        for t in 0..5 {
            assert_eq!(state.admit(at(base, t), WINDOW, 5), Decision::Allowed);
        }
        assert!(!state.admit(at(base, 5), WINDOW, 5).is_allowed());
        assert_eq!(state.len(), 5);
    }

    #[test]
    fn test_rejection_reports_time_until_oldest_expires() {
        let base = Instant::now();
        let mut state = WindowState::new();

        state.admit(at(base, 0), WINDOW, 1);
        let decision = state.admit(at(base, 300), WINDOW, 1);

        assert_eq!(
            decision,
            Decision::Rejected {
                retry_after: Duration::from_secs(600)
            }
        );
    }

    #[test]
    fn test_entry_exactly_one_window_old_is_pruned() {
        let base = Instant::now();
        let mut state = WindowState::new();

        state.admit(at(base, 0), WINDOW, 1);
        assert!(state.admit(at(base, 900), WINDOW, 1).is_allowed());
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_prune_keeps_entries_inside_window() {
        let base = Instant::now();
        let mut state = WindowState::new();

        for t in [0, 100, 200] {
            state.admit(at(base, t), WINDOW, 10);
        }
        state.prune(at(base, 950), WINDOW);

        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_zero_capacity_always_rejects() {
        let base = Instant::now();
        let mut state = WindowState::new();

        let decision = state.admit(base, WINDOW, 0);
        assert_eq!(decision, Decision::Rejected { retry_after: WINDOW });
        assert!(state.is_empty());
    }
}
