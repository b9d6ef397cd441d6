//! Sliding-window rate limiter
//!
//! Admits at most `max_events` within any `window`. Rejected events are
//! not recorded, so a flood does not extend its own penalty.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Sliding-window limiter over admission timestamps
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_events: usize,
    window: Duration,
    admitted: VecDeque<Instant>,
}

impl SlidingWindowLimiter {
    pub fn new(max_events: usize, window: Duration) -> Self {
        Self {
            max_events,
            window,
            admitted: VecDeque::with_capacity(max_events.min(1024)),
        }
    }

    /// Admits one event at `now` if the window has room
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.evict_expired(now);
        if self.admitted.len() >= self.max_events {
            return false;
        }
        self.admitted.push_back(now);
        true
    }

    /// Admissions still inside the window at `now`
    pub fn in_window(&mut self, now: Instant) -> usize {
        self.evict_expired(now);
        self.admitted.len()
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some(&oldest) = self.admitted.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }
}
