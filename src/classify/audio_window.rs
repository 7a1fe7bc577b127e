use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding-time-window counter of loud-audio events.
///
/// Pruning is lazy: entries older than the window are dropped on the next
/// insert, so the window never outgrows the burst it is measuring.
#[derive(Clone, Debug)]
pub struct AudioWindow {
    window: Duration,
    events: VecDeque<Instant>,
}

impl AudioWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            events: VecDeque::new(),
        }
    }

    /// Record an event at `now` and drop everything older than the window.
    pub fn insert(&mut self, now: Instant) {
        self.events.push_back(now);
        self.events
            .retain(|t| now.saturating_duration_since(*t) <= self.window);
    }

    pub fn count(&self) -> usize {
        self.events.len()
    }
}
