//! Wall-clock elapsed-time accounting across pause/resume boundaries.
//!
//! Tick delivery is not trusted for measuring how long a countdown was
//! actually active; instead every running segment is measured from its
//! start timestamp and folded into a baseline when the segment ends.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElapsedTracker {
    /// Start of the current running segment (epoch ms), if running.
    segment_start_ms: Option<u64>,
    /// Whole seconds accumulated from finished segments.
    elapsed_before_pause_secs: u64,
}

impl ElapsedTracker {
    /// Open a new running segment at `now_ms`. Prior segments are kept.
    pub fn begin(&mut self, now_ms: u64) {
        self.segment_start_ms = Some(now_ms);
    }

    /// Close the current segment, adding `floor((now - start) / 1000)`.
    pub fn suspend(&mut self, now_ms: u64) {
        if let Some(start) = self.segment_start_ms.take() {
            self.elapsed_before_pause_secs = self
                .elapsed_before_pause_secs
                .saturating_add(now_ms.saturating_sub(start) / 1000);
        }
    }

    /// Accumulated seconds, including the open segment if there is one.
    pub fn total_secs(&self, now_ms: u64) -> u64 {
        let open = self
            .segment_start_ms
            .map(|start| now_ms.saturating_sub(start) / 1000)
            .unwrap_or(0);
        self.elapsed_before_pause_secs.saturating_add(open)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paused_time_is_excluded() {
        let mut t = ElapsedTracker::default();
        t.begin(0);
        t.suspend(10_400);
        // long pause
        t.begin(600_000);
        assert_eq!(t.total_secs(605_000), 15);
        t.suspend(605_900);
        assert_eq!(t.total_secs(10_000_000), 15);
    }

    #[test]
    fn each_segment_is_floored_separately() {
        let mut t = ElapsedTracker::default();
        t.begin(0);
        t.suspend(1_999);
        t.begin(5_000);
        t.suspend(6_999);
        assert_eq!(t.total_secs(7_000), 2);
    }

    #[test]
    fn suspend_without_begin_is_noop() {
        let mut t = ElapsedTracker::default();
        t.suspend(50_000);
        assert_eq!(t.total_secs(50_000), 0);
        assert_eq!(t, ElapsedTracker::default());
    }

    #[test]
    fn clock_going_backwards_saturates() {
        let mut t = ElapsedTracker::default();
        t.begin(10_000);
        assert_eq!(t.total_secs(5_000), 0);
    }
}
