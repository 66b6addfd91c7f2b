use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::TimerMode;

/// Every timer state change produces an Event.
/// Presentation layers render from snapshots and use events for notices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        mode: TimerMode,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_secs: u64,
        /// Active seconds accumulated so far, pauses excluded.
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// A countdown reached zero.
    TimerCompleted {
        mode: TimerMode,
        duration_secs: u64,
        completed_pomodoros: u32,
        next_mode: TimerMode,
        /// The next countdown is already running.
        auto_started: bool,
        at: DateTime<Utc>,
    },
    TimerReset {
        mode: TimerMode,
        elapsed_secs: u64,
        /// An abandoned session was handed to storage.
        recorded: bool,
        at: DateTime<Utc>,
    },
    TimerSkipped {
        from: TimerMode,
        to: TimerMode,
        at: DateTime<Utc>,
    },
    ModeChanged {
        mode: TimerMode,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::TimerStarted { at, .. }
            | Event::TimerPaused { at, .. }
            | Event::TimerResumed { at, .. }
            | Event::TimerCompleted { at, .. }
            | Event::TimerReset { at, .. }
            | Event::TimerSkipped { at, .. }
            | Event::ModeChanged { at, .. } => *at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_snake_case_tag() {
        let ev = Event::TimerSkipped {
            from: TimerMode::Focus,
            to: TimerMode::ShortBreak,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "timer_skipped");
        assert_eq!(json["to"], "short_break");
    }
}
