//! Session persistence: the contract the timer engine writes through.
//!
//! The engine never waits on a write. When a countdown finishes or is
//! abandoned it captures a [`SessionDraft`] by value and hands it to a
//! [`SessionSink`], which forwards it to a [`SessionStore`] and logs any
//! failure. There is no retry queue: a failed write is reported and
//! dropped.

mod memory;
mod remote;
mod sink;
mod sqlite;

pub use memory::MemorySessionStore;
pub use remote::RemoteSessionStore;
pub use sink::{record_and_log, BackgroundSink, InlineSink, SessionSink};
pub use sqlite::SqliteSessionStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};
use crate::timer::TimerMode;

/// Longest session a store accepts, in seconds.
pub const MAX_SESSION_SECS: u64 = 7200;

/// Everything needed to persist one countdown, frozen at transition time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDraft {
    pub kind: TimerMode,
    pub duration_secs: u64,
    pub completed: bool,
    pub task_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl SessionDraft {
    /// Whether a successful write must also bump the task's counter.
    pub fn counts_toward_task(&self) -> bool {
        self.completed && self.kind == TimerMode::Focus && self.task_id.is_some()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.duration_secs == 0 || self.duration_secs > MAX_SESSION_SECS {
            return Err(ValidationError::OutOfRange {
                field: "duration_secs",
                min: 1,
                max: MAX_SESSION_SECS as i64,
                value: self.duration_secs as i64,
            });
        }
        Ok(())
    }
}

/// A stored session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub kind: TimerMode,
    pub duration_secs: u64,
    pub completed: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub task_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Durable storage for finished and abandoned sessions.
///
/// Implementations are blocking; [`BackgroundSink`] moves calls off the
/// caller's thread. On success with [`SessionDraft::counts_toward_task`]
/// the referenced task's completed-pomodoro counter is incremented.
pub trait SessionStore: Send + Sync {
    fn record_session(&self, draft: &SessionDraft) -> Result<SessionRecord>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(kind: TimerMode, completed: bool, task: Option<&str>) -> SessionDraft {
        let now = Utc::now();
        SessionDraft {
            kind,
            duration_secs: 1500,
            completed,
            task_id: task.map(String::from),
            started_at: now,
            ended_at: now,
        }
    }

    #[test]
    fn only_completed_focus_with_task_counts() {
        assert!(draft(TimerMode::Focus, true, Some("t1")).counts_toward_task());
        assert!(!draft(TimerMode::Focus, false, Some("t1")).counts_toward_task());
        assert!(!draft(TimerMode::ShortBreak, true, Some("t1")).counts_toward_task());
        assert!(!draft(TimerMode::Focus, true, None).counts_toward_task());
    }

    #[test]
    fn validate_rejects_zero_and_oversized() {
        let mut d = draft(TimerMode::Focus, true, None);
        d.duration_secs = 0;
        assert!(d.validate().is_err());
        d.duration_secs = MAX_SESSION_SECS + 1;
        assert!(d.validate().is_err());
        d.duration_secs = MAX_SESSION_SECS;
        assert!(d.validate().is_ok());
    }
}
