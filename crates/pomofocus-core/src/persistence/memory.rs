use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use super::{SessionDraft, SessionRecord, SessionStore};
use crate::error::{CoreError, Result};

/// In-process session store. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    records: Vec<SessionRecord>,
    task_pomodoros: HashMap<String, u32>,
    failing: bool,
    failed_attempts: usize,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    pub fn records(&self) -> Vec<SessionRecord> {
        self.lock().records.clone()
    }

    pub fn failed_attempts(&self) -> usize {
        self.lock().failed_attempts
    }

    pub fn task_pomodoros(&self, task_id: &str) -> u32 {
        self.lock().task_pomodoros.get(task_id).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn record_session(&self, draft: &SessionDraft) -> Result<SessionRecord> {
        let mut inner = self.lock();
        if inner.failing {
            inner.failed_attempts += 1;
            return Err(CoreError::Remote {
                status: Some(503),
                message: "store unavailable".into(),
            });
        }
        draft.validate()?;

        let record = SessionRecord {
            id: Uuid::new_v4().to_string(),
            kind: draft.kind,
            duration_secs: draft.duration_secs,
            completed: draft.completed,
            started_at: draft.started_at,
            completed_at: draft.completed.then_some(draft.ended_at),
            task_id: draft.task_id.clone(),
            notes: None,
        };
        if draft.counts_toward_task() {
            if let Some(task_id) = &draft.task_id {
                *inner.task_pomodoros.entry(task_id.clone()).or_insert(0) += 1;
            }
        }
        inner.records.push(record.clone());
        Ok(record)
    }
}
