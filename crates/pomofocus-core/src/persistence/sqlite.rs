use std::sync::{Arc, Mutex};

use super::{SessionDraft, SessionRecord, SessionStore};
use crate::error::Result;
use crate::storage::Database;

/// Session store backed by the local SQLite database.
#[derive(Clone)]
pub struct SqliteSessionStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteSessionStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Run `f` with exclusive access to the database.
    pub fn with_db<T>(&self, f: impl FnOnce(&Database) -> T) -> T {
        let guard = self.db.lock().unwrap_or_else(|p| p.into_inner());
        f(&guard)
    }
}

impl SessionStore for SqliteSessionStore {
    fn record_session(&self, draft: &SessionDraft) -> Result<SessionRecord> {
        self.with_db(|db| db.record_session(draft))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewTask;
    use crate::timer::TimerMode;
    use chrono::Utc;

    #[test]
    fn records_through_shared_database() {
        let store = SqliteSessionStore::new(Database::open_memory().unwrap());
        let task = store
            .with_db(|db| db.create_task(&NewTask::new("ship release")))
            .unwrap();
        let now = Utc::now();
        store
            .record_session(&SessionDraft {
                kind: TimerMode::Focus,
                duration_secs: 1500,
                completed: true,
                task_id: Some(task.id.clone()),
                started_at: now,
                ended_at: now,
            })
            .unwrap();
        let task = store.with_db(|db| db.get_task(&task.id)).unwrap().unwrap();
        assert_eq!(task.completed_pomodoros, 1);
    }
}
