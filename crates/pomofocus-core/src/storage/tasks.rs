//! Task storage: the to-do items focus sessions are credited to.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::database::{parse_ts, ts, Database};
use crate::error::{DatabaseError, Result, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub estimated_pomodoros: u32,
    pub completed_pomodoros: u32,
    pub completed: bool,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub estimated_pomodoros: u32,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            estimated_pomodoros: 1,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let len = self.title.trim().chars().count();
        if len == 0 || len > 200 {
            return Err(ValidationError::InvalidValue {
                field: "title".into(),
                message: "must be 1 to 200 characters".into(),
            });
        }
        if let Some(desc) = &self.description {
            if desc.chars().count() > 1000 {
                return Err(ValidationError::InvalidValue {
                    field: "description".into(),
                    message: "must be at most 1000 characters".into(),
                });
            }
        }
        if !(1..=20).contains(&self.estimated_pomodoros) {
            return Err(ValidationError::OutOfRange {
                field: "estimated_pomodoros",
                min: 1,
                max: 20,
                value: self.estimated_pomodoros as i64,
            });
        }
        Ok(())
    }
}

/// Focus time credited to one task over the last seven days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub id: String,
    pub title: String,
    pub completed: bool,
    pub estimated_pomodoros: u32,
    pub completed_pomodoros: u32,
    pub total_focus_secs: u64,
    pub session_count: u32,
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        estimated_pomodoros: row.get("estimated_pomodoros")?,
        completed_pomodoros: row.get("completed_pomodoros")?,
        completed: row.get("completed")?,
        position: row.get("position")?,
        created_at: parse_ts(&row.get::<_, String>("created_at")?)?,
        updated_at: parse_ts(&row.get::<_, String>("updated_at")?)?,
    })
}

const TASK_COLUMNS: &str = "id, title, description, estimated_pomodoros, completed_pomodoros, \
     completed, position, created_at, updated_at";

impl Database {
    /// Create a task at the end of the list.
    pub fn create_task(&self, input: &NewTask) -> Result<Task> {
        input.validate()?;
        let now = Utc::now();
        let last: Option<i64> = self
            .conn()
            .query_row("SELECT MAX(position) FROM tasks", [], |row| row.get(0))?;
        let task = Task {
            id: Uuid::new_v4().to_string(),
            title: input.title.trim().to_string(),
            description: input.description.clone(),
            estimated_pomodoros: input.estimated_pomodoros,
            completed_pomodoros: 0,
            completed: false,
            position: last.unwrap_or(0) + 1,
            created_at: now,
            updated_at: now,
        };
        self.conn().execute(
            &format!("INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
            params![
                task.id,
                task.title,
                task.description,
                task.estimated_pomodoros,
                task.completed_pomodoros,
                task.completed,
                task.position,
                ts(&task.created_at),
                ts(&task.updated_at),
            ],
        )?;
        Ok(task)
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                task_from_row,
            )
            .optional()?)
    }

    /// Open tasks in list order; completed ones follow when requested.
    pub fn list_tasks(&self, include_completed: bool) -> Result<Vec<Task>> {
        let sql = if include_completed {
            format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY completed ASC, position ASC, created_at ASC")
        } else {
            format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE completed = 0 ORDER BY position ASC, created_at ASC"
            )
        };
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([], task_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn set_task_completed(&self, id: &str, completed: bool) -> Result<Task> {
        let updated = self.conn().execute(
            "UPDATE tasks SET completed = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, completed, ts(&Utc::now())],
        )?;
        if updated == 0 {
            return Err(not_found(id));
        }
        self.get_task(id)?.ok_or_else(|| not_found(id))
    }

    /// Credit one pomodoro to a task outside of session recording.
    pub fn increment_task_pomodoros(&self, id: &str) -> Result<()> {
        let updated = self.conn().execute(
            "UPDATE tasks SET completed_pomodoros = completed_pomodoros + 1, updated_at = ?2
             WHERE id = ?1",
            params![id, ts(&Utc::now())],
        )?;
        if updated == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    /// Delete a task. Its sessions are kept with the link cleared.
    pub fn delete_task(&self, id: &str) -> Result<()> {
        let deleted = self
            .conn()
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    pub fn task_stats(&self) -> Result<Vec<TaskStats>> {
        self.task_stats_at(Utc::now())
    }

    /// Per-task completed focus time over the seven days before `now`.
    /// Tasks without focus time in that window are omitted.
    pub fn task_stats_at(&self, now: DateTime<Utc>) -> Result<Vec<TaskStats>> {
        let since = ts(&(now - Duration::days(7)));
        let mut stmt = self.conn().prepare(
            "SELECT t.id, t.title, t.completed, t.estimated_pomodoros, t.completed_pomodoros,
                    COALESCE(SUM(s.duration_secs), 0), COUNT(s.id)
             FROM tasks t
             JOIN sessions s ON s.task_id = t.id
             WHERE s.kind = 'focus' AND s.completed = 1 AND s.started_at >= ?1
             GROUP BY t.id
             ORDER BY t.created_at DESC",
        )?;
        let rows = stmt.query_map(params![since], |row| {
            Ok(TaskStats {
                id: row.get(0)?,
                title: row.get(1)?,
                completed: row.get(2)?,
                estimated_pomodoros: row.get(3)?,
                completed_pomodoros: row.get(4)?,
                total_focus_secs: row.get::<_, i64>(5)?.max(0) as u64,
                session_count: row.get(6)?,
            })
        })?;
        let stats = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stats.into_iter().filter(|t| t.total_focus_secs > 0).collect())
    }
}

fn not_found(id: &str) -> crate::error::CoreError {
    DatabaseError::NotFound {
        entity: "task",
        id: id.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SessionDraft;
    use crate::timer::TimerMode;

    fn focus_for(task: &str, completed: bool) -> SessionDraft {
        let now = Utc::now();
        SessionDraft {
            kind: TimerMode::Focus,
            duration_secs: 1500,
            completed,
            task_id: Some(task.to_string()),
            started_at: now - Duration::seconds(1500),
            ended_at: now,
        }
    }

    #[test]
    fn tasks_append_in_order() {
        let db = Database::open_memory().unwrap();
        let a = db.create_task(&NewTask::new("write docs")).unwrap();
        let b = db.create_task(&NewTask::new("review PR")).unwrap();
        assert!(b.position > a.position);
        let ids: Vec<_> = db.list_tasks(false).unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[test]
    fn rejects_blank_title_and_bad_estimate() {
        let db = Database::open_memory().unwrap();
        assert!(db.create_task(&NewTask::new("   ")).is_err());
        let mut t = NewTask::new("ok");
        t.estimated_pomodoros = 21;
        assert!(db.create_task(&t).is_err());
    }

    #[test]
    fn completed_focus_session_bumps_counter() {
        let db = Database::open_memory().unwrap();
        let task = db.create_task(&NewTask::new("deep work")).unwrap();
        db.record_session(&focus_for(&task.id, true)).unwrap();
        db.record_session(&focus_for(&task.id, false)).unwrap();
        let task = db.get_task(&task.id).unwrap().unwrap();
        assert_eq!(task.completed_pomodoros, 1);
    }

    #[test]
    fn unknown_task_rolls_back_session() {
        let db = Database::open_memory().unwrap();
        assert!(db.record_session(&focus_for("nope", true)).is_err());
        assert!(db.recent_sessions(5).unwrap().is_empty());
    }

    #[test]
    fn completed_tasks_hidden_by_default() {
        let db = Database::open_memory().unwrap();
        let a = db.create_task(&NewTask::new("a")).unwrap();
        db.create_task(&NewTask::new("b")).unwrap();
        let done = db.set_task_completed(&a.id, true).unwrap();
        assert!(done.completed);
        assert_eq!(db.list_tasks(false).unwrap().len(), 1);
        assert_eq!(db.list_tasks(true).unwrap().len(), 2);
    }

    #[test]
    fn deleting_task_keeps_sessions() {
        let db = Database::open_memory().unwrap();
        let task = db.create_task(&NewTask::new("short-lived")).unwrap();
        db.record_session(&focus_for(&task.id, true)).unwrap();
        db.delete_task(&task.id).unwrap();
        let sessions = db.recent_sessions(5).unwrap();
        assert_eq!(sessions.len(), 1);
        assert!(sessions[0].task_id.is_none());
        assert!(db.delete_task(&task.id).is_err());
    }

    #[test]
    fn task_stats_only_lists_tasks_with_focus_time() {
        let db = Database::open_memory().unwrap();
        let busy = db.create_task(&NewTask::new("busy")).unwrap();
        db.create_task(&NewTask::new("idle")).unwrap();
        db.record_session(&focus_for(&busy.id, true)).unwrap();
        db.record_session(&focus_for(&busy.id, true)).unwrap();
        let stats = db.task_stats().unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_focus_secs, 3000);
        assert_eq!(stats[0].session_count, 2);
        assert_eq!(stats[0].completed_pomodoros, 2);
    }
}
