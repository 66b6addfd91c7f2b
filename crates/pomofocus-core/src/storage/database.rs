//! SQLite-based session storage and statistics.
//!
//! Provides persistent storage for:
//! - Completed and abandoned sessions
//! - Tasks and their completed-pomodoro counters (see `tasks.rs`)
//! - Session statistics per day, week, month and all time
//! - Key-value store for application state

use std::path::Path;

use chrono::{DateTime, Datelike, Duration, SecondsFormat, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DatabaseError, Result, ValidationError};
use crate::persistence::{SessionDraft, SessionRecord};
use crate::timer::TimerMode;

use super::{data_dir, migrations};

/// Reporting window for [`Database::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsPeriod {
    Day,
    Week,
    Month,
    All,
}

impl StatsPeriod {
    /// Inclusive start of the period containing `now`, or `None` for all time.
    ///
    /// Weeks start on Sunday.
    pub fn start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let midnight = |d: chrono::NaiveDate| {
            Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).unwrap_or_default())
        };
        let today = now.date_naive();
        match self {
            StatsPeriod::Day => Some(midnight(today)),
            StatsPeriod::Week => {
                let back = today.weekday().num_days_from_sunday() as i64;
                Some(midnight(today - Duration::days(back)))
            }
            StatsPeriod::Month => today.with_day(1).map(midnight),
            StatsPeriod::All => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_sessions: u64,
    pub completed_focus_sessions: u64,
    pub abandoned_sessions: u64,
    pub total_focus_secs: u64,
    pub total_break_secs: u64,
}

impl Stats {
    /// Fraction of `daily_goal` reached, capped at 1.0.
    pub fn goal_progress(&self, daily_goal: u32) -> f64 {
        if daily_goal == 0 {
            return 0.0;
        }
        (self.completed_focus_sessions as f64 / daily_goal as f64).min(1.0)
    }
}

/// SQLite database for sessions and tasks.
pub struct Database {
    conn: Connection,
}

pub(crate) fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_ts(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    let kind: String = row.get("kind")?;
    let completed_at: Option<String> = row.get("completed_at")?;
    Ok(SessionRecord {
        id: row.get("id")?,
        kind: TimerMode::parse(&kind).unwrap_or_default(),
        duration_secs: row.get::<_, i64>("duration_secs")?.max(0) as u64,
        completed: row.get("completed")?,
        started_at: parse_ts(&row.get::<_, String>("started_at")?)?,
        completed_at: completed_at.as_deref().map(parse_ts).transpose()?,
        task_id: row.get("task_id")?,
        notes: row.get("notes")?,
    })
}

/// Longest note accepted by [`Database::set_session_notes`], in characters.
pub const MAX_NOTES_CHARS: usize = 500;

const SESSION_COLUMNS: &str =
    "id, kind, duration_secs, completed, started_at, completed_at, task_id, notes";

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data_dir>/pomofocus.db`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("pomofocus.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database file at `path`.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Store one session and, for a completed focus session linked to a
    /// task, bump that task's counter in the same transaction.
    ///
    /// # Errors
    /// Fails on invalid duration, unknown task, or SQL failure; nothing is
    /// written in that case.
    pub fn record_session(&self, draft: &SessionDraft) -> Result<SessionRecord> {
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

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO sessions (id, kind, duration_secs, completed, started_at, completed_at, task_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.kind.as_str(),
                record.duration_secs as i64,
                record.completed,
                ts(&record.started_at),
                record.completed_at.as_ref().map(ts),
                record.task_id,
            ],
        )?;

        if draft.counts_toward_task() {
            if let Some(task_id) = &draft.task_id {
                let updated = tx.execute(
                    "UPDATE tasks SET completed_pomodoros = completed_pomodoros + 1, updated_at = ?2
                     WHERE id = ?1",
                    params![task_id, ts(&draft.ended_at)],
                )?;
                if updated == 0 {
                    return Err(DatabaseError::NotFound {
                        entity: "task",
                        id: task_id.clone(),
                    }
                    .into());
                }
            }
        }
        tx.commit()?;
        Ok(record)
    }

    /// Attach a note to a stored session.
    pub fn set_session_notes(&self, id: &str, notes: &str) -> Result<()> {
        if notes.chars().count() > MAX_NOTES_CHARS {
            return Err(ValidationError::InvalidValue {
                field: "notes".into(),
                message: format!("must be at most {MAX_NOTES_CHARS} characters"),
            }
            .into());
        }
        let updated = self.conn.execute(
            "UPDATE sessions SET notes = ?2 WHERE id = ?1",
            params![id, notes],
        )?;
        if updated == 0 {
            return Err(DatabaseError::NotFound {
                entity: "session",
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Most recent sessions first.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY started_at DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], session_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Sessions started within `[start, end]`, oldest first.
    pub fn sessions_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE started_at >= ?1 AND started_at <= ?2
             ORDER BY started_at ASC"
        ))?;
        let rows = stmt.query_map(params![ts(&start), ts(&end)], session_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn stats(&self, period: StatsPeriod) -> Result<Stats> {
        self.stats_at(period, Utc::now())
    }

    /// Aggregate sessions of `period` as seen at `now`.
    pub fn stats_at(&self, period: StatsPeriod, now: DateTime<Utc>) -> Result<Stats> {
        let since = period
            .start(now)
            .map(|d| ts(&d))
            .unwrap_or_default();
        let mut stmt = self.conn.prepare(
            "SELECT kind, completed, COUNT(*), COALESCE(SUM(duration_secs), 0)
             FROM sessions
             WHERE started_at >= ?1
             GROUP BY kind, completed",
        )?;

        let mut stats = Stats::default();
        let rows = stmt.query_map(params![since], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, bool>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        for row in rows {
            let (kind, completed, count, secs) = row?;
            let (count, secs) = (count.max(0) as u64, secs.max(0) as u64);
            stats.total_sessions += count;
            if !completed {
                stats.abandoned_sessions += count;
                continue;
            }
            match TimerMode::parse(&kind) {
                Some(TimerMode::Focus) => {
                    stats.completed_focus_sessions += count;
                    stats.total_focus_secs += secs;
                }
                Some(_) => stats.total_break_secs += secs,
                None => {}
            }
        }
        Ok(stats)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}
