//! # Pomofocus Core Library
//!
//! This library provides the core business logic for the Pomofocus timer.
//! Everything the `pomofocus` CLI does goes through this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A state machine over focus/break modes that requires
//!   the caller to invoke `tick()` once per second
//! - **Runner**: A tokio task that does the ticking and publishes snapshots
//! - **Persistence**: Fire-and-forget session recording to SQLite or a remote
//!   backend
//! - **Storage**: SQLite-based tasks, sessions and statistics, plus TOML
//!   configuration
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`TimerRunner`]: Drives an engine on the tokio runtime
//! - [`SessionStore`]: Where finished and abandoned sessions go
//! - [`Database`]: Task, session and statistics persistence
//! - [`Config`]: Application configuration management

pub mod error;
pub mod events;
pub mod persistence;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::Event;
pub use persistence::{
    BackgroundSink, InlineSink, MemorySessionStore, RemoteSessionStore, SessionDraft,
    SessionRecord, SessionSink, SessionStore, SqliteSessionStore,
};
pub use storage::{Config, Database, NewTask, Stats, StatsPeriod, Task, TaskStats};
pub use timer::{
    Chime, Clock, EngineOptions, ManualClock, SilentChime, SystemClock, TimerEngine, TimerMode,
    TimerRunner, TimerSettings, TimerSnapshot, TimerStatus,
};
