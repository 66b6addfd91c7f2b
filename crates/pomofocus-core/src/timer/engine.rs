//! Timer engine implementation.
//!
//! The timer engine is a state machine over `(mode, status)`. It does not use
//! internal threads - the caller is responsible for calling `tick()` once per
//! second while the timer is running (see [`TimerRunner`](super::TimerRunner)).
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!           |
//!           +-- reaches zero --> Completed --> Idle | Running (auto-start)
//!
//! reset / skip / set_mode: any -> Idle
//! ```
//!
//! The countdown itself moves one second per tick. How long the user was
//! actually active is measured separately from wall-clock deltas, so paused
//! time and late ticks never leak into recorded durations.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(settings, sink);
//! engine.start();
//! // Once per second:
//! engine.tick(); // Returns Some(Event::TimerCompleted { .. }) at zero
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::chime::{Chime, SilentChime};
use super::clock::{Clock, SystemClock};
use super::elapsed::ElapsedTracker;
use super::mode::{TimerMode, TimerStatus};
use super::settings::TimerSettings;
use crate::events::Event;
use crate::persistence::{SessionDraft, SessionSink};

/// Recording thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// A reset records an abandoned session only above this many active seconds.
    pub abandon_threshold_secs: u64,
    /// Sessions shorter than this are never handed to storage.
    pub min_record_secs: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            abandon_threshold_secs: 60,
            min_record_secs: 10,
        }
    }
}

/// What observers see after every tick and command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub mode: TimerMode,
    pub status: TimerStatus,
    pub time_remaining_secs: u64,
    pub completed_pomodoros: u32,
    pub active_task_id: Option<String>,
}

/// Core timer engine.
pub struct TimerEngine {
    settings: TimerSettings,
    options: EngineOptions,
    mode: TimerMode,
    status: TimerStatus,
    time_remaining_secs: u64,
    /// Focus sessions completed by this engine instance. Drives long-break
    /// cadence only; lifetime totals live in storage.
    completed_pomodoros: u32,
    active_task_id: Option<String>,
    elapsed: ElapsedTracker,
    /// When the current countdown was first started (epoch ms).
    countdown_started_ms: Option<u64>,
    /// Length of the current countdown when it was started.
    countdown_length_secs: u64,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn SessionSink>,
    chime: Arc<dyn Chime>,
}

impl fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerEngine")
            .field("mode", &self.mode)
            .field("status", &self.status)
            .field("time_remaining_secs", &self.time_remaining_secs)
            .field("completed_pomodoros", &self.completed_pomodoros)
            .field("active_task_id", &self.active_task_id)
            .field("elapsed", &self.elapsed)
            .finish_non_exhaustive()
    }
}

fn to_datetime(ms: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms as i64).unwrap_or_else(Utc::now)
}

impl TimerEngine {
    /// Create an engine in `Idle`/`Focus` with the focus duration loaded.
    pub fn new(settings: TimerSettings, sink: Arc<dyn SessionSink>) -> Self {
        let time_remaining_secs = TimerMode::Focus.duration_secs(&settings);
        Self {
            settings,
            options: EngineOptions::default(),
            mode: TimerMode::Focus,
            status: TimerStatus::Idle,
            time_remaining_secs,
            completed_pomodoros: 0,
            active_task_id: None,
            elapsed: ElapsedTracker::default(),
            countdown_started_ms: None,
            countdown_length_secs: time_remaining_secs,
            clock: Arc::new(SystemClock),
            sink,
            chime: Arc::new(SilentChime),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_chime(mut self, chime: Arc<dyn Chime>) -> Self {
        self.chime = chime;
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn time_remaining_secs(&self) -> u64 {
        self.time_remaining_secs
    }

    pub fn completed_pomodoros(&self) -> u32 {
        self.completed_pomodoros
    }

    pub fn active_task_id(&self) -> Option<&str> {
        self.active_task_id.as_deref()
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            mode: self.mode,
            status: self.status,
            time_remaining_secs: self.time_remaining_secs,
            completed_pomodoros: self.completed_pomodoros,
            active_task_id: self.active_task_id.clone(),
        }
    }

    // ── Configuration ────────────────────────────────────────────────

    /// Replace the settings. An idle countdown is resized to the new
    /// duration; a running or paused one keeps its remaining time.
    pub fn set_settings(&mut self, settings: TimerSettings) {
        self.settings = settings;
        if matches!(self.status, TimerStatus::Idle | TimerStatus::Completed) {
            self.load_duration();
        }
    }

    /// Task credited when a focus session completes. Read at transition time.
    pub fn set_active_task(&mut self, task_id: Option<String>) {
        self.active_task_id = task_id;
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        match self.status {
            TimerStatus::Idle | TimerStatus::Completed => {
                if self.time_remaining_secs == 0 {
                    self.load_duration();
                }
                let now = self.clock.now_ms();
                self.begin_countdown(now);
                debug!(mode = %self.mode, remaining = self.time_remaining_secs, "timer started");
                Some(Event::TimerStarted {
                    mode: self.mode,
                    duration_secs: self.time_remaining_secs,
                    at: to_datetime(now),
                })
            }
            TimerStatus::Running | TimerStatus::Paused => None,
        }
    }

    pub fn pause(&mut self) -> Option<Event> {
        if self.status != TimerStatus::Running {
            return None;
        }
        let now = self.clock.now_ms();
        self.elapsed.suspend(now);
        self.status = TimerStatus::Paused;
        Some(Event::TimerPaused {
            remaining_secs: self.time_remaining_secs,
            elapsed_secs: self.elapsed.total_secs(now),
            at: to_datetime(now),
        })
    }

    pub fn resume(&mut self) -> Option<Event> {
        if self.status != TimerStatus::Paused {
            return None;
        }
        let now = self.clock.now_ms();
        self.elapsed.begin(now);
        self.status = TimerStatus::Running;
        Some(Event::TimerResumed {
            remaining_secs: self.time_remaining_secs,
            at: to_datetime(now),
        })
    }

    /// Abandon the current countdown. Enough active time is recorded as an
    /// incomplete session; settings changes are picked up.
    pub fn reset(&mut self) -> Option<Event> {
        let now = self.clock.now_ms();
        self.elapsed.suspend(now);
        let elapsed_secs = self.elapsed.total_secs(now);

        let recorded = elapsed_secs > self.options.abandon_threshold_secs
            && self.submit(SessionDraft {
                kind: self.mode,
                duration_secs: elapsed_secs,
                completed: false,
                task_id: self.active_task_id.clone(),
                started_at: self.countdown_started_ms.map(to_datetime).unwrap_or_else(|| to_datetime(now)),
                ended_at: to_datetime(now),
            });

        self.elapsed.clear();
        self.countdown_started_ms = None;
        self.status = TimerStatus::Idle;
        self.load_duration();
        debug!(mode = %self.mode, elapsed_secs, recorded, "timer reset");
        Some(Event::TimerReset {
            mode: self.mode,
            elapsed_secs,
            recorded,
            at: to_datetime(now),
        })
    }

    /// Move to the next mode without recording anything. Never lands on a
    /// long break.
    pub fn skip(&mut self) -> Option<Event> {
        let from = self.mode;
        self.abandon_silently();
        self.mode = from.next_after_skip();
        self.load_duration();
        Some(Event::TimerSkipped {
            from,
            to: self.mode,
            at: to_datetime(self.clock.now_ms()),
        })
    }

    pub fn set_mode(&mut self, mode: TimerMode) -> Option<Event> {
        self.abandon_silently();
        self.mode = mode;
        self.load_duration();
        Some(Event::ModeChanged {
            mode,
            at: to_datetime(self.clock.now_ms()),
        })
    }

    /// Advance the countdown by one second. Returns
    /// `Some(Event::TimerCompleted)` when this tick brought it to zero.
    pub fn tick(&mut self) -> Option<Event> {
        if self.status != TimerStatus::Running {
            return None;
        }
        self.time_remaining_secs = self.time_remaining_secs.saturating_sub(1);
        self.on_reach_zero()
    }

    /// Completion reaction. Fires only for a running countdown at zero.
    fn on_reach_zero(&mut self) -> Option<Event> {
        if self.status != TimerStatus::Running || self.time_remaining_secs != 0 {
            return None;
        }
        let now = self.clock.now_ms();
        let finished = self.mode;
        let duration_secs = self.countdown_length_secs;
        self.elapsed.suspend(now);
        self.status = TimerStatus::Completed;

        self.submit(SessionDraft {
            kind: finished,
            duration_secs,
            completed: true,
            task_id: self.active_task_id.clone(),
            started_at: self
                .countdown_started_ms
                .map(to_datetime)
                .unwrap_or_else(|| to_datetime(now)),
            ended_at: to_datetime(now),
        });

        let completed_before = self.completed_pomodoros;
        if finished == TimerMode::Focus {
            self.completed_pomodoros = self.completed_pomodoros.saturating_add(1);
        }

        if self.settings.sound_enabled {
            if let Err(e) = self.chime.play(self.settings.sound_volume) {
                debug!(error = %e, "completion sound failed");
            }
        }

        let next = finished.next_after_completion(completed_before, self.settings.long_break_interval);
        let auto_started = self.settings.auto_start_after(finished);
        self.mode = next;
        self.elapsed.clear();
        self.countdown_started_ms = None;
        self.load_duration();
        if auto_started {
            self.begin_countdown(now);
        } else {
            self.status = TimerStatus::Idle;
        }

        info!(
            mode = %finished,
            next = %next,
            completed_pomodoros = self.completed_pomodoros,
            auto_started,
            "session completed"
        );
        Some(Event::TimerCompleted {
            mode: finished,
            duration_secs,
            completed_pomodoros: self.completed_pomodoros,
            next_mode: next,
            auto_started,
            at: to_datetime(now),
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn begin_countdown(&mut self, now: u64) {
        self.elapsed.clear();
        self.elapsed.begin(now);
        self.countdown_started_ms = Some(now);
        self.countdown_length_secs = self.time_remaining_secs;
        self.status = TimerStatus::Running;
    }

    fn abandon_silently(&mut self) {
        self.elapsed.clear();
        self.countdown_started_ms = None;
        self.status = TimerStatus::Idle;
    }

    fn load_duration(&mut self) {
        self.time_remaining_secs = self.mode.duration_secs(&self.settings);
        self.countdown_length_secs = self.time_remaining_secs;
    }

    /// Hand a draft to the sink unless it is too short to be meaningful.
    fn submit(&self, draft: SessionDraft) -> bool {
        if draft.duration_secs < self.options.min_record_secs {
            debug!(duration_secs = draft.duration_secs, "session too short to record");
            return false;
        }
        self.sink.submit(draft);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{InlineSink, MemorySessionStore};
    use crate::timer::ManualClock;

    fn settings() -> TimerSettings {
        TimerSettings {
            focus_duration: 1500,
            short_break_duration: 300,
            long_break_duration: 900,
            long_break_interval: 4,
            ..Default::default()
        }
    }

    fn engine() -> (TimerEngine, Arc<MemorySessionStore>, ManualClock) {
        let store = Arc::new(MemorySessionStore::new());
        let clock = ManualClock::new(1_700_000_000_000);
        let engine = TimerEngine::new(settings(), Arc::new(InlineSink::new(store.clone())))
            .with_clock(Arc::new(clock.clone()));
        (engine, store, clock)
    }

    fn run_ticks(engine: &mut TimerEngine, clock: &ManualClock, n: u64) -> Vec<Event> {
        let mut out = Vec::new();
        for _ in 0..n {
            clock.advance_secs(1);
            if let Some(ev) = engine.tick() {
                out.push(ev);
            }
        }
        out
    }

    #[test]
    fn new_engine_is_idle_focus() {
        let (engine, _, _) = engine();
        let snap = engine.snapshot();
        assert_eq!(snap.mode, TimerMode::Focus);
        assert_eq!(snap.status, TimerStatus::Idle);
        assert_eq!(snap.time_remaining_secs, 1500);
        assert_eq!(snap.completed_pomodoros, 0);
    }

    #[test]
    fn start_pause_resume() {
        let (mut engine, _, _) = engine();
        assert!(engine.start().is_some());
        assert_eq!(engine.status(), TimerStatus::Running);
        assert!(engine.start().is_none());

        assert!(engine.pause().is_some());
        assert_eq!(engine.status(), TimerStatus::Paused);
        assert!(engine.pause().is_none());
        assert!(engine.start().is_none());

        assert!(engine.resume().is_some());
        assert_eq!(engine.status(), TimerStatus::Running);
        assert!(engine.resume().is_none());
    }

    #[test]
    fn tick_is_ignored_unless_running() {
        let (mut engine, _, clock) = engine();
        run_ticks(&mut engine, &clock, 5);
        assert_eq!(engine.time_remaining_secs(), 1500);
        engine.start();
        run_ticks(&mut engine, &clock, 5);
        engine.pause();
        run_ticks(&mut engine, &clock, 5);
        assert_eq!(engine.time_remaining_secs(), 1495);
    }

    #[test]
    fn reset_below_threshold_records_nothing() {
        let (mut engine, store, clock) = engine();
        engine.start();
        run_ticks(&mut engine, &clock, 59);
        let ev = engine.reset().unwrap();
        assert!(matches!(ev, Event::TimerReset { recorded: false, elapsed_secs: 59, .. }));
        assert!(store.records().is_empty());
        assert_eq!(engine.time_remaining_secs(), 1500);
        assert_eq!(engine.status(), TimerStatus::Idle);
    }

    #[test]
    fn reset_above_threshold_records_abandoned_session() {
        let (mut engine, store, clock) = engine();
        engine.set_active_task(Some("task-9".into()));
        engine.start();
        run_ticks(&mut engine, &clock, 90);
        engine.reset();
        let records = store.records();
        assert_eq!(records.len(), 1);
        assert!(!records[0].completed);
        assert_eq!(records[0].duration_secs, 90);
        assert_eq!(records[0].task_id.as_deref(), Some("task-9"));
        assert_eq!(store.task_pomodoros("task-9"), 0);
        assert_eq!(engine.completed_pomodoros(), 0);
    }

    #[test]
    fn reset_picks_up_new_settings() {
        let (mut engine, _, clock) = engine();
        engine.start();
        run_ticks(&mut engine, &clock, 3);
        engine.set_settings(TimerSettings {
            focus_duration: 3000,
            ..settings()
        });
        assert_eq!(engine.time_remaining_secs(), 1497);
        engine.reset();
        assert_eq!(engine.time_remaining_secs(), 3000);
    }

    #[test]
    fn idle_engine_follows_settings_changes() {
        let (mut engine, _, _) = engine();
        engine.set_mode(TimerMode::ShortBreak);
        engine.set_settings(TimerSettings {
            short_break_duration: 420,
            ..settings()
        });
        assert_eq!(engine.time_remaining_secs(), 420);
    }

    #[test]
    fn paused_engine_keeps_remaining_time_on_settings_change() {
        let (mut engine, _, clock) = engine();
        engine.start();
        run_ticks(&mut engine, &clock, 10);
        engine.pause();
        engine.set_settings(TimerSettings {
            focus_duration: 600,
            ..settings()
        });
        assert_eq!(engine.time_remaining_secs(), 1490);
    }

    #[test]
    fn skip_goes_to_short_break_without_recording() {
        let (mut engine, store, clock) = engine();
        engine.start();
        run_ticks(&mut engine, &clock, 200);
        let ev = engine.skip().unwrap();
        assert!(matches!(
            ev,
            Event::TimerSkipped { from: TimerMode::Focus, to: TimerMode::ShortBreak, .. }
        ));
        assert_eq!(engine.status(), TimerStatus::Idle);
        assert_eq!(engine.time_remaining_secs(), 300);
        assert!(store.records().is_empty());

        engine.set_mode(TimerMode::LongBreak);
        engine.skip();
        assert_eq!(engine.mode(), TimerMode::Focus);
    }

    #[test]
    fn set_mode_while_running_stops_the_countdown() {
        let (mut engine, store, clock) = engine();
        engine.start();
        run_ticks(&mut engine, &clock, 120);
        engine.set_mode(TimerMode::LongBreak);
        assert_eq!(engine.status(), TimerStatus::Idle);
        assert_eq!(engine.time_remaining_secs(), 900);
        run_ticks(&mut engine, &clock, 3);
        assert_eq!(engine.time_remaining_secs(), 900);
        assert!(store.records().is_empty());
    }

    #[test]
    fn completed_break_returns_to_focus_without_counting() {
        let (mut engine, store, clock) = engine();
        engine.set_mode(TimerMode::ShortBreak);
        engine.start();
        let events = run_ticks(&mut engine, &clock, 300);
        assert_eq!(events.len(), 1);
        assert_eq!(engine.mode(), TimerMode::Focus);
        assert_eq!(engine.completed_pomodoros(), 0);
        assert_eq!(store.records()[0].kind, TimerMode::ShortBreak);
        assert_eq!(store.records()[0].duration_secs, 300);
    }

    #[test]
    fn auto_start_focus_after_break() {
        let (engine, _, clock) = engine();
        let mut engine = engine;
        engine.set_settings(TimerSettings {
            auto_start_focus: true,
            ..settings()
        });
        engine.set_mode(TimerMode::ShortBreak);
        engine.start();
        run_ticks(&mut engine, &clock, 300);
        assert_eq!(engine.mode(), TimerMode::Focus);
        assert_eq!(engine.status(), TimerStatus::Running);
        assert_eq!(engine.time_remaining_secs(), 1500);
        run_ticks(&mut engine, &clock, 1);
        assert_eq!(engine.time_remaining_secs(), 1499);
    }

    #[test]
    fn completion_records_failure_but_keeps_going() {
        let (mut engine, store, clock) = engine();
        store.set_failing(true);
        engine.start();
        let events = run_ticks(&mut engine, &clock, 1500);
        assert_eq!(events.len(), 1);
        assert_eq!(store.failed_attempts(), 1);
        assert_eq!(engine.completed_pomodoros(), 1);
        assert_eq!(engine.mode(), TimerMode::ShortBreak);
        assert_eq!(engine.status(), TimerStatus::Idle);
    }

    #[test]
    fn sessions_under_minimum_are_never_recorded() {
        let store = Arc::new(MemorySessionStore::new());
        let clock = ManualClock::new(0);
        let mut engine = TimerEngine::new(
            TimerSettings {
                focus_duration: 5,
                ..settings()
            },
            Arc::new(InlineSink::new(store.clone())),
        )
        .with_clock(Arc::new(clock.clone()));
        engine.start();
        let events = run_ticks(&mut engine, &clock, 5);
        assert_eq!(events.len(), 1);
        assert!(store.records().is_empty());
        assert_eq!(engine.completed_pomodoros(), 1);
    }

    struct BrokenSpeaker;

    impl Chime for BrokenSpeaker {
        fn play(&self, _volume: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Err("autoplay blocked".into())
        }
    }

    #[test]
    fn chime_failure_is_ignored() {
        let (engine, store, clock) = engine();
        let mut engine = engine.with_chime(Arc::new(BrokenSpeaker));
        engine.start();
        let events = run_ticks(&mut engine, &clock, 1500);
        assert_eq!(events.len(), 1);
        assert_eq!(store.records().len(), 1);
    }

    #[test]
    fn completion_event_reports_next_mode() {
        let (mut engine, _, clock) = engine();
        engine.start();
        let events = run_ticks(&mut engine, &clock, 1500);
        match &events[0] {
            Event::TimerCompleted {
                mode,
                duration_secs,
                completed_pomodoros,
                next_mode,
                auto_started,
                ..
            } => {
                assert_eq!(*mode, TimerMode::Focus);
                assert_eq!(*duration_secs, 1500);
                assert_eq!(*completed_pomodoros, 1);
                assert_eq!(*next_mode, TimerMode::ShortBreak);
                assert!(!auto_started);
            }
            other => panic!("expected TimerCompleted, got {other:?}"),
        }
    }
}
