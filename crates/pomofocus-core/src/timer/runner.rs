//! Drives a [`TimerEngine`] once per second on the tokio runtime.
//!
//! Commands are synchronous and take effect immediately. Each accepted
//! command bumps a generation counter under the engine lock, so a ticker
//! spawned for an earlier state exits the next time it wakes instead of
//! ticking the new countdown.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::debug;

use super::engine::{TimerEngine, TimerSnapshot};
use super::mode::{TimerMode, TimerStatus};
use super::settings::TimerSettings;
use crate::error::{CoreError, Result};
use crate::events::Event;

const EVENT_CAPACITY: usize = 64;

struct RunnerState {
    engine: TimerEngine,
    generation: u64,
}

struct Shared {
    state: Mutex<RunnerState>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    snapshots: watch::Sender<TimerSnapshot>,
    events: broadcast::Sender<Event>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, RunnerState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_ticker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.ticker.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn publish(&self, snapshot: TimerSnapshot, event: Option<Event>) {
        self.snapshots.send_replace(snapshot);
        if let Some(event) = event {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }
}

/// Owns a timer engine and its one-second ticker.
pub struct TimerRunner {
    shared: Arc<Shared>,
    runtime: Handle,
    period: Duration,
}

impl TimerRunner {
    /// Must be called from within a tokio runtime.
    pub fn new(engine: TimerEngine) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| CoreError::Custom(format!("timer runner needs a tokio runtime: {e}")))?;
        Ok(Self::with_handle(engine, runtime))
    }

    pub fn with_handle(engine: TimerEngine, runtime: Handle) -> Self {
        let (snapshots, _) = watch::channel(engine.snapshot());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(RunnerState {
                    engine,
                    generation: 0,
                }),
                ticker: Mutex::new(None),
                snapshots,
                events,
            }),
            runtime,
            period: Duration::from_secs(1),
        }
    }

    pub fn start(&self) -> Option<Event> {
        self.command(TimerEngine::start)
    }

    pub fn pause(&self) -> Option<Event> {
        self.command(TimerEngine::pause)
    }

    pub fn resume(&self) -> Option<Event> {
        self.command(TimerEngine::resume)
    }

    pub fn reset(&self) -> Option<Event> {
        self.command(TimerEngine::reset)
    }

    pub fn skip(&self) -> Option<Event> {
        self.command(TimerEngine::skip)
    }

    pub fn set_mode(&self, mode: TimerMode) -> Option<Event> {
        self.command(|engine| engine.set_mode(mode))
    }

    /// Does not disturb a running ticker.
    pub fn set_settings(&self, settings: TimerSettings) {
        self.update(|engine| engine.set_settings(settings));
    }

    pub fn set_active_task(&self, task_id: Option<String>) {
        self.update(|engine| engine.set_active_task(task_id));
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.shared.lock_state().engine.snapshot()
    }

    /// Latest snapshot, updated after every tick and command.
    pub fn snapshots(&self) -> watch::Receiver<TimerSnapshot> {
        self.shared.snapshots.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.shared.events.subscribe()
    }

    /// Stop ticking. The engine keeps its state.
    pub fn shutdown(&self) {
        let mut ticker = self.shared.lock_ticker();
        self.shared.lock_state().generation += 1;
        abort(&mut ticker);
    }

    /// The ticker slot is locked before the engine and held until the result
    /// is published, so concurrent commands replace tickers in the same order
    /// they bump the generation.
    fn command(&self, f: impl FnOnce(&mut TimerEngine) -> Option<Event>) -> Option<Event> {
        let mut ticker = self.shared.lock_ticker();
        let (event, snapshot, running, generation) = {
            let mut state = self.shared.lock_state();
            let event = f(&mut state.engine);
            if event.is_some() {
                state.generation += 1;
            }
            (
                event,
                state.engine.snapshot(),
                state.engine.status() == TimerStatus::Running,
                state.generation,
            )
        };
        if event.is_none() {
            return None;
        }

        abort(&mut ticker);
        if running {
            *ticker = Some(self.spawn_ticker(generation));
        }
        self.shared.publish(snapshot, event.clone());
        event
    }

    fn update(&self, f: impl FnOnce(&mut TimerEngine)) {
        let snapshot = {
            let mut state = self.shared.lock_state();
            f(&mut state.engine);
            state.engine.snapshot()
        };
        self.shared.publish(snapshot, None);
    }

    fn spawn_ticker(&self, generation: u64) -> JoinHandle<()> {
        self.runtime.spawn(run_ticker(
            Arc::downgrade(&self.shared),
            generation,
            self.period,
        ))
    }
}

fn abort(ticker: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = ticker.take() {
        handle.abort();
    }
}

impl Drop for TimerRunner {
    fn drop(&mut self) {
        abort(&mut self.shared.lock_ticker());
    }
}

async fn run_ticker(shared: Weak<Shared>, generation: u64, period: Duration) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    loop {
        interval.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        let (event, snapshot, running) = {
            let mut state = shared.lock_state();
            if state.generation != generation {
                break;
            }
            let event = state.engine.tick();
            (
                event,
                state.engine.snapshot(),
                state.engine.status() == TimerStatus::Running,
            )
        };
        shared.publish(snapshot, event);
        if !running {
            debug!(generation, "ticker stopped");
            break;
        }
    }
}
