use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{SessionDraft, SessionRecord, SessionStore};
use crate::error::{CoreError, Result};

/// Non-blocking hand-off from the engine to storage.
pub trait SessionSink: Send + Sync {
    fn submit(&self, draft: SessionDraft);
}

/// Write one draft and log the outcome. Failures never propagate.
pub fn record_and_log(store: &dyn SessionStore, draft: &SessionDraft) -> Option<SessionRecord> {
    match store.record_session(draft) {
        Ok(record) => {
            debug!(
                id = %record.id,
                kind = %draft.kind,
                duration_secs = draft.duration_secs,
                completed = draft.completed,
                "session saved"
            );
            Some(record)
        }
        Err(e) => {
            warn!(
                error = %e,
                kind = %draft.kind,
                duration_secs = draft.duration_secs,
                completed = draft.completed,
                "failed to save session"
            );
            None
        }
    }
}

/// Writes on the calling thread.
pub struct InlineSink {
    store: Arc<dyn SessionStore>,
}

impl InlineSink {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }
}

impl SessionSink for InlineSink {
    fn submit(&self, draft: SessionDraft) {
        record_and_log(self.store.as_ref(), &draft);
    }
}

/// Fire-and-forget writes on the tokio blocking pool.
///
/// Join handles are kept so a host can [`drain`](Self::drain) in-flight
/// writes before exiting.
pub struct BackgroundSink {
    store: Arc<dyn SessionStore>,
    runtime: Handle,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl BackgroundSink {
    /// Bind to the runtime of the calling context.
    pub fn new(store: Arc<dyn SessionStore>) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| CoreError::Custom(format!("background sink needs a tokio runtime: {e}")))?;
        Ok(Self::with_handle(store, runtime))
    }

    pub fn with_handle(store: Arc<dyn SessionStore>, runtime: Handle) -> Self {
        Self {
            store,
            runtime,
            in_flight: Mutex::new(Vec::new()),
        }
    }

    /// Number of writes that have not finished yet.
    pub fn pending(&self) -> usize {
        let guard = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
        guard.iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait for every submitted write to finish.
    pub async fn drain(&self) {
        let handles = {
            let mut guard = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::take(&mut *guard)
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "session write task did not finish");
            }
        }
    }
}

impl SessionSink for BackgroundSink {
    fn submit(&self, draft: SessionDraft) {
        let store = Arc::clone(&self.store);
        let handle = self.runtime.spawn_blocking(move || {
            record_and_log(store.as_ref(), &draft);
        });
        let mut guard = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
        guard.retain(|h| !h.is_finished());
        guard.push(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemorySessionStore;
    use crate::timer::TimerMode;
    use chrono::Utc;

    fn draft(duration_secs: u64) -> SessionDraft {
        let now = Utc::now();
        SessionDraft {
            kind: TimerMode::Focus,
            duration_secs,
            completed: true,
            task_id: Some("task-1".into()),
            started_at: now,
            ended_at: now,
        }
    }

    #[test]
    fn inline_sink_swallows_failures() {
        let store = Arc::new(MemorySessionStore::new());
        store.set_failing(true);
        let sink = InlineSink::new(store.clone());
        sink.submit(draft(1500));
        assert!(store.records().is_empty());
        assert_eq!(store.failed_attempts(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn background_sink_writes_after_drain() {
        let store = Arc::new(MemorySessionStore::new());
        let sink = BackgroundSink::new(store.clone()).unwrap();
        sink.submit(draft(1500));
        sink.submit(draft(300));
        sink.drain().await;
        assert_eq!(store.records().len(), 2);
        assert_eq!(store.task_pomodoros("task-1"), 2);
        assert_eq!(sink.pending(), 0);
    }

    #[test]
    fn background_sink_requires_runtime() {
        let store = Arc::new(MemorySessionStore::new());
        assert!(BackgroundSink::new(store).is_err());
    }
}
