//! HTTP session store: posts sessions to the web backend.
//!
//! The caller's identity is the bearer token; no user id is ever sent.
//!
//! The host backend must serve `POST {base_url}/api/sessions` itself; this
//! route is a contract of this client, not an existing web API. It takes a
//! camelCase JSON body (`type`, `duration`, `completed`, `taskId`,
//! `startedAt`) and must answer 2xx with at least the new row's `id`.
//! 401 and 403 map to [`CoreError::Unauthenticated`].

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use url::Url;

use super::{SessionDraft, SessionRecord, SessionStore};
use crate::error::{ConfigError, CoreError, Result};
use crate::timer::TimerMode;

pub struct RemoteSessionStore {
    client: Client,
    endpoint: Url,
    token: String,
    runtime: Handle,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionBody<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    duration: u64,
    completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_id: Option<&'a str>,
    started_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedSession {
    id: String,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    notes: Option<String>,
}

fn wire_kind(kind: TimerMode) -> &'static str {
    match kind {
        TimerMode::Focus => "FOCUS",
        TimerMode::ShortBreak => "SHORT_BREAK",
        TimerMode::LongBreak => "LONG_BREAK",
    }
}

impl RemoteSessionStore {
    /// `base_url` is the backend root; sessions go to `{base_url}/api/sessions`.
    ///
    /// Requests are driven on `runtime`, so [`record_session`](SessionStore::record_session)
    /// must be called from a thread that may block (e.g. via `BackgroundSink`).
    pub fn new(base_url: &str, token: impl Into<String>, runtime: Handle) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(CoreError::Unauthenticated("empty bearer token".into()));
        }
        let invalid = |message: String| ConfigError::InvalidValue {
            key: "remote.base_url".into(),
            message,
        };
        let mut base = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join("api/sessions").map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            client: Client::new(),
            endpoint,
            token,
            runtime,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post(&self, draft: &SessionDraft) -> Result<SessionRecord> {
        let body = CreateSessionBody {
            kind: wire_kind(draft.kind),
            duration: draft.duration_secs,
            completed: draft.completed,
            task_id: draft.task_id.as_deref(),
            started_at: draft.started_at,
        };
        let resp = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CoreError::Unauthenticated(format!(
                "session store answered {status}"
            )));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(CoreError::Remote {
                status: Some(status.as_u16()),
                message,
            });
        }

        let created: CreatedSession = resp.json().await?;
        Ok(SessionRecord {
            id: created.id,
            kind: draft.kind,
            duration_secs: draft.duration_secs,
            completed: draft.completed,
            started_at: created.started_at.unwrap_or(draft.started_at),
            completed_at: created
                .completed_at
                .or_else(|| draft.completed.then_some(draft.ended_at)),
            task_id: draft.task_id.clone(),
            notes: created.notes,
        })
    }
}

impl SessionStore for RemoteSessionStore {
    fn record_session(&self, draft: &SessionDraft) -> Result<SessionRecord> {
        draft.validate()?;
        self.runtime.block_on(self.post(draft))
    }
}
