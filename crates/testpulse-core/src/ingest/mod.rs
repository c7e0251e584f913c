//! Bridges one external test session into exactly one stored run.

pub mod events;

pub use events::{ingest_path, ingest_reader, IngestSummary, SessionEvent};

use crate::errors::{CoreError, ErrorKind, Result};
use crate::model::{Outcome, Run, RunId};
use crate::storage::Store;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Running(RunId),
    Finalized(RunId),
    /// Ended by a lifecycle violation; the run (if any) stays unfinalized.
    Aborted(Option<RunId>),
}

impl SessionState {
    fn name(&self) -> &'static str {
        match self {
            SessionState::NotStarted => "not started",
            SessionState::Running(_) => "running",
            SessionState::Finalized(_) => "finalized",
            SessionState::Aborted(_) => "aborted",
        }
    }

    fn run_id(&self) -> Option<RunId> {
        match *self {
            SessionState::NotStarted => None,
            SessionState::Running(id) | SessionState::Finalized(id) => Some(id),
            SessionState::Aborted(id) => id,
        }
    }
}

/// `NotStarted -> Running -> Finalized`. Calls in any other order fail with
/// a state error and end the session.
pub struct Session<'a> {
    store: &'a Store,
    state: SessionState,
}

impl<'a> Session<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self {
            store,
            state: SessionState::NotStarted,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn on_session_start(&mut self, timestamp: DateTime<Utc>) -> Result<RunId> {
        if self.state != SessionState::NotStarted {
            return Err(self.abort("session start"));
        }
        let run_id = self.store.begin_run(timestamp)?;
        self.state = SessionState::Running(run_id);
        Ok(run_id)
    }

    /// Duplicate or malformed results are rejected with a validation error
    /// and the session keeps running.
    pub fn on_test_result(
        &mut self,
        test_id: &str,
        outcome: Outcome,
        duration: f64,
        message: Option<&str>,
    ) -> Result<()> {
        let SessionState::Running(run_id) = self.state else {
            return Err(self.abort("test result"));
        };
        match self
            .store
            .record_result(run_id, test_id, outcome, duration, message)
        {
            Err(e) if e.kind() == ErrorKind::State => {
                self.state = SessionState::Aborted(Some(run_id));
                Err(e)
            }
            other => other,
        }
    }

    pub fn on_session_end(&mut self) -> Result<Run> {
        let SessionState::Running(run_id) = self.state else {
            return Err(self.abort("session end"));
        };
        let run = self.store.finalize_run(run_id)?;
        self.state = SessionState::Finalized(run_id);
        Ok(run)
    }

    fn abort(&mut self, event: &str) -> CoreError {
        let err = CoreError::state(format!(
            "{} received while session is {}",
            event,
            self.state.name()
        ));
        self.state = SessionState::Aborted(self.state.run_id());
        err
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        match self.state {
            SessionState::Running(run_id) | SessionState::Aborted(Some(run_id)) => {
                tracing::warn!(
                    event = "session_abandoned",
                    run_id,
                    "session ended before finalization; run stays out of analytics"
                );
            }
            _ => {}
        }
    }
}
