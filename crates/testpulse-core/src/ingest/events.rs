use super::{Session, SessionState};
use crate::errors::{CoreError, Result};
use crate::model::{Outcome, Run, RunId};
use crate::storage::Store;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;

/// One line of the JSON Lines event stream emitted by a test runner hook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStart {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
    TestResult {
        test_id: String,
        outcome: Outcome,
        duration: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    SessionEnd,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct IngestSummary {
    pub runs: Vec<Run>,
    pub results: usize,
    /// Run left open because the stream ended mid-session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unfinalized: Option<RunId>,
}

pub fn ingest_path(store: &Store, path: &Path) -> Result<IngestSummary> {
    let file = std::fs::File::open(path).map_err(|e| {
        CoreError::validation(format!("failed to open event stream {}: {}", path.display(), e))
    })?;
    ingest_reader(store, std::io::BufReader::new(file))
}

/// Drive sessions from a JSONL stream. Several sessions may follow each
/// other; the first error stops ingestion and is returned with its line
/// number.
pub fn ingest_reader<R: BufRead>(store: &Store, reader: R) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();
    let mut session = Session::new(store);

    for (i, line_res) in reader.lines().enumerate() {
        let lineno = i + 1;
        let line = line_res.map_err(|e| {
            CoreError::validation(format!("line {}: failed to read event stream: {}", lineno, e))
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let event: SessionEvent = serde_json::from_str(&line)
            .map_err(|e| CoreError::validation(format!("line {}: invalid event: {}", lineno, e)))?;

        apply(&mut session, &mut summary, store, event)
            .map_err(|e| e.context(format!("line {}", lineno)))?;
    }

    if let SessionState::Running(run_id) = session.state() {
        summary.unfinalized = Some(run_id);
    }
    tracing::info!(
        event = "ingest_finished",
        runs = summary.runs.len(),
        results = summary.results,
        unfinalized = ?summary.unfinalized
    );
    Ok(summary)
}

fn apply<'a>(
    session: &mut Session<'a>,
    summary: &mut IngestSummary,
    store: &'a Store,
    event: SessionEvent,
) -> Result<()> {
    match event {
        SessionEvent::SessionStart { timestamp } => {
            if matches!(session.state(), SessionState::Finalized(_)) {
                *session = Session::new(store);
            }
            session.on_session_start(timestamp.unwrap_or_else(Utc::now))?;
        }
        SessionEvent::TestResult {
            test_id,
            outcome,
            duration,
            message,
        } => {
            session.on_test_result(&test_id, outcome, duration, message.as_deref())?;
            summary.results += 1;
        }
        SessionEvent::SessionEnd => {
            summary.runs.push(session.on_session_end()?);
        }
    }
    Ok(())
}
