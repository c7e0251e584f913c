use crate::errors::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type RunId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "passed" => Ok(Outcome::Passed),
            "failed" => Ok(Outcome::Failed),
            "skipped" => Ok(Outcome::Skipped),
            other => Err(CoreError::validation(format!(
                "unknown outcome '{}' (expected passed|failed|skipped)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for Outcome {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Outcome::parse(s)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunTotals {
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl RunTotals {
    pub fn total(&self) -> u32 {
        self.passed + self.failed + self.skipped
    }

    /// Fraction of passed tests in `[0, 1]`. A run without tests has a pass
    /// rate of `0.0`.
    pub fn pass_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.passed as f64 / total as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Run {
    pub id: RunId,
    pub started_at: DateTime<Utc>,
    /// `None` while the run is still being ingested.
    pub finished_at: Option<DateTime<Utc>>,
    pub totals: RunTotals,
}

impl Run {
    pub fn is_finalized(&self) -> bool {
        self.finished_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestResult {
    pub run_id: RunId,
    pub test_id: String,
    pub outcome: Outcome,
    /// Elapsed seconds.
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One appearance of a test in a finalized run, as returned by
/// `Store::get_history`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub run_id: RunId,
    pub outcome: Outcome,
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunScope {
    #[default]
    Finalized,
    IncludeInProgress,
}

/// Flattened run + result row used for exports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportRow {
    pub run_id: RunId,
    #[serde(with = "crate::storage::ts_text")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "crate::storage::opt_ts_text")]
    pub finished_at: Option<DateTime<Utc>>,
    pub test_id: String,
    pub outcome: Outcome,
    pub duration: f64,
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_parse_rejects_unknown() {
        assert_eq!(Outcome::parse("failed").unwrap(), Outcome::Failed);
        let err = Outcome::parse("error").unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Validation);
    }

    #[test]
    fn empty_run_has_zero_pass_rate() {
        assert_eq!(RunTotals::default().pass_rate(), 0.0);
        let t = RunTotals {
            passed: 1,
            failed: 1,
            skipped: 0,
        };
        assert_eq!(t.pass_rate(), 0.5);
    }
}
