//! Error taxonomy shared by the store, the analytics engine and ingestion.
//!
//! Every failure the core can report maps to exactly one [`ErrorKind`]; the
//! CLI prints the kind and message unchanged.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    State,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::State => "state",
            ErrorKind::Storage => "storage",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Malformed or duplicate input to a write operation.
    #[error("{0}")]
    Validation(String),

    /// Reference to a run or test with no stored record.
    #[error("{0}")]
    NotFound(String),

    /// Operation attempted against a run in the wrong lifecycle state.
    #[error("{0}")]
    State(String),

    /// Store unreachable, locked beyond the busy timeout, or corrupt.
    #[error("{0}")]
    Storage(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::State(_) => ErrorKind::State,
            CoreError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        CoreError::NotFound(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        CoreError::State(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        CoreError::Storage(msg.into())
    }

    pub fn run_not_found(run_id: i64) -> Self {
        CoreError::NotFound(format!("run {} not found", run_id))
    }

    /// Prefix the message, keeping the kind.
    pub fn context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            CoreError::Validation(m) => CoreError::Validation(format!("{}: {}", ctx, m)),
            CoreError::NotFound(m) => CoreError::NotFound(format!("{}: {}", ctx, m)),
            CoreError::State(m) => CoreError::State(format!("{}: {}", ctx, m)),
            CoreError::Storage(m) => CoreError::Storage(format!("{}: {}", ctx, m)),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref f, _) = e {
            match f.code {
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    return CoreError::Storage(format!(
                        "store is locked beyond the busy timeout: {}",
                        e
                    ));
                }
                rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase => {
                    return CoreError::Storage(format!("store is corrupt: {}", e));
                }
                _ => {}
            }
        }
        CoreError::Storage(format!("database error: {}", e))
    }
}

/// Configuration file problems. Kept apart from [`CoreError`] because they
/// happen before any store is opened.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ConfigError(pub String);
