pub mod analytics;
pub mod config;
pub mod errors;
pub mod ingest;
pub mod model;
pub mod report;
pub mod storage;

pub use errors::{CoreError, ErrorKind, Result};
