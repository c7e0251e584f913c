pub mod console;
pub mod export;
pub mod summary;

pub use summary::{build_report, SessionReport};
