use crate::errors::{CoreError, Result};
use crate::model::ExportRow;
use crate::storage::fmt_ts;
use std::io::{self, Write};
use std::path::Path;

const CSV_HEADER: [&str; 7] = [
    "run_id",
    "started_at",
    "finished_at",
    "test_id",
    "outcome",
    "duration",
    "message",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(CoreError::validation(format!(
                "unknown export format '{}' (expected csv or json)",
                other
            ))),
        }
    }
}

pub fn write_rows<W: Write>(w: &mut W, rows: &[ExportRow], format: ExportFormat) -> Result<()> {
    write_format(w, rows, format)
        .map_err(|e| CoreError::storage(format!("failed to write export output: {}", e)))
}

fn write_format<W: Write>(w: &mut W, rows: &[ExportRow], format: ExportFormat) -> io::Result<()> {
    match format {
        ExportFormat::Csv => write_csv(w, rows),
        ExportFormat::Json => write_json(w, rows),
    }
}

pub fn write_json<W: Write>(w: &mut W, rows: &[ExportRow]) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *w, rows)?;
    writeln!(w)
}

/// Timestamps use the same text as the store and the JSON export.
pub fn write_csv<W: Write>(w: &mut W, rows: &[ExportRow]) -> io::Result<()> {
    writeln!(w, "{}", CSV_HEADER.join(","))?;
    for r in rows {
        let finished = r.finished_at.as_ref().map(fmt_ts).unwrap_or_default();
        let fields = [
            r.run_id.to_string(),
            fmt_ts(&r.started_at),
            finished,
            csv_field(&r.test_id),
            r.outcome.as_str().to_string(),
            r.duration.to_string(),
            csv_field(r.message.as_deref().unwrap_or("")),
        ];
        writeln!(w, "{}", fields.join(","))?;
    }
    Ok(())
}

/// Write rows to `path`, creating parent directories. Returns the row count.
/// Failures name the export path; the run store is not involved.
pub fn export_to_path(path: &Path, rows: &[ExportRow], format: ExportFormat) -> Result<usize> {
    let write = || -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut w = io::BufWriter::new(std::fs::File::create(path)?);
        write_format(&mut w, rows, format)?;
        w.flush()
    };
    write().map_err(|e| {
        CoreError::storage(format!(
            "failed to write export file {}: {}",
            path.display(),
            e
        ))
    })?;
    tracing::info!(
        event = "export_written",
        path = %path.display(),
        rows = rows.len(),
        format = format.extension()
    );
    Ok(rows.len())
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
