//! Output formatting and export for records and dashboard views.
//!
//! Supports JSON logging and CSV export (optionally gzipped).

use anyhow::{Context, Result};
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use tracing::{debug, info};

use crate::record::CycleRecord;

/// Logs a value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes records as CSV: a header row from the record's field names, then
/// one line per record. Cells with commas or quotes are quoted.
///
/// An empty slice writes nothing.
pub fn write_records<W: Write>(writer: W, records: &[CycleRecord]) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(writer);

    for r in records {
        writer.serialize(r)?;
    }
    writer.flush()?;

    Ok(())
}

/// Renders records to an in-memory CSV string.
pub fn records_to_csv(records: &[CycleRecord]) -> Result<String> {
    let mut buf = Vec::new();
    write_records(&mut buf, records)?;
    Ok(String::from_utf8(buf)?)
}

/// Exports records to `path`, gzip-compressed when `gzip` is set.
pub fn export_records(path: &str, records: &[CycleRecord], gzip: bool) -> Result<()> {
    debug!(path, records = records.len(), gzip, "Exporting records");

    let file = File::create(path).with_context(|| format!("failed to create '{path}'"))?;

    if gzip {
        let mut encoder = GzEncoder::new(file, Compression::default());
        write_records(&mut encoder, records)?;
        encoder.finish()?;
    } else {
        write_records(file, records)?;
    }

    info!(path, records = records.len(), "Export complete");
    Ok(())
}
