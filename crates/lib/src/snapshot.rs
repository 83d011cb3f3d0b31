//! # Snapshot Files
//!
//! Snapshots are JSON arrays written once by one stage and read once by the
//! next. Writes go to a temporary file in the destination directory that is
//! renamed into place only after the whole array has been serialized, so a
//! failed stage never leaves a partial snapshot behind.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::errors::EtlError;

/// Checks that a stage input exists, is a regular file and is not empty.
///
/// This is how stage ordering is enforced: a stage whose predecessor has not
/// run fails here with a clear diagnostic.
pub fn ensure_input(path: &Path) -> Result<(), EtlError> {
    let metadata = fs::metadata(path).map_err(|_| {
        EtlError::Precondition(format!(
            "input file '{}' not found; run the previous stage first",
            path.display()
        ))
    })?;

    if !metadata.is_file() {
        return Err(EtlError::Precondition(format!(
            "input '{}' is not a regular file",
            path.display()
        )));
    }
    if metadata.len() == 0 {
        return Err(EtlError::Precondition(format!(
            "input file '{}' is empty",
            path.display()
        )));
    }
    Ok(())
}

/// Reads a snapshot after checking the input precondition.
pub fn read_snapshot<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, EtlError> {
    ensure_input(path)?;
    let reader = BufReader::new(File::open(path)?);
    let records: Vec<T> = serde_json::from_reader(reader).map_err(|e| {
        EtlError::Parse(format!("snapshot '{}' is malformed: {e}", path.display()))
    })?;
    debug!("Read {} records from '{}'", records.len(), path.display());
    Ok(records)
}

/// Atomically writes `records` as a pretty-printed JSON array to `path`.
pub fn write_snapshot<T: Serialize>(path: &Path, records: &[T]) -> Result<(), EtlError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, records)
            .map_err(|e| EtlError::Internal(e.into()))?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| EtlError::Io(e.error))?;

    info!("Wrote {} records to '{}'", records.len(), path.display());
    Ok(())
}
