//! JSON-lines codec for the row tables.
//!
//! One JSON object per line. Blank lines are skipped on read. Writers check
//! key uniqueness before touching the output.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ExecutionError, IcqaResult, ValidationError};
use crate::storage::KeyedRow;

fn io_error(path: &str, err: &std::io::Error) -> ExecutionError {
    ExecutionError::Io {
        path: path.to_string(),
        message: err.to_string(),
    }
}

/// Parses every row from `reader`.
///
/// Line numbers in errors are 1-based. `origin` names the source in I/O
/// errors.
pub fn read_rows<T, R>(reader: R, origin: &str) -> IcqaResult<Vec<T>>
where
    T: DeserializeOwned,
    R: BufRead,
{
    let mut rows = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| io_error(origin, &e))?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line).map_err(|e| ValidationError::MalformedRow {
            line: idx + 1,
            reason: e.to_string(),
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Reads a JSON-lines file.
pub fn read_file<T: DeserializeOwned>(path: &Path) -> IcqaResult<Vec<T>> {
    let origin = path.display().to_string();
    let file = File::open(path).map_err(|e| io_error(&origin, &e))?;
    let rows = read_rows(BufReader::new(file), &origin)?;
    tracing::debug!(path = %origin, rows = rows.len(), "read rows");
    Ok(rows)
}

/// Returns the first repeated key, if any.
pub fn first_duplicate<T: KeyedRow>(rows: &[T]) -> Option<String> {
    let mut seen = HashSet::with_capacity(rows.len());
    rows.iter()
        .map(KeyedRow::row_key)
        .find(|key| !seen.insert(key.clone()))
}

/// Writes `rows` to `writer`, one per line.
pub fn write_rows<T, W>(writer: W, rows: &[T], origin: &str) -> IcqaResult<()>
where
    T: Serialize + KeyedRow,
    W: Write,
{
    if let Some(key) = first_duplicate(rows) {
        return Err(ValidationError::DuplicateKey { key }.into());
    }

    let mut out = BufWriter::new(writer);
    for row in rows {
        serde_json::to_writer(&mut out, row).map_err(|e| ExecutionError::Io {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        out.write_all(b"\n").map_err(|e| io_error(origin, &e))?;
    }
    out.flush().map_err(|e| io_error(origin, &e))?;
    Ok(())
}

/// Writes a JSON-lines file, replacing any existing content.
pub fn write_file<T>(path: &Path, rows: &[T]) -> IcqaResult<()>
where
    T: Serialize + KeyedRow,
{
    let origin = path.display().to_string();
    if let Some(key) = first_duplicate(rows) {
        return Err(ValidationError::DuplicateKey { key }.into());
    }
    let file = File::create(path).map_err(|e| io_error(&origin, &e))?;
    write_rows(file, rows, &origin)?;
    tracing::debug!(path = %origin, rows = rows.len(), "wrote rows");
    Ok(())
}
