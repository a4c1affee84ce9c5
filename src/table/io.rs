use csv::{ByteRecord, ReaderBuilder, WriterBuilder};
use std::{
    fs::{self, File},
    io::{BufReader, Write},
    path::Path,
};
use tempfile::NamedTempFile;
use tracing::debug;

use super::{Row, Table};
use crate::error::{StageError, StageResult};

/// Field separator shared by every file the pipeline reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: u8,
}

impl Default for Dialect {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

/// Parse `path` into a [`Table`]. The first record becomes the header.
///
/// A file without any record yields [`StageError::EmptyInput`]. Records with
/// a different field count than the header are kept as they are. Fields that
/// are not valid UTF-8 are decoded lossily.
pub fn read_table<P: AsRef<Path>>(path: P, dialect: &Dialect) -> StageResult<Table> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| StageError::io(path, e))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(dialect.delimiter)
        .from_reader(BufReader::new(file));

    let mut records = rdr.byte_records();
    let headers: Row = match records.next() {
        Some(first) => decode(&first.map_err(|e| StageError::csv(path, e))?),
        None => return Err(StageError::EmptyInput { path: path.into() }),
    };

    let mut rows = Vec::new();
    for result in records {
        let record = result.map_err(|e| StageError::csv(path, e))?;
        rows.push(decode(&record));
    }

    debug!(path = %path.display(), rows = rows.len(), "read table");
    Ok(Table { headers, rows })
}

fn decode(record: &ByteRecord) -> Row {
    record
        .iter()
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect()
}

/// Write header + rows to `path`.
///
/// Rows go to a temp file next to `path` which is renamed over it once
/// complete, so a failed write never leaves a truncated artifact behind.
pub fn write_table<P: AsRef<Path>>(path: P, table: &Table, dialect: &Dialect) -> StageResult<()> {
    write_rows(path.as_ref(), Some(&table.headers), &table.rows, dialect)
}

/// Create (or replace) `path` with zero lines.
pub fn write_empty<P: AsRef<Path>>(path: P) -> StageResult<()> {
    write_rows(path.as_ref(), None, &[], &Dialect::default())
}

fn write_rows(
    path: &Path,
    headers: Option<&Row>,
    rows: &[Row],
    dialect: &Dialect,
) -> StageResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| StageError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StageError::io(dir, e))?;
    {
        let mut wtr = WriterBuilder::new()
            .flexible(true)
            .delimiter(dialect.delimiter)
            .from_writer(&mut tmp);
        if let Some(h) = headers {
            wtr.write_record(h).map_err(|e| StageError::csv(path, e))?;
        }
        for row in rows {
            wtr.write_record(row).map_err(|e| StageError::csv(path, e))?;
        }
        wtr.flush().map_err(|e| StageError::io(path, e))?;
    }
    tmp.as_file_mut()
        .flush()
        .map_err(|e| StageError::io(path, e))?;
    tmp.persist(path)
        .map_err(|e| StageError::io(path, e.error))?;

    debug!(path = %path.display(), rows = rows.len(), "wrote table");
    Ok(())
}
