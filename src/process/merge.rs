// src/process/merge.rs
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};

use crate::error::{FailureRecord, StageError, StageResult};
use crate::table::{read_table, write_empty, write_table, Dialect, Table};

/// Concatenate shards that share one header.
///
/// The first shard with a header supplies it; every later shard only adds
/// its data rows. Returns `None` when no shard has a header at all.
pub fn merge_tables<I>(shards: I) -> Option<Table>
where
    I: IntoIterator<Item = Table>,
{
    let mut merged: Option<Table> = None;
    for shard in shards {
        match merged.as_mut() {
            None => merged = Some(shard),
            Some(acc) => acc.rows.extend(shard.rows),
        }
    }
    merged
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Where the merged file was written; `None` when there was nothing to merge.
    pub output: Option<PathBuf>,
    pub shards_merged: usize,
    pub rows: usize,
    pub failures: Vec<FailureRecord>,
}

/// Merge the shard files in `paths`, in order, into `output`.
///
/// Unreadable shards are logged and left out. Empty shard files are skipped
/// silently. An empty `paths` writes nothing.
#[instrument(level = "info", skip(paths, output, dialect), fields(shards = paths.len(), dest = %output.as_ref().display()))]
pub fn merge_files<P: AsRef<Path>>(
    paths: &[PathBuf],
    output: P,
    dialect: &Dialect,
) -> StageResult<MergeReport> {
    let output = output.as_ref();
    let mut report = MergeReport::default();

    if paths.is_empty() {
        warn!("no files to merge");
        return Ok(report);
    }

    let mut tables = Vec::with_capacity(paths.len());
    for path in paths {
        match read_table(path, dialect) {
            Ok(table) => tables.push(table),
            Err(StageError::EmptyInput { .. }) => continue,
            Err(e) => {
                error!("error reading shard: {}", e);
                report.failures.push(FailureRecord::new(path, &e));
            }
        }
    }
    report.shards_merged = tables.len();

    match merge_tables(tables) {
        Some(merged) => {
            report.rows = merged.len();
            write_table(output, &merged, dialect)?;
        }
        None => write_empty(output)?,
    }
    report.output = Some(output.to_path_buf());

    info!(
        output = %output.display(),
        shards = report.shards_merged,
        rows = report.rows,
        failed = report.failures.len(),
        "merged file created"
    );
    Ok(report)
}
