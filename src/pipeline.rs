use anyhow::{Context, Result};
use serde::Serialize;
use std::{fs, path::PathBuf, time::Instant};
use tracing::{error, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::error::FailureRecord;
use crate::process::{
    derive_location_country_file, filter_shards, merge_files, split_file, ExtractReport,
    FilterReport, MergeReport,
};

/// What one run did, stage by stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub shards: Vec<PathBuf>,
    pub filter: FilterReport,
    pub merge: MergeReport,
    pub extract: Option<ExtractReport>,
    /// Stage-level failures after the split (merge write, extraction).
    pub failures: Vec<FailureRecord>,
}

/// Split → filter → merge → derive `location_country`.
///
/// Only a failed split stops the run. Problems in later stages are logged
/// and recorded in the report.
#[instrument(level = "info", skip_all, fields(file = %config.input.display()))]
pub fn run(config: &PipelineConfig) -> Result<PipelineReport> {
    config.validate()?;
    let start = Instant::now();
    let dialect = config.dialect();
    let mut report = PipelineReport::default();

    // ─── 1) split ────────────────────────────────────────────────────
    report.shards = split_file(
        &config.input,
        &config.shard_naming(),
        config.max_rows_per_shard,
        &dialect,
    )
    .with_context(|| format!("splitting {}", config.input.display()))?;

    if report.shards.is_empty() {
        warn!("no shards produced; nothing further to do");
        return Ok(report);
    }

    // ─── 2) filter shards in place ───────────────────────────────────
    report.filter = filter_shards(&report.shards, &config.criteria(), &dialect);

    // ─── 3) merge ────────────────────────────────────────────────────
    match merge_files(&report.shards, &config.merged_output, &dialect) {
        Ok(merge) => report.merge = merge,
        Err(e) => {
            error!("error writing merged file: {}", e);
            report
                .failures
                .push(FailureRecord::new(&config.merged_output, &e));
            return Ok(report);
        }
    }

    if config.remove_shards {
        remove_shards(&report);
    }

    // ─── 4) location_country ─────────────────────────────────────────
    match derive_location_country_file(&config.merged_output, &config.final_output, &dialect) {
        Ok(extract) => report.extract = Some(extract),
        Err(e) => {
            error!("error processing file: {}", e);
            report
                .failures
                .push(FailureRecord::new(&config.merged_output, &e));
        }
    }

    info!(elapsed = ?start.elapsed(), "pipeline finished");
    Ok(report)
}

/// Delete the shard files, unless the merge skipped any of them. Returns
/// whether the shards were removed.
fn remove_shards(report: &PipelineReport) -> bool {
    if !report.merge.failures.is_empty() {
        warn!(
            failures = report.merge.failures.len(),
            "keeping shard files: merge could not read all of them"
        );
        return false;
    }
    for shard in &report.shards {
        if let Err(e) = fs::remove_file(shard) {
            warn!("failed to delete {}: {}", shard.display(), e);
        }
    }
    info!(count = report.shards.len(), "removed shard files");
    true
}
