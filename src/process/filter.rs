// src/process/filter.rs
use serde::Serialize;
use std::{
    ops::AddAssign,
    path::{Path, PathBuf},
};
use tracing::{error, info, instrument, warn};

use crate::error::{FailureRecord, StageError, StageResult};
use crate::table::{cell, read_table, write_table, Dialect, Table};

/// Industry category dropped unless configured otherwise.
pub const EXCLUDED_INDUSTRY: &str = "Computer Industry";

/// Why a row was dropped. Variants are listed in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    EmptyField,
    ExcludedIndustry,
    CountryNotAccepted,
    IrrelevantJobTitle,
}

impl RejectionReason {
    pub const ALL: [RejectionReason; 4] = [
        RejectionReason::EmptyField,
        RejectionReason::ExcludedIndustry,
        RejectionReason::CountryNotAccepted,
        RejectionReason::IrrelevantJobTitle,
    ];

    pub fn describe(self) -> &'static str {
        match self {
            RejectionReason::EmptyField => "empty fields",
            RejectionReason::ExcludedIndustry => "excluded industry",
            RejectionReason::CountryNotAccepted => "not in accepted country",
            RejectionReason::IrrelevantJobTitle => "irrelevant job title",
        }
    }
}

/// Header names of the three columns the filter inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterColumns {
    pub industry: String,
    pub country: String,
    pub job_title: String,
}

impl Default for FilterColumns {
    fn default() -> Self {
        Self {
            industry: "standardized_industry".into(),
            country: "country".into(),
            job_title: "normalized_job_title".into(),
        }
    }
}

/// Acceptance parameters. Countries, keywords and the excluded industry are
/// stored trimmed and lower-cased; blank entries are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCriteria {
    accepted_countries: Vec<String>,
    job_title_keywords: Vec<String>,
    excluded_industry: String,
    pub columns: FilterColumns,
}

fn fold_all<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| v.as_ref().trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

impl FilterCriteria {
    pub fn new<I, J, S, T>(accepted_countries: I, job_title_keywords: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            accepted_countries: fold_all(accepted_countries),
            job_title_keywords: fold_all(job_title_keywords),
            excluded_industry: EXCLUDED_INDUSTRY.to_lowercase(),
            columns: FilterColumns::default(),
        }
    }

    pub fn with_excluded_industry(mut self, industry: &str) -> Self {
        self.excluded_industry = industry.trim().to_lowercase();
        self
    }

    pub fn with_columns(mut self, columns: FilterColumns) -> Self {
        self.columns = columns;
        self
    }

    fn resolve(&self, table: &Table) -> StageResult<Resolved> {
        let find = |name: &str| {
            table
                .column_index(name)
                .ok_or_else(|| StageError::missing_column(name, PathBuf::new()))
        };
        Ok(Resolved {
            industry: find(&self.columns.industry)?,
            country: find(&self.columns.country)?,
            job_title: find(&self.columns.job_title)?,
            width: table.headers.len(),
        })
    }
}

/// Column positions for one table's header.
struct Resolved {
    industry: usize,
    country: usize,
    job_title: usize,
    width: usize,
}

type Check = fn(&FilterCriteria, &Resolved, &[String]) -> bool;

/// The acceptance chain. The first check a row fails names its rejection.
const CHECKS: [(RejectionReason, Check); 4] = [
    (RejectionReason::EmptyField, is_complete),
    (RejectionReason::ExcludedIndustry, industry_allowed),
    (RejectionReason::CountryNotAccepted, country_accepted),
    (RejectionReason::IrrelevantJobTitle, job_title_relevant),
];

fn is_complete(_: &FilterCriteria, cols: &Resolved, row: &[String]) -> bool {
    row.len() >= cols.width && row.iter().all(|c| !c.trim().is_empty())
}

fn industry_allowed(criteria: &FilterCriteria, cols: &Resolved, row: &[String]) -> bool {
    cell(row, cols.industry).trim().to_lowercase() != criteria.excluded_industry
}

fn country_accepted(criteria: &FilterCriteria, cols: &Resolved, row: &[String]) -> bool {
    let token = country_token(cell(row, cols.country));
    criteria.accepted_countries.iter().any(|c| *c == token)
}

fn job_title_relevant(criteria: &FilterCriteria, cols: &Resolved, row: &[String]) -> bool {
    let title = cell(row, cols.job_title).to_lowercase();
    criteria
        .job_title_keywords
        .iter()
        .any(|k| title.contains(k.as_str()))
}

/// Country part of a `"City, Region, Country"` value: the last non-empty
/// comma-separated segment, trimmed and lower-cased.
pub fn country_token(value: &str) -> String {
    value
        .split(',')
        .rev()
        .find(|s| !s.is_empty())
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

fn evaluate(criteria: &FilterCriteria, cols: &Resolved, row: &[String]) -> Option<RejectionReason> {
    CHECKS
        .iter()
        .find(|(_, passes)| !passes(criteria, cols, row))
        .map(|(reason, _)| *reason)
}

/// Per-shard (or summed) row accounting.
///
/// Every data row lands in exactly one bucket, so the five buckets always add
/// up to `original_rows`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterCounts {
    pub original_rows: usize,
    pub empty_fields: usize,
    pub excluded_industry: usize,
    pub country_not_accepted: usize,
    pub irrelevant_job_title: usize,
    pub kept: usize,
}

impl FilterCounts {
    fn record(&mut self, verdict: Option<RejectionReason>) {
        self.original_rows += 1;
        match verdict {
            None => self.kept += 1,
            Some(reason) => *self.bucket(reason) += 1,
        }
    }

    fn bucket(&mut self, reason: RejectionReason) -> &mut usize {
        match reason {
            RejectionReason::EmptyField => &mut self.empty_fields,
            RejectionReason::ExcludedIndustry => &mut self.excluded_industry,
            RejectionReason::CountryNotAccepted => &mut self.country_not_accepted,
            RejectionReason::IrrelevantJobTitle => &mut self.irrelevant_job_title,
        }
    }

    pub fn rejected(&self, reason: RejectionReason) -> usize {
        match reason {
            RejectionReason::EmptyField => self.empty_fields,
            RejectionReason::ExcludedIndustry => self.excluded_industry,
            RejectionReason::CountryNotAccepted => self.country_not_accepted,
            RejectionReason::IrrelevantJobTitle => self.irrelevant_job_title,
        }
    }

    pub fn removed(&self) -> usize {
        self.empty_fields + self.excluded_industry + self.country_not_accepted + self.irrelevant_job_title
    }
}

impl AddAssign for FilterCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.original_rows += rhs.original_rows;
        self.empty_fields += rhs.empty_fields;
        self.excluded_industry += rhs.excluded_industry;
        self.country_not_accepted += rhs.country_not_accepted;
        self.irrelevant_job_title += rhs.irrelevant_job_title;
        self.kept += rhs.kept;
    }
}

/// Drop every data row of `table` that fails the acceptance chain, keeping
/// the survivors in their original order.
///
/// A missing required column leaves the table untouched.
pub fn filter_table(table: &mut Table, criteria: &FilterCriteria) -> StageResult<FilterCounts> {
    let cols = criteria.resolve(table)?;
    let mut counts = FilterCounts::default();

    let rows = std::mem::take(&mut table.rows);
    table.rows = rows
        .into_iter()
        .filter(|row| {
            let verdict = evaluate(criteria, &cols, row);
            counts.record(verdict);
            verdict.is_none()
        })
        .collect();

    Ok(counts)
}

/// Filter one shard file and rewrite it in place.
pub fn filter_shard<P: AsRef<Path>>(
    path: P,
    criteria: &FilterCriteria,
    dialect: &Dialect,
) -> StageResult<FilterCounts> {
    let path = path.as_ref();
    let mut table = read_table(path, dialect)?;
    let counts = filter_table(&mut table, criteria).map_err(|e| e.at(path))?;
    write_table(path, &table, dialect)?;
    Ok(counts)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardReport {
    pub path: PathBuf,
    pub counts: FilterCounts,
}

/// Outcome of filtering a whole shard set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterReport {
    pub shards: Vec<ShardReport>,
    pub failures: Vec<FailureRecord>,
    pub totals: FilterCounts,
}

/// Filter every shard in order. A shard that cannot be read, written or
/// resolved is recorded as a failure and the next shard is processed.
#[instrument(level = "info", skip_all, fields(shards = paths.len()))]
pub fn filter_shards(paths: &[PathBuf], criteria: &FilterCriteria, dialect: &Dialect) -> FilterReport {
    let mut report = FilterReport::default();

    for path in paths {
        match filter_shard(path, criteria, dialect) {
            Ok(counts) => {
                info!(
                    file = %path.display(),
                    original_rows = counts.original_rows,
                    removed_empty_fields = counts.empty_fields,
                    removed_excluded_industry = counts.excluded_industry,
                    removed_country = counts.country_not_accepted,
                    removed_job_title = counts.irrelevant_job_title,
                    kept = counts.kept,
                    "filtered shard"
                );
                report.totals += counts;
                report.shards.push(ShardReport {
                    path: path.clone(),
                    counts,
                });
            }
            Err(e) => {
                match e {
                    StageError::EmptyInput { .. } => warn!("skipping shard: {}", e),
                    _ => error!("error processing shard: {}", e),
                }
                report.failures.push(FailureRecord::new(path, &e));
            }
        }
    }

    let totals = &report.totals;
    info!(
        total_removed_empty_fields = totals.empty_fields,
        total_removed_excluded_industry = totals.excluded_industry,
        total_removed_country = totals.country_not_accepted,
        total_removed_job_title = totals.irrelevant_job_title,
        total_removed = totals.removed(),
        total_kept = totals.kept,
        failed_shards = report.failures.len(),
        "filter summary"
    );
    report
}
