// src/process/location.rs
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

use crate::error::{StageError, StageResult};
use crate::table::{cell, read_table, write_table, Dialect, Row, Table};

pub const LOCATION_COLUMN: &str = "location";
pub const COUNTRY_COLUMN: &str = "country";
/// Name of the derived column, placed right after the location column.
pub const LOCATION_COUNTRY_COLUMN: &str = "location_country";

static DOUBLED_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*,").expect("valid regex"));

/// Whole-word, case-insensitive matchers keyed by the country text.
///
/// A country whose matcher cannot be built is cached as `None`, so the
/// warning is logged once per distinct value.
#[derive(Default)]
struct CountryPatterns {
    cache: HashMap<String, Option<Regex>>,
    size_limit: Option<usize>,
}

impl CountryPatterns {
    fn get(&mut self, country: &str) -> Option<&Regex> {
        let size_limit = self.size_limit;
        self.cache
            .entry(country.to_string())
            .or_insert_with(|| {
                let mut builder =
                    RegexBuilder::new(&format!(r"\b{}\b", regex::escape(country)));
                builder.case_insensitive(true);
                if let Some(limit) = size_limit {
                    builder.size_limit(limit);
                }
                match builder.build() {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!(country, "cannot build country matcher, location left as is: {}", e);
                        None
                    }
                }
            })
            .as_ref()
    }
}

/// Split `country` out of `location`.
///
/// Returns `(rewritten_location, location_country)`. When the country does
/// not occur in the location as a whole word the location comes back as is
/// and the derived value is empty.
fn extract(location: &str, country: &str, patterns: &mut CountryPatterns) -> (String, String) {
    let unchanged = (location.to_string(), String::new());
    if location.is_empty() || country.is_empty() {
        return unchanged;
    }
    if !location.to_lowercase().contains(&country.to_lowercase()) {
        return unchanged;
    }
    let Some(re) = patterns.get(country) else {
        return unchanged;
    };
    if !re.is_match(location) {
        return unchanged;
    }

    // only the first occurrence goes
    let mut rewritten = re.replace(location, "").into_owned();
    while DOUBLED_COMMA.is_match(&rewritten) {
        rewritten = DOUBLED_COMMA.replace_all(&rewritten, ",").into_owned();
    }
    let rewritten = rewritten
        .trim_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string();

    (rewritten, country.to_string())
}

/// Add `location_country` after the location column and strip the country
/// from each location it was found in.
pub fn derive_location_country(table: &Table) -> StageResult<Table> {
    derive(table).map(|(derived, _)| derived)
}

/// Same as [`derive_location_country`], also returning how many rows got a
/// non-empty `location_country`.
fn derive(table: &Table) -> StageResult<(Table, usize)> {
    let missing = |name: &str| StageError::missing_column(name, PathBuf::new());
    let loc_idx = table
        .column_index(LOCATION_COLUMN)
        .ok_or_else(|| missing(LOCATION_COLUMN))?;
    let country_idx = table
        .column_index(COUNTRY_COLUMN)
        .ok_or_else(|| missing(COUNTRY_COLUMN))?;

    let mut headers = table.headers.clone();
    headers.insert(loc_idx + 1, LOCATION_COUNTRY_COLUMN.to_string());

    let mut patterns = CountryPatterns::default();
    let mut matched = 0;
    let rows = table
        .rows
        .iter()
        .map(|row| {
            let (location, derived) =
                extract(cell(row, loc_idx), cell(row, country_idx), &mut patterns);

            let mut out: Row = row.clone();
            if out.len() < table.headers.len() {
                out.resize(table.headers.len(), String::new());
            }
            if !derived.is_empty() {
                matched += 1;
            }
            out[loc_idx] = location;
            out.insert(loc_idx + 1, derived);
            out
        })
        .collect();

    Ok((Table { headers, rows }, matched))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    pub output: PathBuf,
    pub rows: usize,
    /// Rows whose location contained their country.
    pub matched: usize,
}

/// Read `input`, derive `location_country` and write the result to `output`.
///
/// Nothing is written when the input is empty or lacks a required column.
#[instrument(level = "info", skip_all, fields(file = %input.as_ref().display()))]
pub fn derive_location_country_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    dialect: &Dialect,
) -> StageResult<ExtractReport> {
    let (input, output) = (input.as_ref(), output.as_ref());

    let table = read_table(input, dialect)?;
    let (derived, matched) = derive(&table).map_err(|e| e.at(input))?;
    debug!(rows = derived.len(), matched, "derived location_country");

    write_table(output, &derived, dialect)?;
    info!(output = %output.display(), rows = derived.len(), "file written");

    Ok(ExtractReport {
        output: output.to_path_buf(),
        rows: derived.len(),
        matched,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn people(rows: Vec<Row>) -> Table {
        Table::new(row(&["name", "Location", "country", "title"]), rows)
    }

    fn run(location: &str, country: &str) -> (String, String) {
        extract(location, country, &mut CountryPatterns::default())
    }

    #[test]
    fn country_is_moved_out_of_location() {
        assert_eq!(run("Paris, France", "France"), ("Paris".into(), "France".into()));
        assert_eq!(run("paris, FRANCE", "France"), ("paris".into(), "France".into()));
        assert_eq!(
            run("Lyon, France, Europe", "France"),
            ("Lyon, Europe".into(), "France".into())
        );
        assert_eq!(run("France", "France"), ("".into(), "France".into()));
    }

    #[test]
    fn partial_words_are_left_alone() {
        assert_eq!(run("Franceville", "France"), ("Franceville".into(), "".into()));
        assert_eq!(run("Paris", "France"), ("Paris".into(), "".into()));
        assert_eq!(run("", "France"), ("".into(), "".into()));
        assert_eq!(run("Paris, France", ""), ("Paris, France".into(), "".into()));
    }

    #[test]
    fn only_first_occurrence_is_removed() {
        assert_eq!(
            run("Georgia, Atlanta, Georgia", "Georgia"),
            ("Atlanta, Georgia".into(), "Georgia".into())
        );
    }

    #[test]
    fn country_text_is_matched_literally() {
        assert_eq!(
            run("Castries, St. Lucia", "St. Lucia"),
            ("Castries".into(), "St. Lucia".into())
        );
        assert_eq!(
            run("Castries, StX Lucia", "St. Lucia"),
            ("Castries, StX Lucia".into(), "".into())
        );
    }

    #[test]
    fn unbuildable_matcher_leaves_location_alone() {
        let mut patterns = CountryPatterns {
            size_limit: Some(16),
            ..CountryPatterns::default()
        };
        for _ in 0..2 {
            assert_eq!(
                extract("Paris, France", "France", &mut patterns),
                ("Paris, France".into(), "".into())
            );
        }
        assert_eq!(patterns.cache.len(), 1);
        assert!(matches!(patterns.cache.get("France"), Some(None)));
    }

    #[test]
    fn header_grows_by_one_after_location() -> Result<()> {
        let table = people(vec![
            row(&["Ann", "Paris, France", "France", "CEO"]),
            row(&["Bob", "Franceville", "France", "Owner"]),
        ]);
        let out = derive_location_country(&table)?;

        assert_eq!(out.headers, vec!["name", "Location", "location_country", "country", "title"]);
        assert_eq!(out.rows[0], vec!["Ann", "Paris", "France", "France", "CEO"]);
        assert_eq!(out.rows[1], vec!["Bob", "Franceville", "", "France", "Owner"]);
        assert!(out.rows.iter().all(|r| r.len() == table.headers.len() + 1));
        Ok(())
    }

    #[test]
    fn short_rows_are_padded() -> Result<()> {
        let table = people(vec![row(&["Ann", "Toronto, Canada"])]);
        let out = derive_location_country(&table)?;
        assert_eq!(out.rows[0], vec!["Ann", "Toronto, Canada", "", "", ""]);
        Ok(())
    }

    #[test]
    fn missing_columns_abort() {
        let table = Table::new(row(&["name", "location"]), vec![row(&["Ann", "Paris, France"])]);
        let err = derive_location_country(&table).unwrap_err();
        assert!(matches!(err, StageError::MissingColumn { ref column, .. } if column == "country"));
    }

    #[test]
    fn file_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let input = dir.path().join("merged_output.csv");
        let output = dir.path().join("FinalOutput.csv");
        fs::write(
            &input,
            "name,location,country\nAnn,\"Leeds, United Kingdom\",United Kingdom\nBob,Ottawa,Canada\n",
        )?;

        let report = derive_location_country_file(&input, &output, &Dialect::default())?;
        assert_eq!(report.rows, 2);
        assert_eq!(report.matched, 1);
        assert_eq!(
            fs::read_to_string(&output)?,
            "name,location,location_country,country\nAnn,Leeds,United Kingdom,United Kingdom\nBob,Ottawa,,Canada\n"
        );
        Ok(())
    }

    #[test]
    fn matched_ignores_an_existing_location_country_column() -> Result<()> {
        let dir = tempdir()?;
        let input = dir.path().join("merged.csv");
        let output = dir.path().join("final.csv");
        fs::write(
            &input,
            r#"location_country,location,country
stale,"Lyon, France",France
stale,Ottawa,Canada
stale,Quebec,Canada
"#,
        )?;

        let report = derive_location_country_file(&input, &output, &Dialect::default())?;
        assert_eq!(report.rows, 3);
        assert_eq!(report.matched, 1);

        let out = read_table(&output, &Dialect::default())?;
        assert_eq!(
            out.headers,
            vec!["location_country", "location", "location_country", "country"]
        );
        assert_eq!(out.rows[0], vec!["stale", "Lyon", "France", "France"]);
        Ok(())
    }

    #[test]
    fn no_output_when_columns_are_missing() -> Result<()> {
        let dir = tempdir()?;
        let input = dir.path().join("merged.csv");
        let output = dir.path().join("final.csv");
        fs::write(&input, "name,city\nAnn,Paris\n")?;

        let err = derive_location_country_file(&input, &output, &Dialect::default()).unwrap_err();
        match err {
            StageError::MissingColumn { column, path } => {
                assert_eq!(column, "location");
                assert_eq!(path, input);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!output.exists());
        Ok(())
    }
}
