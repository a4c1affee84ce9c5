// src/process/split.rs
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::error::{StageError, StageResult};
use crate::table::{read_table, write_table, Dialect, Table};

/// Where shard files go: `<dir>/<prefix><n>.<extension>`, `n` starting at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardNaming {
    pub dir: PathBuf,
    pub prefix: String,
    pub extension: String,
}

impl ShardNaming {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            extension: extension.into(),
        }
    }

    pub fn path_for(&self, shard_number: usize) -> PathBuf {
        self.dir
            .join(format!("{}{}.{}", self.prefix, shard_number, self.extension))
    }
}

impl Default for ShardNaming {
    fn default() -> Self {
        Self::new(".", "split_", "csv")
    }
}

/// Partition the data rows of `table` into consecutive groups of at most
/// `max_rows`, each carrying a copy of the header.
///
/// A header-only table yields no shards.
pub fn split_table(table: &Table, max_rows: usize) -> StageResult<Vec<Table>> {
    if max_rows == 0 {
        return Err(StageError::InvalidShardSize);
    }
    Ok(table
        .rows
        .chunks(max_rows)
        .map(|chunk| Table::new(table.headers.clone(), chunk.to_vec()))
        .collect())
}

/// Read `input`, split it with [`split_table`] and write one file per shard.
///
/// Returns the shard paths in row order. Empty input is not an error: it is
/// logged and an empty list comes back.
#[instrument(level = "info", skip(input, naming, dialect), fields(file = %input.as_ref().display()))]
pub fn split_file<P: AsRef<Path>>(
    input: P,
    naming: &ShardNaming,
    max_rows: usize,
    dialect: &Dialect,
) -> StageResult<Vec<PathBuf>> {
    let input = input.as_ref();
    let start = Instant::now();

    let table = match read_table(input, dialect) {
        Ok(t) => t,
        Err(StageError::EmptyInput { .. }) => {
            warn!(input = %input.display(), "the input CSV is empty");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };
    if table.is_empty() {
        warn!(input = %input.display(), "the input CSV has a header but no data rows");
        return Ok(Vec::new());
    }

    let shards = split_table(&table, max_rows)?;
    let mut created = Vec::with_capacity(shards.len());
    for (i, shard) in shards.iter().enumerate() {
        let path = naming.path_for(i + 1);
        write_table(&path, shard, dialect)?;
        info!(path = %path.display(), rows = shard.len(), "created shard");
        created.push(path);
    }

    info!(
        shards = created.len(),
        rows = table.len(),
        elapsed = ?start.elapsed(),
        "split complete"
    );
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use glob::glob;
    use std::fs;
    use tempfile::tempdir;

    fn numbered(n: usize) -> Table {
        Table::new(
            vec!["id".into(), "name".into()],
            (0..n).map(|i| vec![i.to_string(), format!("row {}", i)]).collect(),
        )
    }

    #[test]
    fn shards_reassemble_to_the_input() -> Result<()> {
        for (rows, size) in [(1usize, 1usize), (7, 3), (9, 3), (10, 200), (201, 200)] {
            let table = numbered(rows);
            let shards = split_table(&table, size)?;

            assert_eq!(shards.len(), rows.div_ceil(size), "{} rows / {}", rows, size);
            assert!(shards.iter().all(|s| s.headers == table.headers));
            assert!(shards.iter().all(|s| s.len() <= size));

            let joined: Vec<_> = shards.into_iter().flat_map(|s| s.rows).collect();
            assert_eq!(joined, table.rows);
        }
        Ok(())
    }

    #[test]
    fn header_only_table_has_no_shards() -> Result<()> {
        assert!(split_table(&numbered(0), 5)?.is_empty());
        Ok(())
    }

    #[test]
    fn zero_shard_size_is_rejected() {
        let err = split_table(&numbered(3), 0).unwrap_err();
        assert!(matches!(err, StageError::InvalidShardSize));
    }

    #[test]
    fn split_file_names_shards_from_one() -> Result<()> {
        let dir = tempdir()?;
        let input = dir.path().join("input.csv");
        write_table(&input, &numbered(5), &Dialect::default())?;

        let naming = ShardNaming::new(dir.path().join("shards"), "split_", "csv");
        let paths = split_file(&input, &naming, 2, &Dialect::default())?;

        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["split_1.csv", "split_2.csv", "split_3.csv"]);

        let pattern = format!("{}/split_*.csv", naming.dir.display());
        assert_eq!(glob(&pattern)?.filter_map(|p| p.ok()).count(), 3);

        let last = read_table(&paths[2], &Dialect::default())?;
        assert_eq!(last.headers, vec!["id", "name"]);
        assert_eq!(last.rows, vec![vec!["4", "row 4"]]);
        Ok(())
    }

    #[test]
    fn split_file_on_empty_input_creates_nothing() -> Result<()> {
        let dir = tempdir()?;
        let naming = ShardNaming::new(dir.path(), "split_", "csv");

        let blank = dir.path().join("blank.csv");
        fs::write(&blank, "")?;
        assert!(split_file(&blank, &naming, 10, &Dialect::default())?.is_empty());

        let header_only = dir.path().join("header.csv");
        fs::write(&header_only, "id,name\n")?;
        assert!(split_file(&header_only, &naming, 10, &Dialect::default())?.is_empty());

        assert!(!naming.path_for(1).exists());
        Ok(())
    }

    #[test]
    fn split_file_accepts_non_utf8_input() -> Result<()> {
        let dir = tempdir()?;
        let input = dir.path().join("latin1.csv");
        fs::write(&input, b"name,country\nAnn,Canada\nJos\xe9,Canada\nBob,Canada\n")?;

        let naming = ShardNaming::new(dir.path().join("shards"), "split_", "csv");
        let paths = split_file(&input, &naming, 10, &Dialect::default())?;
        assert_eq!(paths.len(), 1);
        assert_eq!(read_table(&paths[0], &Dialect::default())?.len(), 3);
        Ok(())
    }

    #[test]
    fn split_file_missing_input_fails() {
        let naming = ShardNaming::default();
        let err = split_file("/no/such/input.csv", &naming, 10, &Dialect::default()).unwrap_err();
        assert_eq!(err.kind(), "io");
    }
}
