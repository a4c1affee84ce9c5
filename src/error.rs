use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures a single unit of work (one shard, one file) can hit.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("empty input: {}", .path.display())]
    EmptyInput { path: PathBuf },

    #[error("required column '{column}' not found in {}", .path.display())]
    MissingColumn { column: String, path: PathBuf },

    #[error("shard size must be at least 1")]
    InvalidShardSize,

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl StageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StageError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        StageError::Csv {
            path: path.into(),
            source,
        }
    }

    pub fn missing_column(column: &str, path: impl Into<PathBuf>) -> Self {
        StageError::MissingColumn {
            column: column.to_string(),
            path: path.into(),
        }
    }

    /// Attach the artifact path to errors raised by the in-memory stages.
    pub fn at(self, path: impl Into<PathBuf>) -> Self {
        match self {
            StageError::EmptyInput { .. } => StageError::EmptyInput { path: path.into() },
            StageError::MissingColumn { column, .. } => StageError::MissingColumn {
                column,
                path: path.into(),
            },
            other => other,
        }
    }

    /// Short machine-friendly tag used in run summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::EmptyInput { .. } => "empty_input",
            StageError::MissingColumn { .. } => "missing_column",
            StageError::InvalidShardSize => "invalid_shard_size",
            StageError::Io { .. } => "io",
            StageError::Csv { .. } => "csv",
        }
    }
}

/// A failed unit of work as it appears in run reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub path: PathBuf,
    pub kind: String,
    pub message: String,
}

impl FailureRecord {
    pub fn new(path: &Path, err: &StageError) -> Self {
        Self {
            path: path.to_path_buf(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type for pipeline stages
pub type StageResult<T> = Result<T, StageError>;
