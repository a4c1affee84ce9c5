//! Split a large CSV into shards, filter each shard, merge the survivors and
//! derive a `location_country` column from the merged file.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod table;

pub use config::PipelineConfig;
pub use error::{FailureRecord, StageError, StageResult};
pub use pipeline::{run, PipelineReport};
pub use table::{column_index, Row, Table};
