// src/process/mod.rs
pub mod filter;
pub mod location;
pub mod merge;
pub mod split;

pub use filter::{
    filter_shard, filter_shards, filter_table, FilterColumns, FilterCounts, FilterCriteria,
    FilterReport, RejectionReason, ShardReport,
};
pub use location::{derive_location_country, derive_location_country_file, ExtractReport};
pub use merge::{merge_files, merge_tables, MergeReport};
pub use split::{split_file, split_table, ShardNaming};
