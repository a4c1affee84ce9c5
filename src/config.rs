use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

use crate::process::{FilterColumns, FilterCriteria, ShardNaming};
use crate::table::Dialect;

/// Everything the pipeline needs to know. Every field has a default, so a
/// YAML file only has to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub shard_dir: PathBuf,
    pub shard_prefix: String,
    pub shard_extension: String,
    /// Max data rows per shard, header excluded.
    pub max_rows_per_shard: usize,
    pub accepted_countries: Vec<String>,
    pub job_title_keywords: Vec<String>,
    pub excluded_industry: String,
    pub industry_column: String,
    pub country_column: String,
    pub job_title_column: String,
    pub merged_output: PathBuf,
    pub final_output: PathBuf,
    pub delimiter: char,
    /// Delete the shard files once they have been merged.
    pub remove_shards: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let columns = FilterColumns::default();
        Self {
            input: PathBuf::from("sampleCSV.csv"),
            shard_dir: PathBuf::from("."),
            shard_prefix: "split_".into(),
            shard_extension: "csv".into(),
            max_rows_per_shard: 200,
            accepted_countries: vec![
                "United States".into(),
                "Canada".into(),
                "United Kingdom".into(),
            ],
            job_title_keywords: vec![
                "ceo".into(),
                "founder".into(),
                "chief executive officer".into(),
                "owner".into(),
                "co-founder".into(),
            ],
            excluded_industry: crate::process::filter::EXCLUDED_INDUSTRY.into(),
            industry_column: columns.industry,
            country_column: columns.country,
            job_title_column: columns.job_title,
            merged_output: PathBuf::from("merged_output.csv"),
            final_output: PathBuf::from("FinalOutput.csv"),
            delimiter: ',',
            remove_shards: false,
        }
    }
}

impl PipelineConfig {
    /// Load a YAML config file; absent keys keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {:?}", path))?;
        let config: PipelineConfig = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config file {:?}", path))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_rows_per_shard == 0 {
            bail!("max_rows_per_shard must be a positive integer");
        }
        if self.accepted_countries.iter().all(|c| c.trim().is_empty()) {
            bail!("accepted_countries must name at least one country");
        }
        if self.job_title_keywords.iter().all(|k| k.trim().is_empty()) {
            bail!("job_title_keywords must name at least one keyword");
        }
        if !self.delimiter.is_ascii() {
            bail!("delimiter must be a single ASCII character, got {:?}", self.delimiter);
        }
        Ok(())
    }

    pub fn dialect(&self) -> Dialect {
        Dialect {
            delimiter: self.delimiter as u8,
        }
    }

    pub fn shard_naming(&self) -> ShardNaming {
        ShardNaming::new(&self.shard_dir, &self.shard_prefix, &self.shard_extension)
    }

    pub fn criteria(&self) -> FilterCriteria {
        FilterCriteria::new(&self.accepted_countries, &self.job_title_keywords)
            .with_excluded_industry(&self.excluded_industry)
            .with_columns(FilterColumns {
                industry: self.industry_column.clone(),
                country: self.country_column.clone(),
                job_title: self.job_title_column.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partial_yaml_keeps_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("pipeline.yaml");
        fs::write(
            &path,
            "max_rows_per_shard: 50\naccepted_countries: [Canada]\nmerged_output: out/merged.csv\n",
        )?;

        let config = PipelineConfig::load(&path)?;
        assert_eq!(config.max_rows_per_shard, 50);
        assert_eq!(config.accepted_countries, vec!["Canada"]);
        assert_eq!(config.merged_output, PathBuf::from("out/merged.csv"));
        assert_eq!(config.shard_prefix, "split_");
        assert_eq!(config.job_title_keywords.len(), 5);
        config.validate()?;
        Ok(())
    }

    #[test]
    fn validation_rejects_nonsense() {
        let mut config = PipelineConfig::default();
        assert!(config.validate().is_ok());

        config.max_rows_per_shard = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.accepted_countries = vec!["  ".into()];
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.delimiter = '§';
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_config_file_is_an_error() {
        let err = PipelineConfig::load("/no/such/pipeline.yaml").unwrap_err();
        assert!(format!("{:#}", err).contains("reading config file"));
    }

    #[test]
    fn shard_naming_follows_config() {
        let config = PipelineConfig {
            shard_dir: PathBuf::from("work"),
            shard_prefix: "part-".into(),
            shard_extension: "tsv".into(),
            ..PipelineConfig::default()
        };
        assert_eq!(config.shard_naming().path_for(3), PathBuf::from("work/part-3.tsv"));
    }
}
