use anyhow::{Context, Result};
use clap::Parser;
use csvsieve::{pipeline, process::RejectionReason, PipelineConfig};
use std::{fs, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Split a CSV into shards, filter them, merge the result and derive location_country"
)]
struct Args {
    /// YAML file with pipeline settings; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Max data rows per shard
    #[arg(long)]
    max_rows: Option<usize>,
    #[arg(long)]
    shard_dir: Option<PathBuf>,
    #[arg(long)]
    shard_prefix: Option<String>,
    /// Accepted country (repeatable); replaces the configured list
    #[arg(long = "country")]
    countries: Vec<String>,
    /// Job-title keyword (repeatable); replaces the configured list
    #[arg(long = "keyword")]
    keywords: Vec<String>,
    #[arg(long)]
    excluded_industry: Option<String>,
    #[arg(long)]
    merged: Option<PathBuf>,
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Write a JSON run summary here
    #[arg(long)]
    summary: Option<PathBuf>,
    /// Delete shard files after merging
    #[arg(long)]
    remove_shards: bool,
}

impl Args {
    fn into_config(self) -> Result<(PipelineConfig, Option<PathBuf>)> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(v) = self.input {
            config.input = v;
        }
        if let Some(v) = self.max_rows {
            config.max_rows_per_shard = v;
        }
        if let Some(v) = self.shard_dir {
            config.shard_dir = v;
        }
        if let Some(v) = self.shard_prefix {
            config.shard_prefix = v;
        }
        if !self.countries.is_empty() {
            config.accepted_countries = self.countries;
        }
        if !self.keywords.is_empty() {
            config.job_title_keywords = self.keywords;
        }
        if let Some(v) = self.excluded_industry {
            config.excluded_industry = v;
        }
        if let Some(v) = self.merged {
            config.merged_output = v;
        }
        if let Some(v) = self.output {
            config.final_output = v;
        }
        config.remove_shards |= self.remove_shards;
        Ok((config, self.summary))
    }
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    // ─── 2) configuration ────────────────────────────────────────────
    let (config, summary_path) = Args::parse().into_config()?;
    info!(
        input = %config.input.display(),
        max_rows = config.max_rows_per_shard,
        countries = ?config.accepted_countries,
        keywords = ?config.job_title_keywords,
        "startup"
    );

    // ─── 3) run ──────────────────────────────────────────────────────
    let report = pipeline::run(&config)?;

    let totals = &report.filter.totals;
    for reason in RejectionReason::ALL {
        info!("total removed - {}: {}", reason.describe(), totals.rejected(reason));
    }
    info!(
        shards = report.shards.len(),
        kept = totals.kept,
        removed = totals.removed(),
        failed_shards = report.filter.failures.len(),
        "all done"
    );

    // ─── 4) optional summary ─────────────────────────────────────────
    if let Some(path) = summary_path {
        let json = serde_json::to_string_pretty(&report).context("serializing run summary")?;
        fs::write(&path, json).with_context(|| format!("writing summary {:?}", path))?;
        info!("wrote summary {}", path.display());
    }

    Ok(())
}
