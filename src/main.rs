use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use rusty_assay::config::{LabConfig, DEFAULT_METHOD};
use rusty_assay::data::loader::load_file;
use rusty_assay::{analyze, report};

#[derive(Parser)]
#[command(name = "rusty-assay")]
#[command(about = "QA/QC statistics and analyte correlation for ICP-AES runs")]
#[command(version)]
struct Cli {
    /// Sample records (.json or long-format .csv)
    samples: PathBuf,

    /// Lab configuration with one section per method
    config: PathBuf,

    /// Configuration section to use (default: the samples' own method, then ICP-SS)
    #[arg(short, long)]
    method: Option<String>,

    /// Output prefix for `<out>.json`, `<out>_correlation.csv`, `<out>_qaqc.csv`
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// R² threshold for a significant pair, overrides the configured one
    #[arg(short, long, value_parser = parse_threshold)]
    threshold: Option<f64>,
}

fn parse_threshold(raw: &str) -> std::result::Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not numeric; expected a value between 0 and 1 inclusive"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is outside 0 to 1 inclusive"))
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = LabConfig::from_path(&cli.config)?;
    let dataset =
        load_file(&cli.samples).with_context(|| format!("loading {}", cli.samples.display()))?;

    let method = cli
        .method
        .as_deref()
        .or_else(|| dataset.method())
        .unwrap_or(DEFAULT_METHOD)
        .to_string();
    let prefix = cli
        .out
        .clone()
        .unwrap_or_else(|| cli.samples.with_extension(""));

    let mut method_config = config.method(&method)?.clone();
    if let Some(threshold) = cli.threshold {
        log::info!(
            "correlation threshold {threshold} (configured {})",
            method_config.correlation_threshold
        );
        method_config.correlation_threshold = threshold;
    }
    let result = analyze(dataset, &method_config)?;

    for msg in &result.warnings {
        println!("\t{msg}");
    }
    for path in report::write_all(&result, &prefix)? {
        log::info!("wrote {}", path.display());
    }
    println!(
        "Success: {} sample groups, {} correlation matrices.",
        result.samples.len(),
        result.correlations.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_after_positionals() {
        let cli = Cli::try_parse_from([
            "rusty-assay",
            "s.json",
            "c.json",
            "--threshold",
            "0.8",
            "--method",
            "ICP-MS",
        ])
        .unwrap();
        assert_eq!(cli.samples, PathBuf::from("s.json"));
        assert_eq!(cli.threshold, Some(0.8));
        assert_eq!(cli.method.as_deref(), Some("ICP-MS"));
        assert!(cli.out.is_none());
    }

    #[test]
    fn threshold_must_be_in_unit_range() {
        assert_eq!(parse_threshold("0").unwrap(), 0.0);
        assert_eq!(parse_threshold("1").unwrap(), 1.0);
        assert!(parse_threshold("1.2").is_err());
        assert!(parse_threshold("-0.1").is_err());
        assert!(parse_threshold("high").is_err());
        assert!(Cli::try_parse_from(["rusty-assay", "s.json", "c.json", "-t", "2"]).is_err());
    }

    #[test]
    fn both_inputs_are_required() {
        assert!(Cli::try_parse_from(["rusty-assay", "s.json"]).is_err());
    }
}
