//! Machine-readable hand-off of an [`AnalysisReport`].
//!
//! Spreadsheet layout and styling belong to the reporting side; this module
//! only writes the numbers: the whole report as JSON plus two flat CSV tables.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::analysis::AnalysisReport;
use crate::data::model::is_missing;

/// Write the report as pretty-printed JSON. Missing values become `null`.
pub fn write_json(report: &AnalysisReport, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, report).context("serialising report")?;
    out.flush().context("flushing JSON report")?;
    Ok(())
}

#[derive(Serialize)]
struct CorrelationRow<'a> {
    group: &'a str,
    analyte_a: &'a str,
    analyte_b: &'a str,
    r_squared: Option<f64>,
    significant: bool,
}

/// One row per correlation cell of every group.
pub fn write_correlation_csv(report: &AnalysisReport, path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for matrix in &report.correlations {
        for cell in &matrix.cells {
            writer
                .serialize(CorrelationRow {
                    group: &matrix.group,
                    analyte_a: &cell.analyte_a,
                    analyte_b: &cell.analyte_b,
                    r_squared: (!is_missing(cell.r_squared)).then_some(cell.r_squared),
                    significant: cell.significant,
                })
                .context("writing correlation row")?;
        }
    }
    writer.flush().context("flushing correlation CSV")?;
    Ok(())
}

#[derive(Serialize)]
struct LabelRow<'a> {
    group: &'a str,
    sample: &'a str,
    analyte: &'a str,
    average: f64,
    label: String,
}

/// One row per labelled generic-sample cell.
pub fn write_labels_csv(report: &AnalysisReport, path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for group in &report.labels {
        for cell in &group.cells {
            writer
                .serialize(LabelRow {
                    group: &group.group,
                    sample: &cell.sample,
                    analyte: &cell.analyte,
                    average: cell.average,
                    label: cell.label.to_string(),
                })
                .context("writing label row")?;
        }
    }
    writer.flush().context("flushing label CSV")?;
    Ok(())
}

/// Write `<prefix>.json`, `<prefix>_correlation.csv` and `<prefix>_qaqc.csv`.
pub fn write_all(report: &AnalysisReport, prefix: &Path) -> Result<Vec<PathBuf>> {
    let with_suffix = |suffix: &str| {
        let mut name = prefix.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    };
    let json = with_suffix(".json");
    let corr = with_suffix("_correlation.csv");
    let labels = with_suffix("_qaqc.csv");

    write_json(report, &json)?;
    write_correlation_csv(report, &corr)?;
    write_labels_csv(report, &labels)?;
    Ok(vec![json, corr, labels])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::{CorrelationCell, CorrelationMatrix};

    fn report() -> AnalysisReport {
        AnalysisReport {
            method: "ICP-SS".into(),
            analytes: vec!["Al".into(), "Be".into()],
            correlations: vec![CorrelationMatrix {
                group: "River 1".into(),
                analytes: vec!["Al".into(), "Be".into()],
                threshold: 0.7,
                cells: vec![
                    CorrelationCell {
                        analyte_a: "Al".into(),
                        analyte_b: "Al".into(),
                        r_squared: 1.0,
                        significant: false,
                    },
                    CorrelationCell {
                        analyte_a: "Al".into(),
                        analyte_b: "Be".into(),
                        r_squared: f64::NAN,
                        significant: false,
                    },
                ],
            }],
            warnings: vec!["Warning: Standard deviation for Be is zero.".into()],
            ..Default::default()
        }
    }

    #[test]
    fn writes_all_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_all(&report(), &dir.path().join("run")).unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths.iter().all(|p| p.exists()));

        let json = std::fs::read_to_string(&paths[0]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["method"], "ICP-SS");
        assert!(value["correlations"][0]["cells"][1]["r_squared"].is_null());

        let csv = std::fs::read_to_string(&paths[1]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("group,analyte_a,analyte_b,r_squared,significant")
        );
        assert_eq!(lines.next(), Some("River 1,Al,Al,1.0,false"));
        assert_eq!(lines.next(), Some("River 1,Al,Be,,false"));
    }
}
