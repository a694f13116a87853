//! End-to-end run: classify → aggregate → QA/QC labels → correlation.
//!
//! A failure while freezing or correlating one group is recorded and the run
//! moves on; only an invalid configuration aborts the whole analysis.

use serde::Serialize;

use crate::classify::{Bucket, BucketRole};
use crate::config::MethodConfig;
use crate::correlation::{self, CorrelationMatrix};
use crate::data::model::Dataset;
use crate::error::{Result, Warnings};
use crate::group::SampleGroup;
use crate::qaqc::{self, LabelledCell, QaqcContext};

/// A group that could not be aggregated.
#[derive(Debug, Clone, Serialize)]
pub struct GroupFailure {
    pub group: String,
    pub role: BucketRole,
    pub reason: String,
}

/// QA/QC labels of one generic sample group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupLabels {
    pub group: String,
    pub cells: Vec<LabelledCell>,
}

/// Certified-reference analytes whose replicate RSD is above the limit.
#[derive(Debug, Clone, Serialize)]
pub struct ImpreciseReference {
    pub group: String,
    pub analytes: Vec<String>,
}

/// Everything handed to the reporting side.
#[derive(Debug, Default, Serialize)]
pub struct AnalysisReport {
    pub method: String,
    pub analytes: Vec<String>,
    pub blanks: Option<SampleGroup>,
    pub standards: Option<SampleGroup>,
    pub verification: Option<SampleGroup>,
    pub references: Vec<SampleGroup>,
    pub samples: Vec<SampleGroup>,
    pub failures: Vec<GroupFailure>,
    pub labels: Vec<GroupLabels>,
    pub imprecise_references: Vec<ImpreciseReference>,
    pub correlations: Vec<CorrelationMatrix>,
    pub warnings: Vec<String>,
}

impl AnalysisReport {
    /// Every successfully frozen group, in report order.
    pub fn groups(&self) -> impl Iterator<Item = &SampleGroup> {
        self.blanks
            .iter()
            .chain(self.standards.iter())
            .chain(self.verification.iter())
            .chain(self.references.iter())
            .chain(self.samples.iter())
    }
}

/// Run the full QA/QC analysis of one dataset.
///
/// # Errors
///
/// Only configuration problems (`InvalidThreshold`, `Configuration`).
pub fn analyze(dataset: Dataset, config: &MethodConfig) -> Result<AnalysisReport> {
    config.validate()?;

    let mut classifier = config.classifier(&dataset);
    let Dataset {
        records, analytes, ..
    } = dataset;
    classifier.push_all(records);
    let classification = classifier.finish();

    let mut warnings = Warnings::new();
    warnings.extend(classification.warnings);

    let mut report = AnalysisReport {
        method: config.method.clone(),
        analytes,
        ..Default::default()
    };

    report.blanks = freeze(classification.blanks, &mut report.failures, &mut warnings);
    report.standards = freeze(classification.standards, &mut report.failures, &mut warnings);
    report.verification = freeze(
        classification.verification,
        &mut report.failures,
        &mut warnings,
    );
    report.references = classification
        .references
        .into_iter()
        .filter_map(|b| freeze(b, &mut report.failures, &mut warnings))
        .collect();
    report.samples = classification
        .generic
        .into_iter()
        .filter_map(|b| freeze(b, &mut report.failures, &mut warnings))
        .collect();

    if report.samples.is_empty() {
        warnings.push("Error: found zero generic samples; nothing to label or correlate.");
    }

    let rsd_limit = config.thresholds.reference_rsd_limit;
    report.imprecise_references = report
        .references
        .iter()
        .filter_map(|g| {
            let analytes = qaqc::imprecise_analytes(g, rsd_limit);
            (!analytes.is_empty()).then(|| ImpreciseReference {
                group: g.name().to_string(),
                analytes,
            })
        })
        .collect();

    match (&report.blanks, &report.standards) {
        (Some(blank), Some(standards)) => {
            let ctx = QaqcContext {
                blank,
                standards,
                references: &report.references,
                thresholds: &config.thresholds,
            };
            report.labels = report
                .samples
                .iter()
                .map(|g| GroupLabels {
                    group: g.name().to_string(),
                    cells: qaqc::label_group(g, &ctx, &mut warnings),
                })
                .collect();
        }
        _ if !report.samples.is_empty() => {
            warnings.push(
                "Warning: QA/QC labels skipped; calibration blank or standard statistics are unavailable.",
            );
        }
        _ => {}
    }

    for group in &report.samples {
        match correlation::correlate_group(group, config.correlation_threshold, &mut warnings) {
            Ok(matrix) => report.correlations.push(matrix),
            Err(err) => {
                log::debug!("no correlation for '{}': {err}", group.name());
                warnings.push(format!(
                    "Warning: correlation skipped for '{}': {err}",
                    group.name()
                ));
            }
        }
    }

    log::info!(
        "analysis done: {} groups, {} failures, {} correlation matrices, {} warnings",
        report.groups().count(),
        report.failures.len(),
        report.correlations.len(),
        warnings.len()
    );
    report.warnings = warnings.into_vec();
    Ok(report)
}

fn freeze(
    bucket: Bucket,
    failures: &mut Vec<GroupFailure>,
    warnings: &mut Warnings,
) -> Option<SampleGroup> {
    let name = bucket.name().to_string();
    let role = bucket.role();
    let empty = bucket.records().is_empty();
    match SampleGroup::from_bucket(bucket) {
        Ok(group) => Some(group),
        Err(err) => {
            // untouched default buckets are not worth a warning
            if !empty {
                warnings.push(format!("Warning: group '{name}' skipped: {err}"));
            }
            failures.push(GroupFailure {
                group: name,
                role,
                reason: err.to_string(),
            });
            None
        }
    }
}
