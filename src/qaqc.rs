//! QA/QC flagging of individual analyte results.
//!
//! The policy is a fixed, ordered rule table; the first rule whose predicate
//! holds decides the label. Missing readings are never labelled.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::model::{is_missing, Measurement};
use crate::error::Warnings;
use crate::group::SampleGroup;

// ---------------------------------------------------------------------------
// Labels and thresholds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum QaqcLabel {
    BelowDetectionLimit,
    BelowQuantitationLimit,
    NearCertifiedReference,
    BlankContaminationSuspect,
    AboveHighestStandard,
    Nominal,
}

impl fmt::Display for QaqcLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QaqcLabel::BelowDetectionLimit => "below LOD",
            QaqcLabel::BelowQuantitationLimit => "below LOQ",
            QaqcLabel::NearCertifiedReference => "near drifting reference",
            QaqcLabel::BlankContaminationSuspect => "blank contamination",
            QaqcLabel::AboveHighestStandard => "above highest standard",
            QaqcLabel::Nominal => "nominal",
        };
        f.write_str(s)
    }
}

/// Numeric limits used by the rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Absolute window around a certified reference average (same units as
    /// the reading, not rescaled per analyte).
    pub reference_window: f64,
    pub recovery_low: f64,
    pub recovery_high: f64,
    /// Blank average above this fraction of a reading flags contamination.
    pub blank_ratio: f64,
    /// RSD% above which a certified reference analyte is imprecise.
    pub reference_rsd_limit: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            reference_window: 0.5,
            recovery_low: 90.0,
            recovery_high: 110.0,
            blank_ratio: 0.05,
            reference_rsd_limit: 10.0,
        }
    }
}

/// Aggregated groups a generic reading is judged against.
#[derive(Debug, Clone, Copy)]
pub struct QaqcContext<'a> {
    pub blank: &'a SampleGroup,
    pub standards: &'a SampleGroup,
    pub references: &'a [SampleGroup],
    pub thresholds: &'a Thresholds,
}

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

type Predicate = fn(f64, usize, &QaqcContext<'_>) -> bool;

pub struct Rule {
    pub label: QaqcLabel,
    predicate: Predicate,
}

impl Rule {
    pub fn applies(&self, value: f64, index: usize, ctx: &QaqcContext<'_>) -> bool {
        (self.predicate)(value, index, ctx)
    }
}

/// Evaluated top-down; `Nominal` is the fall-through.
pub const RULES: [Rule; 5] = [
    Rule {
        label: QaqcLabel::BelowDetectionLimit,
        predicate: below_detection,
    },
    Rule {
        label: QaqcLabel::BelowQuantitationLimit,
        predicate: below_quantitation,
    },
    Rule {
        label: QaqcLabel::NearCertifiedReference,
        predicate: near_drifting_reference,
    },
    Rule {
        label: QaqcLabel::BlankContaminationSuspect,
        predicate: blank_contamination,
    },
    Rule {
        label: QaqcLabel::AboveHighestStandard,
        predicate: above_highest_standard,
    },
];

fn below_detection(value: f64, i: usize, ctx: &QaqcContext<'_>) -> bool {
    value < at(ctx.blank.lod(), i)
}

fn below_quantitation(value: f64, i: usize, ctx: &QaqcContext<'_>) -> bool {
    at(ctx.blank.lod(), i) <= value && value < at(ctx.blank.loq(), i)
}

fn near_drifting_reference(value: f64, i: usize, ctx: &QaqcContext<'_>) -> bool {
    drifting_reference(value, i, ctx).is_some()
}

fn blank_contamination(value: f64, i: usize, ctx: &QaqcContext<'_>) -> bool {
    at(ctx.blank.average(), i) > ctx.thresholds.blank_ratio * value
}

fn above_highest_standard(value: f64, i: usize, ctx: &QaqcContext<'_>) -> bool {
    ctx.standards
        .max_measured(i)
        .is_some_and(|highest| value > highest)
}

/// First certified reference close to `value` whose recovery is out of band.
fn drifting_reference<'a>(value: f64, i: usize, ctx: &QaqcContext<'a>) -> Option<&'a SampleGroup> {
    let t = ctx.thresholds;
    ctx.references.iter().find(|g| {
        let near = (at(g.average(), i) - value).abs() < t.reference_window;
        let drifted = g
            .recovery()
            .get(i)
            .and_then(|r| r.value())
            .is_some_and(|r| r < t.recovery_low || r > t.recovery_high);
        near && drifted
    })
}

fn at(values: &[f64], i: usize) -> f64 {
    values.get(i).copied().unwrap_or(f64::NAN)
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Label one reading of analyte `index`. `None` for a missing reading.
pub fn classify_value(value: f64, index: usize, ctx: &QaqcContext<'_>) -> Option<QaqcLabel> {
    if is_missing(value) {
        return None;
    }
    let label = RULES
        .iter()
        .find(|rule| rule.applies(value, index, ctx))
        .map_or(QaqcLabel::Nominal, |rule| rule.label);
    Some(label)
}

pub fn classify(m: &Measurement, index: usize, ctx: &QaqcContext<'_>) -> Option<QaqcLabel> {
    classify_value(m.average(), index, ctx)
}

/// One labelled cell of a generic sample group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelledCell {
    pub sample: String,
    pub analyte: String,
    pub average: f64,
    pub label: QaqcLabel,
}

/// Label every measured cell of `group`, recording drift and contamination
/// warnings.
pub fn label_group(
    group: &SampleGroup,
    ctx: &QaqcContext<'_>,
    warnings: &mut Warnings,
) -> Vec<LabelledCell> {
    let mut cells = Vec::new();
    for record in group.measured() {
        for (i, m) in record.measurements().iter().enumerate() {
            let Some(label) = classify(m, i, ctx) else {
                continue;
            };
            match label {
                QaqcLabel::NearCertifiedReference => {
                    if let Some(g) = drifting_reference(m.average(), i, ctx) {
                        warnings.push(format!(
                            "Warning: {} is near certified reference '{}' whose recovery is outside {}-{}%.",
                            m.analyte_name(),
                            g.name(),
                            ctx.thresholds.recovery_low,
                            ctx.thresholds.recovery_high
                        ));
                    }
                }
                QaqcLabel::BlankContaminationSuspect => {
                    warnings.push(format!(
                        "Warning: blank contamination suspected for {}.",
                        m.analyte_name()
                    ));
                }
                _ => {}
            }
            cells.push(LabelledCell {
                sample: record.name().to_string(),
                analyte: m.analyte_name().to_string(),
                average: m.average(),
                label,
            });
        }
    }
    cells
}

/// Analytes of a certified reference group whose RSD exceeds `limit`.
pub fn imprecise_analytes(group: &SampleGroup, limit: f64) -> Vec<String> {
    group
        .analytes()
        .iter()
        .zip(group.rsd())
        .filter(|(_, rsd)| **rsd > limit)
        .map(|(name, _)| name.clone())
        .collect()
}
