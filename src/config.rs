use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::classify::{Classifier, MatchStrategy};
use crate::correlation::DEFAULT_THRESHOLD;
use crate::data::model::{Dataset, Measurement, SampleRecord, MISSING};
use crate::error::{AssayError, Result};
use crate::qaqc::Thresholds;

/// Method used when the caller does not name one.
pub const DEFAULT_METHOD: &str = "ICP-SS";

/// Name given to the CCV reference row.
pub const CCV_REFERENCE_NAME: &str = "CCV Standard";

// ---------------------------------------------------------------------------
// LabConfig – the laboratory configuration document
// ---------------------------------------------------------------------------

/// Known standard concentrations, one section per instrument method.
///
/// ```json
/// {
///   "methods": [{
///     "method": "ICP-SS",
///     "ccv": { "Al": 1.0, "Fe": 1.0 },
///     "check_standards": [
///       { "name": "Soil B", "values": { "Al": 2.1, "Fe": -1 } }
///     ],
///     "name_matching": { "strategy": "containment" },
///     "correlation_threshold": 0.7
///   }]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabConfig {
    pub methods: Vec<MethodConfig>,
}

impl LabConfig {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let config: LabConfig = serde_json::from_str(text).context("parsing config JSON")?;
        for method in &config.methods {
            method
                .validate()
                .with_context(|| format!("method section '{}'", method.method))?;
        }
        Ok(config)
    }

    /// The section for `method`.
    pub fn method(&self, method: &str) -> Result<&MethodConfig> {
        self.methods
            .iter()
            .find(|m| m.method == method)
            .ok_or_else(|| {
                AssayError::Configuration(format!(
                    "no configuration section matches the method '{method}'"
                ))
            })
    }
}

/// A certified reference (check standard) and its known values.
///
/// Negative or `null` values mean "no certified value for this analyte".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckStandard {
    pub name: String,
    #[serde(default)]
    pub values: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodConfig {
    pub method: String,
    /// Stated CCV concentrations by analyte.
    #[serde(default)]
    pub ccv: BTreeMap<String, Option<f64>>,
    #[serde(default)]
    pub check_standards: Vec<CheckStandard>,
    /// Known calibration-standard concentrations, if supplied.
    #[serde(default)]
    pub calibration_standards: Option<BTreeMap<String, Option<f64>>>,
    #[serde(default)]
    pub name_matching: MatchStrategy,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default = "default_correlation_threshold")]
    pub correlation_threshold: f64,
}

fn default_correlation_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

impl MethodConfig {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ccv: BTreeMap::new(),
            check_standards: Vec::new(),
            calibration_standards: None,
            name_matching: MatchStrategy::default(),
            thresholds: Thresholds::default(),
            correlation_threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.correlation_threshold) {
            return Err(AssayError::InvalidThreshold(self.correlation_threshold));
        }
        let t = &self.thresholds;
        if !(t.reference_window >= 0.0) {
            return Err(AssayError::Configuration(
                "reference_window must be non-negative".into(),
            ));
        }
        if !(t.recovery_low < t.recovery_high) {
            return Err(AssayError::Configuration(format!(
                "recovery band [{}, {}] is empty",
                t.recovery_low, t.recovery_high
            )));
        }
        if let MatchStrategy::EditDistance { max_distance: 0 } = self.name_matching {
            log::warn!("edit-distance matching with max_distance 0 only groups identical names");
        }
        Ok(())
    }

    /// CCV reference row aligned to the dataset's analytes.
    pub fn verification_reference(&self, dataset: &Dataset) -> Option<SampleRecord> {
        if self.ccv.is_empty() {
            return None;
        }
        Some(reference_row(CCV_REFERENCE_NAME, &self.ccv, dataset))
    }

    /// One reference row per check standard, in configuration order.
    pub fn certified_references(&self, dataset: &Dataset) -> Vec<SampleRecord> {
        self.check_standards
            .iter()
            .map(|cs| reference_row(&cs.name, &cs.values, dataset))
            .collect()
    }

    pub fn calibration_reference(&self, dataset: &Dataset) -> Option<SampleRecord> {
        self.calibration_standards
            .as_ref()
            .map(|values| reference_row("Calibration Standard", values, dataset))
    }

    /// A classifier seeded with every configured reference row.
    pub fn classifier(&self, dataset: &Dataset) -> Classifier {
        let mut classifier = self
            .certified_references(dataset)
            .into_iter()
            .fold(
                Classifier::new(self.name_matching.build()),
                Classifier::with_certified_reference,
            );
        if let Some(ccv) = self.verification_reference(dataset) {
            classifier = classifier.with_verification_reference(ccv);
        }
        if let Some(cal) = self.calibration_reference(dataset) {
            classifier = classifier.with_calibration_reference(cal);
        }
        classifier
    }
}

fn reference_row(name: &str, values: &BTreeMap<String, Option<f64>>, dataset: &Dataset) -> SampleRecord {
    let measurements = dataset
        .analytes
        .iter()
        .enumerate()
        .map(|(i, analyte)| {
            let value = values
                .get(analyte)
                .copied()
                .flatten()
                .filter(|v| *v >= 0.0)
                .unwrap_or(MISSING);
            let units = dataset.units.get(i).map(String::as_str).unwrap_or("");
            Measurement::known(analyte.clone(), units, value)
        })
        .collect();
    SampleRecord::reference(name, measurements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{is_missing, SampleType};

    const CONFIG: &str = r#"{
        "methods": [
            { "method": "ICP-MS" },
            {
                "method": "ICP-SS",
                "ccv": { "Al": 1.0, "Fe": 2.0 },
                "check_standards": [
                    { "name": "Soil B", "values": { "Al": 2.5, "Fe": -1 } },
                    { "name": "TMDW", "values": { "Al": null } }
                ],
                "name_matching": { "strategy": "edit_distance", "max_distance": 2 },
                "thresholds": { "reference_window": 0.25 }
            }
        ]
    }"#;

    fn dataset() -> Dataset {
        let rec = SampleRecord::new(
            "ICP-SS",
            "River 1",
            "",
            "",
            SampleType::Unknown,
            3,
            vec![
                Measurement::new("Al", "mg/L", 1.0, 0.0, 0.0),
                Measurement::new("Fe", "mg/L", 1.0, 0.0, 0.0),
            ],
        );
        Dataset::from_records(vec![rec])
    }

    #[test]
    fn selects_method_section() {
        let cfg = LabConfig::from_json(CONFIG).unwrap();
        let m = cfg.method("ICP-SS").unwrap();
        assert_eq!(m.check_standards.len(), 2);
        assert_eq!(m.name_matching, MatchStrategy::EditDistance { max_distance: 2 });
        assert_eq!(m.thresholds.reference_window, 0.25);
        assert_eq!(m.thresholds.recovery_high, 110.0);
        assert_eq!(m.correlation_threshold, 0.7);

        let defaults = cfg.method("ICP-MS").unwrap();
        assert_eq!(defaults.name_matching, MatchStrategy::Containment);
    }

    #[test]
    fn unknown_method_is_configuration_error() {
        let cfg = LabConfig::from_json(CONFIG).unwrap();
        assert!(matches!(
            cfg.method("GFAA"),
            Err(AssayError::Configuration(_))
        ));
    }

    #[test]
    fn reference_rows_follow_dataset_order() {
        let cfg = LabConfig::from_json(CONFIG).unwrap();
        let m = cfg.method("ICP-SS").unwrap();
        let ds = dataset();

        let refs = m.certified_references(&ds);
        assert_eq!(refs[0].name(), "Soil B");
        assert_eq!(refs[0].average_at(0), 2.5);
        assert!(is_missing(refs[0].average_at(1)));
        assert!(is_missing(refs[1].average_at(0)));
        assert_eq!(refs[1].len(), 2);

        let ccv = m.verification_reference(&ds).unwrap();
        assert_eq!(ccv.name(), CCV_REFERENCE_NAME);
        assert_eq!(ccv.average_at(1), 2.0);
        assert!(m.calibration_reference(&ds).is_none());
    }

    #[test]
    fn invalid_threshold_rejected() {
        let bad = r#"{ "methods": [ { "method": "X", "correlation_threshold": 1.2 } ] }"#;
        assert!(LabConfig::from_json(bad).is_err());
        let bad = r#"{ "methods": [ { "method": "X", "thresholds": { "recovery_low": 120 } } ] }"#;
        assert!(LabConfig::from_json(bad).is_err());
    }

    #[test]
    fn seeded_classifier_knows_references() {
        let cfg = LabConfig::from_json(CONFIG).unwrap();
        let classifier = cfg.method("ICP-SS").unwrap().classifier(&dataset());
        let names: Vec<&str> = classifier.reference_names().collect();
        assert_eq!(names, vec!["Soil B", "TMDW"]);
    }
}
