use std::fmt;

use serde::{Deserialize, Serialize};

/// Marker for a reading the instrument could not produce.
///
/// Kept as NaN so it propagates through arithmetic and never reads as zero.
pub const MISSING: f64 = f64::NAN;

/// Whether `value` is the missing marker.
pub fn is_missing(value: f64) -> bool {
    value.is_nan()
}

// ---------------------------------------------------------------------------
// Measurement – one analyte line of a sample
// ---------------------------------------------------------------------------

/// A single analyte result: replicate average, standard deviation and RSD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(rename = "analyte")]
    analyte_name: String,
    #[serde(default)]
    units: String,
    #[serde(with = "missing_as_null")]
    average: f64,
    #[serde(default = "missing", with = "missing_as_null")]
    std_dev: f64,
    #[serde(default = "missing", with = "missing_as_null")]
    rsd: f64,
}

fn missing() -> f64 {
    MISSING
}

impl Measurement {
    pub fn new(
        analyte_name: impl Into<String>,
        units: impl Into<String>,
        average: f64,
        std_dev: f64,
        rsd: f64,
    ) -> Self {
        Self {
            analyte_name: analyte_name.into(),
            units: units.into(),
            average,
            std_dev,
            rsd,
        }
    }

    /// A reference (known-value) measurement: only the average is meaningful.
    pub fn known(analyte_name: impl Into<String>, units: impl Into<String>, value: f64) -> Self {
        Self::new(analyte_name, units, value, 0.0, 0.0)
    }

    pub fn analyte_name(&self) -> &str {
        &self.analyte_name
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn average(&self) -> f64 {
        self.average
    }

    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    pub fn rsd(&self) -> f64 {
        self.rsd
    }

    pub fn is_missing(&self) -> bool {
        is_missing(self.average)
    }
}

// ---------------------------------------------------------------------------
// SampleType – coarse instrument tag
// ---------------------------------------------------------------------------

/// Sample type as tagged by the instrument operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleType {
    #[serde(rename = "Cal", alias = "Calibration")]
    Calibration,
    #[serde(rename = "QC")]
    QC,
    #[serde(rename = "Unk", alias = "Unknown")]
    Unknown,
}

impl SampleType {
    /// Parse the instrument's short code (`Cal`, `QC`, `Unk`).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "Cal" | "Calibration" => Some(SampleType::Calibration),
            "QC" => Some(SampleType::QC),
            "Unk" | "Unknown" => Some(SampleType::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleType::Calibration => write!(f, "Cal"),
            SampleType::QC => write!(f, "QC"),
            SampleType::Unknown => write!(f, "Unk"),
        }
    }
}

// ---------------------------------------------------------------------------
// SampleRecord – one physical sample run
// ---------------------------------------------------------------------------

/// One sample run with its ordered analyte results.
///
/// Built once by the ingestion layer and then only moved, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    #[serde(default)]
    method: String,
    name: String,
    #[serde(default)]
    comment: String,
    #[serde(default, rename = "run_time")]
    run_timestamp: String,
    sample_type: SampleType,
    #[serde(default, rename = "repeats")]
    repeat_count: u32,
    measurements: Vec<Measurement>,
}

impl SampleRecord {
    pub fn new(
        method: impl Into<String>,
        name: impl Into<String>,
        comment: impl Into<String>,
        run_timestamp: impl Into<String>,
        sample_type: SampleType,
        repeat_count: u32,
        measurements: Vec<Measurement>,
    ) -> Self {
        Self {
            method: method.into(),
            name: name.into(),
            comment: comment.into(),
            run_timestamp: run_timestamp.into(),
            sample_type,
            repeat_count,
            measurements,
        }
    }

    /// A configuration-supplied row of known concentrations.
    pub fn reference(name: impl Into<String>, measurements: Vec<Measurement>) -> Self {
        Self::new("", name, "", "", SampleType::QC, 0, measurements)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn run_timestamp(&self) -> &str {
        &self.run_timestamp
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Number of analytes carried by this sample.
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// Average of analyte `index`, or the missing marker if out of range.
    pub fn average_at(&self, index: usize) -> f64 {
        self.measurements
            .get(index)
            .map(Measurement::average)
            .unwrap_or(MISSING)
    }

    pub fn analyte_names(&self) -> impl Iterator<Item = &str> {
        self.measurements.iter().map(Measurement::analyte_name)
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete ingested run
// ---------------------------------------------------------------------------

/// Every record of one instrument run plus the shared analyte order.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<SampleRecord>,
    /// Analyte names in column order, taken from the first record.
    pub analytes: Vec<String>,
    /// Analyte units aligned with `analytes`.
    pub units: Vec<String>,
}

impl Dataset {
    pub fn from_records(records: Vec<SampleRecord>) -> Self {
        let (analytes, units): (Vec<String>, Vec<String>) = records
            .first()
            .map(|r| {
                r.measurements()
                    .iter()
                    .map(|m| (m.analyte_name().to_string(), m.units().to_string()))
                    .unzip()
            })
            .unwrap_or_default();
        Dataset {
            records,
            analytes,
            units,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The run method, taken from the first record that carries one.
    pub fn method(&self) -> Option<&str> {
        self.records
            .iter()
            .map(SampleRecord::method)
            .find(|m| !m.is_empty())
    }
}

// -- serde helper: JSON has no NaN, so missing readings travel as `null` --

mod missing_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::MISSING;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_none()
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(MISSING))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_type_codes() {
        assert_eq!(SampleType::from_code("Cal"), Some(SampleType::Calibration));
        assert_eq!(SampleType::from_code(" QC "), Some(SampleType::QC));
        assert_eq!(SampleType::from_code("Unk"), Some(SampleType::Unknown));
        assert_eq!(SampleType::from_code("Blank"), None);
        assert_eq!(SampleType::Unknown.to_string(), "Unk");
    }

    #[test]
    fn missing_average_reads_back_as_nan() {
        let json = r#"{"analyte": "Al", "units": "mg/L", "average": null}"#;
        let m: Measurement = serde_json::from_str(json).unwrap();
        assert!(m.is_missing());
        assert!(is_missing(m.std_dev()));

        let back = serde_json::to_string(&m).unwrap();
        assert!(back.contains("\"average\":null"));
    }

    #[test]
    fn average_at_out_of_range_is_missing() {
        let r = SampleRecord::reference("Soil B", vec![Measurement::known("Al", "mg/L", 2.0)]);
        assert_eq!(r.average_at(0), 2.0);
        assert!(is_missing(r.average_at(3)));
    }

    #[test]
    fn dataset_takes_analytes_from_first_record() {
        let a = SampleRecord::new(
            "ICP-SS",
            "River 1",
            "",
            "2017-03-01 10:00",
            SampleType::Unknown,
            3,
            vec![
                Measurement::new("Al", "mg/L", 1.0, 0.1, 10.0),
                Measurement::new("Fe", "mg/L", 2.0, 0.1, 5.0),
            ],
        );
        let ds = Dataset::from_records(vec![a]);
        assert_eq!(ds.analytes, vec!["Al", "Fe"]);
        assert_eq!(ds.units, vec!["mg/L", "mg/L"]);
        assert_eq!(ds.method(), Some("ICP-SS"));
    }
}
