use serde::Serialize;

use crate::classify::{Bucket, BucketRole};
use crate::data::model::{is_missing, SampleRecord, MISSING};
use crate::error::{AssayError, Result};
use crate::stats::{self, Comparison};

// ---------------------------------------------------------------------------
// SampleGroup – a frozen bucket with derived statistics
// ---------------------------------------------------------------------------

/// A named, ordered set of sample records with per-analyte statistics.
///
/// All derived sequences are computed once in [`SampleGroup::new`] and are
/// positionally aligned with [`SampleGroup::analytes`]. There is no way to
/// mutate a group after construction; share it by reference.
#[derive(Debug, Serialize)]
pub struct SampleGroup {
    name: String,
    role: BucketRole,
    skip_first_as_reference: bool,
    analytes: Vec<String>,
    records: Vec<SampleRecord>,
    average: Vec<f64>,
    lod: Vec<f64>,
    loq: Vec<f64>,
    rsd: Vec<f64>,
    percent_difference: Vec<Comparison>,
    recovery: Vec<Comparison>,
}

impl SampleGroup {
    /// Freeze a classification bucket.
    pub fn from_bucket(bucket: Bucket) -> Result<Self> {
        let (role, name, records, seeded) = bucket.into_parts();
        Self::new(name, role, records, seeded)
    }

    /// Validate `records` and compute every derived statistic.
    ///
    /// # Errors
    ///
    /// - `InsufficientData` if there is no measured (non-reference) record.
    /// - `DimensionMismatch` if a record's analyte list differs from the
    ///   first record's.
    pub fn new(
        name: impl Into<String>,
        role: BucketRole,
        records: Vec<SampleRecord>,
        skip_first_as_reference: bool,
    ) -> Result<Self> {
        let name = name.into();
        let skip = usize::from(skip_first_as_reference);
        if records.len() <= skip {
            return Err(AssayError::InsufficientData {
                context: format!("group '{name}' has no measured samples"),
                required: 1,
                found: 0,
            });
        }

        let analytes: Vec<String> = records[0].analyte_names().map(str::to_string).collect();
        for record in &records[1..] {
            check_alignment(&name, &analytes, record)?;
        }

        let measured = &records[skip..];
        let n = analytes.len();
        let mut average = Vec::with_capacity(n);
        let mut lod = Vec::with_capacity(n);
        let mut loq = Vec::with_capacity(n);
        let mut rsd = Vec::with_capacity(n);
        let mut percent_difference = Vec::with_capacity(n);
        let mut recovery = Vec::with_capacity(n);

        let mut column = Vec::with_capacity(measured.len());
        for i in 0..n {
            column.clear();
            column.extend(measured.iter().map(|r| r.average_at(i)));

            let mean = stats::mean(&column)?;
            let limits = stats::detection_limits(&column, mean);
            let known = if skip_first_as_reference {
                records[0].average_at(i)
            } else {
                MISSING
            };

            average.push(mean);
            lod.push(limits.lod);
            loq.push(limits.loq);
            rsd.push(limits.rsd);
            percent_difference.push(stats::percent_difference(mean, known));
            recovery.push(stats::percent_recovery(mean, known));
        }

        log::debug!(
            "group '{name}': {} measured samples x {n} analytes",
            measured.len()
        );

        Ok(SampleGroup {
            name,
            role,
            skip_first_as_reference,
            analytes,
            records,
            average,
            lod,
            loq,
            rsd,
            percent_difference,
            recovery,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> BucketRole {
        self.role
    }

    pub fn skip_first_as_reference(&self) -> bool {
        self.skip_first_as_reference
    }

    pub fn analytes(&self) -> &[String] {
        &self.analytes
    }

    /// Every record, reference row included.
    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    /// The known reference row, if this group has one.
    pub fn reference(&self) -> Option<&SampleRecord> {
        if self.skip_first_as_reference {
            self.records.first()
        } else {
            None
        }
    }

    /// Replicates that contributed to the statistics.
    pub fn measured(&self) -> &[SampleRecord] {
        &self.records[usize::from(self.skip_first_as_reference)..]
    }

    pub fn average(&self) -> &[f64] {
        &self.average
    }

    pub fn lod(&self) -> &[f64] {
        &self.lod
    }

    pub fn loq(&self) -> &[f64] {
        &self.loq
    }

    pub fn rsd(&self) -> &[f64] {
        &self.rsd
    }

    pub fn percent_difference(&self) -> &[Comparison] {
        &self.percent_difference
    }

    pub fn recovery(&self) -> &[Comparison] {
        &self.recovery
    }

    /// Per-replicate averages of analyte `index`.
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.measured().iter().map(|r| r.average_at(index)).collect()
    }

    /// Largest non-missing replicate average of analyte `index`.
    pub fn max_measured(&self, index: usize) -> Option<f64> {
        self.measured()
            .iter()
            .map(|r| r.average_at(index))
            .filter(|v| !is_missing(*v))
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
    }
}

fn check_alignment(group: &str, analytes: &[String], record: &SampleRecord) -> Result<()> {
    if record.len() != analytes.len() {
        return Err(AssayError::DimensionMismatch {
            context: format!(
                "sample '{}' in group '{group}' has a different analyte count",
                record.name()
            ),
            expected: analytes.len(),
            found: record.len(),
        });
    }
    if let Some(pos) = record
        .analyte_names()
        .zip(analytes)
        .position(|(got, want)| got != want.as_str())
    {
        return Err(AssayError::DimensionMismatch {
            context: format!(
                "sample '{}' in group '{group}' has analyte '{}' where '{}' was expected",
                record.name(),
                record.measurements()[pos].analyte_name(),
                analytes[pos]
            ),
            expected: analytes.len(),
            found: record.len(),
        });
    }
    Ok(())
}
