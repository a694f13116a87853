//! Partitioning of sample records into QA/QC buckets.
//!
//! Operator-typed sample names carry inconsistent suffixes ("Soil B run 2"),
//! so buckets are matched through a [`NameSimilarity`] rather than by exact
//! name. Buckets keep encounter order: element 0 of a seeded bucket is the
//! known reference row, never a measured replicate.

pub mod similarity;

use serde::Serialize;

use crate::data::model::{SampleRecord, SampleType};
use crate::error::{AssayError, Warnings};

pub use similarity::{Containment, EditDistance, MatchStrategy, NameSimilarity};

/// Substring marking a calibration (instrument) blank.
pub const BLANK_MARKER: &str = "Instrument Blank";
/// Substring marking a continuing calibration verification sample.
pub const CCV_MARKER: &str = "CCV";

// ---------------------------------------------------------------------------
// Bucket
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BucketRole {
    CalibrationBlank,
    CalibrationStandard,
    QCVerification,
    CertifiedReference,
    GenericReplicateSet,
}

/// Records accumulated for one role during classification.
#[derive(Debug, Clone)]
pub struct Bucket {
    role: BucketRole,
    name: String,
    records: Vec<SampleRecord>,
    seeded: bool,
}

impl Bucket {
    fn empty(role: BucketRole, name: &str) -> Self {
        Self {
            role,
            name: name.to_string(),
            records: Vec::new(),
            seeded: false,
        }
    }

    /// A bucket whose first row is a known reference, not a replicate.
    fn seeded(role: BucketRole, reference: SampleRecord) -> Self {
        Self {
            role,
            name: reference.name().to_string(),
            records: vec![reference],
            seeded: true,
        }
    }

    /// A generic bucket whose identity is its first measured sample.
    fn generic(first: SampleRecord) -> Self {
        Self {
            role: BucketRole::GenericReplicateSet,
            name: first.name().to_string(),
            records: vec![first],
            seeded: false,
        }
    }

    pub fn role(&self) -> BucketRole {
        self.role
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether element 0 is a known reference row.
    pub fn skip_first_as_reference(&self) -> bool {
        self.seeded
    }

    /// All rows in encounter order, reference row included.
    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    /// Rows that are real replicates.
    pub fn measured(&self) -> &[SampleRecord] {
        let skip = usize::from(self.seeded).min(self.records.len());
        &self.records[skip..]
    }

    /// Name used for matching: the reference row's name, or the bucket name.
    pub fn reference_name(&self) -> &str {
        self.records
            .first()
            .map(SampleRecord::name)
            .unwrap_or(&self.name)
    }

    pub fn into_parts(self) -> (BucketRole, String, Vec<SampleRecord>, bool) {
        (self.role, self.name, self.records, self.seeded)
    }

    fn push(&mut self, record: SampleRecord) {
        self.records.push(record);
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Streaming classifier: feed records with [`Classifier::push`], then
/// [`Classifier::finish`].
pub struct Classifier {
    blanks: Bucket,
    standards: Bucket,
    verification: Bucket,
    references: Vec<Bucket>,
    generic: Vec<Bucket>,
    similarity: Box<dyn NameSimilarity>,
    warnings: Warnings,
}

/// The frozen outcome of a classification pass.
#[derive(Debug)]
pub struct Classification {
    pub blanks: Bucket,
    pub standards: Bucket,
    pub verification: Bucket,
    pub references: Vec<Bucket>,
    pub generic: Vec<Bucket>,
    pub warnings: Warnings,
}

impl Classifier {
    pub fn new(similarity: Box<dyn NameSimilarity>) -> Self {
        Self {
            blanks: Bucket::empty(BucketRole::CalibrationBlank, "Instrument Blanks"),
            standards: Bucket::empty(BucketRole::CalibrationStandard, "Calibration Standards"),
            verification: Bucket::empty(
                BucketRole::QCVerification,
                "Continuing Calibration Verification",
            ),
            references: Vec::new(),
            generic: Vec::new(),
            similarity,
            warnings: Warnings::new(),
        }
    }

    /// Register a certified reference; its row becomes the bucket's element 0.
    pub fn with_certified_reference(mut self, reference: SampleRecord) -> Self {
        self.references
            .push(Bucket::seeded(BucketRole::CertifiedReference, reference));
        self
    }

    /// Seed the CCV bucket with its stated values.
    pub fn with_verification_reference(mut self, reference: SampleRecord) -> Self {
        let name = self.verification.name.clone();
        self.verification = Bucket::seeded(BucketRole::QCVerification, reference);
        self.verification.name = name;
        self
    }

    /// Seed the calibration-standard bucket with the known concentrations.
    pub fn with_calibration_reference(mut self, reference: SampleRecord) -> Self {
        let name = self.standards.name.clone();
        self.standards = Bucket::seeded(BucketRole::CalibrationStandard, reference);
        self.standards.name = name;
        self
    }

    /// Names of the certified references, in registration order.
    pub fn reference_names(&self) -> impl Iterator<Item = &str> {
        self.references.iter().map(Bucket::reference_name)
    }

    /// Route one record. Returns the role it landed in, or `None` if dropped.
    pub fn push(&mut self, record: SampleRecord) -> Option<BucketRole> {
        let role = match record.sample_type() {
            SampleType::Calibration => {
                self.standards.push(record);
                BucketRole::CalibrationStandard
            }
            SampleType::QC => {
                if record.name().contains(BLANK_MARKER) {
                    self.blanks.push(record);
                    BucketRole::CalibrationBlank
                } else if record.name().contains(CCV_MARKER) {
                    self.verification.push(record);
                    BucketRole::QCVerification
                } else {
                    match self.find_reference(record.name()) {
                        Some(idx) => {
                            self.references[idx].push(record);
                            BucketRole::CertifiedReference
                        }
                        None => {
                            self.warnings
                                .push_error(&AssayError::UnclassifiedReferenceSample {
                                    name: record.name().to_string(),
                                });
                            return None;
                        }
                    }
                }
            }
            SampleType::Unknown => {
                if let Some(idx) = self.find_reference(record.name()) {
                    self.references[idx].push(record);
                    BucketRole::CertifiedReference
                } else if let Some(idx) = self.find_generic(record.name()) {
                    self.generic[idx].push(record);
                    BucketRole::GenericReplicateSet
                } else {
                    log::debug!("new replicate set '{}'", record.name());
                    self.generic.push(Bucket::generic(record));
                    BucketRole::GenericReplicateSet
                }
            }
        };
        Some(role)
    }

    pub fn push_all(&mut self, records: impl IntoIterator<Item = SampleRecord>) {
        for record in records {
            self.push(record);
        }
    }

    pub fn finish(self) -> Classification {
        log::info!(
            "classified: {} blanks, {} standards, {} CCV, {} reference groups, {} sample groups",
            self.blanks.measured().len(),
            self.standards.measured().len(),
            self.verification.measured().len(),
            self.references.len(),
            self.generic.len()
        );
        Classification {
            blanks: self.blanks,
            standards: self.standards,
            verification: self.verification,
            references: self.references,
            generic: self.generic,
            warnings: self.warnings,
        }
    }

    fn find_reference(&self, name: &str) -> Option<usize> {
        self.references
            .iter()
            .position(|b| self.similarity.matches(name, b.reference_name()))
    }

    fn find_generic(&self, name: &str) -> Option<usize> {
        self.generic
            .iter()
            .position(|b| self.similarity.matches_stem(name, b.reference_name()))
    }
}

/// Classify `records` in one call.
pub fn classify(
    records: impl IntoIterator<Item = SampleRecord>,
    certified: impl IntoIterator<Item = SampleRecord>,
    similarity: Box<dyn NameSimilarity>,
) -> Classification {
    let mut classifier = certified
        .into_iter()
        .fold(Classifier::new(similarity), Classifier::with_certified_reference);
    classifier.push_all(records);
    classifier.finish()
}
