//! Pairwise analyte correlation within one sample group.
//!
//! Each analyte is treated as the series of its per-replicate averages; the
//! matrix holds R² for every unordered pair, diagonal included.

use serde::Serialize;

use crate::error::{AssayError, Result, Warnings};
use crate::group::SampleGroup;
use crate::stats::{self, Determination};

/// Default R² at or above which a pair is highlighted.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// One named analyte series.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyteColumn {
    pub name: String,
    pub values: Vec<f64>,
}

/// R² for one unordered analyte pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationCell {
    pub analyte_a: String,
    pub analyte_b: String,
    /// Missing (serialised as `null`) when either series is flat.
    pub r_squared: f64,
    pub significant: bool,
}

impl CorrelationCell {
    pub fn is_diagonal(&self) -> bool {
        self.analyte_a == self.analyte_b
    }
}

/// Upper-triangular R² matrix of one group, stored row by row.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub group: String,
    pub analytes: Vec<String>,
    pub threshold: f64,
    pub cells: Vec<CorrelationCell>,
}

impl CorrelationMatrix {
    /// Cell for `(i, j)` with `i <= j`.
    pub fn get(&self, i: usize, j: usize) -> Option<&CorrelationCell> {
        let k = self.analytes.len();
        if i > j || j >= k {
            return None;
        }
        // rows before i hold k + (k-1) + ... + (k-i+1) cells
        let offset = i * k - i * (i.saturating_sub(1)) / 2;
        self.cells.get(offset + (j - i))
    }

    /// Off-diagonal pairs at or above the threshold.
    pub fn significant_pairs(&self) -> impl Iterator<Item = &CorrelationCell> {
        self.cells.iter().filter(|c| c.significant)
    }
}

/// Compute the R² matrix over `columns`.
///
/// Flat series produce a missing cell and one warning per analyte.
///
/// # Errors
///
/// - `InvalidThreshold` if `threshold` is outside [0, 1].
/// - `DimensionMismatch` if columns differ in length or have fewer than two
///   replicates.
pub fn correlate(
    group: &str,
    columns: &[AnalyteColumn],
    threshold: f64,
    warnings: &mut Warnings,
) -> Result<CorrelationMatrix> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(AssayError::InvalidThreshold(threshold));
    }

    let k = columns.len();
    let mut cells = Vec::with_capacity(k * (k + 1) / 2);
    for (i, a) in columns.iter().enumerate() {
        for (j, b) in columns.iter().enumerate().skip(i) {
            let determination = stats::coefficient_of_determination(&a.values, &b.values)?;
            if let Determination::Degenerate { x_flat, y_flat } = determination {
                if x_flat {
                    warn_flat(warnings, &a.name);
                }
                if y_flat {
                    warn_flat(warnings, &b.name);
                }
            }
            let r_squared = determination.r_squared();
            cells.push(CorrelationCell {
                analyte_a: a.name.clone(),
                analyte_b: b.name.clone(),
                r_squared,
                significant: i != j && r_squared >= threshold,
            });
        }
    }

    log::debug!(
        "correlation '{group}': {} cells, {} significant",
        cells.len(),
        cells.iter().filter(|c| c.significant).count()
    );

    Ok(CorrelationMatrix {
        group: group.to_string(),
        analytes: columns.iter().map(|c| c.name.clone()).collect(),
        threshold,
        cells,
    })
}

/// Columns of a frozen group: one per analyte, one value per replicate.
pub fn group_columns(group: &SampleGroup) -> Vec<AnalyteColumn> {
    group
        .analytes()
        .iter()
        .enumerate()
        .map(|(i, name)| AnalyteColumn {
            name: name.clone(),
            values: group.column(i),
        })
        .collect()
}

/// [`correlate`] over a frozen group.
pub fn correlate_group(
    group: &SampleGroup,
    threshold: f64,
    warnings: &mut Warnings,
) -> Result<CorrelationMatrix> {
    correlate(group.name(), &group_columns(group), threshold, warnings)
}

fn warn_flat(warnings: &mut Warnings, analyte: &str) {
    warnings.push(format!(
        "Warning: Standard deviation for {analyte} is zero. Some R^2 values may be missing."
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, values: &[f64]) -> AnalyteColumn {
        AnalyteColumn {
            name: name.to_string(),
            values: values.to_vec(),
        }
    }

    #[test]
    fn perfectly_correlated_pair_is_significant() {
        let mut w = Warnings::new();
        let m = correlate(
            "River",
            &[col("Al", &[1.0, 2.0, 3.0, 4.0]), col("Fe", &[2.0, 4.0, 6.0, 8.0])],
            DEFAULT_THRESHOLD,
            &mut w,
        )
        .unwrap();

        assert_eq!(m.cells.len(), 3);
        let pair = m.get(0, 1).unwrap();
        assert_eq!((pair.analyte_a.as_str(), pair.analyte_b.as_str()), ("Al", "Fe"));
        assert!((pair.r_squared - 1.0).abs() < 1e-10);
        assert!(pair.significant);
        assert_eq!(m.significant_pairs().count(), 1);
        assert!(w.is_empty());
    }

    #[test]
    fn diagonal_is_never_significant() {
        let mut w = Warnings::new();
        let m = correlate("g", &[col("Al", &[1.0, 2.0, 3.0])], 0.0, &mut w).unwrap();
        let d = m.get(0, 0).unwrap();
        assert!(d.is_diagonal());
        assert!((d.r_squared - 1.0).abs() < 1e-10);
        assert!(!d.significant);
    }

    #[test]
    fn triangular_layout() {
        let mut w = Warnings::new();
        let cols = [
            col("A", &[1.0, 2.0, 3.0, 5.0]),
            col("B", &[2.0, 1.0, 4.0, 3.0]),
            col("C", &[9.0, 7.0, 4.0, 1.0]),
            col("D", &[1.0, 1.5, 1.2, 0.9]),
        ];
        let m = correlate("g", &cols, 0.7, &mut w).unwrap();
        assert_eq!(m.cells.len(), 10);
        for i in 0..4 {
            for j in i..4 {
                let c = m.get(i, j).unwrap();
                assert_eq!(c.analyte_a, cols[i].name);
                assert_eq!(c.analyte_b, cols[j].name);
            }
        }
        assert!(m.get(2, 1).is_none());
        assert!(m.get(0, 4).is_none());
    }

    #[test]
    fn flat_column_warns_once() {
        let mut w = Warnings::new();
        let m = correlate(
            "g",
            &[
                col("Al", &[1.0, 2.0, 3.0]),
                col("Be", &[0.5, 0.5, 0.5]),
                col("Ca", &[3.0, 1.0, 2.0]),
            ],
            0.7,
            &mut w,
        )
        .unwrap();
        assert!(m.get(0, 1).unwrap().r_squared.is_nan());
        assert!(!m.get(0, 1).unwrap().significant);
        assert_eq!(w.len(), 1);
        assert!(w.messages()[0].contains("Be"));
    }

    #[test]
    fn constant_column_with_rounding_noise_warns() {
        let mut w = Warnings::new();
        let m = correlate(
            "g",
            &[col("Al", &[1.0, 2.0, 3.0]), col("Be", &[0.1, 0.1, 0.1])],
            0.7,
            &mut w,
        )
        .unwrap();
        assert!(m.get(0, 1).unwrap().r_squared.is_nan());
        assert!(m.get(1, 1).unwrap().r_squared.is_nan());
        assert_eq!(w.len(), 1);
        assert!(w.messages()[0].contains("Be"));
    }

    #[test]
    fn threshold_out_of_range() {
        let mut w = Warnings::new();
        assert!(matches!(
            correlate("g", &[], 1.5, &mut w),
            Err(AssayError::InvalidThreshold(_))
        ));
        assert!(correlate("g", &[], -0.1, &mut w).is_err());
    }

    #[test]
    fn single_replicate_cannot_correlate() {
        let mut w = Warnings::new();
        assert!(matches!(
            correlate("g", &[col("Al", &[1.0])], 0.7, &mut w),
            Err(AssayError::DimensionMismatch { .. })
        ));
    }
}
