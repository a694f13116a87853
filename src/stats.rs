//! Descriptive statistics over replicate readings.
//!
//! Every dispersion measure here is Bessel-corrected (divides by n − 1).
//! Missing readings (NaN) are never skipped: they flow through to the
//! result so a gap in the data stays visible downstream.
//!
//! # Examples
//!
//! ```
//! use rusty_assay::stats::{coefficient_of_determination, mean};
//!
//! let x = [1.0, 2.0, 3.0, 4.0];
//! let y = [2.0, 4.0, 6.0, 8.0];
//!
//! assert_eq!(mean(&x).unwrap(), 2.5);
//! let r2 = coefficient_of_determination(&x, &y).unwrap().r_squared();
//! assert!((r2 - 1.0).abs() < 1e-10);
//! ```

use serde::{Serialize, Serializer};

use crate::data::model::{is_missing, MISSING};
use crate::error::{AssayError, Result};

/// Multiplier applied to σ for the limit of detection.
pub const LOD_SIGMA: f64 = 3.0;
/// Multiplier applied to σ for the limit of quantitation.
pub const LOQ_SIGMA: f64 = 10.0;

/// σ at or below this fraction of |mean| is rounding noise: the series is flat.
const FLAT_TOLERANCE: f64 = 16.0 * f64::EPSILON;

// ---------------------------------------------------------------------------
// Basic moments
// ---------------------------------------------------------------------------

/// Arithmetic mean.
///
/// # Errors
///
/// `InsufficientData` if `values` is empty.
pub fn mean(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(insufficient("mean", 1, 0));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Bessel-corrected sample standard deviation.
///
/// Returns the missing marker when any input is missing; otherwise the
/// result is always `>= 0`.
///
/// # Errors
///
/// `InsufficientData` if fewer than two values are supplied.
pub fn sample_std_dev(values: &[f64]) -> Result<f64> {
    if values.len() < 2 {
        return Err(insufficient("standard deviation", 2, values.len()));
    }
    if values.iter().any(|v| is_missing(*v)) {
        return Ok(MISSING);
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Ok((ss / (values.len() - 1) as f64).sqrt())
}

/// Bessel-corrected sample covariance.
///
/// # Errors
///
/// `DimensionMismatch` unless both slices have the same length of at least 2.
pub fn covariance(xs: &[f64], ys: &[f64]) -> Result<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return Err(AssayError::DimensionMismatch {
            context: "covariance needs two equal-length series of at least 2 values".into(),
            expected: xs.len().max(2),
            found: ys.len(),
        });
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;
    let sum: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mx) * (y - my))
        .sum();
    Ok(sum / (xs.len() - 1) as f64)
}

// ---------------------------------------------------------------------------
// Coefficient of determination
// ---------------------------------------------------------------------------

/// Outcome of an R² computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Determination {
    /// r² in [0, 1].
    Value(f64),
    /// At least one series has zero (or missing) spread; r is undefined.
    Degenerate { x_flat: bool, y_flat: bool },
}

impl Determination {
    /// r², or the missing marker when degenerate.
    pub fn r_squared(&self) -> f64 {
        match self {
            Determination::Value(v) => *v,
            Determination::Degenerate { .. } => MISSING,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        matches!(self, Determination::Degenerate { .. })
    }
}

/// Squared Pearson correlation, r = cov(x, y) / (σx · σy).
///
/// A flat or missing series yields [`Determination::Degenerate`] rather than
/// an error; the caller decides how to report it.
///
/// # Errors
///
/// `DimensionMismatch` if the series differ in length or have fewer than
/// two points.
pub fn coefficient_of_determination(xs: &[f64], ys: &[f64]) -> Result<Determination> {
    let cov = covariance(xs, ys)?;
    let sx = sample_std_dev(xs)?;
    let sy = sample_std_dev(ys)?;

    let x_flat = is_flat(sx, mean(xs)?);
    let y_flat = is_flat(sy, mean(ys)?);
    if x_flat || y_flat {
        return Ok(Determination::Degenerate { x_flat, y_flat });
    }

    let r = (cov / (sx * sy)).clamp(-1.0, 1.0);
    Ok(Determination::Value(r * r))
}

/// A constant column such as `[0.1, 0.1, 0.1]` keeps a σ of ~1e-17 after
/// rounding, so the zero test is relative to the column's magnitude.
fn is_flat(sigma: f64, mean: f64) -> bool {
    is_missing(sigma) || sigma <= FLAT_TOLERANCE * mean.abs()
}

// ---------------------------------------------------------------------------
// Detection limits
// ---------------------------------------------------------------------------

/// σ-derived limits for one analyte of one group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionLimits {
    pub lod: f64,
    pub loq: f64,
    /// σ as a percentage of the reference mean.
    pub rsd: f64,
}

/// LOD, LOQ and RSD% from a single Bessel σ.
///
/// With fewer than two replicates σ is undefined and every limit is missing.
pub fn detection_limits(values: &[f64], reference_mean: f64) -> DetectionLimits {
    let sigma = sample_std_dev(values).unwrap_or(MISSING);
    DetectionLimits {
        lod: LOD_SIGMA * sigma,
        loq: LOQ_SIGMA * sigma,
        rsd: sigma / reference_mean * 100.0,
    }
}

/// Limit of detection, 3σ.
pub fn lod(values: &[f64], _reference_mean: f64) -> Result<f64> {
    Ok(LOD_SIGMA * sample_std_dev(values)?)
}

/// Limit of quantitation, 10σ.
pub fn loq(values: &[f64], _reference_mean: f64) -> Result<f64> {
    Ok(LOQ_SIGMA * sample_std_dev(values)?)
}

/// Relative standard deviation in percent of `reference_mean`.
pub fn rsd(values: &[f64], reference_mean: f64) -> Result<f64> {
    Ok(sample_std_dev(values)? / reference_mean * 100.0)
}

// ---------------------------------------------------------------------------
// Comparison against a known value
// ---------------------------------------------------------------------------

/// Result of comparing an observed mean with a known reference value.
///
/// `UnknownReference` is a deliberate signal (no certified value exists) and
/// is kept apart from a missing observation, which stays a NaN `Value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Comparison {
    Value(f64),
    UnknownReference,
}

impl Comparison {
    /// Legacy sentinel used by report consumers for an unknown reference.
    pub const UNKNOWN_SENTINEL: f64 = -1.0;

    /// Numeric form: the value, or −1 for an unknown reference.
    pub fn as_f64(&self) -> f64 {
        match self {
            Comparison::Value(v) => *v,
            Comparison::UnknownReference => Self::UNKNOWN_SENTINEL,
        }
    }

    /// `Some(v)` only for a computed value.
    pub fn value(&self) -> Option<f64> {
        match self {
            Comparison::Value(v) => Some(*v),
            Comparison::UnknownReference => None,
        }
    }
}

impl Serialize for Comparison {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

/// (observed − reference) / reference × 100.
pub fn percent_difference(observed_mean: f64, reference_value: f64) -> Comparison {
    if is_missing(reference_value) {
        return Comparison::UnknownReference;
    }
    Comparison::Value((observed_mean - reference_value) / reference_value * 100.0)
}

/// observed / reference × 100.
pub fn percent_recovery(observed_mean: f64, reference_value: f64) -> Comparison {
    if is_missing(reference_value) {
        return Comparison::UnknownReference;
    }
    Comparison::Value(observed_mean / reference_value * 100.0)
}

fn insufficient(context: &str, required: usize, found: usize) -> AssayError {
    AssayError::InsufficientData {
        context: context.to_string(),
        required,
        found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Moments
    // -----------------------------------------------------------------------

    #[test]
    fn mean_of_empty_is_insufficient() {
        assert!(matches!(
            mean(&[]),
            Err(AssayError::InsufficientData { found: 0, .. })
        ));
    }

    #[test]
    fn mean_propagates_missing() {
        assert!(mean(&[1.0, MISSING, 3.0]).unwrap().is_nan());
    }

    #[test]
    fn std_dev_known_value() {
        // Bessel: values 2,4,4,4,5,5,7,9 -> s = sqrt(32/7)
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let s = sample_std_dev(&v).unwrap();
        assert!((s - (32.0f64 / 7.0).sqrt()).abs() < 1e-10, "s = {s}");
    }

    #[test]
    fn std_dev_needs_two_values() {
        assert!(sample_std_dev(&[1.0]).is_err());
        assert!(sample_std_dev(&[]).is_err());
    }

    #[test]
    fn std_dev_non_negative_and_missing_iff_missing_input() {
        let series: [&[f64]; 5] = [
            &[0.0, 0.0],
            &[-5.0, 5.0, 12.5],
            &[1e-9, 2e-9, 3e-9],
            &[100.0, 100.0, 100.0, 100.0],
            &[3.3, -0.2, 7.7, 1.0, 0.0],
        ];
        for v in series {
            let s = sample_std_dev(v).unwrap();
            assert!(s >= 0.0, "{v:?} -> {s}");
            assert!(!s.is_nan());
        }
        assert!(sample_std_dev(&[1.0, MISSING]).unwrap().is_nan());
    }

    #[test]
    fn covariance_rejects_unequal_lengths() {
        assert!(matches!(
            covariance(&[1.0, 2.0, 3.0], &[1.0, 2.0]),
            Err(AssayError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            covariance(&[1.0], &[1.0]),
            Err(AssayError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn covariance_known_value() {
        let c = covariance(&[1.0, 2.0, 3.0], &[1.0, 3.0, 2.0]).unwrap();
        assert!((c - 0.5).abs() < 1e-10);
    }

    // -----------------------------------------------------------------------
    // R²
    // -----------------------------------------------------------------------

    #[test]
    fn perfectly_correlated_columns() {
        let d = coefficient_of_determination(&[1.0, 2.0, 3.0, 4.0], &[2.0, 4.0, 6.0, 8.0]).unwrap();
        assert!((d.r_squared() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn self_correlation_is_one() {
        let x = [0.12, 0.5, 0.33, 0.91, 0.07];
        let d = coefficient_of_determination(&x, &x).unwrap();
        assert!((d.r_squared() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn anti_correlation_squares_to_one() {
        let d = coefficient_of_determination(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap();
        assert!((d.r_squared() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn determination_is_symmetric() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 4.0, 5.0, 4.0, 5.0];
        let a = coefficient_of_determination(&x, &y).unwrap().r_squared();
        let b = coefficient_of_determination(&y, &x).unwrap().r_squared();
        assert!((a - b).abs() < 1e-12);
        assert!(a > 0.0 && a < 1.0);
    }

    #[test]
    fn flat_series_is_degenerate() {
        let d = coefficient_of_determination(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(
            d,
            Determination::Degenerate {
                x_flat: true,
                y_flat: false
            }
        );
        assert!(d.r_squared().is_nan());
    }

    #[test]
    fn constant_inexact_column_is_flat() {
        for level in [0.1, 0.7, 12.34, 1.3] {
            let d = coefficient_of_determination(&[level; 3], &[1.0, 2.0, 3.0]).unwrap();
            assert!(
                matches!(d, Determination::Degenerate { x_flat: true, y_flat: false }),
                "{level}: {d:?}"
            );
        }
    }

    #[test]
    fn tiny_but_varying_column_is_not_flat() {
        let d = coefficient_of_determination(&[1e-9, 2e-9, 3e-9], &[1.0, 2.0, 3.0]).unwrap();
        assert!((d.r_squared() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn missing_reading_is_degenerate() {
        let d = coefficient_of_determination(&[1.0, MISSING, 3.0], &[1.0, 2.0, 3.0]).unwrap();
        assert!(d.is_degenerate());
    }

    // -----------------------------------------------------------------------
    // Limits and comparisons
    // -----------------------------------------------------------------------

    #[test]
    fn limits_scale_sigma() {
        let v = [0.01, 0.03, 0.02, 0.02];
        let sigma = sample_std_dev(&v).unwrap();
        let m = mean(&v).unwrap();
        let l = detection_limits(&v, m);
        assert!((l.lod - 3.0 * sigma).abs() < 1e-12);
        assert!((l.loq - 10.0 * sigma).abs() < 1e-12);
        assert!((l.rsd - sigma / m * 100.0).abs() < 1e-10);
        assert_eq!(lod(&v, m).unwrap(), l.lod);
        assert_eq!(loq(&v, m).unwrap(), l.loq);
        assert_eq!(rsd(&v, m).unwrap(), l.rsd);
    }

    #[test]
    fn limits_of_single_replicate_are_missing() {
        let l = detection_limits(&[0.5], 0.5);
        assert!(l.lod.is_nan() && l.loq.is_nan() && l.rsd.is_nan());
        assert!(lod(&[0.5], 0.5).is_err());
    }

    #[test]
    fn difference_and_recovery() {
        let d = percent_difference(105.0, 100.0);
        let r = percent_recovery(105.0, 100.0);
        assert!((d.as_f64() - 5.0).abs() < 1e-10);
        assert!((r.as_f64() - 105.0).abs() < 1e-10);
    }

    #[test]
    fn unknown_reference_sentinel() {
        assert_eq!(percent_difference(5.0, MISSING), Comparison::UnknownReference);
        assert_eq!(percent_recovery(5.0, MISSING), Comparison::UnknownReference);
        assert_eq!(percent_recovery(5.0, MISSING).as_f64(), -1.0);
        assert_eq!(percent_difference(5.0, MISSING).as_f64(), -1.0);
        assert_eq!(percent_recovery(5.0, MISSING).value(), None);
    }

    #[test]
    fn missing_observation_is_not_unknown_reference() {
        let r = percent_recovery(MISSING, 2.0);
        assert!(matches!(r, Comparison::Value(v) if v.is_nan()));
    }

    #[test]
    fn comparison_serializes_as_number() {
        let json = serde_json::to_string(&vec![
            Comparison::Value(98.5),
            Comparison::UnknownReference,
        ])
        .unwrap();
        assert_eq!(json, "[98.5,-1.0]");
    }
}
