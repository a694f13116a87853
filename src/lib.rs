//! # rusty-assay
//!
//! QA/QC statistics for replicate ICP-AES runs: sample classification,
//! per-group detection limits and recoveries, priority-ordered flagging of
//! sample results, and pairwise analyte R² matrices.
//!
//! ## Modules
//!
//! - [`stats`] — mean, Bessel σ, covariance, R², LOD/LOQ/RSD, recovery
//! - [`classify`] — routing of records into blank / standard / CCV /
//!   certified-reference / generic buckets
//! - [`group`] — frozen sample groups with derived statistics
//! - [`qaqc`] — ordered QA/QC rule table
//! - [`correlation`] — per-group R² matrices
//! - [`analysis`] — the whole pipeline over one dataset
//! - [`config`], [`data`], [`report`] — configuration, ingestion and output

pub mod analysis;
pub mod classify;
pub mod config;
pub mod correlation;
pub mod data;
pub mod error;
pub mod group;
pub mod qaqc;
pub mod report;
pub mod stats;

pub use analysis::{analyze, AnalysisReport};
pub use error::{AssayError, Result, Warnings};
