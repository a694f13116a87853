use std::collections::BTreeSet;

use thiserror::Error;

// ---------------------------------------------------------------------------
// AssayError – failures of the statistics core
// ---------------------------------------------------------------------------

/// Errors raised by the classification / statistics core.
///
/// `InsufficientData` and `DimensionMismatch` only ever abort the group they
/// were raised for; the pipeline keeps going with the remaining groups.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssayError {
    #[error("insufficient data: {context} needs at least {required} values, got {found}")]
    InsufficientData {
        context: String,
        required: usize,
        found: usize,
    },

    #[error("dimension mismatch: {context} (expected {expected}, found {found})")]
    DimensionMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    #[error("sample '{name}' matched no known reference standard")]
    UnclassifiedReferenceSample { name: String },

    #[error("correlation threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),

    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, AssayError>;

// ---------------------------------------------------------------------------
// Warnings – deduplicated, ordered message list
// ---------------------------------------------------------------------------

/// Accumulates non-fatal messages for the caller.
///
/// Messages keep their first-seen order and each distinct text is stored (and
/// logged) exactly once.
#[derive(Debug, Clone, Default)]
pub struct Warnings {
    messages: Vec<String>,
    seen: BTreeSet<String>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message. Returns `false` if it was already present.
    pub fn push(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        if !self.seen.insert(message.clone()) {
            return false;
        }
        log::warn!("{message}");
        self.messages.push(message);
        true
    }

    /// Record a recoverable error as a warning.
    pub fn push_error(&mut self, err: &AssayError) -> bool {
        self.push(format!("Warning: {err}"))
    }

    /// Move every message of `other` into `self`, keeping deduplication.
    pub fn extend(&mut self, other: Warnings) {
        for msg in other.messages {
            self.push(msg);
        }
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.messages
    }
}
