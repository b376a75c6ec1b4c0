//! Error types for a run.
//!
//! Two tiers: [`RunError`] aborts the whole run before or during launch, while
//! [`UnitError`] is plain data recorded on a single unit and never propagated.

use serde::Serialize;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Whole-run fatal errors. None of these produce a per-unit report.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("invalid population size {requested} (expected 1..={max})")]
    InvalidPopulation { requested: usize, max: usize },

    #[error("reference file {} unavailable", .path.display())]
    ReferenceUnavailable {
        path: PathBuf,
        #[source]
        reason: ReferenceError,
    },

    #[error("failed to launch worker {index}")]
    LaunchFailed {
        index: usize,
        #[source]
        source: io::Error,
    },
}

/// Why a reference file could not be turned into a buffer.
#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("open failed")]
    Open(#[source] io::Error),
    #[error("stat failed")]
    Metadata(#[source] io::Error),
    #[error("file is empty")]
    Empty,
    #[error("mapping failed")]
    Map(#[source] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitErrorKind {
    /// The destination file could not be opened; no transfer was attempted.
    SaveFailed,
    /// The transfer started but did not complete cleanly.
    TransferFailed,
}

impl UnitErrorKind {
    pub fn describe(self) -> &'static str {
        match self {
            UnitErrorKind::SaveFailed => "File save failed.",
            UnitErrorKind::TransferFailed => "File transfer failed.",
        }
    }
}

/// A per-unit failure with the diagnostic text of whatever layer reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitError {
    pub kind: UnitErrorKind,
    pub detail: String,
}

impl UnitError {
    pub fn save_failed(detail: impl Into<String>) -> Self {
        Self {
            kind: UnitErrorKind::SaveFailed,
            detail: detail.into(),
        }
    }

    pub fn transfer_failed(detail: impl Into<String>) -> Self {
        Self {
            kind: UnitErrorKind::TransferFailed,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for UnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind.describe(), self.detail)
    }
}
