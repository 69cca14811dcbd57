//! Typed migration errors.
//!
//! Only plan inconsistencies, filesystem failures during execution and
//! cancellation surface as `Err`. Everything else is collected into
//! `MigrationState` or the cleanup report.

use crate::lines::ContentMismatch;
use crate::state::Phase;
use std::path::PathBuf;
use thiserror::Error;

/// A declared line count that contradicts the ranges found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inconsistency {
    pub file: String,
    pub total_lines: usize,
    pub max_end_line: usize,
}

#[derive(Error, Debug)]
pub enum MigrationError {
    /// Post-copy byte mismatch between a source range and its destination
    #[error("content mismatch copying {source_file}:{start_line}-{end_line} to {target} (first difference at line {})", .mismatch.line)]
    ContentIntegrity {
        source_file: String,
        target: String,
        start_line: usize,
        end_line: usize,
        mismatch: ContentMismatch,
    },

    /// Expected output path missing
    #[error("expected output missing: {path}")]
    StructuralValidation { path: String },

    /// Build or route-render failure
    #[error("functional validation failed for {target}: {reason}")]
    FunctionalValidation { target: String, reason: String },

    #[error("plan inconsistent: {}", describe(.0))]
    PlanInconsistency(Vec<Inconsistency>),

    #[error("invalid phase transition from {from} to {to}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("execution cancelled after {completed} command(s); backup restored")]
    Cancelled { completed: usize },

    #[error("I/O error for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MigrationError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn describe(items: &[Inconsistency]) -> String {
    items
        .iter()
        .map(|i| {
            format!(
                "{} declares {} lines but references line {}",
                i.file, i.total_lines, i.max_end_line
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, MigrationError>;
