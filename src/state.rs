//! Migration phase tracking.
//!
//! Phases only move forward (`analysis → planning → execution → validation →
//! complete`). `reset` is the only way back to the start.

use crate::error::{MigrationError, Result};
use crate::model::{MigrationIssue, MigrationWarning};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Analysis,
    Planning,
    Execution,
    Validation,
    Complete,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Planning => "planning",
            Self::Execution => "execution",
            Self::Validation => "validation",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Files that have passed each stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Progress {
    pub analyzed: Vec<String>,
    pub planned: Vec<String>,
    pub executed: Vec<String>,
    pub validated: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationState {
    pub phase: Phase,
    pub progress: Progress,
    pub errors: Vec<MigrationIssue>,
    pub warnings: Vec<MigrationWarning>,
}

impl Default for MigrationState {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Analysis,
            progress: Progress::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Move to a later phase. Skipping phases is allowed, staying or going
    /// back is not.
    pub fn advance_to(&mut self, to: Phase) -> Result<()> {
        if to <= self.phase {
            return Err(MigrationError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        debug!(from = %self.phase, to = %to, "phase transition");
        self.phase = to;
        Ok(())
    }

    /// Error unless the current phase is `expected`.
    pub fn require(&self, expected: Phase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(MigrationError::InvalidTransition {
                from: self.phase,
                to: expected,
            })
        }
    }

    /// Back to `analysis` with everything cleared.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    pub fn record_analyzed(&mut self, file: &str) {
        push_unique(&mut self.progress.analyzed, file);
    }

    pub fn record_planned(&mut self, file: &str) {
        push_unique(&mut self.progress.planned, file);
    }

    pub fn record_executed(&mut self, file: &str) {
        push_unique(&mut self.progress.executed, file);
    }

    pub fn record_validated(&mut self, file: &str) {
        push_unique(&mut self.progress.validated, file);
    }

    pub fn record_error(&mut self, issue: MigrationIssue) {
        self.errors.push(issue);
    }

    pub fn record_warning(&mut self, warning: MigrationWarning) {
        self.warnings.push(warning);
    }
}

fn push_unique(list: &mut Vec<String>, file: &str) {
    if !list.iter().any(|f| f == file) {
        list.push(file.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions() {
        let mut state = MigrationState::new();
        assert_eq!(state.phase, Phase::Analysis);
        state.advance_to(Phase::Planning).unwrap();
        state.advance_to(Phase::Execution).unwrap();
        state.advance_to(Phase::Validation).unwrap();
        state.advance_to(Phase::Complete).unwrap();
        assert!(state.is_complete());
    }

    #[test]
    fn backward_and_repeated_transitions_rejected() {
        let mut state = MigrationState::new();
        state.advance_to(Phase::Execution).unwrap();
        let err = state.advance_to(Phase::Planning).unwrap_err();
        assert_eq!(err.to_string(), "invalid phase transition from execution to planning");
        assert!(state.advance_to(Phase::Execution).is_err());
        assert_eq!(state.phase, Phase::Execution);
    }

    #[test]
    fn reset_clears_everything() {
        let mut state = MigrationState::new();
        state.record_analyzed("a.html");
        state.advance_to(Phase::Complete).unwrap();
        state.reset();
        assert_eq!(state.phase, Phase::Analysis);
        assert!(state.progress.analyzed.is_empty());
    }

    #[test]
    fn progress_is_deduplicated() {
        let mut state = MigrationState::new();
        state.record_planned("a.html");
        state.record_planned("a.html");
        state.record_planned("b.html");
        assert_eq!(state.progress.planned, vec!["a.html", "b.html"]);
    }
}
