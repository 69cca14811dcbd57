//! End-to-end orchestration. `Migration` owns the phase state and drives
//! each stage in order.

use crate::analysis::AnalysisEngine;
use crate::config::MigrationConfig;
use crate::error::{MigrationError, Result};
use crate::executor::CopyPasteExecutor;
use crate::model::*;
use crate::planner;
use crate::state::{MigrationState, Phase};
use crate::validate::ValidationSystem;
use serde::Serialize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

/// Everything a full run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationOutcome {
    pub plan: MigrationPlan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionResult>,
    pub validation: ValidationResult,
    pub state: MigrationState,
}

pub struct Migration {
    config: MigrationConfig,
    state: MigrationState,
    cancel: Arc<AtomicBool>,
}

impl Migration {
    pub fn new(config: MigrationConfig) -> Self {
        Self {
            config,
            state: MigrationState::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn state(&self) -> &MigrationState {
        &self.state
    }

    /// Flag that cancels execution between commands when set.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Back to a fresh `analysis` phase.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    pub fn analyze(&mut self, sources: Vec<SourceDocument>) -> Result<Vec<AnalyzedDocument>> {
        self.state.require(Phase::Analysis)?;
        let docs = AnalysisEngine::new().analyze_all(sources);
        for doc in &docs {
            self.state.record_analyzed(&doc.analysis.file_name);
            for w in &doc.analysis.warnings {
                self.state.record_warning(w.into());
            }
        }
        Ok(docs)
    }

    pub fn plan(&mut self, docs: &mut [AnalyzedDocument]) -> Result<MigrationPlan> {
        self.state.advance_to(Phase::Planning)?;
        let plan = match planner::create_migration_plan(docs) {
            Ok(plan) => plan,
            Err(MigrationError::PlanInconsistency(items)) => {
                for item in &items {
                    self.state.record_error(MigrationIssue {
                        kind: ErrorKind::SyntaxError,
                        file: item.file.clone(),
                        line: Some(item.max_end_line),
                        message: format!(
                            "analysis declares {} lines but references line {}",
                            item.total_lines, item.max_end_line
                        ),
                        command: None,
                    });
                }
                return Err(MigrationError::PlanInconsistency(items));
            }
            Err(e) => return Err(e),
        };
        for file in &plan.source_files {
            self.state.record_planned(file);
        }
        for w in &plan.warnings {
            self.state.record_warning(w.clone());
        }
        Ok(plan)
    }

    pub fn execute(&mut self, plan: &MigrationPlan) -> Result<ExecutionResult> {
        self.state.advance_to(Phase::Execution)?;
        let executor = CopyPasteExecutor::new(&self.config.source_root, &self.config.project_root)
            .with_cancel_flag(self.cancel_flag());
        let result = executor.execute_migration_plan(plan)?;
        for cmd in &result.completed_commands {
            self.state.record_executed(&cmd.source);
        }
        for issue in &result.errors {
            self.state.record_error(issue.clone());
        }
        for w in &result.warnings {
            self.state.record_warning(w.clone());
        }
        Ok(result)
    }

    /// Validate the project tree; completes the migration.
    pub fn validate(
        &mut self,
        plan: &MigrationPlan,
        execution: Option<&ExecutionResult>,
    ) -> Result<ValidationResult> {
        self.state.advance_to(Phase::Validation)?;
        let result = ValidationSystem::new(&self.config).run_all(plan, execution);
        for file in &plan.source_files {
            self.state.record_validated(file);
        }
        self.state.advance_to(Phase::Complete)?;
        Ok(result)
    }

    /// Analyze, plan, execute and validate in one go.
    pub fn run(&mut self, sources: Vec<SourceDocument>) -> Result<MigrationOutcome> {
        let mut docs = self.analyze(sources)?;
        let plan = self.plan(&mut docs)?;
        let execution = self.execute(&plan)?;
        let validation = self.validate(&plan, Some(&execution))?;
        info!(
            passed = validation.passed,
            blocking = validation.report.by_severity(Severity::Blocking).len(),
            "migration complete"
        );
        Ok(MigrationOutcome {
            plan,
            execution: Some(execution),
            validation,
            state: self.state.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sources() -> Vec<SourceDocument> {
        let base = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/site");
        ["index.html", "about.html", "blog/post.html"]
            .iter()
            .map(|n| SourceDocument::new(*n, std::fs::read_to_string(base.join(n)).unwrap()))
            .collect()
    }

    fn config(out: &std::path::Path) -> MigrationConfig {
        MigrationConfig {
            source_root: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/site"),
            project_root: out.to_path_buf(),
            ..MigrationConfig::default()
        }
    }

    #[test]
    fn full_run_completes() {
        let out = tempfile::tempdir().unwrap();
        let mut migration = Migration::new(config(out.path()));
        let outcome = migration.run(sources()).unwrap();
        assert!(outcome.validation.passed);
        assert!(migration.state().is_complete());
        assert_eq!(migration.state().progress.analyzed.len(), 3);
        assert_eq!(migration.state().progress.validated.len(), 3);
    }

    #[test]
    fn stages_cannot_repeat() {
        let out = tempfile::tempdir().unwrap();
        let mut migration = Migration::new(config(out.path()));
        let mut docs = migration.analyze(sources()).unwrap();
        migration.plan(&mut docs).unwrap();
        assert!(matches!(
            migration.plan(&mut docs),
            Err(MigrationError::InvalidTransition { .. })
        ));
        assert!(migration.analyze(sources()).is_err());
        migration.reset();
        assert!(migration.analyze(sources()).is_ok());
    }

    #[test]
    fn inconsistent_plan_is_recorded() {
        let out = tempfile::tempdir().unwrap();
        let mut migration = Migration::new(config(out.path()));
        let mut docs = migration.analyze(sources()).unwrap();
        docs[1].analysis.total_lines = 3;
        assert!(matches!(
            migration.plan(&mut docs),
            Err(MigrationError::PlanInconsistency(_))
        ));
        let errors = &migration.state().errors;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].file, "about.html");
        assert!(errors[0].message.contains("declares 3 lines"));
    }

    #[test]
    fn route_collisions_become_state_warnings() {
        let out = tempfile::tempdir().unwrap();
        let mut migration = Migration::new(config(out.path()));
        let page = "<body>\n<p>x</p>\n</body>";
        let mut docs = migration
            .analyze(vec![
                SourceDocument::new("about.html", page),
                SourceDocument::new("about/index.html", page),
            ])
            .unwrap();
        let plan = migration.plan(&mut docs).unwrap();
        assert_eq!(plan.warnings.len(), 1);
        assert!(migration
            .state()
            .warnings
            .iter()
            .any(|w| w.file == "about/index.html" && w.message.contains("/about2")));
    }

    #[test]
    fn cancelled_run_is_an_error() {
        let out = tempfile::tempdir().unwrap();
        let mut migration = Migration::new(config(out.path()));
        migration.cancel_flag().store(true, std::sync::atomic::Ordering::SeqCst);
        let err = migration.run(sources()).unwrap_err();
        assert!(matches!(err, MigrationError::Cancelled { .. }));
        assert_eq!(migration.state().phase, Phase::Execution);
    }
}
