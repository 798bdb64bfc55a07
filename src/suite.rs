//! Named checks composed into suites
//!
//! A [`SuiteBuilder`] selects checks; [`SuiteBuilder::build`] freezes the
//! selection into an immutable [`Suite`] that always runs in the order
//! validation, circular references, breaking changes.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::cancel::CancellationToken;
use crate::compare::{self, BREAKING_CHECK};
use crate::config::{Config, RulesConfig};
use crate::cycles::{self, CIRCULAR_CHECK};
use crate::findings::CheckResult;
use crate::model::SpecDocument;
use crate::revision::{GitRevisionSource, RevisionSource};
use crate::validator::{VALIDATION_CHECK, Validator};

/// A named check over one document
pub trait Check: Send + Sync {
    fn name(&self) -> &str;

    /// Run the check; the result is a fresh value owned by the caller
    fn run(&self, doc: &SpecDocument, cancel: &CancellationToken) -> CheckResult;
}

/// Structural validation with configurable soft rules
#[derive(Debug, Clone, Default)]
pub struct ValidationCheck {
    validator: Validator,
}

impl ValidationCheck {
    pub fn new(rules: RulesConfig) -> Self {
        Self {
            validator: Validator::new().with_rules(rules),
        }
    }
}

impl Check for ValidationCheck {
    fn name(&self) -> &str {
        VALIDATION_CHECK
    }

    fn run(&self, doc: &SpecDocument, _cancel: &CancellationToken) -> CheckResult {
        self.validator.validate(doc)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CircularReferenceCheck;

impl Check for CircularReferenceCheck {
    fn name(&self) -> &str {
        CIRCULAR_CHECK
    }

    fn run(&self, doc: &SpecDocument, cancel: &CancellationToken) -> CheckResult {
        cycles::detect_cycles_with_cancel(doc, cancel).0
    }
}

/// Diff against `spec_path` as of `revision`, fetched through `source`
#[derive(Clone)]
pub struct BreakingChangeCheck {
    revision: String,
    spec_path: String,
    source: Arc<dyn RevisionSource>,
}

impl BreakingChangeCheck {
    pub fn new(
        revision: impl Into<String>,
        spec_path: impl Into<String>,
        source: Arc<dyn RevisionSource>,
    ) -> Self {
        Self {
            revision: revision.into(),
            spec_path: spec_path.into(),
            source,
        }
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }
}

impl fmt::Debug for BreakingChangeCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakingChangeCheck")
            .field("revision", &self.revision)
            .field("spec_path", &self.spec_path)
            .finish_non_exhaustive()
    }
}

impl Check for BreakingChangeCheck {
    fn name(&self) -> &str {
        BREAKING_CHECK
    }

    fn run(&self, doc: &SpecDocument, cancel: &CancellationToken) -> CheckResult {
        compare::compare_against_revision(doc, &self.revision, &self.spec_path, self.source.as_ref(), cancel)
    }
}

/// Toggles check inclusion before a [`Suite`] is built
#[derive(Default)]
pub struct SuiteBuilder {
    validation: Option<ValidationCheck>,
    circular: Option<CircularReferenceCheck>,
    breaking: Option<BreakingChangeCheck>,
    cancel: Option<CancellationToken>,
}

impl SuiteBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validation and circular-reference detection with default rules
    pub fn with_defaults() -> Self {
        Self::new().validation(true).circular_references(true)
    }

    /// Select checks from merged configuration, reading prior revisions
    /// with git from `revision.repo_dir`
    pub fn from_config(config: &Config, spec: &Path) -> Self {
        let source = Arc::new(GitRevisionSource::new(config.revision.repo_dir.clone()));
        Self::from_config_with_source(config, spec, source)
    }

    pub fn from_config_with_source(
        config: &Config,
        spec: &Path,
        source: Arc<dyn RevisionSource>,
    ) -> Self {
        let mut builder = Self::new().circular_references(config.checks.circular_references);
        if config.checks.validation {
            builder = builder.validation_rules(config.rules.clone());
        }
        if config.breaking_changes_enabled()
            && let Some(base) = &config.revision.base
        {
            builder = builder.breaking_changes(BreakingChangeCheck::new(
                base.clone(),
                config.spec_path_or(spec),
                source,
            ));
        }
        builder
    }

    pub fn validation(mut self, enabled: bool) -> Self {
        self.validation = enabled.then(ValidationCheck::default);
        self
    }

    /// Include structural validation with custom soft rules
    pub fn validation_rules(mut self, rules: RulesConfig) -> Self {
        self.validation = Some(ValidationCheck::new(rules));
        self
    }

    pub fn circular_references(mut self, enabled: bool) -> Self {
        self.circular = enabled.then_some(CircularReferenceCheck);
        self
    }

    pub fn breaking_changes(mut self, check: BreakingChangeCheck) -> Self {
        self.breaking = Some(check);
        self
    }

    pub fn without_breaking_changes(mut self) -> Self {
        self.breaking = None;
        self
    }

    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> Suite {
        let mut checks: Vec<Box<dyn Check>> = Vec::new();
        if let Some(check) = self.validation {
            checks.push(Box::new(check));
        }
        if let Some(check) = self.circular {
            checks.push(Box::new(check));
        }
        if let Some(check) = self.breaking {
            checks.push(Box::new(check));
        }
        Suite {
            checks,
            cancel: self.cancel.unwrap_or_default(),
        }
    }
}

/// An immutable, ordered selection of checks
pub struct Suite {
    checks: Vec<Box<dyn Check>>,
    cancel: CancellationToken,
}

impl fmt::Debug for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("checks", &self.check_names())
            .finish()
    }
}

impl Suite {
    pub fn builder() -> SuiteBuilder {
        SuiteBuilder::new()
    }

    pub fn check_names(&self) -> Vec<&str> {
        self.checks.iter().map(|check| check.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Token that aborts traversal-heavy checks of this suite when cancelled
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run every selected check sequentially over `doc`
    pub fn run(&self, doc: &SpecDocument) -> SuiteReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, checks = self.checks.len(), "Starting check suite");

        let results: Vec<CheckResult> = self
            .checks
            .iter()
            .map(|check| {
                let result = check.run(doc, &self.cancel);
                debug!(
                    check = check.name(),
                    passed = result.passed,
                    errors = result.error_count(),
                    warnings = result.warning_count(),
                    "Check finished"
                );
                result
            })
            .collect();

        let passed = results.iter().all(|result| result.passed);
        info!(%run_id, passed, "Check suite finished");
        SuiteReport {
            run_id,
            started_at,
            results,
            passed,
        }
    }
}

/// Results of one suite run, in check order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub results: Vec<CheckResult>,
    /// True iff every check passed
    pub passed: bool,
}

impl SuiteReport {
    pub fn result(&self, name: &str) -> Option<&CheckResult> {
        self.results.iter().find(|result| result.name == name)
    }

    pub fn total_errors(&self) -> usize {
        self.results.iter().map(CheckResult::error_count).sum()
    }

    pub fn total_warnings(&self) -> usize {
        self.results.iter().map(CheckResult::warning_count).sum()
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|result| !result.passed)
    }
}
