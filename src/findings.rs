use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A single finding tagged with a stable dotted path into the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

impl ValidationIssue {
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            severity: Severity::Error,
            line: None,
            column: None,
        }
    }

    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(path, message)
        }
    }

    pub fn with_location(mut self, line: Option<usize>, column: Option<usize>) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)?;
        if let Some(line) = self.line {
            write!(f, " (line {}", line)?;
            if let Some(column) = self.column {
                write!(f, ", column {}", column)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// How a change affects existing clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Impact {
    Breaking,
    NonBreaking,
    Informational,
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Impact::Breaking => write!(f, "breaking"),
            Impact::NonBreaking => write!(f, "non-breaking"),
            Impact::Informational => write!(f, "informational"),
        }
    }
}

/// Closed set of structural changes between two revisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    PathAdded,
    PathRemoved,
    OperationAdded,
    OperationRemoved,
    OperationDeprecated,
    RequiredParameterAdded,
    OptionalParameterAdded,
    ParameterSchemaNarrowed,
    RequiredBodyFieldAdded,
    RequestBodySchemaNarrowed,
    RequestSchemaWidened,
    ResponseRemoved,
    ResponseSchemaNarrowed,
    ResponseSchemaWidened,
    FieldAdded,
    DescriptionChanged,
}

impl ChangeKind {
    /// Every kind maps to exactly one impact
    pub fn impact(&self) -> Impact {
        match self {
            ChangeKind::PathRemoved
            | ChangeKind::OperationRemoved
            | ChangeKind::RequiredParameterAdded
            | ChangeKind::ParameterSchemaNarrowed
            | ChangeKind::RequiredBodyFieldAdded
            | ChangeKind::RequestBodySchemaNarrowed
            | ChangeKind::ResponseRemoved
            | ChangeKind::ResponseSchemaNarrowed => Impact::Breaking,
            ChangeKind::PathAdded
            | ChangeKind::OperationAdded
            | ChangeKind::OptionalParameterAdded
            | ChangeKind::RequestSchemaWidened
            | ChangeKind::ResponseSchemaWidened
            | ChangeKind::FieldAdded => Impact::NonBreaking,
            ChangeKind::OperationDeprecated | ChangeKind::DescriptionChanged => {
                Impact::Informational
            }
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One classified difference between the prior and current document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakingChange {
    pub kind: ChangeKind,
    pub path: String,
    /// Snapshot of the prior value, if any
    pub old: Option<String>,
    /// Snapshot of the current value, if any
    pub new: Option<String>,
    pub description: String,
    pub impact: Impact,
}

impl BreakingChange {
    pub fn new(kind: ChangeKind, path: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            old: None,
            new: None,
            description: description.into(),
            impact: kind.impact(),
        }
    }

    pub fn with_snapshots(mut self, old: Option<String>, new: Option<String>) -> Self {
        self.old = old;
        self.new = new;
        self
    }

    pub fn is_breaking(&self) -> bool {
        self.impact == Impact::Breaking
    }
}

impl fmt::Display for BreakingChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} at {}: {}",
            self.impact, self.kind, self.path, self.description
        )
    }
}

/// A cycle in the schema reference graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircularReference {
    /// Registry path of the schema where the cycle was entered
    pub root_path: String,
    /// Schema names on the cycle, each exactly once
    pub chain: Vec<String>,
    pub description: String,
}

impl CircularReference {
    pub fn from_chain(chain: Vec<String>) -> Self {
        let head = chain.first().cloned().unwrap_or_default();
        let mut rendered = chain.clone();
        rendered.push(head.clone());
        Self {
            root_path: format!("components.schemas.{}", head),
            description: rendered.join(" -> "),
            chain,
        }
    }
}

/// Outcome of one named check
///
/// `passed` is derived from the error list at construction and is never
/// set independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub summary: String,
    pub diagnostics: Vec<String>,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<BreakingChange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cycles: Vec<CircularReference>,
}

impl CheckResult {
    /// Split issues by severity and derive `passed`
    pub fn from_issues(
        name: impl Into<String>,
        summary: impl Into<String>,
        issues: Vec<ValidationIssue>,
    ) -> Self {
        let (errors, warnings): (Vec<_>, Vec<_>) =
            issues.into_iter().partition(ValidationIssue::is_error);
        Self {
            name: name.into(),
            passed: errors.is_empty(),
            summary: summary.into(),
            diagnostics: Vec::new(),
            errors,
            warnings,
            changes: Vec::new(),
            cycles: Vec::new(),
        }
    }

    /// A result carrying a single fatal error
    pub fn failed(name: impl Into<String>, issue: ValidationIssue) -> Self {
        let summary = issue.message.clone();
        Self::from_issues(name, summary, vec![issue])
    }

    pub fn with_diagnostics(mut self, diagnostics: Vec<String>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_changes(mut self, changes: Vec<BreakingChange>) -> Self {
        self.changes = changes;
        self
    }

    pub fn with_cycles(mut self, cycles: Vec<CircularReference>) -> Self {
        self.cycles = cycles;
        self
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    pub fn breaking_changes(&self) -> impl Iterator<Item = &BreakingChange> {
        self.changes.iter().filter(|c| c.is_breaking())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passed_is_derived_from_errors() {
        let warnings_only = CheckResult::from_issues(
            "validation",
            "ok",
            vec![ValidationIssue::warning("info.description", "missing description")],
        );
        assert!(warnings_only.passed);
        assert_eq!(warnings_only.warning_count(), 1);

        let with_error = CheckResult::from_issues(
            "validation",
            "1 error",
            vec![
                ValidationIssue::warning("info.description", "missing description"),
                ValidationIssue::error("info.version", "info.version is required"),
            ],
        );
        assert!(!with_error.passed);
        assert_eq!(with_error.error_count(), 1);
        assert_eq!(with_error.errors[0].path, "info.version");
    }

    #[test]
    fn test_change_kind_impacts() {
        assert_eq!(ChangeKind::PathRemoved.impact(), Impact::Breaking);
        assert_eq!(ChangeKind::ResponseRemoved.impact(), Impact::Breaking);
        assert_eq!(ChangeKind::FieldAdded.impact(), Impact::NonBreaking);
        assert_eq!(ChangeKind::ResponseSchemaWidened.impact(), Impact::NonBreaking);
        assert_eq!(ChangeKind::DescriptionChanged.impact(), Impact::Informational);
        assert_eq!(ChangeKind::OperationDeprecated.impact(), Impact::Informational);
    }

    #[test]
    fn test_breaking_change_takes_impact_from_kind() {
        let change = BreakingChange::new(ChangeKind::PathRemoved, "paths./pets", "path removed")
            .with_snapshots(Some("/pets".to_string()), None);
        assert!(change.is_breaking());
        assert_eq!(change.old.as_deref(), Some("/pets"));
        assert!(change.to_string().starts_with("[breaking] PathRemoved"));
    }

    #[test]
    fn test_circular_reference_description() {
        let cycle = CircularReference::from_chain(vec!["A".to_string(), "B".to_string()]);
        assert_eq!(cycle.root_path, "components.schemas.A");
        assert_eq!(cycle.description, "A -> B -> A");

        let self_ref = CircularReference::from_chain(vec!["Node".to_string()]);
        assert_eq!(self_ref.chain.len(), 1);
        assert_eq!(self_ref.description, "Node -> Node");
    }

    #[test]
    fn test_issue_display_with_location() {
        let issue = ValidationIssue::error("paths./pets", "no operations").with_location(Some(12), Some(1));
        assert_eq!(issue.to_string(), "paths./pets: no operations (line 12, column 1)");
    }

    #[test]
    fn test_check_result_serializes_to_json() {
        let result = CheckResult::from_issues("circular-references", "no cycles", Vec::new());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["name"], "circular-references");
        assert_eq!(json["passed"], true);
        assert!(json.get("changes").is_none());
    }
}
