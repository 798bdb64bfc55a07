//! Breaking-change detection against a prior revision
//!
//! The prior document is fetched through a [`RevisionSource`], loaded into a
//! transient model and diffed pairwise against the current one. Operations
//! are keyed by (normalised path template, method), parameters by (name,
//! location) and schema properties by name; every difference is classified
//! with a [`ChangeKind`]. A reference that does not resolve on either side
//! aborts the comparison.
//!
//! Schema narrowing follows one rule set regardless of nesting:
//! - `number` to `integer` narrows, the reverse widens, any other type change narrows
//! - removing an enum value narrows even when others are added
//! - tightened bounds, a new pattern and `nullable` turned off narrow
//! - under `allOf` an added branch narrows; under `oneOf`/`anyOf` a removed
//!   branch narrows; surviving branches are paired by position

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::error::{Result, SpecError};
use crate::findings::{BreakingChange, ChangeKind, CheckResult, Impact, ValidationIssue};
use crate::loader::{self, DocumentFormat, attach_path_line, normalize_template, template_parameters};
use crate::model::{
    AdditionalProperties, ArraySchema, CompositeSchema, CompositionKind, HttpMethod, MediaType,
    ObjectSchema, Operation, Parameter, ParameterLocation, PathItem, PrimitiveSchema, PrimitiveType, SchemaKind,
    SchemaNode, SpecDocument,
};
use crate::resolver;
use crate::revision::RevisionSource;

/// Name under which breaking-change results are reported
pub const BREAKING_CHECK: &str = "breaking-changes";

/// Fetch `spec_path` at `revision` and classify every change between it and `doc`
///
/// Fetch and parse failures of the prior revision are reported as a single
/// error issue; they never panic and never skip the check silently.
pub fn compare_against_revision(
    doc: &SpecDocument,
    revision: &str,
    spec_path: &str,
    source: &dyn RevisionSource,
    cancel: &CancellationToken,
) -> CheckResult {
    info!(%revision, path = %spec_path, "Fetching prior revision");
    let bytes = match source.fetch(revision, spec_path) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(%revision, path = %spec_path, error = %err, "Prior revision unavailable");
            let err = SpecError::from(err);
            return CheckResult::failed(BREAKING_CHECK, ValidationIssue::error("revision", err.to_string()));
        }
    };

    let hint = DocumentFormat::from_path(std::path::Path::new(spec_path));
    let prior = match loader::load(&bytes, hint) {
        Ok(prior) => prior,
        Err(err) => {
            warn!(%revision, error = %err, "Prior revision could not be loaded");
            let (line, column) = err.location();
            return CheckResult::failed(
                BREAKING_CHECK,
                ValidationIssue::error(
                    "revision",
                    format!("prior revision {} could not be loaded: {}", revision, err),
                )
                .with_location(line, column),
            );
        }
    };

    let changes = match diff_documents(&prior, doc, cancel) {
        Ok(changes) => changes,
        Err(err) => {
            debug!(error = %err, "Comparison aborted");
            return CheckResult::failed(
                BREAKING_CHECK,
                ValidationIssue::error("revision", format!("comparison aborted: {}", err)),
            );
        }
    };

    result_from_changes(doc, revision, changes)
}

/// Turn classified changes into a check result: breaking entries become errors
pub fn result_from_changes(
    doc: &SpecDocument,
    revision: &str,
    changes: Vec<BreakingChange>,
) -> CheckResult {
    let count = |impact: Impact| changes.iter().filter(|c| c.impact == impact).count();
    let (breaking, non_breaking, informational) = (
        count(Impact::Breaking),
        count(Impact::NonBreaking),
        count(Impact::Informational),
    );

    let issues = changes
        .iter()
        .filter(|change| change.is_breaking())
        .map(|change| {
            let issue = ValidationIssue::error(
                change.path.clone(),
                format!("{}: {}", change.kind, change.description),
            );
            attach_path_line(issue, &doc.path_lines)
        })
        .collect();
    let diagnostics = changes
        .iter()
        .filter(|change| !change.is_breaking())
        .map(ToString::to_string)
        .collect();

    debug!(breaking, non_breaking, informational, "Revision comparison finished");
    let summary = format!(
        "{} breaking, {} non-breaking, {} informational changes since {}",
        breaking, non_breaking, informational, revision
    );
    CheckResult::from_issues(BREAKING_CHECK, summary, issues)
        .with_diagnostics(diagnostics)
        .with_changes(changes)
}

/// Classify every structural difference from `old` to `new`
pub fn diff_documents(
    old: &SpecDocument,
    new: &SpecDocument,
    cancel: &CancellationToken,
) -> Result<Vec<BreakingChange>> {
    let mut differ = Differ {
        old,
        new,
        cancel,
        changes: Vec::new(),
    };
    differ.diff_paths()?;
    Ok(differ.changes)
}

/// Which side of the exchange a schema describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Parameter,
    RequestBody,
    Response,
}

impl Role {
    fn narrowed(self) -> ChangeKind {
        match self {
            Role::Parameter => ChangeKind::ParameterSchemaNarrowed,
            Role::RequestBody => ChangeKind::RequestBodySchemaNarrowed,
            Role::Response => ChangeKind::ResponseSchemaNarrowed,
        }
    }

    fn widened(self) -> ChangeKind {
        match self {
            Role::Parameter | Role::RequestBody => ChangeKind::RequestSchemaWidened,
            Role::Response => ChangeKind::ResponseSchemaWidened,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    Narrowed,
    Widened,
}

/// Lower bounds narrow when they appear or rise
fn lower_bound<T: PartialOrd>(old: Option<T>, new: Option<T>) -> Option<Effect> {
    match (old, new) {
        (None, Some(_)) => Some(Effect::Narrowed),
        (Some(_), None) => Some(Effect::Widened),
        (Some(a), Some(b)) if b > a => Some(Effect::Narrowed),
        (Some(a), Some(b)) if b < a => Some(Effect::Widened),
        _ => None,
    }
}

/// Upper bounds narrow when they appear or drop
fn upper_bound<T: PartialOrd>(old: Option<T>, new: Option<T>) -> Option<Effect> {
    match (old, new) {
        (None, Some(_)) => Some(Effect::Narrowed),
        (Some(_), None) => Some(Effect::Widened),
        (Some(a), Some(b)) if b < a => Some(Effect::Narrowed),
        (Some(a), Some(b)) if b > a => Some(Effect::Widened),
        _ => None,
    }
}

/// A flag that narrows when switched on
fn restriction_flag(old: bool, new: bool) -> Option<Effect> {
    match (old, new) {
        (false, true) => Some(Effect::Narrowed),
        (true, false) => Some(Effect::Widened),
        _ => None,
    }
}

fn snapshot<T: ToString>(value: Option<T>) -> Option<String> {
    value.map(|v| v.to_string())
}

fn values_snapshot(values: Option<&Vec<Value>>) -> Option<String> {
    values.map(|values| Value::Array(values.clone()).to_string())
}

type ParameterKey = (String, ParameterLocation);
type PairVisited = BTreeSet<(String, String)>;
type Route<'d> = (&'d str, &'d PathItem);

struct Differ<'a> {
    old: &'a SpecDocument,
    new: &'a SpecDocument,
    cancel: &'a CancellationToken,
    changes: Vec<BreakingChange>,
}

impl<'a> Differ<'a> {
    fn record(&mut self, kind: ChangeKind, path: impl Into<String>, description: impl Into<String>) {
        self.changes.push(BreakingChange::new(kind, path, description));
    }

    fn record_with(
        &mut self,
        kind: ChangeKind,
        path: impl Into<String>,
        description: impl Into<String>,
        old: Option<String>,
        new: Option<String>,
    ) {
        self.changes
            .push(BreakingChange::new(kind, path, description).with_snapshots(old, new));
    }

    fn record_effect(
        &mut self,
        effect: Effect,
        role: Role,
        path: &str,
        what: &str,
        old: Option<String>,
        new: Option<String>,
    ) {
        let (kind, verb) = match effect {
            Effect::Narrowed => (role.narrowed(), "narrowed"),
            Effect::Widened => (role.widened(), "widened"),
        };
        let description = format!("{} {}", what, verb);
        self.record_with(kind, path, description, old, new);
    }

    fn diff_paths(&mut self) -> Result<()> {
        let old_routes = routes(self.old);
        let new_routes = routes(self.new);

        for (route, old_group) in &old_routes {
            self.cancel.check()?;
            match new_routes.get(route) {
                None => {
                    for &(old_path, _) in old_group {
                        self.record_with(
                            ChangeKind::PathRemoved,
                            format!("paths.{}", old_path),
                            format!("path {} was removed", old_path),
                            Some(old_path.to_string()),
                            None,
                        );
                    }
                }
                Some(new_group) => self.diff_route(old_group, new_group)?,
            }
        }
        for (route, new_group) in &new_routes {
            if old_routes.contains_key(route) {
                continue;
            }
            for &(new_path, _) in new_group {
                self.record_with(
                    ChangeKind::PathAdded,
                    format!("paths.{}", new_path),
                    format!("path {} was added", new_path),
                    None,
                    Some(new_path.to_string()),
                );
            }
        }
        Ok(())
    }

    /// Pair operations by method across every path sharing one normalised template
    fn diff_route(&mut self, old_group: &[Route<'a>], new_group: &[Route<'a>]) -> Result<()> {
        for &(old_path, old_item) in old_group {
            for (method, old_op) in &old_item.operations {
                let label = format!("{} {}", method.as_str().to_uppercase(), old_path);
                match operation_in(new_group, *method) {
                    None => self.record_with(
                        ChangeKind::OperationRemoved,
                        format!("paths.{}.{}", old_path, method),
                        format!("operation {} was removed", label),
                        Some(label.clone()),
                        None,
                    ),
                    Some((new_path, new_item, new_op)) => {
                        let context = format!("paths.{}.{}", new_path, method);
                        let old_side = (old_path, old_item, old_op);
                        let new_side = (new_path, new_item, new_op);
                        self.diff_operation(&context, old_side, new_side)?;
                    }
                }
            }
        }
        for &(new_path, new_item) in new_group {
            for method in new_item.operations.keys() {
                if operation_in(old_group, *method).is_some() {
                    continue;
                }
                let label = format!("{} {}", method.as_str().to_uppercase(), new_path);
                self.record_with(
                    ChangeKind::OperationAdded,
                    format!("paths.{}.{}", new_path, method),
                    format!("operation {} was added", label),
                    None,
                    Some(label),
                );
            }
        }
        Ok(())
    }

    fn diff_operation(
        &mut self,
        context: &str,
        old: (&'a str, &'a PathItem, &'a Operation),
        new: (&'a str, &'a PathItem, &'a Operation),
    ) -> Result<()> {
        self.cancel.check()?;
        let (old_op, new_op) = (old.2, new.2);

        if !old_op.deprecated && new_op.deprecated {
            self.record(
                ChangeKind::OperationDeprecated,
                context,
                "operation is now deprecated",
            );
        }
        self.diff_text(&format!("{}.summary", context), &old_op.summary, &new_op.summary);
        self.diff_text(
            &format!("{}.description", context),
            &old_op.description,
            &new_op.description,
        );

        self.diff_parameters(context, old, new)?;
        self.diff_request_body(context, old_op, new_op)?;
        self.diff_responses(context, old_op, new_op)?;
        Ok(())
    }

    fn diff_text(&mut self, path: &str, old: &Option<String>, new: &Option<String>) {
        if old != new {
            self.record_with(
                ChangeKind::DescriptionChanged,
                path,
                "text changed",
                old.clone(),
                new.clone(),
            );
        }
    }

    fn diff_parameters(
        &mut self,
        context: &str,
        old: (&'a str, &'a PathItem, &'a Operation),
        new: (&'a str, &'a PathItem, &'a Operation),
    ) -> Result<()> {
        let old_params = effective_parameters(self.old, old.0, old.1, old.2)?;
        let new_params = effective_parameters(self.new, new.0, new.1, new.2)?;

        for (key, new_param) in &new_params {
            let path = format!("{}.parameters.{}", context, new_param.name);
            match old_params.get(key) {
                None if new_param.required => self.record_with(
                    ChangeKind::RequiredParameterAdded,
                    path,
                    format!(
                        "new required {} parameter '{}'",
                        new_param.location, new_param.name
                    ),
                    None,
                    Some(new_param.name.clone()),
                ),
                None => self.record_with(
                    ChangeKind::OptionalParameterAdded,
                    path,
                    format!(
                        "new optional {} parameter '{}'",
                        new_param.location, new_param.name
                    ),
                    None,
                    Some(new_param.name.clone()),
                ),
                Some(old_param) => {
                    if !old_param.required && new_param.required {
                        self.record_with(
                            ChangeKind::RequiredParameterAdded,
                            path.clone(),
                            format!("parameter '{}' became required", new_param.name),
                            Some("optional".to_string()),
                            Some("required".to_string()),
                        );
                    }
                    self.diff_text(
                        &format!("{}.description", path),
                        &old_param.description,
                        &new_param.description,
                    );
                    if let (Some(old_schema), Some(new_schema)) = (&old_param.schema, &new_param.schema) {
                        self.diff_schema_root(
                            old_schema,
                            new_schema,
                            &format!("{}.schema", path),
                            Role::Parameter,
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    fn diff_request_body(&mut self, context: &str, old_op: &'a Operation, new_op: &'a Operation) -> Result<()> {
        let (old_doc, new_doc) = (self.old, self.new);
        let path = format!("{}.requestBody", context);
        let old_body = old_op
            .request_body
            .as_ref()
            .map(|body| resolver::resolve_request_body(body, &old_doc.components))
            .transpose()?;
        let new_body = new_op
            .request_body
            .as_ref()
            .map(|body| resolver::resolve_request_body(body, &new_doc.components))
            .transpose()?;

        match (old_body, new_body) {
            (None, None) => {}
            (None, Some(new_body)) if new_body.required => self.record(
                ChangeKind::RequiredBodyFieldAdded,
                path,
                "a required request body was added",
            ),
            (None, Some(_)) => self.record(ChangeKind::FieldAdded, path, "an optional request body was added"),
            (Some(_), None) => self.record(
                ChangeKind::RequestBodySchemaNarrowed,
                path,
                "the request body was removed",
            ),
            (Some(old_body), Some(new_body)) => {
                if !old_body.required && new_body.required {
                    self.record_with(
                        ChangeKind::RequiredBodyFieldAdded,
                        path.clone(),
                        "the request body became required",
                        Some("optional".to_string()),
                        Some("required".to_string()),
                    );
                }
                self.diff_text(
                    &format!("{}.description", path),
                    &old_body.description,
                    &new_body.description,
                );
                self.diff_content(&path, &old_body.content, &new_body.content, Role::RequestBody)?;
            }
        }
        Ok(())
    }

    fn diff_responses(&mut self, context: &str, old_op: &'a Operation, new_op: &'a Operation) -> Result<()> {
        let (old_doc, new_doc) = (self.old, self.new);
        for (status, old_response) in &old_op.responses {
            let path = format!("{}.responses.{}", context, status);
            let Some(new_response) = new_op.responses.get(status) else {
                self.record_with(
                    ChangeKind::ResponseRemoved,
                    path,
                    format!("response {} was removed", status),
                    Some(status.clone()),
                    None,
                );
                continue;
            };
            let old_response = resolver::resolve_response(old_response, &old_doc.components)?;
            let new_response = resolver::resolve_response(new_response, &new_doc.components)?;
            self.diff_text(
                &format!("{}.description", path),
                &old_response.description,
                &new_response.description,
            );
            self.diff_content(&path, &old_response.content, &new_response.content, Role::Response)?;
        }
        for status in new_op.responses.keys() {
            if !old_op.responses.contains_key(status) {
                self.record_with(
                    ChangeKind::ResponseSchemaWidened,
                    format!("{}.responses.{}", context, status),
                    format!("response {} was added", status),
                    None,
                    Some(status.clone()),
                );
            }
        }
        Ok(())
    }

    fn diff_content(
        &mut self,
        context: &str,
        old: &'a BTreeMap<String, MediaType>,
        new: &'a BTreeMap<String, MediaType>,
        role: Role,
    ) -> Result<()> {
        for (media_type, old_media) in old {
            let path = format!("{}.content.{}", context, media_type);
            match new.get(media_type) {
                None => self.record_with(
                    role.narrowed(),
                    path,
                    format!("media type {} was removed", media_type),
                    Some(media_type.clone()),
                    None,
                ),
                Some(new_media) => match (&old_media.schema, &new_media.schema) {
                    (Some(old_schema), Some(new_schema)) => {
                        self.diff_schema_root(old_schema, new_schema, &format!("{}.schema", path), role)?
                    }
                    (None, Some(_)) => self.record_effect(Effect::Narrowed, role, &path, "schema", None, None),
                    (Some(_), None) => self.record_effect(Effect::Widened, role, &path, "schema", None, None),
                    (None, None) => {}
                },
            }
        }
        for media_type in new.keys() {
            if !old.contains_key(media_type) {
                self.record_with(
                    role.widened(),
                    format!("{}.content.{}", context, media_type),
                    format!("media type {} was added", media_type),
                    None,
                    Some(media_type.clone()),
                );
            }
        }
        Ok(())
    }

    fn diff_schema_root(
        &mut self,
        old: &'a SchemaNode,
        new: &'a SchemaNode,
        path: &str,
        role: Role,
    ) -> Result<()> {
        let mut visited = PairVisited::new();
        self.diff_schema(old, new, path, role, &mut visited)
    }

    /// `visited` holds the reference pairs on the current descent only, so a
    /// shared definition is compared under every property that uses it
    fn diff_schema(
        &mut self,
        old: &'a SchemaNode,
        new: &'a SchemaNode,
        path: &str,
        role: Role,
        visited: &mut PairVisited,
    ) -> Result<()> {
        self.cancel.check()?;

        let pair = match (reference_name(old), reference_name(new)) {
            (None, None) => None,
            (old_name, new_name) => Some((old_name.unwrap_or_default(), new_name.unwrap_or_default())),
        };
        let Some(pair) = pair else {
            return self.diff_resolved(old, new, path, role, visited);
        };
        if !visited.insert(pair.clone()) {
            return Ok(());
        }
        let outcome = self.diff_resolved(old, new, path, role, visited);
        visited.remove(&pair);
        outcome
    }

    fn diff_resolved(
        &mut self,
        old: &'a SchemaNode,
        new: &'a SchemaNode,
        path: &str,
        role: Role,
        visited: &mut PairVisited,
    ) -> Result<()> {
        let (old_doc, new_doc) = (self.old, self.new);
        let old = resolver::resolve_concrete(old, &old_doc.components)?;
        let new = resolver::resolve_concrete(new, &new_doc.components)?;

        if old.description != new.description {
            self.record_with(
                ChangeKind::DescriptionChanged,
                format!("{}.description", path),
                "schema description changed",
                old.description.clone(),
                new.description.clone(),
            );
        }
        if let Some(effect) = restriction_flag(new.nullable, old.nullable) {
            self.record_effect(
                effect,
                role,
                path,
                "nullability",
                Some(old.nullable.to_string()),
                Some(new.nullable.to_string()),
            );
        }

        match (&old.kind, &new.kind) {
            (SchemaKind::Any, SchemaKind::Any) => {}
            (SchemaKind::Any, kind) => self.record_effect(
                Effect::Narrowed,
                role,
                path,
                "type",
                Some("any".to_string()),
                Some(kind.label()),
            ),
            (kind, SchemaKind::Any) => self.record_effect(
                Effect::Widened,
                role,
                path,
                "type",
                Some(kind.label()),
                Some("any".to_string()),
            ),
            (SchemaKind::Primitive(a), SchemaKind::Primitive(b)) => self.diff_primitive(a, b, path, role),
            (SchemaKind::Object(a), SchemaKind::Object(b)) => self.diff_object(a, b, path, role, visited)?,
            (SchemaKind::Array(a), SchemaKind::Array(b)) => self.diff_array(a, b, path, role, visited)?,
            (SchemaKind::Composite(a), SchemaKind::Composite(b)) => {
                self.diff_composite(a, b, path, role, visited)?
            }
            (a, b) => self.record_effect(
                Effect::Narrowed,
                role,
                path,
                "type",
                Some(a.label()),
                Some(b.label()),
            ),
        }
        Ok(())
    }

    fn diff_primitive(&mut self, old: &PrimitiveSchema, new: &PrimitiveSchema, path: &str, role: Role) {
        if old.ty != new.ty {
            // Only the numeric pair keeps the remaining keywords comparable
            let (effect, comparable) = match (old.ty, new.ty) {
                (PrimitiveType::Integer, PrimitiveType::Number) => (Effect::Widened, true),
                (PrimitiveType::Number, PrimitiveType::Integer) => (Effect::Narrowed, true),
                _ => (Effect::Narrowed, false),
            };
            self.record_effect(
                effect,
                role,
                path,
                "type",
                Some(old.ty.as_str().to_string()),
                Some(new.ty.as_str().to_string()),
            );
            if !comparable {
                return;
            }
        }

        match (&old.enumeration, &new.enumeration) {
            (None, None) => {}
            (None, Some(_)) | (Some(_), None) => {
                let effect = if old.enumeration.is_none() {
                    Effect::Narrowed
                } else {
                    Effect::Widened
                };
                self.record_effect(
                    effect,
                    role,
                    &format!("{}.enum", path),
                    "enum",
                    values_snapshot(old.enumeration.as_ref()),
                    values_snapshot(new.enumeration.as_ref()),
                );
            }
            (Some(old_values), Some(new_values)) => {
                let removed = old_values.iter().any(|v| !new_values.contains(v));
                let added = new_values.iter().any(|v| !old_values.contains(v));
                let effect = if removed {
                    Some(Effect::Narrowed)
                } else if added {
                    Some(Effect::Widened)
                } else {
                    None
                };
                if let Some(effect) = effect {
                    self.record_effect(
                        effect,
                        role,
                        &format!("{}.enum", path),
                        "enum",
                        values_snapshot(Some(old_values)),
                        values_snapshot(Some(new_values)),
                    );
                }
            }
        }

        if old.format != new.format {
            let effect = if new.format.is_none() {
                Effect::Widened
            } else {
                Effect::Narrowed
            };
            self.record_effect(
                effect,
                role,
                &format!("{}.format", path),
                "format",
                old.format.clone(),
                new.format.clone(),
            );
        }
        if old.pattern != new.pattern {
            let effect = if new.pattern.is_none() {
                Effect::Widened
            } else {
                Effect::Narrowed
            };
            self.record_effect(
                effect,
                role,
                &format!("{}.pattern", path),
                "pattern",
                old.pattern.clone(),
                new.pattern.clone(),
            );
        }

        let bounds = [
            ("minLength", lower_bound(old.min_length, new.min_length), snapshot(old.min_length), snapshot(new.min_length)),
            ("maxLength", upper_bound(old.max_length, new.max_length), snapshot(old.max_length), snapshot(new.max_length)),
            ("minimum", lower_bound(old.minimum, new.minimum), snapshot(old.minimum), snapshot(new.minimum)),
            ("maximum", upper_bound(old.maximum, new.maximum), snapshot(old.maximum), snapshot(new.maximum)),
            (
                "exclusiveMinimum",
                restriction_flag(old.exclusive_minimum, new.exclusive_minimum),
                Some(old.exclusive_minimum.to_string()),
                Some(new.exclusive_minimum.to_string()),
            ),
            (
                "exclusiveMaximum",
                restriction_flag(old.exclusive_maximum, new.exclusive_maximum),
                Some(old.exclusive_maximum.to_string()),
                Some(new.exclusive_maximum.to_string()),
            ),
        ];
        for (keyword, effect, old_value, new_value) in bounds {
            if let Some(effect) = effect {
                self.record_effect(effect, role, &format!("{}.{}", path, keyword), keyword, old_value, new_value);
            }
        }

        if old.multiple_of != new.multiple_of {
            let effect = match (old.multiple_of, new.multiple_of) {
                (Some(_), None) => Effect::Widened,
                (Some(a), Some(b)) if b != 0.0 && (a / b).fract() == 0.0 => Effect::Widened,
                _ => Effect::Narrowed,
            };
            self.record_effect(
                effect,
                role,
                &format!("{}.multipleOf", path),
                "multipleOf",
                snapshot(old.multiple_of),
                snapshot(new.multiple_of),
            );
        }
    }

    fn diff_object(
        &mut self,
        old: &'a ObjectSchema,
        new: &'a ObjectSchema,
        path: &str,
        role: Role,
        visited: &mut PairVisited,
    ) -> Result<()> {
        for (name, old_property) in &old.properties {
            let property_path = format!("{}.properties.{}", path, name);
            let Some(new_property) = new.properties.get(name) else {
                self.record_with(
                    role.narrowed(),
                    property_path,
                    format!("property '{}' was removed", name),
                    Some(name.clone()),
                    None,
                );
                continue;
            };
            self.diff_schema(old_property, new_property, &property_path, role, visited)?;

            let (was_required, is_required) = (old.is_required(name), new.is_required(name));
            match (role, was_required, is_required) {
                (Role::Response, _, _) => {}
                (Role::RequestBody, false, true) => self.record_with(
                    ChangeKind::RequiredBodyFieldAdded,
                    property_path,
                    format!("property '{}' became required", name),
                    Some("optional".to_string()),
                    Some("required".to_string()),
                ),
                (_, false, true) => self.record_effect(
                    Effect::Narrowed,
                    role,
                    &property_path,
                    "required properties",
                    Some("optional".to_string()),
                    Some("required".to_string()),
                ),
                (_, true, false) => self.record_effect(
                    Effect::Widened,
                    role,
                    &property_path,
                    "required properties",
                    Some("required".to_string()),
                    Some("optional".to_string()),
                ),
                _ => {}
            }
        }

        for name in new.properties.keys() {
            if old.properties.contains_key(name) {
                continue;
            }
            let property_path = format!("{}.properties.{}", path, name);
            if role == Role::RequestBody && new.is_required(name) {
                self.record_with(
                    ChangeKind::RequiredBodyFieldAdded,
                    property_path,
                    format!("new required property '{}'", name),
                    None,
                    Some(name.clone()),
                );
            } else {
                self.record_with(
                    ChangeKind::FieldAdded,
                    property_path,
                    format!("new property '{}'", name),
                    None,
                    Some(name.clone()),
                );
            }
        }

        let additional_path = format!("{}.additionalProperties", path);
        match (&old.additional_properties, &new.additional_properties) {
            (AdditionalProperties::Schema(a), AdditionalProperties::Schema(b)) => {
                self.diff_schema(a, b, &additional_path, role, visited)?
            }
            (a, b) => {
                let rank = |ap: &AdditionalProperties| match ap {
                    AdditionalProperties::Forbidden => 0,
                    AdditionalProperties::Schema(_) => 1,
                    AdditionalProperties::Allowed => 2,
                };
                let effect = match rank(a).cmp(&rank(b)) {
                    std::cmp::Ordering::Greater => Some(Effect::Narrowed),
                    std::cmp::Ordering::Less => Some(Effect::Widened),
                    std::cmp::Ordering::Equal => None,
                };
                if let Some(effect) = effect {
                    self.record_effect(effect, role, &additional_path, "additionalProperties", None, None);
                }
            }
        }
        Ok(())
    }

    fn diff_array(
        &mut self,
        old: &'a ArraySchema,
        new: &'a ArraySchema,
        path: &str,
        role: Role,
        visited: &mut PairVisited,
    ) -> Result<()> {
        let bounds = [
            ("minItems", lower_bound(old.min_items, new.min_items), snapshot(old.min_items), snapshot(new.min_items)),
            ("maxItems", upper_bound(old.max_items, new.max_items), snapshot(old.max_items), snapshot(new.max_items)),
            (
                "uniqueItems",
                restriction_flag(old.unique_items, new.unique_items),
                Some(old.unique_items.to_string()),
                Some(new.unique_items.to_string()),
            ),
        ];
        for (keyword, effect, old_value, new_value) in bounds {
            if let Some(effect) = effect {
                self.record_effect(effect, role, &format!("{}.{}", path, keyword), keyword, old_value, new_value);
            }
        }

        let items_path = format!("{}.items", path);
        match (&old.items, &new.items) {
            (Some(a), Some(b)) => self.diff_schema(a, b, &items_path, role, visited)?,
            (None, Some(_)) => self.record_effect(Effect::Narrowed, role, &items_path, "items", None, None),
            (Some(_), None) => self.record_effect(Effect::Widened, role, &items_path, "items", None, None),
            (None, None) => {}
        }
        Ok(())
    }

    fn diff_composite(
        &mut self,
        old: &'a CompositeSchema,
        new: &'a CompositeSchema,
        path: &str,
        role: Role,
        visited: &mut PairVisited,
    ) -> Result<()> {
        if old.kind != new.kind {
            self.record_effect(
                Effect::Narrowed,
                role,
                path,
                "composition",
                Some(old.kind.as_str().to_string()),
                Some(new.kind.as_str().to_string()),
            );
            return Ok(());
        }

        let keyword = old.kind.as_str();
        for (index, (a, b)) in old.branches.iter().zip(new.branches.iter()).enumerate() {
            self.diff_schema(a, b, &format!("{}.{}[{}]", path, keyword, index), role, visited)?;
        }

        let (old_len, new_len) = (old.branches.len(), new.branches.len());
        if old_len != new_len {
            let effect = match (old.kind, new_len > old_len) {
                (CompositionKind::AllOf, true) => Effect::Narrowed,
                (CompositionKind::AllOf, false) => Effect::Widened,
                (_, true) => Effect::Widened,
                (_, false) => Effect::Narrowed,
            };
            self.record_effect(
                effect,
                role,
                &format!("{}.{}", path, keyword),
                &format!("{} branches", keyword),
                Some(old_len.to_string()),
                Some(new_len.to_string()),
            );
        }
        Ok(())
    }
}

/// Paths grouped by their normalised template, in document order within a group
fn routes(doc: &SpecDocument) -> BTreeMap<String, Vec<Route<'_>>> {
    let mut routes: BTreeMap<String, Vec<Route<'_>>> = BTreeMap::new();
    for (path, item) in &doc.paths {
        routes
            .entry(normalize_template(path))
            .or_default()
            .push((path.as_str(), item));
    }
    routes
}

/// First path of a route that defines `method`
fn operation_in<'d>(
    group: &[Route<'d>],
    method: HttpMethod,
) -> Option<(&'d str, &'d PathItem, &'d Operation)> {
    group.iter().find_map(|&(path, item)| {
        item.operations
            .get(&method)
            .map(|operation| (path, item, operation))
    })
}

/// Path-item parameters overridden by operation parameters, keyed for pairing
/// across revisions
fn effective_parameters<'d>(
    doc: &'d SpecDocument,
    path: &str,
    item: &'d PathItem,
    operation: &'d Operation,
) -> Result<BTreeMap<ParameterKey, &'d Parameter>> {
    let template = template_parameters(path);
    item.parameters
        .iter()
        .chain(operation.parameters.iter())
        .map(|parameter| {
            let parameter = resolver::resolve_parameter(parameter, &doc.components)?;
            Ok((parameter_key(parameter, &template), parameter))
        })
        .collect()
}

/// Path parameters pair by template position so renaming `{id}` is not a
/// new parameter; header names are case-insensitive
fn parameter_key(parameter: &Parameter, template: &[String]) -> ParameterKey {
    match parameter.location {
        ParameterLocation::Path => match template.iter().position(|name| name == &parameter.name) {
            Some(index) => (format!("{{{}}}", index), ParameterLocation::Path),
            None => (parameter.name.clone(), ParameterLocation::Path),
        },
        ParameterLocation::Header => (parameter.name.to_ascii_lowercase(), ParameterLocation::Header),
        location => (parameter.name.clone(), location),
    }
}

fn reference_name(node: &SchemaNode) -> Option<String> {
    match &node.kind {
        SchemaKind::Reference(reference) => Some(reference.pointer.clone()),
        _ => None,
    }
}
