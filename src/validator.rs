//! Structural validation of a loaded document
//!
//! A single deterministic pass over the model that accumulates every issue
//! instead of stopping at the first one:
//! - required `info` fields and a non-empty `paths` map
//! - at least one operation per path item and one response per operation
//! - every reachable `$ref` resolves
//! - unique `operationId`s, declared path template parameters, declared
//!   security schemes
//! - soft warnings for missing summaries, descriptions and examples

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::RulesConfig;
use crate::findings::{CheckResult, ValidationIssue};
use crate::loader::{attach_path_line, template_parameters};
use crate::model::{
    MediaType, Parameter, ParameterLocation, RefOr, SchemaNode, SecurityRequirement, SpecDocument,
};
use crate::resolver;

/// Name under which structural validation results are reported
pub const VALIDATION_CHECK: &str = "validation";

/// Validate a document with the default rule set
pub fn validate(doc: &SpecDocument) -> CheckResult {
    Validator::new().validate(doc)
}

/// Structural validator with configurable soft rules
#[derive(Debug, Clone, Default)]
pub struct Validator {
    rules: RulesConfig,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(mut self, rules: RulesConfig) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    pub fn validate(&self, doc: &SpecDocument) -> CheckResult {
        let mut pass = Pass {
            doc,
            rules: &self.rules,
            issues: Vec::new(),
            operation_ids: BTreeMap::new(),
        };
        pass.run();

        let issues: Vec<ValidationIssue> = pass
            .issues
            .into_iter()
            .chain(doc.notices.iter().cloned())
            .map(|issue| attach_path_line(issue, &doc.path_lines))
            .collect();

        let operation_count = doc.operations().count();
        let result = CheckResult::from_issues(VALIDATION_CHECK, String::new(), issues);
        let summary = if result.passed {
            format!(
                "document is structurally valid ({} warnings)",
                result.warning_count()
            )
        } else {
            format!(
                "{} errors, {} warnings",
                result.error_count(),
                result.warning_count()
            )
        };
        debug!(
            errors = result.error_count(),
            warnings = result.warning_count(),
            "Structural validation finished"
        );

        CheckResult { summary, ..result }.with_diagnostics(vec![format!(
            "checked {} paths, {} operations, {} component schemas",
            doc.paths.len(),
            operation_count,
            doc.components.schema_count()
        )])
    }
}

/// State of a single validation run
struct Pass<'a> {
    doc: &'a SpecDocument,
    rules: &'a RulesConfig,
    issues: Vec<ValidationIssue>,
    /// operationId → location of its first use
    operation_ids: BTreeMap<&'a str, String>,
}

impl<'a> Pass<'a> {
    fn run(&mut self) {
        self.check_version();
        self.check_info();
        self.check_paths();
        let doc = self.doc;
        self.check_security(&doc.security, "security");
        self.check_components();
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue::error(path, message));
    }

    fn warning(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue::warning(path, message));
    }

    fn check_version(&mut self) {
        let doc = self.doc;
        match doc.openapi.as_deref() {
            None => self.warning("openapi", "document does not declare an OpenAPI version"),
            Some(version) if !version.starts_with("3.") => self.error(
                "openapi",
                format!("unsupported OpenAPI version '{}', expected 3.x", version),
            ),
            Some(_) => {}
        }
    }

    fn check_info(&mut self) {
        let doc = self.doc;
        let info = &doc.info;
        if is_blank(&info.title) {
            self.error("info.title", "info.title is required");
        }
        if is_blank(&info.version) {
            self.error("info.version", "info.version is required");
        }
        if self.rules.warn_missing_description && is_blank(&info.description) {
            self.warning("info.description", "info.description is missing");
        }
    }

    fn check_paths(&mut self) {
        let doc = self.doc;
        if doc.paths.is_empty() {
            self.error("paths", "paths must contain at least one path");
        }

        for (path, item) in &doc.paths {
            let context = format!("paths.{}", path);
            if !path.starts_with('/') {
                self.error(context.as_str(), "path must begin with '/'");
            }
            if item.operations.is_empty() {
                self.error(context.as_str(), "path item has no operations");
            }

            let shared = self.check_parameters(&item.parameters, &context);
            let template = template_parameters(path);

            for (method, operation) in &item.operations {
                let op_context = format!("{}.{}", context, method);

                if let Some(id) = operation.operation_id.as_deref() {
                    match self.operation_ids.get(id) {
                        Some(first) => {
                            let message =
                                format!("duplicate operationId '{}' (first used at {})", id, first);
                            self.error(format!("{}.operationId", op_context), message);
                        }
                        None => {
                            self.operation_ids.insert(id, op_context.clone());
                        }
                    }
                }

                if self.rules.warn_missing_summary && is_blank(&operation.summary) {
                    self.warning(
                        format!("{}.summary", op_context),
                        "operation is missing a summary",
                    );
                }
                if self.rules.warn_missing_description && is_blank(&operation.description) {
                    self.warning(
                        format!("{}.description", op_context),
                        "operation is missing a description",
                    );
                }

                let own = self.check_parameters(&operation.parameters, &op_context);
                for name in &template {
                    let declared = own
                        .iter()
                        .chain(shared.iter())
                        .any(|p| p.location == ParameterLocation::Path && &p.name == name);
                    if !declared {
                        self.error(
                            format!("{}.parameters", op_context),
                            format!(
                                "path template parameter '{}' is not declared as an 'in: path' parameter",
                                name
                            ),
                        );
                    }
                }

                if let Some(body) = &operation.request_body {
                    let body_context = format!("{}.requestBody", op_context);
                    match resolver::resolve_request_body(body, &doc.components) {
                        Ok(body) => self.check_content(&body.content, &body_context, false),
                        Err(err) => self.error(body_context, err.to_string()),
                    }
                }

                if operation.responses.is_empty() {
                    self.error(
                        format!("{}.responses", op_context),
                        "operation must declare at least one response",
                    );
                }
                for (status, response) in &operation.responses {
                    let response_context = format!("{}.responses.{}", op_context, status);
                    match resolver::resolve_response(response, &doc.components) {
                        Ok(response) => {
                            if is_blank(&response.description) {
                                self.warning(
                                    format!("{}.description", response_context),
                                    "response is missing a description",
                                );
                            }
                            self.check_content(&response.content, &response_context, true);
                        }
                        Err(err) => self.error(response_context, err.to_string()),
                    }
                }

                if let Some(security) = &operation.security {
                    self.check_security(security, &format!("{}.security", op_context));
                }
            }
        }
    }

    /// Resolve a parameter list, reporting unresolved references and optional
    /// path parameters; returns the parameters that resolved
    fn check_parameters(
        &mut self,
        parameters: &'a [RefOr<Parameter>],
        context: &str,
    ) -> Vec<&'a Parameter> {
        let doc = self.doc;
        let mut resolved = Vec::new();
        for (index, parameter) in parameters.iter().enumerate() {
            let parameter_context = format!("{}.parameters[{}]", context, index);
            match resolver::resolve_parameter(parameter, &doc.components) {
                Ok(parameter) => {
                    if parameter.location == ParameterLocation::Path && !parameter.required {
                        self.error(
                            format!("{}.required", parameter_context),
                            format!("path parameter '{}' must be required", parameter.name),
                        );
                    }
                    if let Some(schema) = &parameter.schema {
                        self.check_schema_references(schema, &format!("{}.schema", parameter_context));
                    }
                    resolved.push(parameter);
                }
                Err(err) => self.error(parameter_context, err.to_string()),
            }
        }
        resolved
    }

    fn check_content(
        &mut self,
        content: &BTreeMap<String, MediaType>,
        context: &str,
        is_response: bool,
    ) {
        for (media_type, media) in content {
            let media_context = format!("{}.content.{}", context, media_type);
            if let Some(schema) = &media.schema {
                self.check_schema_references(schema, &format!("{}.schema", media_context));
            }
            let has_example = media.example.is_some()
                || media.has_examples
                || media.schema.as_ref().is_some_and(|s| s.example.is_some());
            if is_response && self.rules.warn_missing_examples && !has_example {
                self.warning(
                    format!("{}.example", media_context),
                    "response content has no example",
                );
            }
        }
    }

    /// Shallow-resolve every reference inside a schema
    fn check_schema_references(&mut self, schema: &SchemaNode, context: &str) {
        let doc = self.doc;
        for reference in schema.references() {
            if let Err(err) = resolver::target_id(reference, &doc.components) {
                self.error(context, err.to_string());
            }
        }
    }

    fn check_security(&mut self, requirements: &[SecurityRequirement], context: &str) {
        let doc = self.doc;
        for requirement in requirements {
            for scheme in requirement.keys() {
                if !doc.components.security_schemes.contains_key(scheme) {
                    self.error(
                        context,
                        format!(
                            "security scheme '{}' is not declared in components.securitySchemes",
                            scheme
                        ),
                    );
                }
            }
        }
    }

    fn check_components(&mut self) {
        let doc = self.doc;
        let registry = &doc.components;
        for (name, schema) in registry.schemas() {
            self.check_schema_references(schema, &format!("components.schemas.{}", name));
        }
        for (name, parameter) in &registry.parameters {
            if let Some(schema) = &parameter.schema {
                self.check_schema_references(schema, &format!("components.parameters.{}.schema", name));
            }
        }
        for (name, body) in &registry.request_bodies {
            self.check_content(&body.content, &format!("components.requestBodies.{}", name), false);
        }
        for (name, response) in &registry.responses {
            self.check_content(&response.content, &format!("components.responses.{}", name), false);
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{DocumentFormat, load};

    fn load_yaml(yaml: &str) -> SpecDocument {
        load(yaml.as_bytes(), DocumentFormat::Yaml).unwrap()
    }

    const MINIMAL: &str = r#"openapi: 3.0.3
info:
  title: Minimal
  version: 1.0.0
paths:
  /health:
    get:
      responses:
        '200':
          description: ok
"#;

    #[test]
    fn test_minimal_document_passes() {
        let result = validate(&load_yaml(MINIMAL));
        assert!(result.passed, "unexpected errors: {:?}", result.errors);
        assert!(result.errors.is_empty());
        assert_eq!(result.name, VALIDATION_CHECK);
    }

    #[test]
    fn test_missing_version_yields_exactly_one_error() {
        let doc = load_yaml(&MINIMAL.replace("  version: 1.0.0\n", ""));
        let result = validate(&doc);
        assert!(!result.passed);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "info.version");
    }

    #[test]
    fn test_empty_paths_is_an_error() {
        let doc = load_yaml("openapi: 3.0.0\ninfo: {title: t, version: '1'}\npaths: {}\n");
        let result = validate(&doc);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "paths");
    }

    #[test]
    fn test_operation_without_responses() {
        let doc = load_yaml(
            "openapi: 3.0.0\ninfo: {title: t, version: '1'}\npaths:\n  /a:\n    post:\n      summary: create\n      responses: {}\n",
        );
        let result = validate(&doc);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "paths./a.post.responses");
        assert_eq!(result.errors[0].line, Some(4));
        assert_eq!(result.errors[0].column, Some(1));
    }

    #[test]
    fn test_path_item_without_operations() {
        let doc = load_yaml("openapi: 3.0.0\ninfo: {title: t, version: '1'}\npaths:\n  /empty:\n    summary: nothing here\n");
        let result = validate(&doc);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "paths./empty");
    }

    #[test]
    fn test_missing_response_description_is_warning() {
        let doc = load_yaml(
            "openapi: 3.0.0\ninfo: {title: t, version: '1'}\npaths:\n  /a:\n    get:\n      summary: s\n      responses:\n        '204': {}\n",
        );
        let result = validate(&doc);
        assert!(result.passed);
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.path == "paths./a.get.responses.204.description")
        );
    }

    #[test]
    fn test_unresolved_reference_is_error() {
        let doc = load_yaml(
            r#"openapi: 3.0.0
info: {title: t, version: '1'}
paths:
  /a:
    get:
      responses:
        '200':
          description: ok
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Missing'
"#,
        );
        let result = validate(&doc);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            result.errors[0].path,
            "paths./a.get.responses.200.content.application/json.schema"
        );
        assert!(result.errors[0].message.contains("Missing"));
    }

    #[test]
    fn test_duplicate_operation_id() {
        let doc = load_yaml(
            r#"openapi: 3.0.0
info: {title: t, version: '1'}
paths:
  /a:
    get:
      operationId: fetch
      responses: {'200': {description: ok}}
  /b:
    get:
      operationId: fetch
      responses: {'200': {description: ok}}
"#,
        );
        let result = validate(&doc);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "paths./b.get.operationId");
        assert!(result.errors[0].message.contains("paths./a.get"));
    }

    #[test]
    fn test_undeclared_and_optional_path_parameters() {
        let doc = load_yaml(
            r#"openapi: 3.0.0
info: {title: t, version: '1'}
paths:
  /pets/{petId}/toys/{toyId}:
    parameters:
      - {name: petId, in: path, required: true, schema: {type: string}}
    get:
      parameters:
        - {name: toyId, in: path, schema: {type: string}}
      responses: {'200': {description: ok}}
    delete:
      responses: {'204': {description: gone}}
"#,
        );
        let result = validate(&doc);
        let paths: Vec<&str> = result.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "paths./pets/{petId}/toys/{toyId}.get.parameters[0].required",
                "paths./pets/{petId}/toys/{toyId}.delete.parameters",
            ]
        );
    }

    #[test]
    fn test_undeclared_security_scheme() {
        let doc = load_yaml(
            r#"openapi: 3.0.0
info: {title: t, version: '1'}
security:
  - apiKey: []
paths:
  /a:
    get:
      security:
        - oauth: [read]
      responses: {'200': {description: ok}}
components:
  securitySchemes:
    apiKey: {type: apiKey, name: X-Key, in: header}
"#,
        );
        let result = validate(&doc);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "paths./a.get.security");
        assert!(result.errors[0].message.contains("oauth"));
    }

    #[test]
    fn test_openapi_version_rules() {
        let missing = validate(&load_yaml(&MINIMAL.replace("openapi: 3.0.3\n", "")));
        assert!(missing.passed);
        assert!(missing.warnings.iter().any(|w| w.path == "openapi"));

        let swagger = validate(&load_yaml(&MINIMAL.replace("openapi: 3.0.3", "openapi: '2.0'")));
        assert!(!swagger.passed);
        assert_eq!(swagger.errors[0].path, "openapi");
    }

    #[test]
    fn test_soft_rules_follow_configuration() {
        let doc = load_yaml(MINIMAL);
        let default = validate(&doc);
        assert!(
            default
                .warnings
                .iter()
                .any(|w| w.path == "paths./health.get.summary")
        );

        let quiet_rules = RulesConfig {
            warn_missing_summary: false,
            warn_missing_description: false,
            warn_missing_examples: true,
        };
        let result = Validator::new().with_rules(quiet_rules).validate(&doc);
        assert!(!result.warnings.iter().any(|w| w.path.ends_with(".summary")));
        assert!(!result.warnings.iter().any(|w| w.path.ends_with("description")));
    }

    #[test]
    fn test_load_notices_are_reported() {
        let doc = load_yaml(
            "openapi: 3.0.0\ninfo: {title: t, version: '1'}\npaths:\n  /a:\n    get: {responses: {'200': {description: ok}}}\ncomponents:\n  schemas:\n    Odd: {type: decimal}\n",
        );
        let result = validate(&doc);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "components.schemas.Odd.type");
    }

    #[test]
    fn test_validation_is_deterministic() {
        let doc = load_yaml(
            "info: {title: t}\npaths:\n  /b: {}\n  /a:\n    get: {responses: {}}\n",
        );
        let first = validate(&doc);
        let second = validate(&doc);
        assert_eq!(first, second);
        assert_eq!(first.errors.len(), 3);
    }
}
