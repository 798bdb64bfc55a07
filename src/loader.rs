//! Document loading and model building
//!
//! Bytes are parsed into a generic JSON tree (YAML is converted on the way in)
//! and then mapped onto the typed model in [`crate::model`]. Loading performs
//! no I/O apart from [`load_file`], which only reads the file before
//! delegating to [`load`].

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

use regex::Regex;
use serde::de::{self, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, SpecError};
use crate::findings::ValidationIssue;
use crate::model::{
    AdditionalProperties, ArraySchema, ComponentRef, ComponentRegistry, CompositeSchema,
    CompositionKind, HttpMethod, Info, MediaType, ObjectSchema, Operation, Parameter,
    ParameterLocation, PathItem, PrimitiveSchema, PrimitiveType, RefOr, RequestBody, Response,
    SchemaKind, SchemaNode, SecurityRequirement, SecurityScheme, SpecDocument,
};

/// Serialization format of a specification document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Json,
    Yaml,
    /// Sniff the format from the content
    #[default]
    Auto,
}

impl DocumentFormat {
    /// Guess a format hint from a file extension
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => DocumentFormat::Json,
            Some("yaml") | Some("yml") => DocumentFormat::Yaml,
            _ => DocumentFormat::Auto,
        }
    }

    /// Content sniffing: a document whose first significant byte opens a JSON
    /// object or array is JSON, anything else is YAML
    pub fn sniff(bytes: &[u8]) -> Self {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') | Some(b'[') => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }

    /// Replace `Auto` with the sniffed format
    pub fn resolve(self, bytes: &[u8]) -> Self {
        match self {
            DocumentFormat::Auto => Self::sniff(bytes),
            explicit => explicit,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Json => write!(f, "JSON"),
            DocumentFormat::Yaml => write!(f, "YAML"),
            DocumentFormat::Auto => write!(f, "auto"),
        }
    }
}

/// Parse a specification document and build its model
pub fn load(bytes: &[u8], hint: DocumentFormat) -> Result<SpecDocument> {
    let format = hint.resolve(bytes);
    let text = std::str::from_utf8(bytes).map_err(|e| SpecError::Parse {
        format,
        line: None,
        column: None,
        details: format!("document is not valid UTF-8: {}", e),
    })?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let root = parse_tree(text, format)?;
    let Value::Object(root) = root else {
        return Err(SpecError::Parse {
            format,
            line: None,
            column: None,
            details: "document root must be a mapping".to_string(),
        });
    };

    let mut builder = ModelBuilder::default();
    let mut document = builder.build(&root)?;

    document.path_lines = locate_path_keys(text, document.paths.keys());
    if format == DocumentFormat::Json {
        builder.report_duplicate_keys(text);
    }
    builder.report_equivalent_templates(&document.paths);
    document.notices = builder
        .notices
        .into_iter()
        .map(|issue| attach_path_line(issue, &document.path_lines))
        .collect();

    debug!(
        %format,
        paths = document.paths.len(),
        schemas = document.components.schema_count(),
        notices = document.notices.len(),
        "Loaded specification document"
    );
    Ok(document)
}

/// Read a document from disk and load it
pub fn load_file(path: &Path, hint: DocumentFormat) -> Result<SpecDocument> {
    let bytes = std::fs::read(path)?;
    let hint = match hint {
        DocumentFormat::Auto => DocumentFormat::from_path(path),
        explicit => explicit,
    };
    debug!(path = %path.display(), %hint, "Reading specification document");
    load(&bytes, hint)
}

fn parse_tree(text: &str, format: DocumentFormat) -> Result<Value> {
    match format {
        DocumentFormat::Json | DocumentFormat::Auto => {
            serde_json::from_str(text).map_err(|e| SpecError::Parse {
                format: DocumentFormat::Json,
                line: Some(e.line()),
                column: Some(e.column()),
                details: e.to_string(),
            })
        }
        DocumentFormat::Yaml => {
            let yaml: serde_yaml::Value =
                serde_yaml::from_str(text).map_err(|e| SpecError::Parse {
                    format,
                    line: e.location().map(|l| l.line()),
                    column: e.location().map(|l| l.column()),
                    details: e.to_string(),
                })?;
            yaml_to_json(yaml)
        }
    }
}

/// Convert a YAML tree into a JSON tree, stringifying scalar mapping keys
/// (`200:` is a number in YAML but a status code string in OpenAPI)
fn yaml_to_json(value: serde_yaml::Value) -> Result<Value> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut object = Map::new();
            for (key, value) in mapping {
                let key = match key {
                    Yaml::String(s) => s,
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    Yaml::Null => "null".to_string(),
                    other => {
                        return Err(SpecError::Parse {
                            format: DocumentFormat::Yaml,
                            line: None,
                            column: None,
                            details: format!("unsupported mapping key: {:?}", other),
                        });
                    }
                };
                object.insert(key, yaml_to_json(value)?);
            }
            Value::Object(object)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

/// Maps the generic tree onto the typed model, collecting notices
#[derive(Default)]
struct ModelBuilder {
    notices: Vec<ValidationIssue>,
}

impl ModelBuilder {
    fn build(&mut self, root: &Map<String, Value>) -> Result<SpecDocument> {
        let info = match root.get("info") {
            Some(Value::Object(info)) => Info {
                title: scalar_string(info.get("title")),
                version: scalar_string(info.get("version")),
                description: scalar_string(info.get("description")),
            },
            _ => {
                return Err(SpecError::SchemaShape {
                    key: "info".to_string(),
                });
            }
        };
        let Some(Value::Object(raw_paths)) = root.get("paths") else {
            return Err(SpecError::SchemaShape {
                key: "paths".to_string(),
            });
        };

        let components = match root.get("components") {
            Some(Value::Object(components)) => self.build_components(components),
            _ => ComponentRegistry::new(),
        };

        let mut paths = BTreeMap::new();
        for (path, raw_item) in raw_paths {
            let item = match raw_item {
                Value::Object(item) => self.build_path_item(path, item),
                _ => {
                    self.notices.push(ValidationIssue::error(
                        format!("paths.{}", path),
                        "path item must be a mapping",
                    ));
                    PathItem::default()
                }
            };
            paths.insert(path.clone(), item);
        }

        let security = match root.get("security") {
            Some(value) => self.build_security(value, "security"),
            None => Vec::new(),
        };

        Ok(SpecDocument {
            openapi: scalar_string(root.get("openapi")),
            info,
            paths,
            components,
            security,
            notices: Vec::new(),
            path_lines: BTreeMap::new(),
        })
    }

    fn build_components(&mut self, components: &Map<String, Value>) -> ComponentRegistry {
        let mut schemas = BTreeMap::new();
        for (name, raw) in section(components, "schemas") {
            let node = self.build_schema(raw, &format!("components.schemas.{}", name));
            schemas.insert(name.clone(), node);
        }
        let mut registry = ComponentRegistry::with_schemas(schemas);

        for (name, raw) in section(components, "parameters") {
            let context = format!("components.parameters.{}", name);
            if let Some(parameter) = self.build_parameter_item(raw, &context) {
                registry.parameters.insert(name.clone(), parameter);
            }
        }
        for (name, raw) in section(components, "requestBodies") {
            if let Value::Object(raw) = raw {
                let body = self.build_request_body(raw, &format!("components.requestBodies.{}", name));
                registry.request_bodies.insert(name.clone(), body);
            }
        }
        for (name, raw) in section(components, "responses") {
            if let Value::Object(raw) = raw {
                let response = self.build_response(raw, &format!("components.responses.{}", name));
                registry.responses.insert(name.clone(), response);
            }
        }
        for (name, raw) in section(components, "securitySchemes") {
            if let Value::Object(raw) = raw {
                registry.security_schemes.insert(
                    name.clone(),
                    SecurityScheme {
                        scheme_type: scalar_string(raw.get("type")),
                        description: scalar_string(raw.get("description")),
                    },
                );
            }
        }
        registry
    }

    fn build_path_item(&mut self, path: &str, raw: &Map<String, Value>) -> PathItem {
        let context = format!("paths.{}", path);
        let mut item = PathItem {
            summary: scalar_string(raw.get("summary")),
            description: scalar_string(raw.get("description")),
            parameters: self.build_parameters(raw.get("parameters"), &context),
            operations: BTreeMap::new(),
        };
        for method in HttpMethod::ALL {
            let op_context = format!("{}.{}", context, method);
            match raw.get(method.as_str()) {
                Some(Value::Object(raw_op)) => {
                    item.operations
                        .insert(method, self.build_operation(raw_op, &op_context));
                }
                Some(_) => self
                    .notices
                    .push(ValidationIssue::error(op_context, "operation must be a mapping")),
                None => {}
            }
        }
        item
    }

    fn build_operation(&mut self, raw: &Map<String, Value>, context: &str) -> Operation {
        let body_context = format!("{}.requestBody", context);
        let request_body = match raw.get("requestBody") {
            Some(Value::Object(body)) => Some(match reference_of(body) {
                Some(pointer) => RefOr::Ref(ComponentRef::parse(pointer, "requestBodies")),
                None => RefOr::Item(self.build_request_body(body, &body_context)),
            }),
            Some(_) => {
                self.notices
                    .push(ValidationIssue::error(body_context, "request body must be a mapping"));
                None
            }
            None => None,
        };

        let mut responses = BTreeMap::new();
        if let Some(Value::Object(raw_responses)) = raw.get("responses") {
            for (status, raw_response) in raw_responses {
                let Value::Object(raw_response) = raw_response else {
                    if !status.starts_with("x-") {
                        self.notices.push(ValidationIssue::error(
                            format!("{}.responses.{}", context, status),
                            "response must be a mapping",
                        ));
                    }
                    continue;
                };
                let response = match reference_of(raw_response) {
                    Some(pointer) => RefOr::Ref(ComponentRef::parse(pointer, "responses")),
                    None => RefOr::Item(self.build_response(
                        raw_response,
                        &format!("{}.responses.{}", context, status),
                    )),
                };
                responses.insert(status.clone(), response);
            }
        }

        Operation {
            operation_id: scalar_string(raw.get("operationId")),
            summary: scalar_string(raw.get("summary")),
            description: scalar_string(raw.get("description")),
            deprecated: flag(raw, "deprecated"),
            tags: string_list(raw.get("tags")),
            parameters: self.build_parameters(raw.get("parameters"), context),
            request_body,
            responses,
            security: raw
                .get("security")
                .map(|value| self.build_security(value, &format!("{}.security", context))),
        }
    }

    fn build_parameters(&mut self, raw: Option<&Value>, context: &str) -> Vec<RefOr<Parameter>> {
        let Some(Value::Array(raw)) = raw else {
            return Vec::new();
        };
        let mut parameters = Vec::new();
        for (index, entry) in raw.iter().enumerate() {
            if let Value::Object(object) = entry
                && let Some(pointer) = reference_of(object)
            {
                parameters.push(RefOr::Ref(ComponentRef::parse(pointer, "parameters")));
                continue;
            }
            let entry_context = format!("{}.parameters[{}]", context, index);
            if let Some(parameter) = self.build_parameter_item(entry, &entry_context) {
                parameters.push(RefOr::Item(parameter));
            }
        }
        parameters
    }

    fn build_parameter_item(&mut self, raw: &Value, context: &str) -> Option<Parameter> {
        let Value::Object(raw) = raw else {
            self.notices
                .push(ValidationIssue::error(context, "parameter must be a mapping"));
            return None;
        };
        let Some(name) = scalar_string(raw.get("name")) else {
            self.notices
                .push(ValidationIssue::error(context, "parameter is missing a name"));
            return None;
        };
        let location = match raw.get("in").and_then(Value::as_str) {
            Some(value) => match ParameterLocation::parse(value) {
                Some(location) => location,
                None => {
                    self.notices.push(ValidationIssue::error(
                        format!("{}.in", context),
                        format!("parameter '{}' has invalid location '{}'", name, value),
                    ));
                    return None;
                }
            },
            None => {
                self.notices.push(ValidationIssue::error(
                    format!("{}.in", context),
                    format!("parameter '{}' is missing its location", name),
                ));
                return None;
            }
        };

        let schema = match raw.get("schema") {
            Some(schema) => Some(self.build_schema(schema, &format!("{}.schema", context))),
            None => match raw.get("content") {
                Some(Value::Object(content)) => content
                    .values()
                    .next()
                    .and_then(|media| media.get("schema"))
                    .map(|schema| self.build_schema(schema, &format!("{}.content.schema", context))),
                _ => None,
            },
        };

        Some(Parameter {
            name,
            location,
            required: flag(raw, "required"),
            schema,
            description: scalar_string(raw.get("description")),
            deprecated: flag(raw, "deprecated"),
            example: raw.get("example").cloned(),
        })
    }

    fn build_request_body(&mut self, raw: &Map<String, Value>, context: &str) -> RequestBody {
        RequestBody {
            description: scalar_string(raw.get("description")),
            required: flag(raw, "required"),
            content: self.build_content(raw.get("content"), context),
        }
    }

    fn build_response(&mut self, raw: &Map<String, Value>, context: &str) -> Response {
        Response {
            description: scalar_string(raw.get("description")),
            content: self.build_content(raw.get("content"), context),
        }
    }

    fn build_content(&mut self, raw: Option<&Value>, context: &str) -> BTreeMap<String, MediaType> {
        let Some(Value::Object(raw)) = raw else {
            return BTreeMap::new();
        };
        raw.iter()
            .map(|(media_type, entry)| {
                let schema = entry.get("schema").map(|schema| {
                    self.build_schema(schema, &format!("{}.content.{}.schema", context, media_type))
                });
                let media = MediaType {
                    schema,
                    example: entry.get("example").cloned(),
                    has_examples: entry
                        .get("examples")
                        .and_then(Value::as_object)
                        .is_some_and(|examples| !examples.is_empty()),
                };
                (media_type.clone(), media)
            })
            .collect()
    }

    fn build_security(&mut self, raw: &Value, context: &str) -> Vec<SecurityRequirement> {
        let Value::Array(entries) = raw else {
            self.notices.push(ValidationIssue::error(
                context,
                "security must be a list of requirement objects",
            ));
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(Value::as_object)
            .map(|requirement| {
                requirement
                    .iter()
                    .map(|(scheme, scopes)| (scheme.clone(), string_list(Some(scopes))))
                    .collect()
            })
            .collect()
    }

    fn build_schema(&mut self, raw: &Value, context: &str) -> SchemaNode {
        let Value::Object(raw) = raw else {
            self.notices
                .push(ValidationIssue::error(context, "schema must be a mapping"));
            return SchemaNode::any();
        };

        if let Some(pointer) = reference_of(raw) {
            return SchemaNode::new(SchemaKind::Reference(ComponentRef::parse(pointer, "schemas")));
        }

        let mut composites = Vec::new();
        for (keyword, kind) in [
            ("allOf", CompositionKind::AllOf),
            ("oneOf", CompositionKind::OneOf),
            ("anyOf", CompositionKind::AnyOf),
        ] {
            if let Some(Value::Array(raw_branches)) = raw.get(keyword) {
                let branches = raw_branches
                    .iter()
                    .enumerate()
                    .map(|(i, branch)| self.build_schema(branch, &format!("{}.{}[{}]", context, keyword, i)))
                    .collect();
                composites.push(SchemaNode::new(SchemaKind::Composite(CompositeSchema {
                    kind,
                    branches,
                })));
            }
        }

        let base = self.build_structural(raw, context);
        let kind = match (base, composites.len()) {
            (SchemaKind::Any, 0) => SchemaKind::Any,
            (base, 0) => base,
            (SchemaKind::Any, 1) => composites.remove(0).kind,
            (SchemaKind::Any, _) => SchemaKind::Composite(CompositeSchema {
                kind: CompositionKind::AllOf,
                branches: composites,
            }),
            (base, _) => {
                let mut branches = vec![SchemaNode::new(base)];
                branches.extend(composites);
                SchemaKind::Composite(CompositeSchema {
                    kind: CompositionKind::AllOf,
                    branches,
                })
            }
        };

        SchemaNode {
            kind,
            nullable: flag(raw, "nullable"),
            description: scalar_string(raw.get("description")),
            example: raw.get("example").cloned(),
            deprecated: flag(raw, "deprecated"),
        }
    }

    /// The non-composition part of a schema, with the type inferred from
    /// keywords when `type` is absent
    fn build_structural(&mut self, raw: &Map<String, Value>, context: &str) -> SchemaKind {
        let declared = match raw.get("type") {
            None => None,
            Some(Value::String(ty)) => Some(ty.as_str()),
            Some(other) => {
                self.notices.push(ValidationIssue::error(
                    format!("{}.type", context),
                    format!("schema type must be a string, found {}", other),
                ));
                return SchemaKind::Any;
            }
        };

        match declared {
            Some("object") => self.build_object(raw, context),
            Some("array") => self.build_array(raw, context),
            Some(other) => match PrimitiveType::parse(other) {
                Some(ty) => build_primitive(raw, ty),
                None => {
                    self.notices.push(ValidationIssue::error(
                        format!("{}.type", context),
                        format!("unknown schema type '{}'", other),
                    ));
                    SchemaKind::Any
                }
            },
            None => {
                if ["properties", "additionalProperties", "required"]
                    .iter()
                    .any(|k| raw.contains_key(*k))
                {
                    self.build_object(raw, context)
                } else if raw.contains_key("items") {
                    self.build_array(raw, context)
                } else if let Some(ty) = raw
                    .get("enum")
                    .and_then(Value::as_array)
                    .and_then(|values| values.iter().find_map(PrimitiveType::of_value))
                {
                    build_primitive(raw, ty)
                } else if ["minLength", "maxLength", "pattern"]
                    .iter()
                    .any(|k| raw.contains_key(*k))
                {
                    build_primitive(raw, PrimitiveType::String)
                } else if ["minimum", "maximum", "multipleOf"]
                    .iter()
                    .any(|k| raw.contains_key(*k))
                {
                    build_primitive(raw, PrimitiveType::Number)
                } else {
                    SchemaKind::Any
                }
            }
        }
    }

    fn build_object(&mut self, raw: &Map<String, Value>, context: &str) -> SchemaKind {
        let mut properties = BTreeMap::new();
        if let Some(Value::Object(raw_properties)) = raw.get("properties") {
            for (name, raw_property) in raw_properties {
                let node = self.build_schema(raw_property, &format!("{}.properties.{}", context, name));
                properties.insert(name.clone(), node);
            }
        }
        let additional_properties = match raw.get("additionalProperties") {
            None | Some(Value::Bool(true)) => AdditionalProperties::Allowed,
            Some(Value::Bool(false)) => AdditionalProperties::Forbidden,
            Some(schema) => AdditionalProperties::Schema(Box::new(
                self.build_schema(schema, &format!("{}.additionalProperties", context)),
            )),
        };
        SchemaKind::Object(ObjectSchema {
            properties,
            required: string_list(raw.get("required")),
            additional_properties,
        })
    }

    fn build_array(&mut self, raw: &Map<String, Value>, context: &str) -> SchemaKind {
        SchemaKind::Array(ArraySchema {
            items: raw
                .get("items")
                .map(|items| Box::new(self.build_schema(items, &format!("{}.items", context)))),
            min_items: raw.get("minItems").and_then(Value::as_u64),
            max_items: raw.get("maxItems").and_then(Value::as_u64),
            unique_items: flag(raw, "uniqueItems"),
        })
    }

    /// Warn about path keys that appear twice in a JSON source; the parser
    /// keeps only the last one
    fn report_duplicate_keys(&mut self, text: &str) {
        let Ok(probe) = serde_json::from_str::<PathsProbe>(text) else {
            return;
        };
        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        for (path, methods) in &probe.paths.0 {
            let count = seen.entry(path.as_str()).or_default();
            *count += 1;
            if *count == 2 {
                self.notices.push(ValidationIssue::warning(
                    format!("paths.{}", path),
                    "path is declared more than once; the last declaration wins",
                ));
            }
            let mut seen_methods: Vec<&str> = Vec::new();
            for (method, _) in &methods.0 {
                if HttpMethod::ALL.iter().any(|m| m.as_str() == method.as_str()) {
                    if seen_methods.contains(&method.as_str()) {
                        self.notices.push(ValidationIssue::warning(
                            format!("paths.{}.{}", path, method),
                            "operation is declared more than once; the last declaration wins",
                        ));
                    }
                    seen_methods.push(method);
                }
            }
        }
    }

    /// Warn when two templates are the same route under different parameter
    /// names and share a method
    fn report_equivalent_templates(&mut self, paths: &BTreeMap<String, PathItem>) {
        let mut first_by_route: BTreeMap<(String, HttpMethod), &str> = BTreeMap::new();
        for (path, item) in paths {
            let route = normalize_template(path);
            for method in item.operations.keys() {
                match first_by_route.get(&(route.clone(), *method)) {
                    Some(first) => self.notices.push(ValidationIssue::warning(
                        format!("paths.{}.{}", path, method),
                        format!(
                            "duplicate operation: {} {} matches {} {} after normalising path parameters",
                            method.as_str().to_uppercase(),
                            path,
                            method.as_str().to_uppercase(),
                            first
                        ),
                    )),
                    None => {
                        first_by_route.insert((route.clone(), *method), path);
                    }
                }
            }
        }
    }
}

fn build_primitive(raw: &Map<String, Value>, ty: PrimitiveType) -> SchemaKind {
    SchemaKind::Primitive(PrimitiveSchema {
        ty,
        format: scalar_string(raw.get("format")),
        enumeration: raw.get("enum").and_then(Value::as_array).cloned(),
        min_length: raw.get("minLength").and_then(Value::as_u64),
        max_length: raw.get("maxLength").and_then(Value::as_u64),
        pattern: scalar_string(raw.get("pattern")),
        minimum: raw.get("minimum").and_then(Value::as_f64),
        maximum: raw.get("maximum").and_then(Value::as_f64),
        exclusive_minimum: flag(raw, "exclusiveMinimum"),
        exclusive_maximum: flag(raw, "exclusiveMaximum"),
        multiple_of: raw.get("multipleOf").and_then(Value::as_f64),
    })
}

/// Replace every `{name}` in a path template with `{}`
pub fn normalize_template(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len());
    let mut in_param = false;
    for ch in path.chars() {
        match ch {
            '{' => {
                in_param = true;
                normalized.push('{');
            }
            '}' if in_param => {
                in_param = false;
                normalized.push('}');
            }
            _ if in_param => {}
            _ => normalized.push(ch),
        }
    }
    normalized
}

/// Parameter names of a path template in order of appearance
pub fn template_parameters(path: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            break;
        };
        names.push(after[..end].to_string());
        rest = &after[end + 1..];
    }
    names
}

/// Find the 1-based source line of each path key below the `paths` key
fn locate_path_keys<'a>(
    text: &str,
    keys: impl Iterator<Item = &'a String>,
) -> BTreeMap<String, usize> {
    let Ok(paths_key) = Regex::new(r#"^\s*["']?paths["']?\s*:"#) else {
        return BTreeMap::new();
    };
    let lines: Vec<&str> = text.lines().collect();
    let start = lines
        .iter()
        .position(|line| paths_key.is_match(line))
        .map(|index| index + 1)
        .unwrap_or(0);

    let mut found = BTreeMap::new();
    for key in keys {
        let candidates = [format!("\"{}\"", key), format!("'{}'", key), key.clone()];
        let line = lines.iter().enumerate().skip(start).find(|(_, line)| {
            let trimmed = line.trim_start().trim_start_matches(['{', ',']).trim_start();
            candidates.iter().any(|candidate| {
                trimmed
                    .strip_prefix(candidate.as_str())
                    .is_some_and(|rest| rest.trim_start().starts_with(':'))
            })
        });
        if let Some((index, _)) = line {
            found.insert(key.clone(), index + 1);
        }
    }
    found
}

/// Path-scoped issues carry the line of their path key
pub(crate) fn attach_path_line(
    issue: ValidationIssue,
    path_lines: &BTreeMap<String, usize>,
) -> ValidationIssue {
    if issue.line.is_some() {
        return issue;
    }
    let Some(rest) = issue.path.strip_prefix("paths.") else {
        return issue;
    };
    // Longest key first: `/pets/{id}` must win over `/pets`
    let line = path_lines
        .iter()
        .filter(|(key, _)| {
            rest.strip_prefix(key.as_str())
                .is_some_and(|tail| tail.is_empty() || tail.starts_with('.'))
        })
        .max_by_key(|(key, _)| key.len())
        .map(|(_, line)| *line);
    match line {
        Some(line) => issue.with_location(Some(line), Some(1)),
        None => issue,
    }
}

fn section<'a>(
    components: &'a Map<String, Value>,
    name: &str,
) -> impl Iterator<Item = (&'a String, &'a Value)> + use<'a> {
    components
        .get(name)
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|entries| entries.iter())
}

fn reference_of(raw: &Map<String, Value>) -> Option<&str> {
    raw.get("$ref").and_then(Value::as_str)
}

fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn flag(raw: &Map<String, Value>, key: &str) -> bool {
    raw.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|v| scalar_string(Some(v))).collect())
        .unwrap_or_default()
}

#[derive(Deserialize)]
struct PathsProbe {
    paths: KeyOccurrences<KeyOccurrences<IgnoredAny>>,
}

/// Every entry of a mapping in source order, duplicate keys included
struct KeyOccurrences<V>(Vec<(String, V)>);

impl<'de, V: Deserialize<'de>> Deserialize<'de> for KeyOccurrences<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OccurrenceVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OccurrenceVisitor<V> {
            type Value = KeyOccurrences<V>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a mapping")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some(entry) = map.next_entry::<String, V>()? {
                    entries.push(entry);
                }
                Ok(KeyOccurrences(entries))
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
                Ok(KeyOccurrences(Vec::new()))
            }
        }

        deserializer.deserialize_map(OccurrenceVisitor(PhantomData))
    }
}
