//! Validation of concrete payloads and parameters against resolved schemas
//!
//! Type checks are strict: a numeric string is not a number and `1.5` is not
//! an integer. Errors accumulate over the whole value and are reported with a
//! JSON-path style location (`$.items[2].name`).

use std::collections::BTreeSet;

use regex::Regex;
use serde::Serialize;
use serde_json::{Number, Value};
use tracing::debug;

use crate::formats::FormatRegistry;
use crate::model::{
    AdditionalProperties, ArraySchema, ComponentRegistry, CompositeSchema, CompositionKind,
    HttpMethod, ObjectSchema, Operation, Parameter, ParameterLocation, PathItem, PrimitiveSchema,
    PrimitiveType, RefOr,
    Response, SchemaKind, SchemaNode, SpecDocument, preferred_media_type,
};
use crate::resolver;

/// Outcome of one data validation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueValidation {
    pub ok: bool,
    pub errors: Vec<String>,
}

impl ValueValidation {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            ok: errors.is_empty(),
            errors,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self::from_errors(vec![message.into()])
    }
}

/// Validate `value` against an inline schema using the built-in formats
///
/// References cannot be followed without a document; use
/// [`DataValidator::validate_value`] for schemas that contain `$ref`.
pub fn validate_value_against_schema(value: &Value, schema: &SchemaNode) -> ValueValidation {
    let registry = ComponentRegistry::new();
    let formats = FormatRegistry::with_defaults();
    let mut walker = Walker::new(&registry, &formats);
    walker.check(value, schema, "$");
    ValueValidation::from_errors(walker.errors)
}

/// Validates runtime data against the schemas of one document
#[derive(Debug, Clone)]
pub struct DataValidator<'a> {
    doc: &'a SpecDocument,
    formats: FormatRegistry,
}

impl<'a> DataValidator<'a> {
    pub fn new(doc: &'a SpecDocument) -> Self {
        Self {
            doc,
            formats: FormatRegistry::with_defaults(),
        }
    }

    /// Replace the format predicates
    pub fn with_formats(mut self, formats: FormatRegistry) -> Self {
        self.formats = formats;
        self
    }

    pub fn formats_mut(&mut self) -> &mut FormatRegistry {
        &mut self.formats
    }

    pub fn validate_value(&self, value: &Value, schema: &SchemaNode) -> ValueValidation {
        let mut walker = Walker::new(&self.doc.components, &self.formats);
        walker.check(value, schema, "$");
        ValueValidation::from_errors(walker.errors)
    }

    /// Decode a raw parameter string per its declared schema and validate it
    ///
    /// `path` may be a template key (`/pets/{id}`) or a concrete request path
    /// (`/pets/42`).
    pub fn validate_parameter(
        &self,
        method: HttpMethod,
        path: &str,
        name: &str,
        raw: &str,
    ) -> ValueValidation {
        debug!(%method, %path, %name, "Validating parameter");
        let Some((template, item, operation)) = self.find_operation(method, path) else {
            return ValueValidation::failure(format!(
                "no operation {} {} in the document",
                method.as_str().to_uppercase(),
                path
            ));
        };
        let parameter = match self.find_parameter(item, operation, name) {
            Ok(Some(parameter)) => parameter,
            Ok(None) => {
                return ValueValidation::failure(format!(
                    "parameter '{}' is not declared for {} {}",
                    name,
                    method.as_str().to_uppercase(),
                    template
                ));
            }
            Err(err) => return ValueValidation::failure(err.to_string()),
        };
        let Some(schema) = &parameter.schema else {
            return ValueValidation::from_errors(Vec::new());
        };

        let value = match self.decode(raw, schema) {
            Ok(value) => value,
            Err(message) => return ValueValidation::failure(format!("$: {}", message)),
        };
        self.validate_value(&value, schema)
    }

    /// Validate a response body against the schema documented for `status`
    pub fn validate_response_shape(
        &self,
        method: HttpMethod,
        path: &str,
        status: u16,
        body: &Value,
    ) -> ValueValidation {
        debug!(%method, %path, status, "Validating response body");
        let Some((template, _, operation)) = self.find_operation(method, path) else {
            return ValueValidation::failure(format!(
                "no operation {} {} in the document",
                method.as_str().to_uppercase(),
                path
            ));
        };
        let Some(response) = find_response(operation, status) else {
            return ValueValidation::failure(format!(
                "no response documented for status {} on {} {}",
                status,
                method.as_str().to_uppercase(),
                template
            ));
        };
        let response = match resolver::resolve_response(response, &self.doc.components) {
            Ok(response) => response,
            Err(err) => return ValueValidation::failure(err.to_string()),
        };
        match preferred_media_type(&response.content).and_then(|(_, media)| media.schema.as_ref()) {
            Some(schema) => self.validate_value(body, schema),
            None => ValueValidation::from_errors(Vec::new()),
        }
    }

    /// Exact path key first, then the template with the most literal segments
    fn find_operation(
        &self,
        method: HttpMethod,
        path: &str,
    ) -> Option<(&'a str, &'a PathItem, &'a Operation)> {
        let doc = self.doc;
        if let Some((key, item)) = doc.paths.get_key_value(path) {
            return item
                .operations
                .get(&method)
                .map(|operation| (key.as_str(), item, operation));
        }
        doc.paths
            .iter()
            .filter_map(|(template, item)| {
                let literals = template_match(template, path)?;
                let operation = item.operations.get(&method)?;
                Some((literals, template.as_str(), item, operation))
            })
            .max_by_key(|(literals, ..)| *literals)
            .map(|(_, template, item, operation)| (template, item, operation))
    }

    /// Operation parameters win over path-item parameters of the same name;
    /// header names match case-insensitively
    fn find_parameter(
        &self,
        item: &'a PathItem,
        operation: &'a Operation,
        name: &str,
    ) -> crate::error::Result<Option<&'a Parameter>> {
        let doc = self.doc;
        let registry = &doc.components;
        let lookup = |parameters: &'a [RefOr<Parameter>]| -> crate::error::Result<Option<&'a Parameter>> {
            for parameter in parameters {
                let parameter = resolver::resolve_parameter(parameter, registry)?;
                let matches = match parameter.location {
                    ParameterLocation::Header => parameter.name.eq_ignore_ascii_case(name),
                    _ => parameter.name == name,
                };
                if matches {
                    return Ok(Some(parameter));
                }
            }
            Ok(None)
        };
        match lookup(operation.parameters.as_slice())? {
            Some(parameter) => Ok(Some(parameter)),
            None => lookup(item.parameters.as_slice()),
        }
    }

    fn decode(&self, raw: &str, schema: &SchemaNode) -> Result<Value, String> {
        let schema = resolver::resolve_concrete(schema, &self.doc.components).map_err(|e| e.to_string())?;
        match &schema.kind {
            SchemaKind::Primitive(primitive) => decode_primitive(raw, primitive.ty),
            SchemaKind::Array(ArraySchema { items, .. }) => {
                if raw.is_empty() {
                    return Ok(Value::Array(Vec::new()));
                }
                raw.split(',')
                    .map(|part| match items {
                        Some(items) => self.decode(part, items),
                        None => Ok(Value::String(part.to_string())),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            SchemaKind::Object(_) => serde_json::from_str(raw)
                .map_err(|e| format!("'{}' is not a valid JSON object: {}", raw, e)),
            SchemaKind::Composite(_) => {
                Ok(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())))
            }
            SchemaKind::Any | SchemaKind::Reference(_) => Ok(Value::String(raw.to_string())),
        }
    }
}

fn decode_primitive(raw: &str, ty: PrimitiveType) -> Result<Value, String> {
    match ty {
        PrimitiveType::String => Ok(Value::String(raw.to_string())),
        PrimitiveType::Integer => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("'{}' is not a valid integer", raw)),
        PrimitiveType::Number => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("'{}' is not a valid number", raw)),
        PrimitiveType::Boolean => match raw {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("'{}' is not a valid boolean", raw)),
        },
    }
}

/// Number of literal segments when `path` matches `template`, else `None`
fn template_match(template: &str, path: &str) -> Option<usize> {
    let template_segments: Vec<&str> = template.split('/').collect();
    let path_segments: Vec<&str> = path.split('/').collect();
    if template_segments.len() != path_segments.len() {
        return None;
    }
    let mut literals = 0;
    for (pattern, segment) in template_segments.iter().zip(&path_segments) {
        if pattern.starts_with('{') && pattern.ends_with('}') {
            if segment.is_empty() {
                return None;
            }
        } else if pattern == segment {
            literals += 1;
        } else {
            return None;
        }
    }
    Some(literals)
}

/// Exact status code, then its `NXX` range, then `default`
fn find_response(operation: &Operation, status: u16) -> Option<&RefOr<Response>> {
    let code = status.to_string();
    let range = format!("{}XX", status / 100);
    operation
        .responses
        .get(&code)
        .or_else(|| {
            operation
                .responses
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(&range))
                .map(|(_, response)| response)
        })
        .or_else(|| operation.responses.get("default"))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_integer(n: &Number) -> bool {
    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
}

/// Recursive schema walk accumulating errors
struct Walker<'r> {
    registry: &'r ComponentRegistry,
    formats: &'r FormatRegistry,
    /// (reference, instance path) pairs currently being expanded
    expanding: BTreeSet<(String, String)>,
    errors: Vec<String>,
}

impl<'r> Walker<'r> {
    fn new(registry: &'r ComponentRegistry, formats: &'r FormatRegistry) -> Self {
        Self {
            registry,
            formats,
            expanding: BTreeSet::new(),
            errors: Vec::new(),
        }
    }

    fn error(&mut self, at: &str, message: impl std::fmt::Display) {
        self.errors.push(format!("{}: {}", at, message));
    }

    fn check(&mut self, value: &Value, schema: &SchemaNode, at: &str) {
        if let SchemaKind::Reference(reference) = &schema.kind {
            let key = (reference.pointer.clone(), at.to_string());
            // A schema that re-enters itself without consuming input
            if !self.expanding.insert(key.clone()) {
                return;
            }
            match resolver::resolve_shallow(schema, self.registry) {
                Ok(target) => self.check(value, target, at),
                Err(err) => self.error(at, err),
            }
            self.expanding.remove(&key);
            return;
        }

        if value.is_null() {
            if !schema.nullable && !matches!(schema.kind, SchemaKind::Any | SchemaKind::Composite(_)) {
                self.error(at, format!("expected {}, found null", schema.kind.label()));
            }
            if schema.nullable || !matches!(schema.kind, SchemaKind::Composite(_)) {
                return;
            }
        }

        match &schema.kind {
            SchemaKind::Any | SchemaKind::Reference(_) => {}
            SchemaKind::Primitive(primitive) => self.check_primitive(value, primitive, at),
            SchemaKind::Object(object) => self.check_object(value, object, at),
            SchemaKind::Array(array) => self.check_array(value, array, at),
            SchemaKind::Composite(composite) => self.check_composite(value, composite, at),
        }
    }

    fn check_primitive(&mut self, value: &Value, schema: &PrimitiveSchema, at: &str) {
        let type_ok = match (schema.ty, value) {
            (PrimitiveType::String, Value::String(_)) => true,
            (PrimitiveType::Boolean, Value::Bool(_)) => true,
            (PrimitiveType::Number, Value::Number(_)) => true,
            (PrimitiveType::Integer, Value::Number(n)) => is_integer(n),
            _ => false,
        };
        if !type_ok {
            self.error(
                at,
                format!("expected {}, found {}", schema.ty.as_str(), type_name(value)),
            );
            return;
        }

        if let Some(allowed) = &schema.enumeration
            && !allowed.contains(value)
        {
            let rendered = Value::Array(allowed.clone());
            self.error(at, format!("value {} is not one of {}", value, rendered));
        }
        if let Some(format) = &schema.format
            && !self.formats.check(format, value)
        {
            self.error(at, format!("value {} is not a valid {}", value, format));
        }

        match value {
            Value::String(s) => self.check_string(s, schema, at),
            Value::Number(n) => self.check_number(n, schema, at),
            _ => {}
        }
    }

    fn check_string(&mut self, s: &str, schema: &PrimitiveSchema, at: &str) {
        let length = s.chars().count() as u64;
        if let Some(min) = schema.min_length
            && length < min
        {
            self.error(at, format!("length {} is less than minLength {}", length, min));
        }
        if let Some(max) = schema.max_length
            && length > max
        {
            self.error(at, format!("length {} is greater than maxLength {}", length, max));
        }
        if let Some(pattern) = &schema.pattern {
            match Regex::new(pattern) {
                Ok(regex) if !regex.is_match(s) => {
                    self.error(at, format!("'{}' does not match pattern {}", s, pattern))
                }
                Ok(_) => {}
                Err(err) => self.error(at, format!("invalid pattern {}: {}", pattern, err)),
            }
        }
    }

    fn check_number(&mut self, n: &Number, schema: &PrimitiveSchema, at: &str) {
        let Some(x) = n.as_f64() else {
            return;
        };
        if let Some(min) = schema.minimum {
            let below = if schema.exclusive_minimum { x <= min } else { x < min };
            if below {
                let relation = if schema.exclusive_minimum { "exclusive minimum" } else { "minimum" };
                self.error(at, format!("{} is below {} {}", n, relation, min));
            }
        }
        if let Some(max) = schema.maximum {
            let above = if schema.exclusive_maximum { x >= max } else { x > max };
            if above {
                let relation = if schema.exclusive_maximum { "exclusive maximum" } else { "maximum" };
                self.error(at, format!("{} is above {} {}", n, relation, max));
            }
        }
        if let Some(step) = schema.multiple_of
            && step > 0.0
        {
            let quotient = x / step;
            if (quotient - quotient.round()).abs() > 1e-9 {
                self.error(at, format!("{} is not a multiple of {}", n, step));
            }
        }
    }

    fn check_object(&mut self, value: &Value, schema: &ObjectSchema, at: &str) {
        let Value::Object(map) = value else {
            self.error(at, format!("expected object, found {}", type_name(value)));
            return;
        };
        for name in &schema.required {
            if !map.contains_key(name) {
                self.error(at, format!("missing required property '{}'", name));
            }
        }
        for (key, item) in map {
            let child = format!("{}.{}", at, key);
            match schema.properties.get(key) {
                Some(property) => self.check(item, property, &child),
                None => match &schema.additional_properties {
                    AdditionalProperties::Allowed => {}
                    AdditionalProperties::Forbidden => {
                        self.error(at, format!("unexpected property '{}'", key))
                    }
                    AdditionalProperties::Schema(extra) => self.check(item, extra, &child),
                },
            }
        }
    }

    fn check_array(&mut self, value: &Value, schema: &ArraySchema, at: &str) {
        let Value::Array(items) = value else {
            self.error(at, format!("expected array, found {}", type_name(value)));
            return;
        };
        let count = items.len() as u64;
        if let Some(min) = schema.min_items
            && count < min
        {
            self.error(at, format!("{} items is fewer than minItems {}", count, min));
        }
        if let Some(max) = schema.max_items
            && count > max
        {
            self.error(at, format!("{} items is more than maxItems {}", count, max));
        }
        if schema.unique_items {
            let duplicated = items
                .iter()
                .enumerate()
                .any(|(i, item)| items[..i].contains(item));
            if duplicated {
                self.error(at, "items are not unique");
            }
        }
        if let Some(item_schema) = &schema.items {
            for (index, item) in items.iter().enumerate() {
                self.check(item, item_schema, &format!("{}[{}]", at, index));
            }
        }
    }

    fn check_composite(&mut self, value: &Value, schema: &CompositeSchema, at: &str) {
        match schema.kind {
            CompositionKind::AllOf => {
                for branch in &schema.branches {
                    self.check(value, branch, at);
                }
            }
            CompositionKind::AnyOf | CompositionKind::OneOf => {
                let mut matching = 0;
                let mut branch_errors = Vec::new();
                for branch in &schema.branches {
                    let errors = self.branch_errors(value, branch, at);
                    if errors.is_empty() {
                        matching += 1;
                    } else {
                        branch_errors.extend(errors);
                    }
                }
                let keyword = schema.kind.as_str();
                if matching == 0 {
                    self.error(at, format!("value does not match any {} branch", keyword));
                    self.errors.extend(branch_errors);
                } else if schema.kind == CompositionKind::OneOf && matching > 1 {
                    self.error(
                        at,
                        format!("value matches {} oneOf branches, expected exactly one", matching),
                    );
                }
            }
        }
    }

    /// Errors one branch would produce, without recording them
    fn branch_errors(&mut self, value: &Value, branch: &SchemaNode, at: &str) -> Vec<String> {
        let saved = std::mem::take(&mut self.errors);
        self.check(value, branch, at);
        std::mem::replace(&mut self.errors, saved)
    }
}
