//! Typed OpenAPI 3.0 object model
//!
//! A [`SpecDocument`] is built once by the loader and is read-only afterwards.
//! Named schemas live in the [`ComponentRegistry`] arena; a
//! [`SchemaKind::Reference`] only names its target and never owns it, so two
//! references to the same component always resolve to the same [`SchemaId`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::findings::ValidationIssue;

/// Root of a loaded specification document
#[derive(Debug, Clone)]
pub struct SpecDocument {
    /// Value of the top-level `openapi` field
    pub openapi: Option<String>,
    pub info: Info,
    pub paths: BTreeMap<String, PathItem>,
    pub components: ComponentRegistry,
    /// Document-level security requirements
    pub security: Vec<SecurityRequirement>,
    /// Findings recorded while building the model (unknown types, duplicate routes, ...)
    pub notices: Vec<ValidationIssue>,
    /// 1-based line of each path key in the source text
    pub path_lines: BTreeMap<String, usize>,
}

impl SpecDocument {
    /// Look up an operation by path template and method
    pub fn operation(&self, path: &str, method: HttpMethod) -> Option<&Operation> {
        self.paths.get(path).and_then(|item| item.operations.get(&method))
    }

    /// Iterate over every (path, method, operation) triple in deterministic order
    pub fn operations(&self) -> impl Iterator<Item = (&str, HttpMethod, &Operation)> {
        self.paths.iter().flat_map(|(path, item)| {
            item.operations
                .iter()
                .map(move |(method, op)| (path.as_str(), *method, op))
        })
    }

    /// Line of the path key in the source document, if recorded
    pub fn line_of_path(&self, path: &str) -> Option<usize> {
        self.path_lines.get(path).copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Info {
    pub title: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
}

/// HTTP methods an OpenAPI path item may carry, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Put,
        HttpMethod::Post,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Head,
        HttpMethod::Patch,
        HttpMethod::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Put => "put",
            HttpMethod::Post => "post",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
            HttpMethod::Patch => "patch",
            HttpMethod::Trace => "trace",
        }
    }

    /// Parse a method name case-insensitively
    pub fn parse(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        Self::ALL.into_iter().find(|m| m.as_str() == lower)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathItem {
    pub summary: Option<String>,
    pub description: Option<String>,
    /// Parameters shared by every operation on this path
    pub parameters: Vec<RefOr<Parameter>>,
    pub operations: BTreeMap<HttpMethod, Operation>,
}

#[derive(Debug, Clone, Default)]
pub struct Operation {
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub deprecated: bool,
    pub tags: Vec<String>,
    pub parameters: Vec<RefOr<Parameter>>,
    pub request_body: Option<RefOr<RequestBody>>,
    /// Keyed by status code (`200`, `4XX`, `default`)
    pub responses: BTreeMap<String, RefOr<Response>>,
    /// `None` inherits the document-level requirements
    pub security: Option<Vec<SecurityRequirement>>,
}

/// Either an inline definition or a `$ref` to a named component
#[derive(Debug, Clone, PartialEq)]
pub enum RefOr<T> {
    Ref(ComponentRef),
    Item(T),
}

impl<T> RefOr<T> {
    pub fn as_item(&self) -> Option<&T> {
        match self {
            RefOr::Item(item) => Some(item),
            RefOr::Ref(_) => None,
        }
    }
}

/// A `$ref` pointer into `#/components/<section>/<name>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentRef {
    /// The pointer exactly as written in the document
    pub pointer: String,
    /// Target component name; `None` when the pointer is external or malformed
    pub name: Option<String>,
}

impl ComponentRef {
    /// Parse a pointer expected to target the given components section
    pub fn parse(pointer: &str, section: &str) -> Self {
        let prefix = format!("#/components/{}/", section);
        let name = pointer
            .strip_prefix(&prefix)
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(|rest| rest.replace("~1", "/").replace("~0", "~"));
        Self {
            pointer: pointer.to_string(),
            name,
        }
    }

    /// Build a reference to a named schema
    pub fn schema(name: &str) -> Self {
        let escaped = name.replace('~', "~0").replace('/', "~1");
        Self {
            pointer: format!("#/components/schemas/{}", escaped),
            name: Some(name.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Header,
    Path,
    Cookie,
}

impl ParameterLocation {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "query" => Some(ParameterLocation::Query),
            "header" => Some(ParameterLocation::Header),
            "path" => Some(ParameterLocation::Path),
            "cookie" => Some(ParameterLocation::Cookie),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Path => "path",
            ParameterLocation::Cookie => "cookie",
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Option<SchemaNode>,
    pub description: Option<String>,
    pub deprecated: bool,
    pub example: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct RequestBody {
    pub description: Option<String>,
    pub required: bool,
    /// Keyed by media type
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, Default)]
pub struct Response {
    pub description: Option<String>,
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, Default)]
pub struct MediaType {
    pub schema: Option<SchemaNode>,
    pub example: Option<Value>,
    /// Whether a non-empty `examples` map was present
    pub has_examples: bool,
}

/// Pick the JSON media type of a content map: `application/json`, then any
/// `+json` type, then the first entry
pub fn preferred_media_type(content: &BTreeMap<String, MediaType>) -> Option<(&str, &MediaType)> {
    content
        .get_key_value("application/json")
        .or_else(|| content.iter().find(|(name, _)| name.ends_with("+json")))
        .or_else(|| content.iter().next())
        .map(|(name, media)| (name.as_str(), media))
}

/// Scheme name → required scopes
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq)]
pub struct SecurityScheme {
    /// The scheme's `type` (`apiKey`, `http`, `oauth2`, `openIdConnect`)
    pub scheme_type: Option<String>,
    pub description: Option<String>,
}

/// A schema definition: exactly one structural variant plus shared annotations
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: SchemaKind,
    pub nullable: bool,
    pub description: Option<String>,
    pub example: Option<Value>,
    pub deprecated: bool,
}

impl SchemaNode {
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            nullable: false,
            description: None,
            example: None,
            deprecated: false,
        }
    }

    pub fn reference(name: &str) -> Self {
        Self::new(SchemaKind::Reference(ComponentRef::schema(name)))
    }

    pub fn primitive(ty: PrimitiveType) -> Self {
        Self::new(SchemaKind::Primitive(PrimitiveSchema::new(ty)))
    }

    pub fn any() -> Self {
        Self::new(SchemaKind::Any)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, SchemaKind::Reference(_))
    }

    /// Direct children of this node (properties, items, branches)
    pub fn children(&self) -> Vec<&SchemaNode> {
        match &self.kind {
            SchemaKind::Object(object) => {
                let mut children: Vec<&SchemaNode> = object.properties.values().collect();
                if let AdditionalProperties::Schema(schema) = &object.additional_properties {
                    children.push(schema);
                }
                children
            }
            SchemaKind::Array(array) => array.items.iter().map(|b| b.as_ref()).collect(),
            SchemaKind::Composite(composite) => composite.branches.iter().collect(),
            SchemaKind::Primitive(_) | SchemaKind::Reference(_) | SchemaKind::Any => Vec::new(),
        }
    }

    /// Every `$ref` reachable inside this node without following references,
    /// in first-occurrence order
    pub fn references(&self) -> Vec<&ComponentRef> {
        let mut found = Vec::new();
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            if let SchemaKind::Reference(reference) = &node.kind {
                found.push(reference);
                continue;
            }
            let children = node.children();
            pending.extend(children.into_iter().rev());
        }
        found
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    /// Non-owning pointer to a named schema in the registry
    Reference(ComponentRef),
    Primitive(PrimitiveSchema),
    Object(ObjectSchema),
    Array(ArraySchema),
    Composite(CompositeSchema),
    /// No type constraint at all (`{}`)
    Any,
}

impl SchemaKind {
    /// Short label used in diagnostics and snapshots
    pub fn label(&self) -> String {
        match self {
            SchemaKind::Reference(reference) => format!("$ref {}", reference.pointer),
            SchemaKind::Primitive(primitive) => primitive.ty.as_str().to_string(),
            SchemaKind::Object(_) => "object".to_string(),
            SchemaKind::Array(_) => "array".to_string(),
            SchemaKind::Composite(composite) => composite.kind.as_str().to_string(),
            SchemaKind::Any => "any".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    String,
    Number,
    Integer,
    Boolean,
}

impl PrimitiveType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "string" => Some(PrimitiveType::String),
            "number" => Some(PrimitiveType::Number),
            "integer" => Some(PrimitiveType::Integer),
            "boolean" => Some(PrimitiveType::Boolean),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveType::String => "string",
            PrimitiveType::Number => "number",
            PrimitiveType::Integer => "integer",
            PrimitiveType::Boolean => "boolean",
        }
    }

    /// Infer a type from a literal, used for `enum` without `type`
    pub fn of_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(_) => Some(PrimitiveType::String),
            Value::Bool(_) => Some(PrimitiveType::Boolean),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(PrimitiveType::Integer),
            Value::Number(_) => Some(PrimitiveType::Number),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveSchema {
    pub ty: PrimitiveType,
    pub format: Option<String>,
    pub enumeration: Option<Vec<Value>>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: bool,
    pub exclusive_maximum: bool,
    pub multiple_of: Option<f64>,
}

impl PrimitiveSchema {
    pub fn new(ty: PrimitiveType) -> Self {
        Self {
            ty,
            format: None,
            enumeration: None,
            min_length: None,
            max_length: None,
            pattern: None,
            minimum: None,
            maximum: None,
            exclusive_minimum: false,
            exclusive_maximum: false,
            multiple_of: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectSchema {
    pub properties: BTreeMap<String, SchemaNode>,
    /// Required property names in declaration order
    pub required: Vec<String>,
    pub additional_properties: AdditionalProperties,
}

impl ObjectSchema {
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum AdditionalProperties {
    #[default]
    Allowed,
    Forbidden,
    Schema(Box<SchemaNode>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArraySchema {
    pub items: Option<Box<SchemaNode>>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionKind {
    AllOf,
    OneOf,
    AnyOf,
}

impl CompositionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositionKind::AllOf => "allOf",
            CompositionKind::OneOf => "oneOf",
            CompositionKind::AnyOf => "anyOf",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeSchema {
    pub kind: CompositionKind,
    pub branches: Vec<SchemaNode>,
}

/// Index of a named schema inside the registry arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaId(usize);

impl SchemaId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Exclusive owner of every named component
///
/// Schemas are stored in an arena ordered by name so that identity is a plain
/// index and traversals are deterministic.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    schema_names: Vec<String>,
    schema_nodes: Vec<SchemaNode>,
    schema_index: BTreeMap<String, SchemaId>,
    pub parameters: BTreeMap<String, Parameter>,
    pub request_bodies: BTreeMap<String, RequestBody>,
    pub responses: BTreeMap<String, Response>,
    pub security_schemes: BTreeMap<String, SecurityScheme>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the schema arena from named definitions
    pub fn with_schemas(schemas: BTreeMap<String, SchemaNode>) -> Self {
        let mut registry = Self::new();
        for (name, node) in schemas {
            let id = SchemaId(registry.schema_nodes.len());
            registry.schema_index.insert(name.clone(), id);
            registry.schema_names.push(name);
            registry.schema_nodes.push(node);
        }
        registry
    }

    pub fn schema_count(&self) -> usize {
        self.schema_nodes.len()
    }

    pub fn schema_id(&self, name: &str) -> Option<SchemaId> {
        self.schema_index.get(name).copied()
    }

    pub fn schema(&self, name: &str) -> Option<&SchemaNode> {
        self.schema_id(name).map(|id| self.node(id))
    }

    pub fn node(&self, id: SchemaId) -> &SchemaNode {
        &self.schema_nodes[id.0]
    }

    pub fn name(&self, id: SchemaId) -> &str {
        &self.schema_names[id.0]
    }

    pub fn schema_ids(&self) -> impl Iterator<Item = SchemaId> + use<> {
        (0..self.schema_nodes.len()).map(SchemaId)
    }

    /// Named schemas in name order
    pub fn schemas(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.schema_names
            .iter()
            .map(String::as_str)
            .zip(self.schema_nodes.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_with(properties: Vec<(&str, SchemaNode)>) -> SchemaNode {
        SchemaNode::new(SchemaKind::Object(ObjectSchema {
            properties: properties
                .into_iter()
                .map(|(name, node)| (name.to_string(), node))
                .collect(),
            required: Vec::new(),
            additional_properties: AdditionalProperties::Allowed,
        }))
    }

    #[test]
    fn test_component_ref_parsing() {
        let reference = ComponentRef::parse("#/components/schemas/Pet", "schemas");
        assert_eq!(reference.name.as_deref(), Some("Pet"));

        let escaped = ComponentRef::parse("#/components/schemas/a~1b~0c", "schemas");
        assert_eq!(escaped.name.as_deref(), Some("a/b~c"));

        let wrong_section = ComponentRef::parse("#/components/responses/NotFound", "schemas");
        assert!(wrong_section.name.is_none());

        let external = ComponentRef::parse("common.yaml#/components/schemas/Pet", "schemas");
        assert!(external.name.is_none());
        assert_eq!(external.pointer, "common.yaml#/components/schemas/Pet");
    }

    #[test]
    fn test_component_ref_schema_round_trip() {
        let reference = ComponentRef::schema("a/b");
        assert_eq!(reference.pointer, "#/components/schemas/a~1b");
        assert_eq!(
            ComponentRef::parse(&reference.pointer, "schemas").name.as_deref(),
            Some("a/b")
        );
    }

    #[test]
    fn test_http_method_parse_and_order() {
        assert_eq!(HttpMethod::parse("GET"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::parse("patch"), Some(HttpMethod::Patch));
        assert_eq!(HttpMethod::parse("connect"), None);
        assert!(HttpMethod::Get < HttpMethod::Post);
    }

    #[test]
    fn test_registry_arena_is_name_ordered() {
        let mut schemas = BTreeMap::new();
        schemas.insert("Zebra".to_string(), SchemaNode::any());
        schemas.insert("Apple".to_string(), SchemaNode::any());
        let registry = ComponentRegistry::with_schemas(schemas);

        let names: Vec<&str> = registry.schemas().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Apple", "Zebra"]);
        let id = registry.schema_id("Zebra").unwrap();
        assert_eq!(registry.name(id), "Zebra");
        assert_eq!(id.index(), 1);
        assert!(registry.schema("Missing").is_none());
    }

    #[test]
    fn test_references_walks_nested_structure() {
        let node = object_with(vec![
            ("owner", SchemaNode::reference("Person")),
            (
                "tags",
                SchemaNode::new(SchemaKind::Array(ArraySchema {
                    items: Some(Box::new(SchemaNode::reference("Tag"))),
                    ..ArraySchema::default()
                })),
            ),
            (
                "shape",
                SchemaNode::new(SchemaKind::Composite(CompositeSchema {
                    kind: CompositionKind::OneOf,
                    branches: vec![SchemaNode::reference("Circle"), SchemaNode::any()],
                })),
            ),
        ]);

        let names: Vec<&str> = node
            .references()
            .into_iter()
            .filter_map(|r| r.name.as_deref())
            .collect();
        assert_eq!(names, vec!["Person", "Circle", "Tag"]);
    }

    #[test]
    fn test_preferred_media_type() {
        let mut content = BTreeMap::new();
        content.insert("text/plain".to_string(), MediaType::default());
        content.insert("application/problem+json".to_string(), MediaType::default());
        assert_eq!(
            preferred_media_type(&content).map(|(name, _)| name),
            Some("application/problem+json")
        );

        content.insert("application/json".to_string(), MediaType::default());
        assert_eq!(
            preferred_media_type(&content).map(|(name, _)| name),
            Some("application/json")
        );
    }

    #[test]
    fn test_primitive_type_inference() {
        assert_eq!(
            PrimitiveType::of_value(&serde_json::json!("a")),
            Some(PrimitiveType::String)
        );
        assert_eq!(
            PrimitiveType::of_value(&serde_json::json!(3)),
            Some(PrimitiveType::Integer)
        );
        assert_eq!(
            PrimitiveType::of_value(&serde_json::json!(3.5)),
            Some(PrimitiveType::Number)
        );
        assert_eq!(PrimitiveType::of_value(&serde_json::json!(null)), None);
    }
}
