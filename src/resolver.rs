//! `$ref` resolution against the component registry
//!
//! Resolution never treats a dangling pointer as absent: every failure is a
//! [`SpecError::UnresolvedReference`]. Cycles are not errors; deep resolution
//! returns [`Resolved::Cycle`] and lets the caller decide what it means.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, SpecError};
use crate::model::{
    ComponentRef, ComponentRegistry, Parameter, RefOr, RequestBody, Response, SchemaId,
    SchemaKind, SchemaNode,
};

/// Outcome of following a reference chain to its end
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a> {
    /// A node that is not itself a reference
    Concrete(&'a SchemaNode),
    /// The chain reached a schema already in the visited set
    Cycle(&'a str),
}

/// Registry identity of the schema a reference points to
pub fn target_id(reference: &ComponentRef, registry: &ComponentRegistry) -> Result<SchemaId> {
    let Some(name) = reference.name.as_deref() else {
        return Err(SpecError::UnresolvedReference {
            reference: reference.pointer.clone(),
            reason: "only local references into #/components/schemas are supported".to_string(),
        });
    };
    registry
        .schema_id(name)
        .ok_or_else(|| SpecError::UnresolvedReference {
            reference: reference.pointer.clone(),
            reason: format!("no schema named '{}' in components.schemas", name),
        })
}

/// Follow at most one `$ref` hop
///
/// Non-reference nodes are returned unchanged; the returned node may itself be
/// a reference when the target is an alias.
pub fn resolve_shallow<'a>(
    node: &'a SchemaNode,
    registry: &'a ComponentRegistry,
) -> Result<&'a SchemaNode> {
    match &node.kind {
        SchemaKind::Reference(reference) => {
            let id = target_id(reference, registry)?;
            Ok(registry.node(id))
        }
        _ => Ok(node),
    }
}

/// Follow `$ref` hops until a concrete node or a cycle
///
/// Every schema name passed through is added to `visited`; reaching a name
/// that is already present yields [`Resolved::Cycle`].
pub fn resolve_deep<'a>(
    node: &'a SchemaNode,
    registry: &'a ComponentRegistry,
    visited: &mut BTreeSet<String>,
) -> Result<Resolved<'a>> {
    let mut current = node;
    while let SchemaKind::Reference(reference) = &current.kind {
        let id = target_id(reference, registry)?;
        let name = registry.name(id);
        if !visited.insert(name.to_string()) {
            return Ok(Resolved::Cycle(name));
        }
        current = registry.node(id);
    }
    Ok(Resolved::Concrete(current))
}

/// Resolve a chain of references with a fresh visited set, treating a pure
/// alias loop (`A: {$ref: B}`, `B: {$ref: A}`) as unresolvable
pub fn resolve_concrete<'a>(
    node: &'a SchemaNode,
    registry: &'a ComponentRegistry,
) -> Result<&'a SchemaNode> {
    let mut visited = BTreeSet::new();
    match resolve_deep(node, registry, &mut visited)? {
        Resolved::Concrete(node) => Ok(node),
        Resolved::Cycle(name) => Err(SpecError::UnresolvedReference {
            reference: format!("#/components/schemas/{}", name),
            reason: "reference chain loops without reaching a definition".to_string(),
        }),
    }
}

pub fn resolve_parameter<'a>(
    item: &'a RefOr<Parameter>,
    registry: &'a ComponentRegistry,
) -> Result<&'a Parameter> {
    resolve_component(item, &registry.parameters, "parameters")
}

pub fn resolve_request_body<'a>(
    item: &'a RefOr<RequestBody>,
    registry: &'a ComponentRegistry,
) -> Result<&'a RequestBody> {
    resolve_component(item, &registry.request_bodies, "requestBodies")
}

pub fn resolve_response<'a>(
    item: &'a RefOr<Response>,
    registry: &'a ComponentRegistry,
) -> Result<&'a Response> {
    resolve_component(item, &registry.responses, "responses")
}

fn resolve_component<'a, T>(
    item: &'a RefOr<T>,
    section: &'a BTreeMap<String, T>,
    section_name: &str,
) -> Result<&'a T> {
    match item {
        RefOr::Item(item) => Ok(item),
        RefOr::Ref(reference) => {
            let Some(name) = reference.name.as_deref() else {
                return Err(SpecError::UnresolvedReference {
                    reference: reference.pointer.clone(),
                    reason: format!(
                        "only local references into #/components/{} are supported",
                        section_name
                    ),
                });
            };
            section
                .get(name)
                .ok_or_else(|| SpecError::UnresolvedReference {
                    reference: reference.pointer.clone(),
                    reason: format!("no entry named '{}' in components.{}", name, section_name),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ParameterLocation, PrimitiveType};

    fn registry(entries: Vec<(&str, SchemaNode)>) -> ComponentRegistry {
        ComponentRegistry::with_schemas(
            entries
                .into_iter()
                .map(|(name, node)| (name.to_string(), node))
                .collect(),
        )
    }

    #[test]
    fn test_shallow_follows_one_hop() {
        let registry = registry(vec![
            ("Alias", SchemaNode::reference("Name")),
            ("Name", SchemaNode::primitive(PrimitiveType::String)),
        ]);
        let node = SchemaNode::reference("Alias");

        let first = resolve_shallow(&node, &registry).unwrap();
        assert!(first.is_reference());
        let second = resolve_shallow(first, &registry).unwrap();
        assert_eq!(second.kind.label(), "string");
    }

    #[test]
    fn test_shallow_returns_concrete_nodes_unchanged() {
        let registry = registry(Vec::new());
        let node = SchemaNode::primitive(PrimitiveType::Integer);
        assert!(std::ptr::eq(resolve_shallow(&node, &registry).unwrap(), &node));
    }

    #[test]
    fn test_missing_target_is_an_error() {
        let registry = registry(Vec::new());
        let node = SchemaNode::reference("Ghost");
        match resolve_shallow(&node, &registry) {
            Err(SpecError::UnresolvedReference { reference, reason }) => {
                assert_eq!(reference, "#/components/schemas/Ghost");
                assert!(reason.contains("Ghost"));
            }
            other => panic!("Expected UnresolvedReference, got {:?}", other),
        }
    }

    #[test]
    fn test_external_reference_is_an_error() {
        let registry = registry(Vec::new());
        let node = SchemaNode::new(SchemaKind::Reference(ComponentRef::parse(
            "other.yaml#/components/schemas/Pet",
            "schemas",
        )));
        assert!(matches!(
            resolve_shallow(&node, &registry),
            Err(SpecError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_deep_records_visited_names() {
        let registry = registry(vec![
            ("A", SchemaNode::reference("B")),
            ("B", SchemaNode::primitive(PrimitiveType::Boolean)),
        ]);
        let mut visited = BTreeSet::new();
        let start = SchemaNode::reference("A");
        let resolved = resolve_deep(&start, &registry, &mut visited).unwrap();
        match resolved {
            Resolved::Concrete(node) => assert_eq!(node.kind.label(), "boolean"),
            Resolved::Cycle(_) => panic!("Expected a concrete node"),
        }
        assert!(visited.contains("A"));
        assert!(visited.contains("B"));
    }

    #[test]
    fn test_deep_reports_cycle_as_sentinel() {
        let registry = registry(vec![
            ("A", SchemaNode::reference("B")),
            ("B", SchemaNode::reference("A")),
        ]);
        let mut visited = BTreeSet::new();
        let start = SchemaNode::reference("A");
        let resolved = resolve_deep(&start, &registry, &mut visited).unwrap();
        assert_eq!(resolved, Resolved::Cycle("A"));

        assert!(matches!(
            resolve_concrete(&SchemaNode::reference("A"), &registry),
            Err(SpecError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_deep_honours_caller_visited_set() {
        let registry = registry(vec![("A", SchemaNode::any())]);
        let mut visited = BTreeSet::from(["A".to_string()]);
        let start = SchemaNode::reference("A");
        let resolved = resolve_deep(&start, &registry, &mut visited).unwrap();
        assert_eq!(resolved, Resolved::Cycle("A"));
    }

    #[test]
    fn test_component_resolution() {
        let mut registry = registry(Vec::new());
        registry.parameters.insert(
            "limit".to_string(),
            Parameter {
                name: "limit".to_string(),
                location: ParameterLocation::Query,
                required: false,
                schema: None,
                description: None,
                deprecated: false,
                example: None,
            },
        );

        let by_ref = RefOr::Ref(ComponentRef::parse("#/components/parameters/limit", "parameters"));
        assert_eq!(resolve_parameter(&by_ref, &registry).unwrap().name, "limit");

        let missing = RefOr::Ref(ComponentRef::parse("#/components/parameters/offset", "parameters"));
        assert!(resolve_parameter(&missing, &registry).is_err());

        let response: RefOr<Response> =
            RefOr::Ref(ComponentRef::parse("#/components/responses/NotFound", "responses"));
        match resolve_response(&response, &registry) {
            Err(SpecError::UnresolvedReference { reason, .. }) => {
                assert!(reason.contains("components.responses"))
            }
            _ => panic!("Expected UnresolvedReference"),
        }
    }
}
