//! Circular reference detection over the component schema graph
//!
//! Every named schema is a vertex; `A -> B` exists when A's definition
//! references B anywhere in its properties, items or composition branches.
//! The traversal is an explicit-stack DFS with three-state marking, so each
//! edge is followed at most once and deep graphs cannot overflow the call
//! stack.

use tracing::debug;

use crate::cancel::CancellationToken;
use crate::error::{Result, SpecError};
use crate::findings::{CheckResult, CircularReference, ValidationIssue};
use crate::model::{ComponentRegistry, SchemaId, SpecDocument};
use crate::resolver::target_id;

/// Name under which cycle detection results are reported
pub const CIRCULAR_CHECK: &str = "circular-references";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Adjacency lists indexed by [`SchemaId`]
#[derive(Debug, Clone)]
pub struct SchemaGraph {
    edges: Vec<Vec<SchemaId>>,
}

impl SchemaGraph {
    /// Build the reference graph; references that do not resolve are left out
    pub fn build(registry: &ComponentRegistry) -> Self {
        let edges = registry
            .schema_ids()
            .map(|id| {
                let mut targets: Vec<SchemaId> = Vec::new();
                for reference in registry.node(id).references() {
                    if let Ok(target) = target_id(reference, registry)
                        && !targets.contains(&target)
                    {
                        targets.push(target);
                    }
                }
                targets
            })
            .collect();
        Self { edges }
    }

    pub fn targets(&self, id: SchemaId) -> &[SchemaId] {
        &self.edges[id.index()]
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }
}

/// Find every cycle reachable by the DFS, in deterministic order
pub fn find_cycles(
    registry: &ComponentRegistry,
    cancel: &CancellationToken,
) -> Result<Vec<CircularReference>> {
    let graph = SchemaGraph::build(registry);
    let mut marks = vec![Mark::Unvisited; registry.schema_count()];
    let mut cycles = Vec::new();

    for root in registry.schema_ids() {
        if marks[root.index()] != Mark::Unvisited {
            continue;
        }
        cancel.check()?;
        marks[root.index()] = Mark::InProgress;
        // (node, index of the next edge to follow)
        let mut stack: Vec<(SchemaId, usize)> = vec![(root, 0)];

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            let Some(&target) = graph.targets(node).get(top.1) else {
                marks[node.index()] = Mark::Done;
                stack.pop();
                continue;
            };
            top.1 += 1;

            match marks[target.index()] {
                Mark::Unvisited => {
                    cancel.check()?;
                    marks[target.index()] = Mark::InProgress;
                    stack.push((target, 0));
                }
                Mark::InProgress => {
                    let start = stack
                        .iter()
                        .position(|(id, _)| *id == target)
                        .unwrap_or(0);
                    let chain = stack[start..]
                        .iter()
                        .map(|(id, _)| registry.name(*id).to_string())
                        .collect();
                    cycles.push(CircularReference::from_chain(chain));
                }
                Mark::Done => {}
            }
        }
    }

    Ok(cycles)
}

/// Run cycle detection as a check
pub fn detect_cycles(doc: &SpecDocument) -> (CheckResult, Vec<CircularReference>) {
    detect_cycles_with_cancel(doc, &CancellationToken::new())
}

/// Run cycle detection as a check, polling `cancel` at every node
///
/// A cancelled run reports a single error and no cycles.
pub fn detect_cycles_with_cancel(
    doc: &SpecDocument,
    cancel: &CancellationToken,
) -> (CheckResult, Vec<CircularReference>) {
    let registry = &doc.components;
    let cycles = match find_cycles(registry, cancel) {
        Ok(cycles) => cycles,
        Err(SpecError::Cancelled) => {
            debug!("Circular reference detection cancelled");
            let result = CheckResult::failed(
                CIRCULAR_CHECK,
                ValidationIssue::error("components.schemas", "circular reference detection was cancelled"),
            );
            return (result, Vec::new());
        }
        Err(err) => {
            let result =
                CheckResult::failed(CIRCULAR_CHECK, ValidationIssue::error("components.schemas", err.to_string()));
            return (result, Vec::new());
        }
    };

    let issues = cycles
        .iter()
        .map(|cycle| {
            ValidationIssue::error(
                cycle.root_path.clone(),
                format!("circular reference: {}", cycle.description),
            )
        })
        .collect();
    let summary = if cycles.is_empty() {
        format!(
            "no circular references among {} schemas",
            registry.schema_count()
        )
    } else {
        format!("{} circular references found", cycles.len())
    };
    debug!(cycles = cycles.len(), "Circular reference detection finished");

    let result = CheckResult::from_issues(CIRCULAR_CHECK, summary, issues)
        .with_diagnostics(vec![format!(
            "reference graph: {} schemas, {} edges",
            registry.schema_count(),
            SchemaGraph::build(registry).edge_count()
        )])
        .with_cycles(cycles.clone());
    (result, cycles)
}
