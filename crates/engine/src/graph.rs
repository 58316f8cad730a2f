// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task graph construction from a schema and deterministic scheduling.
//!
//! Each table yields entity, mapper, service and controller tasks. Foreign
//! keys order entities so referenced tables are generated first.

use mend_core::{CyclePolicy, TaskEdge, TaskGraph, TaskNode, TaskType};
use regex::Regex;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::LazyLock;
use thiserror::Error;

#[allow(clippy::expect_used)]
static CREATE_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:["`]?[A-Za-z0-9_]+["`]?\.)?["`]?([A-Za-z0-9_]+)["`]?"#,
    )
    .expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static REFERENCES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)REFERENCES\s+([^\s(]+)").expect("constant regex pattern is valid")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("task graph has a cycle or dangling dependency: ordered {ordered} of {total} tasks")]
    Unordered { ordered: usize, total: usize },
}

/// Table name and the text between its balanced parentheses, if any
struct TableDef<'a> {
    name: String,
    body: Option<&'a str>,
}

/// Scan `CREATE TABLE` statements, in source order, first definition wins
fn table_defs(schema: &str) -> Vec<TableDef<'_>> {
    let mut seen = HashSet::new();
    let mut defs = Vec::new();
    for caps in CREATE_TABLE.captures_iter(schema) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let name = name.as_str().to_string();
        if !seen.insert(name.to_ascii_lowercase()) {
            continue;
        }
        let rest = &schema[whole.end()..];
        let body = rest
            .trim_start()
            .strip_prefix('(')
            .and_then(balanced_body);
        defs.push(TableDef { name, body });
    }
    defs
}

/// Text up to the parenthesis closing an already-opened one
fn balanced_body(after_open: &str) -> Option<&str> {
    let mut depth = 1usize;
    for (i, c) in after_open.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&after_open[..i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// `public."users",` -> `users`
fn normalize_table_ref(raw: &str) -> Option<String> {
    let token = raw.trim();
    let token = match token.rfind('.') {
        Some(dot) if dot + 1 < token.len() => &token[dot + 1..],
        _ => token,
    };
    let token: String = token.chars().filter(|c| *c != '"' && *c != '`').collect();
    let token = token.trim_end_matches([',', ';', ')']).trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Build the task graph for every table in `schema`.
///
/// An empty or table-less schema yields an empty graph.
pub fn build_graph(schema: &str) -> TaskGraph {
    let defs = table_defs(schema);
    let mut graph = TaskGraph::default();
    if defs.is_empty() {
        tracing::warn!("no CREATE TABLE statements found, task graph is empty");
        return graph;
    }

    let known: HashMap<String, &str> =
        defs.iter().map(|d| (d.name.to_ascii_lowercase(), d.name.as_str())).collect();

    for def in &defs {
        let table = def.name.as_str();
        graph.tables.push(table.to_string());
        for task_type in TaskType::ALL {
            graph.nodes.push(TaskNode::for_table(task_type, table));
        }
        let id = |t: TaskType| format!("{}_{}", t, table);
        graph.edges.extend([
            TaskEdge::new(id(TaskType::Entity), id(TaskType::Mapper)),
            TaskEdge::new(id(TaskType::Mapper), id(TaskType::Service)),
            TaskEdge::new(id(TaskType::Entity), id(TaskType::Service)),
            TaskEdge::new(id(TaskType::Service), id(TaskType::Controller)),
        ]);
    }

    for def in &defs {
        let Some(body) = def.body else { continue };
        for caps in REFERENCES.captures_iter(body) {
            let Some(referenced) = caps.get(1).and_then(|m| normalize_table_ref(m.as_str())) else {
                continue;
            };
            let Some(referenced) = known.get(&referenced.to_ascii_lowercase()) else {
                continue;
            };
            if referenced.eq_ignore_ascii_case(&def.name) {
                continue;
            }
            let edge = TaskEdge::new(
                format!("{}_{}", TaskType::Entity, referenced),
                format!("{}_{}", TaskType::Entity, def.name),
            );
            if !graph.edges.contains(&edge) {
                graph.edges.push(edge);
            }
        }
    }

    tracing::info!(
        tables = graph.tables.len(),
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "built task graph"
    );
    graph
}

type SortKey<'a> = (
    bool,
    Option<i32>,
    bool,
    Option<TaskType>,
    bool,
    Option<&'a str>,
    bool,
    Option<&'a str>,
    &'a str,
);

/// Priority, type, related entity, name, id; ascending with missing values last
fn sort_key(node: &TaskNode) -> SortKey<'_> {
    (
        node.priority.is_none(),
        node.priority,
        node.task_type.is_none(),
        node.task_type,
        node.related_entity.is_none(),
        node.related_entity.as_deref(),
        node.name.is_none(),
        node.name.as_deref(),
        node.id.as_str(),
    )
}

/// Order tasks so every dependency precedes its dependents.
///
/// Kahn's algorithm popping the lowest [`sort_key`] among ready tasks.
/// Duplicate ids keep the first node; edges naming unknown ids are ignored.
/// When not every task can be ordered, [`CyclePolicy::Fallback`] returns all
/// tasks sorted by key and [`CyclePolicy::Reject`] returns an error.
pub fn topological_sort(
    graph: &TaskGraph,
    policy: CyclePolicy,
) -> Result<Vec<TaskNode>, GraphError> {
    let mut nodes: Vec<&TaskNode> = Vec::with_capacity(graph.nodes.len());
    let mut index: HashMap<&str, usize> = HashMap::new();
    for node in &graph.nodes {
        if node.id.trim().is_empty() {
            tracing::warn!("skipping task with empty id");
            continue;
        }
        if index.contains_key(node.id.as_str()) {
            tracing::warn!(id = %node.id, "duplicate task id, keeping first");
            continue;
        }
        index.insert(node.id.as_str(), nodes.len());
        nodes.push(node);
    }

    let mut indegree = vec![0usize; nodes.len()];
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for edge in &graph.edges {
        match (index.get(edge.source.as_str()), index.get(edge.target.as_str())) {
            (Some(&s), Some(&t)) => {
                outgoing[s].push(t);
                indegree[t] += 1;
            }
            _ => tracing::debug!(source = %edge.source, target = %edge.target, "ignoring invalid edge"),
        }
    }

    let mut ready: BinaryHeap<Reverse<(SortKey<'_>, usize)>> = indegree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| Reverse((sort_key(nodes[i]), i)))
        .collect();

    let mut sorted = Vec::with_capacity(nodes.len());
    while let Some(Reverse((_, i))) = ready.pop() {
        sorted.push(nodes[i].clone());
        for &next in &outgoing[i] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                ready.push(Reverse((sort_key(nodes[next]), next)));
            }
        }
    }

    if sorted.len() == nodes.len() {
        return Ok(sorted);
    }

    let (ordered, total) = (sorted.len(), nodes.len());
    match policy {
        CyclePolicy::Reject => Err(GraphError::Unordered { ordered, total }),
        CyclePolicy::Fallback => {
            tracing::warn!(ordered, total, "task graph not fully ordered, falling back to priority order");
            let mut fallback = nodes;
            fallback.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
            Ok(fallback.into_iter().cloned().collect())
        }
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
