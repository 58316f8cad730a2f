// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generation task graph primitives.

use serde::{Deserialize, Serialize};

/// Layer a generation task produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Entity,
    Mapper,
    Service,
    Controller,
}

impl TaskType {
    pub const ALL: [TaskType; 4] =
        [TaskType::Entity, TaskType::Mapper, TaskType::Service, TaskType::Controller];

    /// Fixed scheduling priority, lower runs first
    pub fn priority(&self) -> i32 {
        match self {
            TaskType::Entity => 10,
            TaskType::Mapper => 20,
            TaskType::Service => 30,
            TaskType::Controller => 40,
        }
    }
}

crate::simple_display! {
    TaskType {
        Entity => "entity",
        Mapper => "mapper",
        Service => "service",
        Controller => "controller",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

/// One generation unit. Optional fields sort last when ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: String,
    pub name: Option<String>,
    pub task_type: Option<TaskType>,
    pub related_entity: Option<String>,
    pub priority: Option<i32>,
    #[serde(default)]
    pub status: TaskStatus,
}

impl TaskNode {
    /// Node for `table` at the given layer, id `<type>_<table>`
    pub fn for_table(task_type: TaskType, table: &str) -> Self {
        Self {
            id: format!("{}_{}", task_type, table),
            name: Some(format!("Generate {}{}", pascal_case(table), pascal_case(&task_type.to_string()))),
            task_type: Some(task_type),
            related_entity: Some(table.to_string()),
            priority: Some(task_type.priority()),
            status: TaskStatus::Pending,
        }
    }
}

/// `source -> target`: target depends on source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskEdge {
    pub source: String,
    pub target: String,
}

impl TaskEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self { source: source.into(), target: target.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskGraph {
    pub tables: Vec<String>,
    pub nodes: Vec<TaskNode>,
    pub edges: Vec<TaskEdge>,
}

impl TaskGraph {
    pub fn node(&self, id: &str) -> Option<&TaskNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.edges.iter().any(|e| e.source == source && e.target == target)
    }
}

/// `order_items` -> `OrderItems`
pub fn pascal_case(s: &str) -> String {
    s.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
