// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{Artifact, ParsedError, Severity};

/// Proptest strategies for graph and artifact types.
pub mod strategies {
    use crate::task::{TaskEdge, TaskNode, TaskStatus, TaskType};
    use proptest::prelude::*;

    pub fn arb_task_type() -> impl Strategy<Value = TaskType> {
        prop_oneof![
            Just(TaskType::Entity),
            Just(TaskType::Mapper),
            Just(TaskType::Service),
            Just(TaskType::Controller),
        ]
    }

    pub fn arb_task_node(id: String) -> impl Strategy<Value = TaskNode> {
        (
            proptest::option::of(arb_task_type()),
            proptest::option::of(0i32..50),
            proptest::option::of("[a-c]{1,3}"),
        )
            .prop_map(move |(task_type, priority, related_entity)| TaskNode {
                id: id.clone(),
                name: related_entity.as_ref().map(|e| format!("Generate {e}")),
                task_type,
                related_entity,
                priority,
                status: TaskStatus::Pending,
            })
    }

    /// Acyclic graph: edges only go from lower to higher node index
    pub fn arb_dag(max_nodes: usize) -> impl Strategy<Value = (Vec<TaskNode>, Vec<TaskEdge>)> {
        (1..=max_nodes).prop_flat_map(|n| {
            let nodes: Vec<_> = (0..n).map(|i| arb_task_node(format!("n{i}"))).collect();
            let edges = prop::collection::vec((0..n, 0..n), 0..(n * 2)).prop_map(|pairs| {
                pairs
                    .into_iter()
                    .filter(|(a, b)| a < b)
                    .map(|(a, b)| TaskEdge::new(format!("n{a}"), format!("n{b}")))
                    .collect::<Vec<_>>()
            });
            (nodes, edges)
        })
    }
}

/// Small Spring-style backend for pipeline tests
pub fn sample_artifacts() -> Vec<Artifact> {
    vec![
        Artifact::new("pom.xml", "<project><artifactId>demo</artifactId></project>").agent("coder"),
        Artifact::new(
            "src/main/java/com/demo/entity/User.java",
            "package com.demo.entity;\npublic class User { private Long id; }\n",
        )
        .agent("coder"),
        Artifact::new(
            "src/main/java/com/demo/mapper/UserMapper.java",
            "package com.demo.mapper;\n@Mapper\npublic interface UserMapper {}\n",
        )
        .agent("coder"),
    ]
}

pub fn code_error(file: &str, line: u32, message: &str) -> ParsedError {
    ParsedError {
        file: file.to_string(),
        line,
        column: Some(1),
        message: message.to_string(),
        severity: Severity::Error,
    }
}
