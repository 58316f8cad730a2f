// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mend-engine: scheduling, sandboxed validation, hooks and the repair loop

pub mod compiler;
pub mod compliance;
pub mod graph;
pub mod hooks;
pub mod log_stream;
pub mod memory;
pub mod orchestrator;
pub mod sandbox;
pub mod signature;
pub mod static_analysis;
pub mod toolset;
pub mod validation;

#[cfg(test)]
mod test_helpers;

pub use compliance::{ComplianceChecker, SchemaCompliance};
pub use graph::{build_graph, topological_sort, GraphError};
pub use hooks::{
    AuditHookHandler, HookHandler, HookPipeline, HookedGenerator, HookedModel, HookedPlanner,
    HookedRepairer,
};
pub use log_stream::{JobLogSink, LogHub, LogSubscription};
pub use memory::{RepairAttempt, SessionMemory, SessionMemoryStore};
pub use orchestrator::{Orchestrator, OrchestratorDeps, OrchestratorError};
pub use sandbox::SandboxService;
pub use static_analysis::StaticAnalyzer;
pub use toolset::{ToolError, Toolset};
pub use validation::{ValidationPipeline, ValidationReport};
