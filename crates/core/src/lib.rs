// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mend-core: data model for the self-healing build pipeline

pub mod macros;

pub mod artifact;
pub mod clock;
pub mod config;
pub mod hook;
pub mod id;
pub mod job;
pub mod log_entry;
pub mod task;
pub mod validation;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use uuid;

pub use artifact::{merge_artifacts, next_revisions, Artifact};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    AgentsConfig, ConfigError, CyclePolicy, HookConfig, MemoryConfig, OrchestratorConfig, PipelineConfig,
    SandboxConfig, SandboxProviderKind, SchedulerConfig, ToolsetConfig, ValidationConfig,
};
pub use hook::{HookContext, HookDecision, HookEvent, HookResult};
#[cfg(any(test, feature = "test-support"))]
pub use job::JobBuilder;
pub use job::{Contract, Job, JobError, JobId, JobState, SandboxRef};
pub use log_entry::{LogEntry, LogLevel, LogRole};
pub use task::{pascal_case, TaskEdge, TaskGraph, TaskNode, TaskStatus, TaskType};
pub use validation::{
    BuildResult, ErrorClass, ParsedError, PhaseOutcome, Severity, ValidationPhase,
    ValidationResult,
};
