// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mend-adapters: build sandboxes, subprocesses and content collaborators

pub mod agent;
pub mod model;
pub mod sandbox;
pub mod subprocess;

pub use agent::{
    AgentError, CommandAgent, CommandGenerator, CommandPlanner, CommandRepairer,
    GenerateOutcome, Generator, PlanOutcome, Planner, RepairOutcome, Repairer,
};
pub use model::{ModelAdapter, ModelError, ModelRequest, ModelResponse, TokenUsage};
pub use sandbox::{
    CommandSandbox, ExecOutput, LocalSandbox, RemoteSandbox, SandboxAdapter, SandboxError,
    SandboxRouter, SandboxSession,
};
pub use subprocess::{run_with_input, run_with_timeout, CommandError, CommandOutput};

#[cfg(any(test, feature = "test-support"))]
pub use agent::{FakeGenerator, FakePlanner, FakeRepairer, RepairCall};
#[cfg(any(test, feature = "test-support"))]
pub use model::FakeModel;
#[cfg(any(test, feature = "test-support"))]
pub use sandbox::{FakeSandbox, SandboxCall};
