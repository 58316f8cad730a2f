// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! mend-daemon: process wiring for `mendd`
//!
//! Loads configuration, recovers the job store and drives requirements
//! through the engine.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
pub mod lifecycle;
pub mod logging;

pub use lifecycle::{
    load_pipeline_config, startup, startup_with, Collaborators, Config, Daemon, JobSummary,
    LifecycleError,
};
