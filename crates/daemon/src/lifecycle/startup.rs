// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup: recover the store, sweep stale host builds, wire the
//! engine.

use std::path::PathBuf;
use std::sync::Arc;

use mend_adapters::{
    CommandAgent, CommandGenerator, CommandPlanner, CommandRepairer, Generator, LocalSandbox,
    Planner, Repairer, SandboxAdapter, SandboxRouter,
};
use mend_core::{AgentsConfig, Clock, PipelineConfig, SandboxConfig, SystemClock};
use mend_engine::{
    HookPipeline, HookedGenerator, HookedPlanner, HookedRepairer, LogHub, Orchestrator,
    OrchestratorDeps, SandboxService, SchemaCompliance, SessionMemoryStore, ValidationPipeline,
};
use mend_storage::{JobStore, MemoryJobStore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{Config, Daemon, LifecycleError};

pub const INTERRUPTED_MESSAGE: &str = "interrupted: daemon restarted before the job finished";

/// Planning, generation and repair collaborators
#[derive(Clone)]
pub struct Collaborators {
    pub planner: Arc<dyn Planner>,
    pub generator: Arc<dyn Generator>,
    pub repairer: Arc<dyn Repairer>,
}

impl Collaborators {
    /// Command-backed collaborators. Every command must be set.
    pub fn from_config(
        agents: &AgentsConfig,
        target_type: &str,
        cwd: Option<PathBuf>,
    ) -> Result<Self, LifecycleError> {
        let agent = |command: &str, key: &'static str| {
            if command.trim().is_empty() {
                return Err(LifecycleError::NotConfigured(key));
            }
            let agent = CommandAgent::new(command, agents.timeout());
            Ok(match &cwd {
                Some(dir) => agent.cwd(dir.clone()),
                None => agent,
            })
        };
        Ok(Self {
            planner: Arc::new(CommandPlanner(agent(
                &agents.planner_command,
                "agents.planner_command",
            )?)),
            generator: Arc::new(CommandGenerator::new(
                agent(&agents.generator_command, "agents.generator_command")?,
                target_type,
            )),
            repairer: Arc::new(CommandRepairer(agent(
                &agents.repairer_command,
                "agents.repairer_command",
            )?)),
        })
    }

    /// Route every collaborator call through `hooks` as a tool event
    pub fn hooked(self, hooks: &HookPipeline, max_payload_chars: usize) -> Self {
        Self {
            planner: Arc::new(HookedPlanner::new(self.planner, hooks.clone(), max_payload_chars)),
            generator: Arc::new(HookedGenerator::new(
                self.generator,
                hooks.clone(),
                max_payload_chars,
            )),
            repairer: Arc::new(HookedRepairer::new(
                self.repairer,
                hooks.clone(),
                max_payload_chars,
            )),
        }
    }
}

/// Start the daemon with the config-selected sandbox provider and
/// command-backed collaborators
pub fn startup(config: &Config, pipeline: PipelineConfig) -> Result<Daemon, LifecycleError> {
    let provider = SandboxRouter::from_config(&pipeline.sandbox)?;
    let collaborators = Collaborators::from_config(
        &pipeline.agents,
        &pipeline.orchestrator.target_type,
        pipeline.toolset.workspace_root.clone(),
    )?;
    startup_with(config, pipeline, provider, collaborators)
}

pub fn startup_with<S: SandboxAdapter>(
    config: &Config,
    pipeline: PipelineConfig,
    provider: S,
    collaborators: Collaborators,
) -> Result<Daemon<S>, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    let clock = SystemClock;
    let store = MemoryJobStore::load_snapshot(&config.snapshot_path)?;
    let interrupted = reconcile_state(&store, &clock)?;
    info!(
        jobs = store.list_jobs()?.len(),
        interrupted,
        provider = provider.name(),
        "recovered state"
    );

    sweep_local_root(&pipeline.sandbox);

    let shutdown = CancellationToken::new();
    let logs = LogHub::new(store.clone());
    let hooks = HookPipeline::from_config(&pipeline.hooks, Arc::new(logs.clone()));
    let collaborators = collaborators.hooked(&hooks, pipeline.hooks.max_payload_chars);
    let sandbox = SandboxService::new(
        provider,
        pipeline.sandbox.clone(),
        hooks,
        clock,
        shutdown.clone(),
    );
    let validation =
        ValidationPipeline::new(Arc::new(sandbox), pipeline.validation.clone(), clock)
            .with_compliance(Arc::new(SchemaCompliance));
    let memory = SessionMemoryStore::new(
        pipeline.memory.ttl(),
        pipeline.orchestrator.repeated_error_tolerance,
        clock,
    );

    let deps = OrchestratorDeps {
        store: store.clone(),
        logs,
        planner: collaborators.planner,
        generator: collaborators.generator,
        repairer: collaborators.repairer,
        validation,
        memory,
    };
    let orchestrator = Orchestrator::new(
        deps,
        pipeline.orchestrator.clone(),
        pipeline.scheduler.cycle_policy,
        clock,
    );

    Ok(Daemon { config: config.clone(), pipeline, orchestrator, store, shutdown })
}

/// Fail jobs a previous process left mid-flight. Returns how many.
pub fn reconcile_state(store: &impl JobStore, clock: &impl Clock) -> Result<usize, LifecycleError> {
    let mut count = 0;
    for mut job in store.list_jobs()?.into_iter().filter(|j| !j.state.is_terminal()) {
        let from = job.state;
        if let Err(e) = job.fail(INTERRUPTED_MESSAGE, clock) {
            warn!(job_id = %job.id, error = %e, "cannot fail interrupted job");
            continue;
        }
        store.update_job(&job)?;
        info!(job_id = %job.id, state = %from, "failed interrupted job");
        count += 1;
    }
    Ok(count)
}

fn sweep_local_root(config: &SandboxConfig) {
    let local = LocalSandbox::new(config.local_root.clone());
    match local.sweep(config.local_retention()) {
        Ok(0) => {}
        Ok(removed) => info!(removed, root = %local.root().display(), "swept stale local builds"),
        Err(e) => warn!(root = %local.root().display(), error = %e, "local sandbox sweep failed"),
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
