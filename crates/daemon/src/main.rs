// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! mendd: run one requirement through the pipeline.
//!
//! Usage: `mendd <requirement...>` or `echo "<requirement>" | mendd -`.
//! Prints a JSON summary on stdout; exits non-zero unless the job completed.

use std::io::Read;
use std::process::ExitCode;

use mend_core::JobState;
use mend_daemon::{load_pipeline_config, logging, startup, Config, LifecycleError};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "mendd failed");
            eprintln!("mendd: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode, LifecycleError> {
    let requirement = read_requirement()?;
    let config = Config::load()?;
    // NOTE(lifetime): flushes the file writer on drop
    let _guard = logging::init(config.log_dir.as_deref())?;

    let pipeline = load_pipeline_config(config.config_path.as_deref())?;
    info!(
        state_dir = %config.state_dir.display(),
        provider = %pipeline.sandbox.provider,
        max_rounds = pipeline.orchestrator.max_rounds,
        "starting mendd"
    );
    let daemon = startup(&config, pipeline)?;

    let token = daemon.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling build");
            token.cancel();
        }
    });

    let job = daemon.run_requirement(&requirement).await?;
    let summary = daemon.summary(&job)?;
    daemon.shutdown();

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(if job.state == JobState::Completed { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn read_requirement() -> Result<String, LifecycleError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let requirement = match args.as_slice() {
        [] => return Err(LifecycleError::EmptyRequirement),
        [dash] if dash == "-" => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            text
        }
        words => words.join(" "),
    };
    if requirement.trim().is_empty() {
        return Err(LifecycleError::EmptyRequirement);
    }
    Ok(requirement)
}
