use crate::{
    commands::{Commands, RunArgs},
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use std::{sync::Arc, time::Duration};
use supervisor_core::{handoff::HandoffDir, retry::RetryPolicy, state};
use supervisor_runtime::{
    backend::{ConfiguredBackends, cluster::InClusterConnector},
    supervisor::{self, Outcome},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod commands;
mod error;
mod logging;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "orchestrator",
    version = "0.1.0",
    about = "Supervises one attempt of a connector job"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[tokio::main]
async fn main() {
    let log_level = logging::init();

    let cli = Cli::parse();

    let code = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(cli.run, &log_level).await,
        Commands::Status {
            store,
            unit,
            prefix,
            json,
        } => match commands::show_status(&store, &prefix, &unit, json) {
            Ok(()) => ExitCode::Success.as_i32(),
            Err(err) => {
                error!(error = %err, "Failed to show status");
                ExitCode::GeneralError.as_i32()
            }
        },
    };

    // Detached tasks (heartbeat listener, log pumps) and pooled API clients
    // never finish on their own; ending the process here reclaims them.
    std::process::exit(code);
}

async fn run(args: RunArgs, log_level: &logging::LogLevel) -> i32 {
    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let policy = RetryPolicy::fixed(
        Duration::from_millis(args.handoff_poll_interval_ms),
        args.handoff_max_polls,
    );
    info!(
        config_dir = %args.config_dir.display(),
        max_wait = ?policy.total_delay(),
        "Waiting for job handoff"
    );
    let backends = Arc::new(ConfiguredBackends::new(InClusterConnector::default()));

    let outcome = match supervisor::prepare(
        HandoffDir::new(&args.config_dir),
        &policy,
        &shutdown.cancel_token(),
        backends,
        state::open,
    )
    .await
    {
        Ok(supervisor) => {
            log_level.apply_handoff(&supervisor.context().environment);
            shutdown.job_started();
            supervisor.run().await
        }
        Err(outcome) => outcome,
    };

    report(&outcome);
    outcome.exit_code()
}

fn report(outcome: &Outcome) {
    match &outcome.result {
        Ok(_) => info!(state = %outcome.state, "Supervisor finished"),
        Err(err) => error!(
            state = %outcome.state,
            kind = ?err.kind(),
            exit_code = err.exit_code(),
            "Supervisor finished with error: {err}"
        ),
    }
}
