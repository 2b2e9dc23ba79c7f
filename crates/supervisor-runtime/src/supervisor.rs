use crate::{
    backend::BackendProvider,
    error::SupervisorError,
    orchestrator::{OrchestratorDeps, dispatch},
};
use model::execution::{context::JobContext, status::JobStatus};
use std::{fmt, sync::Arc};
use supervisor_config::{StateStorage, SupervisorConfig};
use supervisor_core::{
    error::StoreError,
    handoff::HandoffDir,
    heartbeat::{HeartbeatHandle, HeartbeatServer},
    reporter::StatusReporter,
    retry::RetryPolicy,
    state::{self, StatusStore},
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span};

/// Progress through one attempt. Only the last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Start,
    ContextLoaded,
    InitializingWritten,
    RunningWritten,
    SucceededWritten,
    FailedWritten,
}

impl SupervisorState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SupervisorState::SucceededWritten | SupervisorState::FailedWritten
        )
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SupervisorState::Start => "START",
            SupervisorState::ContextLoaded => "CONTEXT_LOADED",
            SupervisorState::InitializingWritten => "INITIALIZING_WRITTEN",
            SupervisorState::RunningWritten => "RUNNING_WRITTEN",
            SupervisorState::SucceededWritten => "SUCCEEDED_WRITTEN",
            SupervisorState::FailedWritten => "FAILED_WRITTEN",
        };
        f.write_str(s)
    }
}

/// How an attempt ended: the last state reached and the job output or the
/// failure that stopped it.
#[derive(Debug)]
pub struct Outcome {
    pub state: SupervisorState,
    pub result: Result<Option<String>, SupervisorError>,
    /// Still serving until the process exits.
    pub heartbeat: Option<HeartbeatHandle>,
}

impl Outcome {
    fn failed_before_start(state: SupervisorState, err: SupervisorError) -> Self {
        Self {
            state,
            result: Err(err),
            heartbeat: None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match &self.result {
            Ok(_) => 0,
            Err(err) => err.exit_code(),
        }
    }
}

/// Waits for the handoff, then loads the context and the status store
/// settings. Nothing is written to the status store here, so the rest of the
/// configuration waits until after INITIALIZING.
pub async fn load(
    handoff: &HandoffDir,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<(JobContext, StateStorage), SupervisorError> {
    handoff.wait_until_ready(policy, cancel).await?;
    let context = handoff.load_context().await?;
    info!(
        application = %context.application,
        job = %context.job,
        unit = %context.unit,
        "Loaded job context"
    );

    let storage = StateStorage::from_env_map(&context.environment)?;
    Ok((context, storage))
}

/// Runs one attempt end to end with the store the configuration selects.
pub async fn supervise(
    handoff: HandoffDir,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    backends: Arc<dyn BackendProvider>,
) -> Outcome {
    supervise_with(handoff, policy, cancel, backends, state::open).await
}

/// [`supervise`] with a caller-chosen way of opening the status store.
pub async fn supervise_with<F>(
    handoff: HandoffDir,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    backends: Arc<dyn BackendProvider>,
    open_store: F,
) -> Outcome
where
    F: FnOnce(&StateStorage) -> Result<Arc<dyn StatusStore>, StoreError>,
{
    match prepare(handoff, policy, cancel, backends, open_store).await {
        Ok(supervisor) => supervisor.run().await,
        Err(outcome) => outcome,
    }
}

/// Everything up to, but excluding, the first status write. A failure here
/// is returned as a finished [`Outcome`] with no writes made.
pub async fn prepare<F>(
    handoff: HandoffDir,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    backends: Arc<dyn BackendProvider>,
    open_store: F,
) -> Result<Supervisor, Outcome>
where
    F: FnOnce(&StateStorage) -> Result<Arc<dyn StatusStore>, StoreError>,
{
    let (context, storage) = load(&handoff, policy, cancel).await.map_err(|err| {
        error!(error = %err, "Failed to start job");
        Outcome::failed_before_start(SupervisorState::Start, err)
    })?;

    let store = open_store(&storage).map_err(|source| {
        let err = SupervisorError::StoreOpen(source);
        error!(error = %err, "Failed to start job");
        Outcome::failed_before_start(SupervisorState::ContextLoaded, err)
    })?;
    let reporter = StatusReporter::new(store, storage.prefix);

    Ok(Supervisor::new(context, handoff, reporter, backends))
}

/// The main sequence for a loaded context: INITIALIZING, configuration,
/// backend and orchestrator setup, heartbeat, RUNNING, run, terminal status.
pub struct Supervisor {
    context: JobContext,
    handoff: HandoffDir,
    reporter: StatusReporter,
    backends: Arc<dyn BackendProvider>,
}

impl Supervisor {
    pub fn new(
        context: JobContext,
        handoff: HandoffDir,
        reporter: StatusReporter,
        backends: Arc<dyn BackendProvider>,
    ) -> Self {
        Self {
            context,
            handoff,
            reporter,
            backends,
        }
    }

    pub fn context(&self) -> &JobContext {
        &self.context
    }

    pub async fn run(self) -> Outcome {
        let span = info_span!(
            "supervisor",
            application = %self.context.application,
            job_id = %self.context.job.job_id,
            attempt = self.context.job.attempt_id,
        );
        self.run_attempt().instrument(span).await
    }

    async fn run_attempt(self) -> Outcome {
        let unit = &self.context.unit;

        if let Err(source) = self
            .reporter
            .record(unit, JobStatus::Initializing, None)
            .await
        {
            let err = SupervisorError::Reporting {
                status: JobStatus::Initializing,
                source,
            };
            error!(error = %err, "Failed to start job");
            return Outcome::failed_before_start(SupervisorState::ContextLoaded, err);
        }

        let mut state = SupervisorState::InitializingWritten;
        let mut heartbeat = None;

        // A SUCCEEDED write that did not land leaves no terminal record, so
        // it takes the failure path like any other step.
        let err = match self.execute(&mut state, &mut heartbeat).await {
            Ok(output) => match self
                .reporter
                .record(unit, JobStatus::Succeeded, output.clone())
                .await
            {
                Ok(_) => {
                    info!("Job succeeded");
                    return Outcome {
                        state: SupervisorState::SucceededWritten,
                        result: Ok(output),
                        heartbeat,
                    };
                }
                Err(source) => SupervisorError::Reporting {
                    status: JobStatus::Succeeded,
                    source,
                },
            },
            Err(err) => err,
        };

        error!(error = %err, %state, "Job failed");
        match self.reporter.record(unit, JobStatus::Failed, None).await {
            Ok(_) => Outcome {
                state: SupervisorState::FailedWritten,
                result: Err(err),
                heartbeat,
            },
            Err(source) => {
                error!(error = %source, "Failed to record FAILED status");
                Outcome {
                    state,
                    result: Err(SupervisorError::ReportingAfterFailure {
                        original: Box::new(err),
                        source,
                    }),
                    heartbeat,
                }
            }
        }
    }

    async fn execute(
        &self,
        state: &mut SupervisorState,
        heartbeat: &mut Option<HeartbeatHandle>,
    ) -> Result<Option<String>, SupervisorError> {
        let config = Arc::new(SupervisorConfig::from_env_map(&self.context.environment)?);

        let backend = self.backends.provide(&config).await?;
        info!(backend = %backend.kind(), "Execution backend ready");

        let deps = OrchestratorDeps {
            handoff: self.handoff.clone(),
            config: config.clone(),
        };
        let orchestrator = dispatch(self.context.application, &deps);

        *heartbeat = Some(
            HeartbeatServer::new(config.heartbeat_port)
                .start_background()
                .await?,
        );

        self.reporter
            .record(&self.context.unit, JobStatus::Running, None)
            .await
            .map_err(|source| SupervisorError::Reporting {
                status: JobStatus::Running,
                source,
            })?;
        *state = SupervisorState::RunningWritten;

        info!(orchestrator = %orchestrator.kind(), "Running job");
        let output = orchestrator.run(&self.context, backend.as_ref()).await?;
        Ok(output)
    }
}
