use model::execution::{errors::ModelError, status::JobStatus};
use std::io;
use supervisor_config::ConfigError;
use supervisor_core::error::{HandoffError, HeartbeatError, StoreError};
use thiserror::Error;

/// Errors raised by execution backends while creating or driving units.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Failed to construct cluster client: {0}")]
    ClientConstruction(String),

    #[error("Failed to resolve local address: {0}")]
    AddressResolution(String),

    #[error("Cluster API request failed: {0}")]
    ClusterApi(#[from] reqwest::Error),

    #[error("Cluster API returned HTTP {status} for {operation}: {body}")]
    ClusterStatus {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("Requested {requested} ports from a pool of {size}")]
    PortPoolTooSmall { requested: usize, size: usize },

    #[error("Port pool closed")]
    PortPoolClosed,

    #[error("Failed to bind relay port {port}: {source}")]
    RelayBind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("Unit '{unit}' never connected its {stream} relay")]
    RelayTimeout { unit: String, stream: &'static str },

    #[error("Unit '{unit}' has no {stream} stream available")]
    StreamUnavailable { unit: String, stream: &'static str },

    #[error("Failed to launch unit '{unit}': {source}")]
    Launch {
        unit: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised inside a job orchestrator's run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Failed to read job input: {0}")]
    Input(#[from] HandoffError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Unit '{unit}' exited with code {exit_code}")]
    UnitFailed { unit: String, exit_code: i32 },

    #[error("Failed to relay connector messages: {0}")]
    Relay(#[from] io::Error),

    #[error("Failed to serialize job output: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Coarse failure classes, each with its own process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Startup,
    StartupTimeout,
    Cancelled,
    Configuration,
    Execution,
    Reporting,
}

impl FailureKind {
    pub fn exit_code(self) -> i32 {
        match self {
            FailureKind::Execution => 1,
            FailureKind::Startup => 2,
            FailureKind::StartupTimeout => 3,
            FailureKind::Configuration => 4,
            FailureKind::Reporting => 5,
            FailureKind::Cancelled => 130,
        }
    }
}

/// Every way a supervised attempt can end other than SUCCEEDED.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to load job context: {0}")]
    Startup(#[source] HandoffError),

    #[error("Job context was not handed off after {polls} polls")]
    StartupTimeout { polls: usize },

    #[error("Shutdown requested before the job context was handed off")]
    Cancelled,

    #[error("Unexpected application kind: {0}")]
    UnknownApplication(#[source] ModelError),

    #[error("Invalid job configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to build execution backend: {0}")]
    Backend(#[from] BackendError),

    #[error("Failed to start heartbeat server: {0}")]
    Heartbeat(#[from] HeartbeatError),

    #[error("Job orchestrator failed: {0}")]
    Execution(#[from] OrchestratorError),

    #[error("Failed to open status store: {0}")]
    StoreOpen(#[source] StoreError),

    #[error("Failed to record {status} status: {source}")]
    Reporting {
        status: JobStatus,
        #[source]
        source: StoreError,
    },

    #[error("Failed to record FAILED status ({source}) after: {original}")]
    ReportingAfterFailure {
        original: Box<SupervisorError>,
        #[source]
        source: StoreError,
    },
}

impl SupervisorError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SupervisorError::Startup(_) => FailureKind::Startup,
            SupervisorError::StartupTimeout { .. } => FailureKind::StartupTimeout,
            SupervisorError::Cancelled => FailureKind::Cancelled,
            SupervisorError::UnknownApplication(_)
            | SupervisorError::Config(_)
            | SupervisorError::Backend(_) => FailureKind::Configuration,
            SupervisorError::Heartbeat(_) | SupervisorError::Execution(_) => {
                FailureKind::Execution
            }
            SupervisorError::StoreOpen(_)
            | SupervisorError::Reporting { .. }
            | SupervisorError::ReportingAfterFailure { .. } => FailureKind::Reporting,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}

impl From<HandoffError> for SupervisorError {
    fn from(err: HandoffError) -> Self {
        match err {
            HandoffError::Timeout { polls } => SupervisorError::StartupTimeout { polls },
            HandoffError::Cancelled => SupervisorError::Cancelled,
            HandoffError::Application(e) => SupervisorError::UnknownApplication(e),
            other => SupervisorError::Startup(other),
        }
    }
}
