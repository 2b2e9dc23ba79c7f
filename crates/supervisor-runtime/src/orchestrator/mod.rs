use crate::{
    backend::{ExecutionBackend, UnitReader, UnitSpec},
    error::OrchestratorError,
};
use async_trait::async_trait;
use model::{
    core::application::ApplicationKind, execution::context::JobContext,
    io::message::ConnectorMessage,
};
use std::sync::Arc;
use supervisor_config::SupervisorConfig;
use supervisor_core::handoff::HandoffDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

pub mod dbt;
pub mod noop;
pub mod normalization;
pub mod replication;

pub use dbt::DbtOrchestrator;
pub use noop::NoOpOrchestrator;
pub use normalization::NormalizationOrchestrator;
pub use replication::ReplicationOrchestrator;

/// Runs one kind of job to completion and produces its serialized output.
#[async_trait]
pub trait JobOrchestrator: Send + Sync {
    fn kind(&self) -> ApplicationKind;

    /// `Ok(None)` means the job succeeded without output.
    async fn run(
        &self,
        ctx: &JobContext,
        backend: &dyn ExecutionBackend,
    ) -> Result<Option<String>, OrchestratorError>;
}

/// What orchestrators read besides the job context.
#[derive(Debug, Clone)]
pub struct OrchestratorDeps {
    pub handoff: HandoffDir,
    pub config: Arc<SupervisorConfig>,
}

/// Selects the orchestrator for an application kind. Total over the enum.
pub fn dispatch(kind: ApplicationKind, deps: &OrchestratorDeps) -> Box<dyn JobOrchestrator> {
    match kind {
        ApplicationKind::Replication => Box::new(ReplicationOrchestrator::new(deps.clone())),
        ApplicationKind::Normalization => Box::new(NormalizationOrchestrator::new(deps.clone())),
        ApplicationKind::Dbt => Box::new(DbtOrchestrator::new(deps.clone())),
        ApplicationKind::NoOp => Box::new(NoOpOrchestrator),
    }
}

/// Launches a unit that needs no input, logs its output and waits for a
/// zero exit code.
pub(crate) async fn run_unit(
    backend: &dyn ExecutionBackend,
    spec: UnitSpec,
) -> Result<(), OrchestratorError> {
    let mut unit = backend.create(spec).await?;
    let stdout = unit.take_stdout().await?;
    let unit_name = unit.name().to_string();

    log_output(&unit_name, stdout).await?;

    let exit_code = unit.wait().await?;
    ensure_success(&unit_name, exit_code)
}

pub(crate) fn ensure_success(unit: &str, exit_code: i32) -> Result<(), OrchestratorError> {
    if exit_code == 0 {
        Ok(())
    } else {
        Err(OrchestratorError::UnitFailed {
            unit: unit.to_string(),
            exit_code,
        })
    }
}

async fn log_output(unit: &str, stdout: UnitReader) -> Result<(), OrchestratorError> {
    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines.next_line().await? {
        match ConnectorMessage::parse_line(&line) {
            Some(ConnectorMessage::Log { log }) => {
                log_connector_message(unit, &log.level, &log.message)
            }
            Some(_) => debug!(%unit, "Ignoring connector message"),
            None => info!(%unit, "{line}"),
        }
    }
    Ok(())
}

pub(crate) fn log_connector_message(unit: &str, level: &str, message: &str) {
    match level.to_ascii_uppercase().as_str() {
        "FATAL" | "ERROR" => error!(%unit, "{message}"),
        "WARN" => warn!(%unit, "{message}"),
        "DEBUG" | "TRACE" => debug!(%unit, "{message}"),
        _ => info!(%unit, "{message}"),
    }
}


#[cfg(test)]
mod tests {
    use super::{testing::ScriptedBackend, *};
    use model::core::identifiers::JobIdentity;
    use std::collections::HashMap;

    fn deps() -> OrchestratorDeps {
        OrchestratorDeps {
            handoff: HandoffDir::new("/nonexistent"),
            config: Arc::new(SupervisorConfig::from_env_map(&HashMap::new()).unwrap()),
        }
    }

    #[test]
    fn dispatch_is_total() {
        let deps = deps();
        for kind in ApplicationKind::ALL {
            assert_eq!(dispatch(kind, &deps).kind(), kind);
        }
    }

    #[tokio::test]
    async fn run_unit_reports_non_zero_exit() {
        let backend = ScriptedBackend::default().with(
            "dbt",
            &[r#"{"type":"LOG","log":{"level":"ERROR","message":"boom"}}"#],
            2,
        );
        let spec = UnitSpec::new(&JobIdentity::new("1", 0), "dbt", "img");

        let err = run_unit(&backend, spec).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::UnitFailed { exit_code: 2, .. }));
    }
}
