use super::{JobOrchestrator, OrchestratorDeps, ensure_success, log_connector_message};
use crate::{
    backend::{ExecutionBackend, UnitReader, UnitSpec, UnitWriter},
    error::OrchestratorError,
};
use async_trait::async_trait;
use chrono::Utc;
use model::{
    core::application::ApplicationKind,
    execution::context::JobContext,
    io::{
        message::ConnectorMessage,
        replication::{ReplicationInput, ReplicationOutput},
    },
};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

const SOURCE_CONFIG: &str = "source_config.json";
const SOURCE_CATALOG: &str = "source_catalog.json";
const INPUT_STATE: &str = "input_state.json";
const DESTINATION_CONFIG: &str = "destination_config.json";
const DESTINATION_CATALOG: &str = "destination_catalog.json";

/// Moves records from a source connector into a destination connector.
pub struct ReplicationOrchestrator {
    deps: OrchestratorDeps,
}

#[derive(Debug, Default)]
struct PumpStats {
    records: u64,
    bytes: u64,
    last_state: Option<Value>,
}

impl ReplicationOrchestrator {
    pub fn new(deps: OrchestratorDeps) -> Self {
        Self { deps }
    }

    fn source_spec(&self, ctx: &JobContext, input: &ReplicationInput) -> UnitSpec {
        let mut args = vec![
            "read",
            "--config",
            SOURCE_CONFIG,
            "--catalog",
            SOURCE_CATALOG,
        ];
        let mut spec = UnitSpec::new(&ctx.job, "source", &input.source.docker_image)
            .env(&self.deps.config.forwarded_env)
            .file(SOURCE_CONFIG, input.source.connection_configuration.to_string())
            .file(SOURCE_CATALOG, input.catalog.to_string());

        if let Some(state) = &input.state {
            args.extend(["--state", INPUT_STATE]);
            spec = spec.file(INPUT_STATE, state.to_string());
        }
        spec.args(args)
    }

    fn destination_spec(&self, ctx: &JobContext, input: &ReplicationInput) -> UnitSpec {
        UnitSpec::new(&ctx.job, "destination", &input.destination.docker_image)
            .env(&self.deps.config.forwarded_env)
            .file(
                DESTINATION_CONFIG,
                input.destination.connection_configuration.to_string(),
            )
            .file(DESTINATION_CATALOG, input.catalog.to_string())
            .args([
                "write",
                "--config",
                DESTINATION_CONFIG,
                "--catalog",
                DESTINATION_CATALOG,
            ])
            .with_stdin()
    }
}

#[async_trait]
impl JobOrchestrator for ReplicationOrchestrator {
    fn kind(&self) -> ApplicationKind {
        ApplicationKind::Replication
    }

    async fn run(
        &self,
        ctx: &JobContext,
        backend: &dyn ExecutionBackend,
    ) -> Result<Option<String>, OrchestratorError> {
        let input: ReplicationInput = self.deps.handoff.read_input().await?;
        info!(
            source = %input.source.docker_image,
            destination = %input.destination.docker_image,
            "Starting replication"
        );
        let started_at = Utc::now();

        let mut destination = backend.create(self.destination_spec(ctx, &input)).await?;
        let mut source = backend.create(self.source_spec(ctx, &input)).await?;
        let source_name = source.name().to_string();
        let destination_name = destination.name().to_string();

        let destination_stdin = destination.take_stdin().await?;
        let source_stdout = source.take_stdout().await?;
        let destination_stdout = destination.take_stdout().await?;

        let (stats, committed_state) = tokio::try_join!(
            pump(&source_name, source_stdout, destination_stdin),
            collect_state(&destination_name, destination_stdout),
        )?;

        let source_exit = source.wait().await?;
        let destination_exit = destination.wait().await?;
        ensure_success(&source_name, source_exit)?;
        ensure_success(&destination_name, destination_exit)?;

        let output = ReplicationOutput {
            records_synced: stats.records,
            bytes_synced: stats.bytes,
            state: committed_state,
            started_at,
            ended_at: Utc::now(),
        };
        info!(
            records = output.records_synced,
            bytes = output.bytes_synced,
            "Replication finished"
        );
        debug!(last_emitted_state = ?stats.last_state, "Source state");

        Ok(Some(serde_json::to_string(&output)?))
    }
}

/// Forwards RECORD and STATE lines from the source to the destination.
async fn pump(
    unit: &str,
    source: UnitReader,
    mut destination: UnitWriter,
) -> Result<PumpStats, OrchestratorError> {
    let mut stats = PumpStats::default();
    let mut lines = BufReader::new(source).lines();

    while let Some(line) = lines.next_line().await? {
        match ConnectorMessage::parse_line(&line) {
            Some(message) if message.is_forwarded() => {
                match message {
                    ConnectorMessage::Record { .. } => {
                        stats.records += 1;
                        stats.bytes += line.len() as u64;
                    }
                    ConnectorMessage::State { state } => stats.last_state = Some(state),
                    _ => {}
                }
                destination.write_all(line.as_bytes()).await?;
                destination.write_all(b"\n").await?;
            }
            Some(ConnectorMessage::Log { log }) => {
                log_connector_message(unit, &log.level, &log.message)
            }
            Some(_) => debug!(%unit, "Ignoring connector message"),
            None => info!(%unit, "{line}"),
        }
    }

    destination.flush().await?;
    destination.shutdown().await?;
    Ok(stats)
}

/// Reads the destination's output; the last STATE it emits is what it committed.
async fn collect_state(
    unit: &str,
    destination: UnitReader,
) -> Result<Option<Value>, OrchestratorError> {
    let mut committed = None;
    let mut lines = BufReader::new(destination).lines();

    while let Some(line) = lines.next_line().await? {
        match ConnectorMessage::parse_line(&line) {
            Some(ConnectorMessage::State { state }) => committed = Some(state),
            Some(ConnectorMessage::Log { log }) => {
                log_connector_message(unit, &log.level, &log.message)
            }
            Some(_) => debug!(%unit, "Ignoring connector message"),
            None => info!(%unit, "{line}"),
        }
    }
    Ok(committed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::testing::ScriptedBackend;
    use model::core::identifiers::{ExecutionUnitIdentity, JobIdentity};
    use std::{collections::HashMap, sync::Arc};
    use supervisor_config::SupervisorConfig;
    use supervisor_core::handoff::{HandoffDir, INPUT_FILE};
    use tempfile::tempdir;

    const INPUT: &str = r#"{
        "source": {"dockerImage": "airbyte/source-faker:1", "connectionConfiguration": {"count": 2}},
        "destination": {"dockerImage": "airbyte/destination-local:1", "connectionConfiguration": {}},
        "catalog": {"streams": []},
        "state": {"cursor": 1}
    }"#;

    fn context() -> JobContext {
        JobContext::new(
            ApplicationKind::Replication,
            HashMap::new(),
            JobIdentity::new("42", 0),
            ExecutionUnitIdentity::new("job-42-0", "jobs"),
        )
    }

    fn orchestrator(dir: &std::path::Path) -> ReplicationOrchestrator {
        std::fs::write(dir.join(INPUT_FILE), INPUT).unwrap();
        let vars: HashMap<String, String> = [("LOG_LEVEL".to_string(), "debug".to_string())].into();
        ReplicationOrchestrator::new(OrchestratorDeps {
            handoff: HandoffDir::new(dir),
            config: Arc::new(SupervisorConfig::from_env_map(&vars).unwrap()),
        })
    }

    #[tokio::test]
    async fn forwards_records_and_reports_committed_state() {
        let dir = tempdir().unwrap();
        let backend = ScriptedBackend::default()
            .with(
                "source",
                &[
                    "starting source",
                    r#"{"type":"LOG","log":{"level":"INFO","message":"reading"}}"#,
                    r#"{"type":"RECORD","record":{"id":1}}"#,
                    r#"{"type":"RECORD","record":{"id":2}}"#,
                    r#"{"type":"STATE","state":{"cursor":2}}"#,
                ],
                0,
            )
            .with("destination", &[r#"{"type":"STATE","state":{"cursor":2}}"#], 0);

        let raw = orchestrator(dir.path())
            .run(&context(), &backend)
            .await
            .unwrap()
            .unwrap();
        let output: ReplicationOutput = serde_json::from_str(&raw).unwrap();

        assert_eq!(output.records_synced, 2);
        assert_eq!(output.state, Some(serde_json::json!({"cursor": 2})));
        assert!(output.ended_at >= output.started_at);

        let forwarded = backend.stdin_of("destination");
        assert_eq!(forwarded.lines().count(), 3);
        assert!(!forwarded.contains("LOG"));

        let launched = backend.launched();
        let source = launched.iter().find(|s| s.role == "source").unwrap();
        assert!(source.args.ends_with(&["--state".to_string(), INPUT_STATE.to_string()]));
        assert_eq!(source.files[SOURCE_CONFIG], r#"{"count":2}"#);
        assert_eq!(source.env.get("LOG_LEVEL").map(String::as_str), Some("debug"));
        assert!(launched.iter().any(|s| s.role == "destination" && s.uses_stdin));
    }

    #[tokio::test]
    async fn failing_source_fails_the_job() {
        let dir = tempdir().unwrap();
        let backend = ScriptedBackend::default()
            .with("source", &[r#"{"type":"RECORD","record":{"id":1}}"#], 1)
            .with("destination", &[], 0);

        let err = orchestrator(dir.path())
            .run(&context(), &backend)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::UnitFailed { ref unit, exit_code: 1 } if unit == "source"
        ));
    }

    #[tokio::test]
    async fn missing_input_is_an_input_error() {
        let dir = tempdir().unwrap();
        let orchestrator = orchestrator(dir.path());
        std::fs::remove_file(dir.path().join(INPUT_FILE)).unwrap();

        let err = orchestrator
            .run(&context(), &ScriptedBackend::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Input(_)));
    }
}
