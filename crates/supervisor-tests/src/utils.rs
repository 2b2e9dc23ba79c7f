#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex},
};
use supervisor_config::SupervisorConfig;
use supervisor_core::handoff::{
    APPLICATION_FILE, ENV_MAP_FILE, INPUT_FILE, JOB_RUN_CONFIG_FILE, SUCCESS_FILE_NAME,
    UNIT_INFO_FILE,
};
use supervisor_runtime::{
    backend::{
        BackendKind, BackendProvider, ExecutionBackend, ExecutionUnit, UnitReader, UnitSpec,
        UnitWriter,
    },
    error::BackendError,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

pub const NORMALIZATION_INPUT: &str =
    r#"{"destination":{"dockerImage":"airbyte/destination-postgres:0.3"},"catalog":{}}"#;

/// Writes the files the launcher hands off, one at a time.
pub struct Handoff<'a> {
    dir: &'a Path,
    env: HashMap<String, String>,
}

impl<'a> Handoff<'a> {
    /// Scenario context: job 42, attempt 0, unit `job-42-0` in `jobs`.
    pub fn new(dir: &'a Path) -> Self {
        let env = [
            ("WORKER_ENVIRONMENT", "DOCKER"),
            ("HEARTBEAT_PORT", "0"),
            ("STATE_STORAGE_PREFIX", ""),
            ("LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self { dir, env }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn application(self, token: &str) -> Self {
        self.write(APPLICATION_FILE, token)
    }

    pub fn input(self, input: &str) -> Self {
        self.write(INPUT_FILE, input)
    }

    pub fn context(self) -> Self {
        let env = serde_json::to_string(&self.env).unwrap();
        self.write(ENV_MAP_FILE, &env)
            .write(JOB_RUN_CONFIG_FILE, r#"{"jobId":"42","attemptId":0}"#)
            .write(UNIT_INFO_FILE, r#"{"name":"job-42-0","namespace":"jobs"}"#)
    }

    pub fn finish(self) -> Self {
        self.write(SUCCESS_FILE_NAME, "")
    }

    /// Everything a complete handoff contains.
    pub fn complete(self, application: &str, input: &str) -> Self {
        self.application(application).input(input).context().finish()
    }

    fn write(self, file: &str, contents: &str) -> Self {
        std::fs::write(self.dir.join(file), contents).unwrap();
        self
    }
}

#[derive(Debug, Clone, Default)]
struct Script {
    stdout: Vec<String>,
    exit_code: i32,
}

/// Execution backend whose units print a fixed script and exit with a fixed
/// code. Records every unit spec it was asked to launch and whatever each unit
/// received on stdin.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: HashMap<String, Script>,
    launched: Mutex<Vec<UnitSpec>>,
    stdin: Arc<Mutex<HashMap<String, String>>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unit(mut self, role: &str, stdout: &[&str], exit_code: i32) -> Self {
        self.scripts.insert(
            role.to_string(),
            Script {
                stdout: stdout.iter().map(|s| s.to_string()).collect(),
                exit_code,
            },
        );
        self
    }

    pub fn launched(&self) -> Vec<UnitSpec> {
        self.launched.lock().unwrap().clone()
    }

    pub fn roles(&self) -> Vec<String> {
        self.launched().into_iter().map(|s| s.role).collect()
    }

    pub fn stdin_of(&self, role: &str) -> String {
        self.stdin
            .lock()
            .unwrap()
            .get(role)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ExecutionBackend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn create(&self, spec: UnitSpec) -> Result<Box<dyn ExecutionUnit>, BackendError> {
        let script = self.scripts.get(&spec.role).cloned().unwrap_or_default();
        self.launched.lock().unwrap().push(spec.clone());

        let (mut out_tx, out_rx) = duplex(64 * 1024);
        let writer = tokio::spawn(async move {
            for line in script.stdout {
                let line = format!("{line}\n");
                if out_tx.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
            }
        });

        let (in_tx, in_rx) = duplex(64 * 1024);
        Ok(Box::new(ScriptedUnit {
            role: spec.role,
            exit_code: script.exit_code,
            stdout: Some(out_rx),
            stdin: spec.uses_stdin.then_some(in_tx),
            stdin_rx: in_rx,
            writer,
            sink: self.stdin.clone(),
        }))
    }
}

struct ScriptedUnit {
    role: String,
    exit_code: i32,
    stdout: Option<DuplexStream>,
    stdin: Option<DuplexStream>,
    stdin_rx: DuplexStream,
    writer: tokio::task::JoinHandle<()>,
    sink: Arc<Mutex<HashMap<String, String>>>,
}

#[async_trait]
impl ExecutionUnit for ScriptedUnit {
    fn name(&self) -> &str {
        &self.role
    }

    async fn take_stdin(&mut self) -> Result<UnitWriter, BackendError> {
        self.stdin
            .take()
            .map(|s| Box::new(s) as UnitWriter)
            .ok_or_else(|| BackendError::StreamUnavailable {
                unit: self.role.clone(),
                stream: "stdin",
            })
    }

    async fn take_stdout(&mut self) -> Result<UnitReader, BackendError> {
        self.stdout
            .take()
            .map(|s| Box::new(s) as UnitReader)
            .ok_or_else(|| BackendError::StreamUnavailable {
                unit: self.role.clone(),
                stream: "stdout",
            })
    }

    async fn wait(mut self: Box<Self>) -> Result<i32, BackendError> {
        drop(self.stdin.take());
        let mut received = String::new();
        self.stdin_rx.read_to_string(&mut received).await?;
        self.sink.lock().unwrap().insert(self.role.clone(), received);

        drop(self.stdout.take());
        self.writer.abort();
        Ok(self.exit_code)
    }
}

/// Hands the same backend to every attempt.
pub struct Fixed(pub Arc<ScriptedBackend>);

#[async_trait]
impl BackendProvider for Fixed {
    async fn provide(
        &self,
        _config: &SupervisorConfig,
    ) -> Result<Arc<dyn ExecutionBackend>, BackendError> {
        Ok(self.0.clone())
    }
}

/// Fails backend construction the way an unresolvable cluster would.
pub struct Unreachable;

#[async_trait]
impl BackendProvider for Unreachable {
    async fn provide(
        &self,
        _config: &SupervisorConfig,
    ) -> Result<Arc<dyn ExecutionBackend>, BackendError> {
        Err(BackendError::ClientConstruction(
            "KUBERNETES_SERVICE_HOST is not set".into(),
        ))
    }
}

pub fn replication_input() -> String {
    json!({
        "source": {"dockerImage": "airbyte/source-faker:1", "connectionConfiguration": {"count": 3}},
        "destination": {"dockerImage": "airbyte/destination-local-json:1", "connectionConfiguration": {}},
        "catalog": {"streams": [{"name": "users"}]},
    })
    .to_string()
}

pub fn dbt_input() -> String {
    json!({
        "destination": {"dockerImage": "airbyte/destination-postgres:0.3", "connectionConfiguration": {}},
        "operator": {
            "dockerImage": "fishtownanalytics/dbt:1.0.0",
            "gitRepoUrl": "https://github.com/acme/dbt-project",
            "dbtArguments": "run"
        },
    })
    .to_string()
}

pub fn record(id: u64) -> String {
    json!({"type": "RECORD", "record": {"stream": "users", "data": {"id": id}}}).to_string()
}

pub fn state(cursor: u64) -> String {
    json!({"type": "STATE", "state": {"cursor": cursor}}).to_string()
}

pub fn parse(payload: &str) -> Value {
    serde_json::from_str(payload).unwrap()
}
