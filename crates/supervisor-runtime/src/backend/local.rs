use crate::{
    backend::{ExecutionUnit, UnitReader, UnitSpec, UnitWriter},
    error::BackendError,
};
use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    process::Stdio,
};
use supervisor_config::LocalSettings;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, ChildStderr, Command},
};
use tracing::{debug, info, warn};

const DATA_MOUNT: &str = "/data";
const LOCAL_MOUNT: &str = "/local";

/// Runs units as containers through the local container runtime CLI.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    workspace_root: PathBuf,
    workspace_mount: String,
    local_mount: Option<String>,
    network: String,
    runtime: String,
}

impl LocalBackend {
    pub fn new(settings: &LocalSettings) -> Self {
        Self {
            workspace_root: settings.workspace_root.clone(),
            workspace_mount: settings.workspace_mount.clone(),
            local_mount: settings.local_mount.clone(),
            network: settings.network.clone(),
            runtime: "docker".to_string(),
        }
    }

    /// Overrides the runtime binary (`docker` by default).
    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = runtime.into();
        self
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn workspace_mount(&self) -> &str {
        &self.workspace_mount
    }

    pub fn local_mount(&self) -> Option<&str> {
        self.local_mount.as_deref()
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    fn job_root(&self, spec: &UnitSpec) -> PathBuf {
        self.workspace_root
            .join(spec.job.job_id.as_str())
            .join(spec.job.attempt_id.to_string())
    }

    /// Full argument list passed to the runtime binary.
    pub fn run_args(&self, name: &str, spec: &UnitSpec) -> Vec<String> {
        let working_dir = format!(
            "{DATA_MOUNT}/{}/{}",
            spec.job.job_id, spec.job.attempt_id
        );

        let mut args: Vec<String> = vec![
            "run".into(),
            "--rm".into(),
            "--init".into(),
            "-i".into(),
            "-w".into(),
            working_dir,
            "--log-driver".into(),
            "none".into(),
            "--name".into(),
            name.into(),
            "--network".into(),
            self.network.clone(),
            "-v".into(),
            format!("{}:{DATA_MOUNT}", self.workspace_mount),
        ];

        if let Some(local_mount) = &self.local_mount {
            args.push("-v".into());
            args.push(format!("{local_mount}:{LOCAL_MOUNT}"));
        }

        for (key, value) in &spec.env {
            args.push("-e".into());
            args.push(format!("{key}={value}"));
        }

        args.push(spec.image.clone());
        args.extend(spec.args.iter().cloned());
        args
    }

    pub async fn create(&self, spec: UnitSpec) -> Result<Box<dyn ExecutionUnit>, BackendError> {
        let name = spec.unit_name();

        let job_root = self.job_root(&spec);
        tokio::fs::create_dir_all(&job_root).await?;
        for (file, contents) in &spec.files {
            tokio::fs::write(job_root.join(file), contents).await?;
        }

        let args = self.run_args(&name, &spec);
        debug!(unit = %name, ?args, "Launching container");

        let mut child = Command::new(&self.runtime)
            .args(&args)
            .stdin(if spec.uses_stdin {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BackendError::Launch {
                unit: name.clone(),
                source,
            })?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_stderr(name.clone(), stderr));
        }

        info!(unit = %name, image = %spec.image, "Started container");
        Ok(Box::new(LocalUnit { name, child }))
    }
}

async fn log_stderr(unit: String, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => info!(%unit, "{line}"),
            Ok(None) => break,
            Err(e) => {
                warn!(%unit, error = %e, "Failed to read stderr");
                break;
            }
        }
    }
}

struct LocalUnit {
    name: String,
    child: Child,
}

#[async_trait]
impl ExecutionUnit for LocalUnit {
    fn name(&self) -> &str {
        &self.name
    }

    async fn take_stdin(&mut self) -> Result<UnitWriter, BackendError> {
        self.child
            .stdin
            .take()
            .map(|stdin| Box::new(stdin) as UnitWriter)
            .ok_or_else(|| BackendError::StreamUnavailable {
                unit: self.name.clone(),
                stream: "stdin",
            })
    }

    async fn take_stdout(&mut self) -> Result<UnitReader, BackendError> {
        self.child
            .stdout
            .take()
            .map(|stdout| Box::new(stdout) as UnitReader)
            .ok_or_else(|| BackendError::StreamUnavailable {
                unit: self.name.clone(),
                stream: "stdout",
            })
    }

    async fn wait(mut self: Box<Self>) -> Result<i32, BackendError> {
        // An unread stdout pipe would block the container once it fills up.
        if let Some(mut stdout) = self.child.stdout.take() {
            tokio::spawn(async move {
                let _ = tokio::io::copy(&mut stdout, &mut tokio::io::sink()).await;
            });
        }
        drop(self.child.stdin.take());

        let status = self.child.wait().await?;
        let exit_code = status.code().unwrap_or(-1);
        info!(unit = %self.name, exit_code, "Container exited");
        Ok(exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::identifiers::JobIdentity;
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn backend(root: &Path, local_mount: Option<&str>) -> LocalBackend {
        LocalBackend::new(&LocalSettings {
            workspace_root: root.to_path_buf(),
            workspace_mount: "airbyte_workspace".into(),
            local_mount: local_mount.map(str::to_string),
            network: "host".into(),
        })
    }

    #[test]
    fn run_args_mount_workspace_and_forward_env() {
        let backend = backend(Path::new("/ws"), Some("/tmp/airbyte_local"));
        let spec = UnitSpec::new(&JobIdentity::new("42", 1), "source", "airbyte/source-faker:1")
            .args(["read", "--config", "source_config.json"])
            .env(&[("LOG_LEVEL".to_string(), "debug".to_string())].into());

        let args = backend.run_args("source-42-1-abc", &spec);
        let joined = args.join(" ");
        assert!(joined.starts_with("run --rm --init -i -w /data/42/1"));
        assert!(joined.contains("--name source-42-1-abc --network host"));
        assert!(joined.contains("-v airbyte_workspace:/data -v /tmp/airbyte_local:/local"));
        assert!(joined.contains("-e LOG_LEVEL=debug"));
        assert!(joined.ends_with("airbyte/source-faker:1 read --config source_config.json"));
    }

    #[test]
    fn run_args_skip_absent_local_mount() {
        let backend = backend(Path::new("/ws"), None);
        let spec = UnitSpec::new(&JobIdentity::new("42", 1), "dbt", "img");
        let args = backend.run_args("n", &spec);
        assert!(!args.iter().any(|a| a.ends_with(":/local")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_through_runtime_binary() {
        let dir = tempdir().unwrap();
        // Stand-in runtime that echoes its stdin back.
        let runtime = dir.path().join("fake-runtime.sh");
        std::fs::write(&runtime, "#!/bin/sh\ncat\nexit 3\n").unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&runtime, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let backend = backend(dir.path(), None).with_runtime(runtime.display().to_string());
        let spec = UnitSpec::new(&JobIdentity::new("7", 0), "destination", "img")
            .file("destination_config.json", "{}")
            .with_stdin();

        let mut unit = backend.create(spec).await.unwrap();
        let mut stdin = unit.take_stdin().await.unwrap();
        let mut stdout = unit.take_stdout().await.unwrap();
        stdin.write_all(b"hello\n").await.unwrap();
        stdin.shutdown().await.unwrap();
        drop(stdin);

        let mut echoed = String::new();
        stdout.read_to_string(&mut echoed).await.unwrap();
        assert_eq!(echoed, "hello\n");
        assert_eq!(unit.wait().await.unwrap(), 3);

        let written = dir.path().join("7/0/destination_config.json");
        assert_eq!(std::fs::read_to_string(written).unwrap(), "{}");
    }

    #[tokio::test]
    async fn stdin_is_unavailable_unless_requested() {
        let dir = tempdir().unwrap();
        let backend = backend(dir.path(), None).with_runtime("true");
        let spec = UnitSpec::new(&JobIdentity::new("7", 0), "source", "img");

        let mut unit = backend.create(spec).await.unwrap();
        let err = unit.take_stdin().await.err().unwrap();
        assert!(matches!(err, BackendError::StreamUnavailable { stream: "stdin", .. }));
        assert_eq!(unit.wait().await.unwrap(), 0);
    }
}
