use crate::error::BackendError;
use async_trait::async_trait;
use model::core::identifiers::JobIdentity;
use std::{collections::BTreeMap, fmt, sync::Arc};
use supervisor_config::{SupervisorConfig, WorkerEnvironment};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

pub mod cluster;
pub mod local;
pub mod ports;

use cluster::{ClusterBackend, ClusterConnector};
use local::LocalBackend;
use ports::PortPool;

pub type UnitReader = Box<dyn AsyncRead + Send + Unpin>;
pub type UnitWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// What to launch for one connector (or transformation) step of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSpec {
    pub job: JobIdentity,
    /// Short label such as `source` or `normalization`; part of the unit name.
    pub role: String,
    pub image: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// File name to contents, placed in the unit's working directory.
    pub files: BTreeMap<String, String>,
    pub uses_stdin: bool,
}

impl UnitSpec {
    pub fn new(job: &JobIdentity, role: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            job: job.clone(),
            role: role.into(),
            image: image.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            files: BTreeMap::new(),
            uses_stdin: false,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn file(mut self, name: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files.insert(name.into(), contents.into());
        self
    }

    pub fn with_stdin(mut self) -> Self {
        self.uses_stdin = true;
        self
    }

    /// Unique, DNS-safe name: `<role>-<job>-<attempt>-<suffix>`.
    pub fn unit_name(&self) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let raw = format!(
            "{}-{}-{}-{}",
            self.role,
            self.job.job_id,
            self.job.attempt_id,
            &suffix[..8]
        );
        raw.to_ascii_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect()
    }
}

/// A launched pod or container.
#[async_trait]
pub trait ExecutionUnit: Send {
    fn name(&self) -> &str;

    /// The unit's stdin. Available once, and only if the unit spec asked for it.
    async fn take_stdin(&mut self) -> Result<UnitWriter, BackendError>;

    /// The unit's stdout. Available once.
    async fn take_stdout(&mut self) -> Result<UnitReader, BackendError>;

    /// Waits for the unit to terminate and returns its exit code.
    async fn wait(self: Box<Self>) -> Result<i32, BackendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Cluster,
    Local,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Cluster => f.write_str("cluster"),
            BackendKind::Local => f.write_str("local"),
        }
    }
}

/// Mechanism used to run connector images for this attempt.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn create(&self, spec: UnitSpec) -> Result<Box<dyn ExecutionUnit>, BackendError>;
}

pub enum Backend {
    Cluster(ClusterBackend),
    Local(LocalBackend),
}

impl Backend {
    pub fn port_pool(&self) -> Option<&PortPool> {
        match self {
            Backend::Cluster(cluster) => Some(cluster.port_pool()),
            Backend::Local(_) => None,
        }
    }
}

#[async_trait]
impl ExecutionBackend for Backend {
    fn kind(&self) -> BackendKind {
        match self {
            Backend::Cluster(_) => BackendKind::Cluster,
            Backend::Local(_) => BackendKind::Local,
        }
    }

    async fn create(&self, spec: UnitSpec) -> Result<Box<dyn ExecutionUnit>, BackendError> {
        match self {
            Backend::Cluster(cluster) => cluster.create(spec).await,
            Backend::Local(local) => local.create(spec).await,
        }
    }
}

/// Builds the backend selected by `WORKER_ENVIRONMENT`. There is no fallback
/// from one variant to the other.
pub async fn create_backend(
    config: &SupervisorConfig,
    connector: &dyn ClusterConnector,
) -> Result<Backend, BackendError> {
    match config.worker_environment {
        WorkerEnvironment::Kubernetes => {
            let api = connector.connect(&config.cluster).await?;
            let local_ip = connector.local_ip().await?;
            info!(namespace = %config.cluster.namespace, "Using Kubernetes namespace");

            let ports = PortPool::new(config.orchestrator_ports.iter().copied());
            Ok(Backend::Cluster(ClusterBackend::new(
                config.cluster.namespace.clone(),
                local_ip,
                config.heartbeat_port,
                api,
                ports,
            )))
        }
        WorkerEnvironment::Docker => {
            info!(network = %config.local.network, "Using local container runtime");
            Ok(Backend::Local(LocalBackend::new(&config.local)))
        }
    }
}

/// Seam between the supervisor and however the backend gets built.
#[async_trait]
pub trait BackendProvider: Send + Sync {
    async fn provide(
        &self,
        config: &SupervisorConfig,
    ) -> Result<Arc<dyn ExecutionBackend>, BackendError>;
}

/// Builds backends from configuration with the given cluster connector.
pub struct ConfiguredBackends<C> {
    connector: C,
}

impl<C: ClusterConnector> ConfiguredBackends<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl<C: ClusterConnector> BackendProvider for ConfiguredBackends<C> {
    async fn provide(
        &self,
        config: &SupervisorConfig,
    ) -> Result<Arc<dyn ExecutionBackend>, BackendError> {
        let backend = create_backend(config, &self.connector).await?;
        Ok(Arc::new(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::cluster::{ClusterApi, PodPhase};
    use serde_json::Value;
    use std::{
        collections::HashMap,
        net::{IpAddr, Ipv4Addr},
    };
    use supervisor_config::ClusterSettings;

    struct NoopApi;

    #[async_trait]
    impl ClusterApi for NoopApi {
        async fn create_pod(&self, _: &str, _: &Value) -> Result<(), BackendError> {
            Ok(())
        }
        async fn pod_phase(&self, _: &str, _: &str) -> Result<PodPhase, BackendError> {
            Ok(PodPhase::Terminated { exit_code: 0 })
        }
        async fn delete_pod(&self, _: &str, _: &str) -> Result<(), BackendError> {
            Ok(())
        }
    }

    struct FakeConnector {
        resolvable: bool,
    }

    #[async_trait]
    impl ClusterConnector for FakeConnector {
        async fn connect(
            &self,
            _settings: &ClusterSettings,
        ) -> Result<Arc<dyn ClusterApi>, BackendError> {
            Ok(Arc::new(NoopApi))
        }

        async fn local_ip(&self) -> Result<IpAddr, BackendError> {
            if self.resolvable {
                Ok(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)))
            } else {
                Err(BackendError::AddressResolution("no hostname".into()))
            }
        }
    }

    fn config(pairs: &[(&str, &str)]) -> SupervisorConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SupervisorConfig::from_env_map(&vars).unwrap()
    }

    #[tokio::test]
    async fn cluster_backend_binds_namespace_and_port_pool() {
        let config = config(&[
            ("WORKER_ENVIRONMENT", "KUBERNETES"),
            ("JOB_KUBE_NAMESPACE", "jobs"),
        ]);
        let backend = create_backend(&config, &FakeConnector { resolvable: true })
            .await
            .unwrap();

        assert_eq!(backend.kind(), BackendKind::Cluster);
        assert_eq!(backend.port_pool().unwrap().size(), 4);
        let Backend::Cluster(cluster) = backend else {
            panic!("expected cluster backend");
        };
        assert_eq!(cluster.namespace(), "jobs");
        assert_eq!(cluster.heartbeat_url(), "10.1.2.3:9000");
    }

    #[tokio::test]
    async fn local_backend_has_no_port_pool() {
        let config = config(&[
            ("WORKER_ENVIRONMENT", "DOCKER"),
            ("WORKSPACE_ROOT", "/ws"),
            ("WORKSPACE_DOCKER_MOUNT", "workspace"),
            ("LOCAL_DOCKER_MOUNT", "/tmp/local"),
            ("DOCKER_NETWORK", "airbyte"),
        ]);
        let backend = create_backend(&config, &FakeConnector { resolvable: false })
            .await
            .unwrap();

        assert_eq!(backend.kind(), BackendKind::Local);
        assert!(backend.port_pool().is_none());
        let Backend::Local(local) = backend else {
            panic!("expected local backend");
        };
        assert_eq!(local.workspace_root().to_str(), Some("/ws"));
        assert_eq!(local.workspace_mount(), "workspace");
        assert_eq!(local.local_mount(), Some("/tmp/local"));
        assert_eq!(local.network(), "airbyte");
    }

    #[tokio::test]
    async fn address_resolution_failure_is_fatal() {
        let config = config(&[("WORKER_ENVIRONMENT", "KUBERNETES")]);
        let err = create_backend(&config, &FakeConnector { resolvable: false })
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BackendError::AddressResolution(_)));
    }

    #[test]
    fn unit_names_are_dns_safe() {
        let spec = UnitSpec::new(&JobIdentity::new("Job_42", 3), "source", "img");
        let name = spec.unit_name();
        assert!(name.starts_with("source-job-42-3-"));
        assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        assert_ne!(name, spec.unit_name());
    }
}
