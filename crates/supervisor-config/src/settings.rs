use crate::{
    constants::{self, keys},
    env::EnvView,
    error::ConfigError,
};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Where execution units are created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerEnvironment {
    Kubernetes,
    Docker,
}

impl FromStr for WorkerEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "KUBERNETES" => Ok(WorkerEnvironment::Kubernetes),
            "DOCKER" => Ok(WorkerEnvironment::Docker),
            other => Err(format!("expected KUBERNETES or DOCKER, got {other}")),
        }
    }
}

impl fmt::Display for WorkerEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerEnvironment::Kubernetes => f.write_str("KUBERNETES"),
            WorkerEnvironment::Docker => f.write_str("DOCKER"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSettings {
    pub namespace: String,
    /// API server address, as injected into pods by the cluster.
    pub api_host: Option<String>,
    pub api_port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSettings {
    pub workspace_root: PathBuf,
    pub workspace_mount: String,
    pub local_mount: Option<String>,
    pub network: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateStorageKind {
    Sled { path: PathBuf },
    Http { base_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateStorage {
    pub kind: StateStorageKind,
    pub prefix: String,
}

impl StateStorage {
    /// Only the settings needed to publish status. Everything else is
    /// resolved after the first status write.
    pub fn from_env_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let env = EnvView::new(vars);
        Self::resolve(&env, &workspace_root(&env))
    }

    fn resolve(env: &EnvView<'_>, workspace_root: &Path) -> Result<Self, ConfigError> {
        let kind = match env
            .get(keys::STATE_STORAGE_TYPE)
            .map(str::to_ascii_uppercase)
            .as_deref()
        {
            None | Some("SLED") => StateStorageKind::Sled {
                path: env
                    .get(keys::STATE_STORAGE_SLED_PATH)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| workspace_root.join(".state")),
            },
            Some("HTTP") => StateStorageKind::Http {
                base_url: env
                    .get(keys::STATE_STORAGE_HTTP_URL)
                    .ok_or(ConfigError::Missing(keys::STATE_STORAGE_HTTP_URL))?
                    .trim_end_matches('/')
                    .to_string(),
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: keys::STATE_STORAGE_TYPE,
                    value: other.to_string(),
                    reason: "expected SLED or HTTP".into(),
                });
            }
        };

        Ok(StateStorage {
            kind,
            prefix: env
                .raw(keys::STATE_STORAGE_PREFIX)
                .unwrap_or(constants::DEFAULT_STATE_PREFIX)
                .to_string(),
        })
    }
}

fn workspace_root(env: &EnvView<'_>) -> PathBuf {
    PathBuf::from(env.get_or(keys::WORKSPACE_ROOT, constants::DEFAULT_WORKSPACE_ROOT))
}

/// Typed view of the job environment. Resolved once per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub worker_environment: WorkerEnvironment,
    pub cluster: ClusterSettings,
    pub local: LocalSettings,
    pub state_storage: StateStorage,
    pub heartbeat_port: u16,
    pub orchestrator_ports: Vec<u16>,
    pub normalization_image: String,
    pub forwarded_env: BTreeMap<String, String>,
}

impl SupervisorConfig {
    pub fn from_env_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let env = EnvView::new(vars);

        let worker_environment =
            env.parse_or(keys::WORKER_ENVIRONMENT, WorkerEnvironment::Docker)?;

        let cluster = ClusterSettings {
            namespace: env.get_or(keys::JOB_KUBE_NAMESPACE, constants::DEFAULT_NAMESPACE),
            api_host: env.get(keys::KUBERNETES_SERVICE_HOST).map(str::to_string),
            api_port: env
                .get(keys::KUBERNETES_SERVICE_PORT)
                .map(|_| env.parse_or(keys::KUBERNETES_SERVICE_PORT, 443))
                .transpose()?,
        };

        let workspace_root = workspace_root(&env);
        let local = LocalSettings {
            workspace_mount: env
                .get(keys::WORKSPACE_DOCKER_MOUNT)
                .map(str::to_string)
                .unwrap_or_else(|| workspace_root.display().to_string()),
            local_mount: env.get(keys::LOCAL_DOCKER_MOUNT).map(str::to_string),
            network: env.get_or(keys::DOCKER_NETWORK, constants::DEFAULT_DOCKER_NETWORK),
            workspace_root,
        };

        let state_storage = StateStorage::resolve(&env, &local.workspace_root)?;

        Ok(Self {
            worker_environment,
            cluster,
            local,
            state_storage,
            heartbeat_port: env
                .parse_or(keys::HEARTBEAT_PORT, constants::DEFAULT_HEARTBEAT_PORT)?,
            orchestrator_ports: Self::orchestrator_ports(&env)?,
            normalization_image: env.get_or(
                keys::NORMALIZATION_IMAGE,
                constants::DEFAULT_NORMALIZATION_IMAGE,
            ),
            forwarded_env: env.forwarded(),
        })
    }

    /// Workspace directory owned by one attempt.
    pub fn job_root(&self, job_id: &str, attempt_id: u64) -> PathBuf {
        self.local
            .workspace_root
            .join(job_id)
            .join(attempt_id.to_string())
    }

    fn orchestrator_ports(env: &EnvView<'_>) -> Result<Vec<u16>, ConfigError> {
        let Some(raw) = env.get(keys::ORCHESTRATOR_PORTS) else {
            return Ok(constants::DEFAULT_ORCHESTRATOR_PORTS.to_vec());
        };

        let mut ports = BTreeSet::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let port = part.parse::<u16>().map_err(|e| ConfigError::Invalid {
                key: keys::ORCHESTRATOR_PORTS,
                value: part.to_string(),
                reason: e.to_string(),
            })?;
            ports.insert(port);
        }

        if ports.len() != constants::PORTS_PER_PAIR {
            return Err(ConfigError::PortCount {
                expected: constants::PORTS_PER_PAIR,
                actual: ports.len(),
            });
        }

        Ok(ports.into_iter().collect())
    }
}
