/// Port the heartbeat responder listens on inside the execution unit.
pub const DEFAULT_HEARTBEAT_PORT: u16 = 9000;

/// Two relay ports (stdin + stdout) for each side of a connector pair.
pub const PORTS_PER_PAIR: usize = 4;

pub const DEFAULT_ORCHESTRATOR_PORTS: [u16; PORTS_PER_PAIR] = [9877, 9878, 9879, 9880];

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_WORKSPACE_ROOT: &str = "/tmp/workspace";
pub const DEFAULT_DOCKER_NETWORK: &str = "host";
pub const DEFAULT_STATE_PREFIX: &str = "state/";
pub const DEFAULT_NORMALIZATION_IMAGE: &str = "airbyte/normalization:0.1.61";

/// Variables copied from the handed-off environment into every execution unit.
pub const ENV_VARS_TO_TRANSFER: &[&str] = &[
    "LOG_LEVEL",
    "JOB_MAIN_CONTAINER_CPU_REQUEST",
    "JOB_MAIN_CONTAINER_CPU_LIMIT",
    "JOB_MAIN_CONTAINER_MEMORY_REQUEST",
    "JOB_MAIN_CONTAINER_MEMORY_LIMIT",
    "JOB_KUBE_TOLERATIONS",
    "JOB_KUBE_NODE_SELECTORS",
    "JOB_KUBE_MAIN_CONTAINER_IMAGE_PULL_POLICY",
];

pub mod keys {
    pub const WORKER_ENVIRONMENT: &str = "WORKER_ENVIRONMENT";
    pub const JOB_KUBE_NAMESPACE: &str = "JOB_KUBE_NAMESPACE";
    pub const KUBERNETES_SERVICE_HOST: &str = "KUBERNETES_SERVICE_HOST";
    pub const KUBERNETES_SERVICE_PORT: &str = "KUBERNETES_SERVICE_PORT";
    pub const WORKSPACE_ROOT: &str = "WORKSPACE_ROOT";
    pub const WORKSPACE_DOCKER_MOUNT: &str = "WORKSPACE_DOCKER_MOUNT";
    pub const LOCAL_DOCKER_MOUNT: &str = "LOCAL_DOCKER_MOUNT";
    pub const DOCKER_NETWORK: &str = "DOCKER_NETWORK";
    pub const STATE_STORAGE_TYPE: &str = "STATE_STORAGE_TYPE";
    pub const STATE_STORAGE_SLED_PATH: &str = "STATE_STORAGE_SLED_PATH";
    pub const STATE_STORAGE_HTTP_URL: &str = "STATE_STORAGE_HTTP_URL";
    pub const STATE_STORAGE_PREFIX: &str = "STATE_STORAGE_PREFIX";
    pub const HEARTBEAT_PORT: &str = "HEARTBEAT_PORT";
    pub const ORCHESTRATOR_PORTS: &str = "ORCHESTRATOR_PORTS";
    pub const NORMALIZATION_IMAGE: &str = "NORMALIZATION_IMAGE";
}
