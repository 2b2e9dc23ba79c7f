use crate::{
    backend::{
        ExecutionUnit, UnitReader, UnitSpec, UnitWriter,
        ports::{PortLease, PortPool},
    },
    error::BackendError,
};
use async_trait::async_trait;
use reqwest::{Certificate, Client, StatusCode};
use serde_json::{Value, json};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use supervisor_config::ClusterSettings;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
pub const RELAY_CONNECT_TIMEOUT: Duration = Duration::from_secs(300);
const MAIN_CONTAINER: &str = "main";
const INIT_IMAGE: &str = "busybox:1.35";
const RELAY_IMAGE: &str = "alpine/socat:1.7.4.3-r0";
const STDIN_PIPE: &str = "/pipes/stdin";
const STDOUT_PIPE: &str = "/pipes/stdout";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Terminated { exit_code: i32 },
}

/// The handful of pod operations the backend needs.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn create_pod(&self, namespace: &str, manifest: &Value) -> Result<(), BackendError>;
    async fn pod_phase(&self, namespace: &str, name: &str) -> Result<PodPhase, BackendError>;
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), BackendError>;
}

/// Builds the API client and resolves the address pods use to reach back.
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    async fn connect(&self, settings: &ClusterSettings) -> Result<Arc<dyn ClusterApi>, BackendError>;
    async fn local_ip(&self) -> Result<IpAddr, BackendError>;
}

/// Runs units as pods. Each pod relays its stdio back to this process over
/// TCP through ports leased from the pool.
pub struct ClusterBackend {
    namespace: String,
    local_ip: IpAddr,
    heartbeat_url: String,
    api: Arc<dyn ClusterApi>,
    ports: PortPool,
    poll_interval: Duration,
    relay_timeout: Duration,
}

impl ClusterBackend {
    pub fn new(
        namespace: String,
        local_ip: IpAddr,
        heartbeat_port: u16,
        api: Arc<dyn ClusterApi>,
        ports: PortPool,
    ) -> Self {
        Self {
            namespace,
            heartbeat_url: format!("{local_ip}:{heartbeat_port}"),
            local_ip,
            api,
            ports,
            poll_interval: Duration::from_secs(1),
            relay_timeout: RELAY_CONNECT_TIMEOUT,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_relay_timeout(mut self, timeout: Duration) -> Self {
        self.relay_timeout = timeout;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn heartbeat_url(&self) -> &str {
        &self.heartbeat_url
    }

    pub fn port_pool(&self) -> &PortPool {
        &self.ports
    }

    pub async fn create(&self, spec: UnitSpec) -> Result<Box<dyn ExecutionUnit>, BackendError> {
        let name = spec.unit_name();
        let lease = self.ports.take(if spec.uses_stdin { 2 } else { 1 }).await?;

        let stdout_port = lease.ports()[0];
        let stdin_port = lease.ports().get(1).copied();

        let stdout = bind_relay(stdout_port).await?;
        let stdin = match stdin_port {
            Some(port) => Some(bind_relay(port).await?),
            None => None,
        };

        let manifest = self.pod_manifest(&name, &spec, stdout_port, stdin_port);
        self.api.create_pod(&self.namespace, &manifest).await?;
        info!(unit = %name, namespace = %self.namespace, image = %spec.image, "Created pod");

        Ok(Box::new(ClusterUnit {
            name,
            namespace: self.namespace.clone(),
            api: self.api.clone(),
            stdin,
            stdout: Some(stdout),
            poll_interval: self.poll_interval,
            relay_timeout: self.relay_timeout,
            deleted: false,
            _lease: lease,
        }))
    }

    pub fn pod_manifest(
        &self,
        name: &str,
        spec: &UnitSpec,
        stdout_port: u16,
        stdin_port: Option<u16>,
    ) -> Value {
        let mut init_script = vec![format!("mkfifo {STDOUT_PIPE}")];
        let mut init_env = Vec::new();
        for (i, (file, contents)) in spec.files.iter().enumerate() {
            init_script.push(format!("printf '%s' \"$FILE_{i}\" > /config/{}", shell_quote(file)));
            init_env.push(json!({ "name": format!("FILE_{i}"), "value": contents }));
        }

        let quoted_args: Vec<String> = spec.args.iter().map(|a| shell_quote(a)).collect();
        let mut main_script = format!(
            "eval \"$AIRBYTE_ENTRYPOINT {}\"",
            double_quote_escape(&quoted_args.join(" "))
        );
        if stdin_port.is_some() {
            init_script.push(format!("mkfifo {STDIN_PIPE}"));
            main_script.push_str(&format!(" < {STDIN_PIPE}"));
        }
        main_script.push_str(&format!(" > {STDOUT_PIPE}"));

        let mut main_env: Vec<Value> = spec
            .env
            .iter()
            .map(|(k, v)| json!({ "name": k, "value": v }))
            .collect();
        main_env.push(json!({ "name": "HEARTBEAT_URL", "value": self.heartbeat_url }));

        let mounts = json!([
            { "name": "config", "mountPath": "/config" },
            { "name": "pipes", "mountPath": "/pipes" },
        ]);

        let mut containers = vec![
            json!({
                "name": MAIN_CONTAINER,
                "image": spec.image,
                "workingDir": "/config",
                "command": ["sh", "-c", main_script],
                "env": main_env,
                "volumeMounts": mounts,
            }),
            json!({
                "name": "relay-stdout",
                "image": RELAY_IMAGE,
                "command": [
                    "sh", "-c",
                    format!("socat -d -u PIPE:{STDOUT_PIPE} TCP:{}:{stdout_port}", self.local_ip),
                ],
                "volumeMounts": mounts,
            }),
        ];
        if let Some(port) = stdin_port {
            containers.push(json!({
                "name": "relay-stdin",
                "image": RELAY_IMAGE,
                "command": [
                    "sh", "-c",
                    format!("socat -d -u TCP:{}:{port} PIPE:{STDIN_PIPE}", self.local_ip),
                ],
                "volumeMounts": mounts,
            }));
        }

        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": name,
                "namespace": self.namespace,
                "labels": {
                    "job_id": spec.job.job_id.as_str(),
                    "attempt_id": spec.job.attempt_id.to_string(),
                    "role": spec.role,
                },
            },
            "spec": {
                "restartPolicy": "Never",
                "initContainers": [{
                    "name": "init",
                    "image": INIT_IMAGE,
                    "command": ["sh", "-c", init_script.join(" && ")],
                    "env": init_env,
                    "volumeMounts": mounts,
                }],
                "containers": containers,
                "volumes": [
                    { "name": "config", "emptyDir": {} },
                    { "name": "pipes", "emptyDir": {} },
                ],
            },
        })
    }
}

async fn bind_relay(port: u16) -> Result<TcpListener, BackendError> {
    TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))
        .await
        .map_err(|source| BackendError::RelayBind { port, source })
}

fn shell_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', r"'\''"))
}

fn double_quote_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

struct ClusterUnit {
    name: String,
    namespace: String,
    api: Arc<dyn ClusterApi>,
    stdin: Option<TcpListener>,
    stdout: Option<TcpListener>,
    poll_interval: Duration,
    relay_timeout: Duration,
    /// Set once `wait` has issued the delete itself.
    deleted: bool,
    _lease: PortLease,
}

impl ClusterUnit {
    async fn exit_code(&self) -> Result<i32, BackendError> {
        loop {
            match self.api.pod_phase(&self.namespace, &self.name).await? {
                PodPhase::Terminated { exit_code } => return Ok(exit_code),
                phase => {
                    debug!(unit = %self.name, ?phase, "Pod still running");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn accept(
        &self,
        listener: TcpListener,
        stream: &'static str,
    ) -> Result<tokio::net::TcpStream, BackendError> {
        match tokio::time::timeout(self.relay_timeout, listener.accept()).await {
            Ok(Ok((socket, peer))) => {
                debug!(unit = %self.name, %peer, stream, "Relay connected");
                Ok(socket)
            }
            Ok(Err(e)) => Err(BackendError::Io(e)),
            Err(_) => Err(BackendError::RelayTimeout {
                unit: self.name.clone(),
                stream,
            }),
        }
    }
}

#[async_trait]
impl ExecutionUnit for ClusterUnit {
    fn name(&self) -> &str {
        &self.name
    }

    async fn take_stdin(&mut self) -> Result<UnitWriter, BackendError> {
        let listener = self.stdin.take().ok_or_else(|| BackendError::StreamUnavailable {
            unit: self.name.clone(),
            stream: "stdin",
        })?;
        let socket = self.accept(listener, "stdin").await?;
        Ok(Box::new(socket))
    }

    async fn take_stdout(&mut self) -> Result<UnitReader, BackendError> {
        let listener = self.stdout.take().ok_or_else(|| BackendError::StreamUnavailable {
            unit: self.name.clone(),
            stream: "stdout",
        })?;
        let socket = self.accept(listener, "stdout").await?;
        Ok(Box::new(socket))
    }

    async fn wait(mut self: Box<Self>) -> Result<i32, BackendError> {
        let result = self.exit_code().await;
        match &result {
            Ok(exit_code) => info!(unit = %self.name, exit_code, "Pod terminated"),
            Err(e) => warn!(unit = %self.name, error = %e, "Lost track of pod"),
        }

        self.deleted = true;
        if let Err(e) = self.api.delete_pod(&self.namespace, &self.name).await {
            warn!(unit = %self.name, error = %e, "Failed to delete pod");
        }
        result
    }
}

/// Units abandoned before `wait` (an earlier step failed) still get their pod
/// deleted, best effort, on whatever runtime is current.
impl Drop for ClusterUnit {
    fn drop(&mut self) {
        if self.deleted {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(unit = %self.name, "No runtime left to delete pod");
            return;
        };

        let api = self.api.clone();
        let namespace = self.namespace.clone();
        let name = self.name.clone();
        runtime.spawn(async move {
            match api.delete_pod(&namespace, &name).await {
                Ok(()) => info!(unit = %name, "Deleted abandoned pod"),
                Err(e) => warn!(unit = %name, error = %e, "Failed to delete abandoned pod"),
            }
        });
    }
}

/// Derives the unit phase from a pod object. The main container decides;
/// relay sidecars may outlive it by a moment.
pub fn phase_from_pod(pod: &Value) -> PodPhase {
    let main = pod
        .pointer("/status/containerStatuses")
        .and_then(Value::as_array)
        .and_then(|statuses| {
            statuses
                .iter()
                .find(|s| s.get("name").and_then(Value::as_str) == Some(MAIN_CONTAINER))
        });

    if let Some(exit_code) = main
        .and_then(|s| s.pointer("/state/terminated/exitCode"))
        .and_then(Value::as_i64)
    {
        return PodPhase::Terminated {
            exit_code: exit_code as i32,
        };
    }

    match pod.pointer("/status/phase").and_then(Value::as_str) {
        Some("Running") => PodPhase::Running,
        Some("Succeeded") => PodPhase::Terminated { exit_code: 0 },
        Some("Failed") => PodPhase::Terminated { exit_code: 1 },
        _ => PodPhase::Pending,
    }
}

/// Pod operations against the API server over plain REST.
pub struct HttpClusterApi {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpClusterApi {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        ca_pem: Option<&[u8]>,
    ) -> Result<Self, BackendError> {
        let mut builder = Client::builder();
        if let Some(pem) = ca_pem {
            let cert = Certificate::from_pem(pem)
                .map_err(|e| BackendError::ClientConstruction(e.to_string()))?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder
            .build()
            .map_err(|e| BackendError::ClientConstruction(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn pods_url(&self, namespace: &str) -> String {
        format!("{}/api/v1/namespaces/{namespace}/pods", self.base_url)
    }

    async fn check(
        response: reqwest::Response,
        operation: String,
    ) -> Result<reqwest::Response, BackendError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::ClusterStatus {
            operation,
            status,
            body,
        })
    }
}

#[async_trait]
impl ClusterApi for HttpClusterApi {
    async fn create_pod(&self, namespace: &str, manifest: &Value) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.pods_url(namespace))
            .bearer_auth(&self.token)
            .json(manifest)
            .send()
            .await?;
        Self::check(response, "create pod".into()).await?;
        Ok(())
    }

    async fn pod_phase(&self, namespace: &str, name: &str) -> Result<PodPhase, BackendError> {
        let response = self
            .client
            .get(format!("{}/{name}", self.pods_url(namespace)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let pod: Value = Self::check(response, format!("get pod {name}"))
            .await?
            .json()
            .await?;
        Ok(phase_from_pod(&pod))
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), BackendError> {
        let response = self
            .client
            .delete(format!("{}/{name}", self.pods_url(namespace)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(response, format!("delete pod {name}")).await?;
        Ok(())
    }
}

/// Connects with the pod's own service account.
#[derive(Debug, Clone)]
pub struct InClusterConnector {
    service_account_dir: PathBuf,
}

impl Default for InClusterConnector {
    fn default() -> Self {
        Self {
            service_account_dir: PathBuf::from(SERVICE_ACCOUNT_DIR),
        }
    }
}

impl InClusterConnector {
    pub fn new(service_account_dir: impl Into<PathBuf>) -> Self {
        Self {
            service_account_dir: service_account_dir.into(),
        }
    }
}

#[async_trait]
impl ClusterConnector for InClusterConnector {
    async fn connect(&self, settings: &ClusterSettings) -> Result<Arc<dyn ClusterApi>, BackendError> {
        let host = settings.api_host.as_deref().ok_or_else(|| {
            BackendError::ClientConstruction("KUBERNETES_SERVICE_HOST is not set".into())
        })?;
        let port = settings.api_port.unwrap_or(443);

        let token = tokio::fs::read_to_string(self.service_account_dir.join("token"))
            .await
            .map_err(|e| BackendError::ClientConstruction(format!("service account token: {e}")))?;
        let ca = tokio::fs::read(self.service_account_dir.join("ca.crt")).await.ok();

        let api = HttpClusterApi::new(format!("https://{host}:{port}"), token.trim(), ca.as_deref())?;
        Ok(Arc::new(api))
    }

    async fn local_ip(&self) -> Result<IpAddr, BackendError> {
        let hostname = match std::env::var("HOSTNAME") {
            Ok(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => tokio::fs::read_to_string("/etc/hostname")
                .await
                .map_err(|e| BackendError::AddressResolution(e.to_string()))?
                .trim()
                .to_string(),
        };

        let mut addrs = tokio::net::lookup_host((hostname.as_str(), 0))
            .await
            .map_err(|e| BackendError::AddressResolution(format!("{hostname}: {e}")))?;
        addrs
            .next()
            .map(|addr| addr.ip())
            .ok_or_else(|| BackendError::AddressResolution(format!("{hostname}: no addresses")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::identifiers::JobIdentity;
    use std::sync::Mutex;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpStream,
    };

    #[derive(Default)]
    struct FakeApi {
        created: Mutex<Vec<Value>>,
        deleted: Mutex<Vec<String>>,
        phases: Mutex<Vec<PodPhase>>,
        unreachable: Mutex<bool>,
    }

    #[async_trait]
    impl ClusterApi for FakeApi {
        async fn create_pod(&self, _: &str, manifest: &Value) -> Result<(), BackendError> {
            self.created.lock().unwrap().push(manifest.clone());
            Ok(())
        }

        async fn pod_phase(&self, _: &str, name: &str) -> Result<PodPhase, BackendError> {
            if *self.unreachable.lock().unwrap() {
                return Err(BackendError::ClusterStatus {
                    operation: format!("get pod {name}"),
                    status: 503,
                    body: String::new(),
                });
            }
            let mut phases = self.phases.lock().unwrap();
            Ok(if phases.len() > 1 {
                phases.remove(0)
            } else {
                phases[0]
            })
        }

        async fn delete_pod(&self, _: &str, name: &str) -> Result<(), BackendError> {
            self.deleted.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    fn free_ports(count: usize) -> Vec<u16> {
        let listeners: Vec<std::net::TcpListener> = (0..count)
            .map(|_| std::net::TcpListener::bind("127.0.0.1:0").unwrap())
            .collect();
        listeners
            .iter()
            .map(|l| l.local_addr().unwrap().port())
            .collect()
    }

    fn backend(api: Arc<FakeApi>, ports: Vec<u16>) -> ClusterBackend {
        ClusterBackend::new(
            "jobs".into(),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)),
            9000,
            api,
            PortPool::new(ports),
        )
        .with_poll_interval(Duration::from_millis(5))
        .with_relay_timeout(Duration::from_secs(5))
    }

    #[test]
    fn manifest_wires_relays_and_files() {
        let backend = backend(Arc::new(FakeApi::default()), vec![1, 2, 3, 4]);
        let spec = UnitSpec::new(&JobIdentity::new("42", 0), "destination", "airbyte/dest:1")
            .args(["write", "--config", "destination_config.json"])
            .file("destination_config.json", r#"{"host":"db"}"#)
            .with_stdin();

        let manifest = backend.pod_manifest("destination-42-0-x", &spec, 9877, Some(9878));
        assert_eq!(manifest["metadata"]["labels"]["job_id"], "42");
        assert_eq!(manifest["spec"]["restartPolicy"], "Never");

        let init = &manifest["spec"]["initContainers"][0];
        let script = init["command"][2].as_str().unwrap();
        assert!(script.contains("mkfifo /pipes/stdin"));
        assert!(script.contains("> /config/'destination_config.json'"));
        assert_eq!(init["env"][0]["value"], r#"{"host":"db"}"#);

        let containers = manifest["spec"]["containers"].as_array().unwrap();
        assert_eq!(containers.len(), 3);
        let main = containers[0]["command"][2].as_str().unwrap();
        assert!(main.contains("'write' '--config' 'destination_config.json'"));
        assert!(main.ends_with("< /pipes/stdin > /pipes/stdout"));
        assert!(
            containers[0]["env"]
                .as_array()
                .unwrap()
                .contains(&json!({ "name": "HEARTBEAT_URL", "value": "10.0.0.5:9000" }))
        );
        assert!(containers[1]["command"][2].as_str().unwrap().ends_with("TCP:10.0.0.5:9877"));
    }

    #[test]
    fn quotes_embedded_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(double_quote_escape(r#"$HOME "x""#), r#"\$HOME \"x\""#);
    }

    #[test]
    fn phase_prefers_main_container_state() {
        let pod = json!({
            "status": {
                "phase": "Running",
                "containerStatuses": [
                    { "name": "relay-stdout", "state": { "running": {} } },
                    { "name": "main", "state": { "terminated": { "exitCode": 2 } } },
                ],
            },
        });
        assert_eq!(phase_from_pod(&pod), PodPhase::Terminated { exit_code: 2 });
        assert_eq!(phase_from_pod(&json!({ "status": { "phase": "Pending" } })), PodPhase::Pending);
        assert_eq!(phase_from_pod(&json!({ "status": { "phase": "Running" } })), PodPhase::Running);
    }

    #[tokio::test]
    async fn relays_stdio_and_cleans_up() {
        let api = Arc::new(FakeApi::default());
        *api.phases.lock().unwrap() = vec![PodPhase::Running, PodPhase::Terminated { exit_code: 0 }];
        let ports = free_ports(2);
        let backend = backend(api.clone(), ports.clone());

        let spec = UnitSpec::new(&JobIdentity::new("42", 0), "destination", "img").with_stdin();
        let mut unit = backend.create(spec).await.unwrap();
        assert_eq!(backend.port_pool().available(), 0);

        // Play the relay sidecars.
        let mut pod_stdout = TcpStream::connect(("127.0.0.1", ports[0])).await.unwrap();
        let mut pod_stdin = TcpStream::connect(("127.0.0.1", ports[1])).await.unwrap();

        let mut stdin = unit.take_stdin().await.unwrap();
        stdin.write_all(b"in\n").await.unwrap();
        drop(stdin);
        let mut received = String::new();
        pod_stdin.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "in\n");

        let mut stdout = unit.take_stdout().await.unwrap();
        pod_stdout.write_all(b"out\n").await.unwrap();
        drop(pod_stdout);
        let mut sent = String::new();
        stdout.read_to_string(&mut sent).await.unwrap();
        assert_eq!(sent, "out\n");

        let name = unit.name().to_string();
        assert_eq!(unit.wait().await.unwrap(), 0);
        assert_eq!(api.deleted.lock().unwrap().as_slice(), &[name]);
        assert_eq!(backend.port_pool().available(), 2);
    }

    #[tokio::test]
    async fn pod_is_deleted_when_polling_fails() {
        let api = Arc::new(FakeApi::default());
        *api.unreachable.lock().unwrap() = true;
        let backend = backend(api.clone(), free_ports(1));

        let spec = UnitSpec::new(&JobIdentity::new("42", 0), "source", "img");
        let unit = backend.create(spec).await.unwrap();
        let name = unit.name().to_string();

        let err = unit.wait().await.unwrap_err();
        assert!(matches!(err, BackendError::ClusterStatus { status: 503, .. }));
        assert_eq!(api.deleted.lock().unwrap().as_slice(), &[name]);
    }

    #[tokio::test]
    async fn abandoned_unit_deletes_its_pod() {
        let api = Arc::new(FakeApi::default());
        let backend = backend(api.clone(), free_ports(2));

        let spec = UnitSpec::new(&JobIdentity::new("42", 0), "destination", "img").with_stdin();
        let unit = backend.create(spec).await.unwrap();
        let name = unit.name().to_string();
        drop(unit);

        for _ in 0..100 {
            if !api.deleted.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(api.deleted.lock().unwrap().as_slice(), &[name]);
        assert_eq!(api.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_relay_times_out() {
        let api = Arc::new(FakeApi::default());
        let backend = backend(api, free_ports(1)).with_relay_timeout(Duration::from_millis(20));

        let spec = UnitSpec::new(&JobIdentity::new("42", 0), "source", "img");
        let mut unit = backend.create(spec).await.unwrap();
        let err = unit.take_stdout().await.err().unwrap();
        assert!(matches!(err, BackendError::RelayTimeout { stream: "stdout", .. }));
    }
}
