use crate::{
    error::HandoffError,
    retry::{RetryDisposition, RetryError, RetryPolicy},
};
use model::{
    core::{
        application::ApplicationKind,
        identifiers::{ExecutionUnitIdentity, JobIdentity},
    },
    execution::context::JobContext,
};
use serde::de::DeserializeOwned;
use std::{collections::HashMap, path::PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const CONFIG_DIR: &str = "/config";
pub const SUCCESS_FILE_NAME: &str = "FINISHED_UPLOADING";
pub const APPLICATION_FILE: &str = "application.txt";
pub const ENV_MAP_FILE: &str = "envMap.json";
pub const JOB_RUN_CONFIG_FILE: &str = "jobRunConfig.json";
pub const UNIT_INFO_FILE: &str = "kubePodInfo.json";
pub const INPUT_FILE: &str = "input.json";

/// Directory the launcher copies an attempt's configuration into before
/// dropping the success marker.
#[derive(Debug, Clone)]
pub struct HandoffDir {
    root: PathBuf,
}

impl HandoffDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Blocks until the success marker exists. Polls on `policy`; gives up
    /// with [`HandoffError::Timeout`] once its attempts run out.
    pub async fn wait_until_ready(
        &self,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<(), HandoffError> {
        let marker = self.root.join(SUCCESS_FILE_NAME);

        let result = policy
            .run(
                cancel,
                || {
                    let marker = marker.clone();
                    async move {
                        match tokio::fs::try_exists(&marker).await {
                            Ok(true) => Ok(()),
                            Ok(false) => {
                                info!("Waiting for config file transfers to complete...");
                                Err(HandoffError::NotReady)
                            }
                            Err(source) => Err(HandoffError::Read {
                                file: SUCCESS_FILE_NAME,
                                source,
                            }),
                        }
                    }
                },
                |err| match err {
                    HandoffError::NotReady => RetryDisposition::Retry,
                    _ => RetryDisposition::Stop,
                },
            )
            .await;

        match result {
            Ok(()) => {
                debug!(dir = %self.root.display(), "Handoff complete");
                Ok(())
            }
            Err(RetryError::Fatal(err)) => Err(err),
            Err(RetryError::AttemptsExceeded(_)) => Err(HandoffError::Timeout {
                polls: policy.max_attempts,
            }),
            Err(RetryError::Cancelled) => Err(HandoffError::Cancelled),
        }
    }

    /// Reads the four context values. The reads are independent of each other.
    pub async fn load_context(&self) -> Result<JobContext, HandoffError> {
        let (application, environment, job, unit) = tokio::try_join!(
            self.read_application(),
            self.read_json::<HashMap<String, String>>(ENV_MAP_FILE),
            self.read_json::<JobIdentity>(JOB_RUN_CONFIG_FILE),
            self.read_json::<ExecutionUnitIdentity>(UNIT_INFO_FILE),
        )?;

        Ok(JobContext::new(application, environment, job, unit))
    }

    /// Job-kind specific input, read by the orchestrator when it runs.
    pub async fn read_input<T: DeserializeOwned>(&self) -> Result<T, HandoffError> {
        self.read_json(INPUT_FILE).await
    }

    async fn read_application(&self) -> Result<ApplicationKind, HandoffError> {
        let raw = self.read_string(APPLICATION_FILE).await?;
        Ok(raw.parse()?)
    }

    async fn read_json<T: DeserializeOwned>(&self, file: &'static str) -> Result<T, HandoffError> {
        let raw = self.read_string(file).await?;
        serde_json::from_str(&raw).map_err(|source| HandoffError::Parse { file, source })
    }

    async fn read_string(&self, file: &'static str) -> Result<String, HandoffError> {
        tokio::fs::read_to_string(self.root.join(file))
            .await
            .map_err(|source| HandoffError::Read { file, source })
    }
}
