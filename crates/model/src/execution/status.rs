use crate::{core::identifiers::ExecutionUnitIdentity, execution::errors::ModelError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Initializing,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Initializing => "INITIALIZING",
            JobStatus::Running => "RUNNING",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lifecycle write as seen by the external poller.
///
/// Only the constructors below build records, so a SUCCEEDED record always
/// carries a payload (possibly empty) and every other status carries none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub unit: ExecutionUnitIdentity,
    pub status: JobStatus,
    pub payload: Option<String>,
    pub written_at: DateTime<Utc>,
}

impl StatusRecord {
    fn new(unit: &ExecutionUnitIdentity, status: JobStatus, payload: Option<String>) -> Self {
        Self {
            unit: unit.clone(),
            status,
            payload,
            written_at: Utc::now(),
        }
    }

    pub fn initializing(unit: &ExecutionUnitIdentity) -> Self {
        Self::new(unit, JobStatus::Initializing, None)
    }

    pub fn running(unit: &ExecutionUnitIdentity) -> Self {
        Self::new(unit, JobStatus::Running, None)
    }

    pub fn succeeded(unit: &ExecutionUnitIdentity, output: Option<String>) -> Self {
        Self::new(unit, JobStatus::Succeeded, Some(output.unwrap_or_default()))
    }

    pub fn failed(unit: &ExecutionUnitIdentity) -> Self {
        Self::new(unit, JobStatus::Failed, None)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
