use crate::{error::StoreError, state::StatusStore};
use model::{
    core::identifiers::ExecutionUnitIdentity,
    execution::status::{JobStatus, StatusRecord},
};
use std::sync::Arc;
use tracing::{info, warn};

/// Publishes lifecycle transitions for one execution unit.
#[derive(Clone)]
pub struct StatusReporter {
    store: Arc<dyn StatusStore>,
    prefix: String,
}

impl StatusReporter {
    pub fn new(store: Arc<dyn StatusStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn key_for(&self, unit: &ExecutionUnitIdentity) -> String {
        format!("{}{}", self.prefix, unit.name)
    }

    /// Writes `status` for `unit`. Only SUCCEEDED keeps a payload; a missing
    /// one is stored as the empty string.
    pub async fn record(
        &self,
        unit: &ExecutionUnitIdentity,
        status: JobStatus,
        payload: Option<String>,
    ) -> Result<StatusRecord, StoreError> {
        if status != JobStatus::Succeeded && payload.is_some() {
            warn!(%status, "Dropping payload, only SUCCEEDED carries one");
        }

        let record = match status {
            JobStatus::Initializing => StatusRecord::initializing(unit),
            JobStatus::Running => StatusRecord::running(unit),
            JobStatus::Succeeded => StatusRecord::succeeded(unit, payload),
            JobStatus::Failed => StatusRecord::failed(unit),
        };

        let key = self.key_for(unit);
        self.store.write(&key, &record.to_bytes()?).await?;

        info!(%key, %status, "Recorded status");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::memory::MemoryStatusStore;

    #[tokio::test]
    async fn key_is_prefix_plus_unit_name() {
        let store = Arc::new(MemoryStatusStore::new());
        let reporter = StatusReporter::new(store.clone(), "state/");
        let unit = ExecutionUnitIdentity::new("job-42-0", "jobs");

        reporter
            .record(&unit, JobStatus::Initializing, None)
            .await
            .unwrap();

        assert_eq!(reporter.key_for(&unit), "state/job-42-0");
        assert_eq!(
            store.statuses("state/job-42-0"),
            vec![JobStatus::Initializing]
        );
    }

    #[tokio::test]
    async fn payload_only_survives_on_success() {
        let store = Arc::new(MemoryStatusStore::new());
        let reporter = StatusReporter::new(store.clone(), "");
        let unit = ExecutionUnitIdentity::new("job-42-0", "jobs");

        let failed = reporter
            .record(&unit, JobStatus::Failed, Some("boom".into()))
            .await
            .unwrap();
        assert_eq!(failed.payload, None);

        let succeeded = reporter
            .record(&unit, JobStatus::Succeeded, None)
            .await
            .unwrap();
        assert_eq!(succeeded.payload.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn store_failures_propagate() {
        let store = Arc::new(MemoryStatusStore::new());
        store.fail_after(0);
        let reporter = StatusReporter::new(store, "");
        let unit = ExecutionUnitIdentity::new("job-42-0", "jobs");

        let err = reporter
            .record(&unit, JobStatus::Running, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
