use crate::{error::StoreError, state::StatusStore};
use async_trait::async_trait;
use model::execution::status::{JobStatus, StatusRecord};
use std::sync::Mutex;

/// Keeps every write in order. Lets tests observe the exact sequence a
/// poller would have seen, and inject write failures.
#[derive(Default)]
pub struct MemoryStatusStore {
    writes: Mutex<Vec<(String, Vec<u8>)>>,
    fail_after: Mutex<Option<usize>>,
    rejected: Mutex<Option<JobStatus>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `n` more writes, then reject every following one.
    pub fn fail_after(&self, n: usize) {
        if let Ok(mut guard) = self.fail_after.lock() {
            *guard = Some(n);
        }
    }

    /// Reject every write of `status`, whatever the budget says.
    pub fn reject(&self, status: JobStatus) {
        if let Ok(mut guard) = self.rejected.lock() {
            *guard = Some(status);
        }
    }

    pub fn keys(&self) -> Vec<String> {
        let writes = self.writes.lock().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = writes.iter().map(|(k, _)| k.clone()).collect();
        keys.dedup();
        keys
    }

    pub fn records(&self, key: &str) -> Vec<StatusRecord> {
        let writes = self.writes.lock().unwrap_or_else(|e| e.into_inner());
        writes
            .iter()
            .filter(|(k, _)| k == key)
            .filter_map(|(_, bytes)| StatusRecord::from_bytes(bytes).ok())
            .collect()
    }

    pub fn statuses(&self, key: &str) -> Vec<JobStatus> {
        self.records(key).into_iter().map(|r| r.status).collect()
    }

    pub fn total_writes(&self) -> usize {
        self.writes.lock().map(|w| w.len()).unwrap_or(0)
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let rejected = *self
            .rejected
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if let Some(status) = rejected {
            if StatusRecord::from_bytes(value).is_ok_and(|r| r.status == status) {
                return Err(StoreError::Unavailable(format!(
                    "{status:?} write to '{key}' rejected"
                )));
            }
        }

        {
            let mut budget = self
                .fail_after
                .lock()
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            match budget.as_mut() {
                Some(0) => {
                    return Err(StoreError::Unavailable(format!(
                        "write to '{key}' rejected"
                    )));
                }
                Some(remaining) => *remaining -= 1,
                None => {}
            }
        }

        self.writes
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .push((key.to_string(), value.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::identifiers::ExecutionUnitIdentity;

    #[tokio::test]
    async fn rejects_writes_past_the_budget() {
        let store = MemoryStatusStore::new();
        let unit = ExecutionUnitIdentity::new("job-1-0", "jobs");
        store.fail_after(1);

        let first = StatusRecord::initializing(&unit).to_bytes().unwrap();
        let second = StatusRecord::running(&unit).to_bytes().unwrap();
        store.write("job-1-0", &first).await.unwrap();
        assert!(store.write("job-1-0", &second).await.is_err());

        assert_eq!(store.statuses("job-1-0"), vec![JobStatus::Initializing]);
        assert_eq!(store.keys(), vec!["job-1-0".to_string()]);
    }

    #[tokio::test]
    async fn rejects_only_the_chosen_status() {
        let store = MemoryStatusStore::new();
        let unit = ExecutionUnitIdentity::new("job-1-0", "jobs");
        store.reject(JobStatus::Running);

        let running = StatusRecord::running(&unit).to_bytes().unwrap();
        let failed = StatusRecord::failed(&unit).to_bytes().unwrap();
        assert!(store.write("job-1-0", &running).await.is_err());
        store.write("job-1-0", &failed).await.unwrap();

        assert_eq!(store.statuses("job-1-0"), vec![JobStatus::Failed]);
    }
}
