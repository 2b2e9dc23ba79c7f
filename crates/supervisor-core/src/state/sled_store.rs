use crate::{error::StoreError, state::StatusStore};
use async_trait::async_trait;
use model::execution::status::StatusRecord;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::debug;

const OPEN_ATTEMPTS: u32 = 20;
const OPEN_BACKOFF: Duration = Duration::from_millis(25);

/// Embedded store, used when the launcher and the supervisor share a volume.
///
/// sled locks its files for as long as a handle is open, so the database is
/// opened for each operation and closed again. Between writes any other
/// process, including `orchestrator status`, can read it.
pub struct SledStatusStore {
    path: PathBuf,
}

impl SledStatusStore {
    /// Creates the database if needed and checks that it can be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, sled::Error> {
        let path = path.as_ref().to_path_buf();
        open_db(&path)?;
        Ok(Self { path })
    }

    /// Reads the last record written under `key`. Used by operator tooling,
    /// never by the supervisor itself.
    pub fn read(&self, key: &str) -> Result<Option<StatusRecord>, StoreError> {
        let db = open_db(&self.path)?;
        match db.get(key)? {
            Some(bytes) => Ok(Some(StatusRecord::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }
}

/// Another process may hold the lock for the length of one operation.
fn open_db(path: &Path) -> Result<sled::Db, sled::Error> {
    let mut attempt = 1;
    loop {
        match sled::Config::new().path(path).flush_every_ms(None).open() {
            Err(sled::Error::Io(e)) if attempt < OPEN_ATTEMPTS => {
                debug!(path = %path.display(), attempt, error = %e, "Status store busy");
                std::thread::sleep(OPEN_BACKOFF);
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[async_trait]
impl StatusStore for SledStatusStore {
    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.path.clone();
        let key = key.to_string();
        let value = value.to_vec();

        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let db = open_db(&path)?;
            db.insert(key.as_bytes(), value)?;
            db.flush()?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{core::identifiers::ExecutionUnitIdentity, execution::status::JobStatus};
    use tempfile::tempdir;

    #[tokio::test]
    async fn last_write_wins() {
        let dir = tempdir().unwrap();
        let store = SledStatusStore::open(dir.path()).unwrap();
        let unit = ExecutionUnitIdentity::new("job-42-0", "jobs");

        for record in [
            StatusRecord::initializing(&unit),
            StatusRecord::running(&unit),
            StatusRecord::succeeded(&unit, Some("done".into())),
        ] {
            store.write("state/job-42-0", &record.to_bytes().unwrap()).await.unwrap();
        }

        let record = store.read("state/job-42-0").unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Succeeded);
        assert_eq!(record.payload.as_deref(), Some("done"));
        assert!(store.read("state/other").unwrap().is_none());
    }

    #[tokio::test]
    async fn readable_by_another_handle_mid_run() {
        let dir = tempdir().unwrap();
        let writer = SledStatusStore::open(dir.path()).unwrap();
        let unit = ExecutionUnitIdentity::new("job-42-0", "jobs");

        let initializing = StatusRecord::initializing(&unit).to_bytes().unwrap();
        writer.write("state/job-42-0", &initializing).await.unwrap();

        let poller = SledStatusStore::open(dir.path()).unwrap();
        let seen = poller.read("state/job-42-0").unwrap().unwrap();
        assert_eq!(seen.status, JobStatus::Initializing);

        let running = StatusRecord::running(&unit).to_bytes().unwrap();
        writer.write("state/job-42-0", &running).await.unwrap();
        let seen = poller.read("state/job-42-0").unwrap().unwrap();
        assert_eq!(seen.status, JobStatus::Running);
    }
}
