use crate::error::StoreError;
use async_trait::async_trait;
use std::sync::Arc;
use supervisor_config::{StateStorage, StateStorageKind};

pub mod http_store;
pub mod memory;
pub mod sled_store;

/// Write side of the external key-value store polled by the launcher.
/// Writes are last-write-wins; the supervisor never reads them back.
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}

/// Opens the store selected by configuration.
pub fn open(storage: &StateStorage) -> Result<Arc<dyn StatusStore>, StoreError> {
    match &storage.kind {
        StateStorageKind::Sled { path } => Ok(Arc::new(sled_store::SledStatusStore::open(path)?)),
        StateStorageKind::Http { base_url } => {
            Ok(Arc::new(http_store::HttpStatusStore::new(base_url.clone())?))
        }
    }
}
