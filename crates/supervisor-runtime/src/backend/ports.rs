use crate::error::BackendError;
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};
use tokio::sync::Semaphore;
use tracing::debug;

/// Fixed set of host ports used to relay connector stdio. Ports go back to
/// the pool when the [`PortLease`] holding them is dropped.
#[derive(Clone)]
pub struct PortPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    free: Mutex<VecDeque<u16>>,
    available: Semaphore,
    size: usize,
}

impl PortPool {
    pub fn new(ports: impl IntoIterator<Item = u16>) -> Self {
        let free: VecDeque<u16> = ports.into_iter().collect();
        let size = free.len();
        Self {
            inner: Arc::new(PoolInner {
                available: Semaphore::new(size),
                free: Mutex::new(free),
                size,
            }),
        }
    }

    pub fn size(&self) -> usize {
        self.inner.size
    }

    pub fn available(&self) -> usize {
        self.inner.available.available_permits()
    }

    /// Waits until `count` ports are free and leases them together.
    pub async fn take(&self, count: usize) -> Result<PortLease, BackendError> {
        if count > self.inner.size {
            return Err(BackendError::PortPoolTooSmall {
                requested: count,
                size: self.inner.size,
            });
        }

        let permits = self
            .inner
            .available
            .acquire_many(count as u32)
            .await
            .map_err(|_| BackendError::PortPoolClosed)?;
        permits.forget();

        let ports: Vec<u16> = {
            let mut free = self
                .inner
                .free
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            free.drain(..count).collect()
        };
        debug!(?ports, "Leased relay ports");

        Ok(PortLease {
            ports,
            pool: self.clone(),
        })
    }

    fn give_back(&self, ports: &[u16]) {
        {
            let mut free = self
                .inner
                .free
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            free.extend(ports.iter().copied());
        }
        self.inner.available.add_permits(ports.len());
        debug!(?ports, "Returned relay ports");
    }
}

pub struct PortLease {
    ports: Vec<u16>,
    pool: PortPool,
}

impl PortLease {
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        self.pool.give_back(&self.ports);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn lease_returns_ports_on_drop() {
        let pool = PortPool::new([9877, 9878, 9879, 9880]);
        assert_eq!(pool.size(), 4);

        let lease = pool.take(2).await.unwrap();
        assert_eq!(lease.ports(), &[9877, 9878]);
        assert_eq!(pool.available(), 2);

        drop(lease);
        assert_eq!(pool.available(), 4);
    }

    #[tokio::test]
    async fn take_waits_for_a_release() {
        let pool = PortPool::new([1, 2]);
        let held = pool.take(2).await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.take(1).await.map(|l| l.ports().to_vec()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        let ports = waiter.await.unwrap().unwrap();
        assert_eq!(ports.len(), 1);
    }

    #[tokio::test]
    async fn oversized_request_fails_fast() {
        let pool = PortPool::new([1, 2, 3, 4]);
        let err = pool.take(5).await.err().unwrap();
        assert!(matches!(
            err,
            BackendError::PortPoolTooSmall {
                requested: 5,
                size: 4
            }
        ));
    }
}
