#![allow(dead_code)]

use std::{path::Path, sync::Arc, time::Duration};
use supervisor_core::{
    handoff::HandoffDir,
    retry::RetryPolicy,
    state::{StatusStore, memory::MemoryStatusStore},
};
use supervisor_runtime::{
    backend::BackendProvider,
    supervisor::{Outcome, supervise_with},
};
use tokio_util::sync::CancellationToken;

pub mod utils;

/// Unit key the scenarios write under: empty prefix plus the unit name.
pub const UNIT_KEY: &str = "job-42-0";

/// Short fixed-interval policy so missing handoffs time out quickly.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy::fixed(Duration::from_millis(2), 5)
}

/// Runs one attempt against an in-memory status store.
pub async fn run_attempt(
    config_dir: &Path,
    store: Arc<MemoryStatusStore>,
    backends: Arc<dyn BackendProvider>,
) -> Outcome {
    run_attempt_with_cancel(config_dir, store, backends, &CancellationToken::new()).await
}

pub async fn run_attempt_with_cancel(
    config_dir: &Path,
    store: Arc<MemoryStatusStore>,
    backends: Arc<dyn BackendProvider>,
    cancel: &CancellationToken,
) -> Outcome {
    supervise_with(
        HandoffDir::new(config_dir),
        &fast_policy(),
        cancel,
        backends,
        move |_| Ok(store as Arc<dyn StatusStore>),
    )
    .await
}
