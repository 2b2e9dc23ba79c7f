use super::JobOrchestrator;
use crate::{backend::ExecutionBackend, error::OrchestratorError};
use async_trait::async_trait;
use model::{core::application::ApplicationKind, execution::context::JobContext};
use tracing::info;

/// Launches nothing. Lets the launcher exercise the full status lifecycle.
pub struct NoOpOrchestrator;

#[async_trait]
impl JobOrchestrator for NoOpOrchestrator {
    fn kind(&self) -> ApplicationKind {
        ApplicationKind::NoOp
    }

    async fn run(
        &self,
        ctx: &JobContext,
        _backend: &dyn ExecutionBackend,
    ) -> Result<Option<String>, OrchestratorError> {
        info!(job = %ctx.job, "No-op job, nothing to run");
        Ok(None)
    }
}
