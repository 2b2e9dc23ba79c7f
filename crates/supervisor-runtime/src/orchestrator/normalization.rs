use super::{JobOrchestrator, OrchestratorDeps, run_unit};
use crate::{
    backend::{ExecutionBackend, UnitSpec},
    error::OrchestratorError,
};
use async_trait::async_trait;
use model::{
    core::application::ApplicationKind, execution::context::JobContext,
    io::transform::NormalizationInput,
};
use tracing::info;

const DESTINATION_CONFIG: &str = "destination_config.json";
const DESTINATION_CATALOG: &str = "destination_catalog.json";

/// Runs the normalization image over what a replication loaded.
pub struct NormalizationOrchestrator {
    deps: OrchestratorDeps,
}

impl NormalizationOrchestrator {
    pub fn new(deps: OrchestratorDeps) -> Self {
        Self { deps }
    }
}

/// `airbyte/destination-postgres:0.3.1` -> `postgres`
pub fn integration_type(destination_image: &str) -> &str {
    let name = destination_image
        .rsplit('/')
        .next()
        .unwrap_or(destination_image);
    let name = name.split(':').next().unwrap_or(name);
    name.strip_prefix("destination-").unwrap_or(name)
}

#[async_trait]
impl JobOrchestrator for NormalizationOrchestrator {
    fn kind(&self) -> ApplicationKind {
        ApplicationKind::Normalization
    }

    async fn run(
        &self,
        ctx: &JobContext,
        backend: &dyn ExecutionBackend,
    ) -> Result<Option<String>, OrchestratorError> {
        let input: NormalizationInput = self.deps.handoff.read_input().await?;
        let image = input
            .normalization_image
            .as_deref()
            .unwrap_or(&self.deps.config.normalization_image);
        let integration = integration_type(&input.destination.docker_image);
        info!(%image, %integration, "Running normalization");

        let spec = UnitSpec::new(&ctx.job, "normalization", image)
            .env(&self.deps.config.forwarded_env)
            .file(
                DESTINATION_CONFIG,
                input.destination.connection_configuration.to_string(),
            )
            .file(DESTINATION_CATALOG, input.catalog.to_string())
            .args([
                "run",
                "--integration-type",
                integration,
                "--config",
                DESTINATION_CONFIG,
                "--catalog",
                DESTINATION_CATALOG,
            ]);

        run_unit(backend, spec).await?;
        info!("Normalization finished");
        Ok(None)
    }
}
