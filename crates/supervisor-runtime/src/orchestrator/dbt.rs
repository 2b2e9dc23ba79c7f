use super::{JobOrchestrator, OrchestratorDeps, run_unit};
use crate::{
    backend::{ExecutionBackend, UnitSpec},
    error::OrchestratorError,
};
use async_trait::async_trait;
use model::{
    core::application::ApplicationKind, execution::context::JobContext, io::transform::DbtInput,
};
use tracing::info;

const DESTINATION_CONFIG: &str = "destination_config.json";

/// Runs a user-supplied dbt project against the destination.
pub struct DbtOrchestrator {
    deps: OrchestratorDeps,
}

impl DbtOrchestrator {
    pub fn new(deps: OrchestratorDeps) -> Self {
        Self { deps }
    }

    fn spec(&self, ctx: &JobContext, input: &DbtInput) -> UnitSpec {
        let operator = &input.operator;
        let mut args = vec!["--git-repo".to_string(), operator.git_repo_url.clone()];
        if let Some(branch) = &operator.git_repo_branch {
            args.extend(["--git-branch".to_string(), branch.clone()]);
        }
        args.extend(operator.arguments());

        UnitSpec::new(&ctx.job, "dbt", &operator.docker_image)
            .env(&self.deps.config.forwarded_env)
            .file(
                DESTINATION_CONFIG,
                input.destination.connection_configuration.to_string(),
            )
            .args(args)
    }
}

#[async_trait]
impl JobOrchestrator for DbtOrchestrator {
    fn kind(&self) -> ApplicationKind {
        ApplicationKind::Dbt
    }

    async fn run(
        &self,
        ctx: &JobContext,
        backend: &dyn ExecutionBackend,
    ) -> Result<Option<String>, OrchestratorError> {
        let input: DbtInput = self.deps.handoff.read_input().await?;
        info!(
            image = %input.operator.docker_image,
            repo = %input.operator.git_repo_url,
            "Running custom transformation"
        );

        run_unit(backend, self.spec(ctx, &input)).await?;
        Ok(None)
    }
}
