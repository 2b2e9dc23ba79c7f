use crate::core::{
    application::ApplicationKind,
    identifiers::{ExecutionUnitIdentity, JobIdentity},
};
use std::collections::HashMap;

/// Everything the launcher hands to a supervisor. Built once at startup and
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobContext {
    pub application: ApplicationKind,
    pub environment: HashMap<String, String>,
    pub job: JobIdentity,
    pub unit: ExecutionUnitIdentity,
}

impl JobContext {
    pub fn new(
        application: ApplicationKind,
        environment: HashMap<String, String>,
        job: JobIdentity,
        unit: ExecutionUnitIdentity,
    ) -> Self {
        Self {
            application,
            environment,
            job,
            unit,
        }
    }

    pub fn env(&self, key: &str) -> Option<&str> {
        self.environment.get(key).map(String::as_str)
    }
}
