use super::ConnectorConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationInput {
    pub destination: ConnectorConfig,
    pub catalog: Value,
    /// Overrides the configured normalization image.
    #[serde(default)]
    pub normalization_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbtInput {
    pub destination: ConnectorConfig,
    pub operator: DbtOperator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbtOperator {
    pub docker_image: String,
    pub git_repo_url: String,
    #[serde(default)]
    pub git_repo_branch: Option<String>,
    #[serde(default)]
    pub dbt_arguments: String,
}

impl DbtOperator {
    pub fn arguments(&self) -> Vec<String> {
        self.dbt_arguments
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}
