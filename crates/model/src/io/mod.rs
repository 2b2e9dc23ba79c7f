pub mod message;
pub mod replication;
pub mod transform;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A connector image together with the configuration it is launched with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorConfig {
    pub docker_image: String,
    #[serde(default)]
    pub connection_configuration: Value,
}
