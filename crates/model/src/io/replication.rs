use super::ConnectorConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationInput {
    pub source: ConnectorConfig,
    pub destination: ConnectorConfig,
    pub catalog: Value,
    #[serde(default)]
    pub state: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationOutput {
    pub records_synced: u64,
    pub bytes_synced: u64,
    pub state: Option<Value>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}
