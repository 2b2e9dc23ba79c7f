use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Line-delimited JSON messages exchanged with connectors over stdio.
/// Anything that is not a record, state or log passes through as `Other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectorMessage {
    Record { record: Value },
    State { state: Value },
    Log { log: LogMessage },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub level: String,
    pub message: String,
}

impl ConnectorMessage {
    /// Parses one stdout line. Non-JSON lines are connector chatter and yield `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with('{') {
            return None;
        }
        serde_json::from_str(line).ok()
    }

    /// Whether the destination side needs to see this message.
    pub fn is_forwarded(&self) -> bool {
        matches!(
            self,
            ConnectorMessage::Record { .. } | ConnectorMessage::State { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_records_and_states() {
        let record = ConnectorMessage::parse_line(r#"{"type":"RECORD","record":{"id":1}}"#);
        assert!(matches!(record, Some(ConnectorMessage::Record { .. })));

        let state = ConnectorMessage::parse_line(r#"{"type":"STATE","state":{"cursor":9}}"#);
        assert!(state.unwrap().is_forwarded());
    }

    #[test]
    fn unknown_types_and_plain_text() {
        let trace = ConnectorMessage::parse_line(r#"{"type":"TRACE","trace":{}}"#);
        assert_eq!(trace, Some(ConnectorMessage::Other));
        assert_eq!(ConnectorMessage::parse_line("starting source..."), None);
    }
}
