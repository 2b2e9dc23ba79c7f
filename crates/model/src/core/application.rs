use crate::execution::errors::ModelError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The job kinds a supervisor knows how to drive. Parsed from the
/// `application.txt` token handed off by the launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplicationKind {
    Replication,
    Normalization,
    Dbt,
    NoOp,
}

impl ApplicationKind {
    pub const ALL: [ApplicationKind; 4] = [
        ApplicationKind::Replication,
        ApplicationKind::Normalization,
        ApplicationKind::Dbt,
        ApplicationKind::NoOp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationKind::Replication => "replication",
            ApplicationKind::Normalization => "normalization",
            ApplicationKind::Dbt => "dbt",
            ApplicationKind::NoOp => "no-op",
        }
    }
}

impl fmt::Display for ApplicationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == token)
            .ok_or_else(|| ModelError::UnknownApplication(token.to_string()))
    }
}
