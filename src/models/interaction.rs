use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One question the owner asked the advisory assistant, with its answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub id: String,
    pub query: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}
