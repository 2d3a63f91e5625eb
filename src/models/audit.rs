use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::AuditAction;

/// One doctor action against a patient's record. Appended, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub action: AuditAction,
    pub resource: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}
