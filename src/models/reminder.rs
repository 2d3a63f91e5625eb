use serde::{Deserialize, Serialize};

use super::enums::{ReminderStatus, ReminderType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(rename = "type")]
    pub kind: ReminderType,
    pub status: ReminderStatus,
}
