use serde::{Deserialize, Serialize};

use super::enums::MedicationStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: String,
    pub name: String,
    pub dosage: String,
    pub duration: String,
    pub frequency: String,
    pub start_date: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub prescribed_by: Option<String>,
    pub status: MedicationStatus,
}
