use serde::{Deserialize, Serialize};

use super::enums::NoteCategory;

/// Free-text note from a consultation, follow-up or procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentNote {
    pub id: String,
    pub doctor_name: String,
    pub date: String,
    pub note: String,
    #[serde(default)]
    pub clinic_name: Option<String>,
    #[serde(default)]
    pub category: Option<NoteCategory>,
}
