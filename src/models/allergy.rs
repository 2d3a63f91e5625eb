use serde::{Deserialize, Serialize};

use super::enums::AllergySeverity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allergy {
    pub id: String,
    pub substance: String,
    pub severity: AllergySeverity,
    #[serde(default)]
    pub reaction: Option<String>,
    #[serde(default)]
    pub first_observed: Option<String>,
}
