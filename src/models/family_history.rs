use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyHistory {
    pub id: String,
    pub relation: String,
    pub condition: String,
    #[serde(default)]
    pub notes: Option<String>,
}
