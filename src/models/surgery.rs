use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Surgery {
    pub id: String,
    #[serde(rename = "type")]
    pub procedure: String,
    pub date: String,
    pub hospital: String,
    #[serde(default)]
    pub surgeon: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
}
