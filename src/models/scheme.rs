use serde::{Deserialize, Serialize};

/// A government welfare or benefit programme matched to a patient.
///
/// Every field except `official_link` is required: replies from the
/// advisory service missing any of them are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scheme {
    pub id: String,
    pub name: String,
    pub benefits: String,
    pub coverage_amount: String,
    pub eligibility: String,
    pub match_reason: String,
    pub application_steps: Vec<String>,
    pub required_documents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official_link: Option<String>,
}
