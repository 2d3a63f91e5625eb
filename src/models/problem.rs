use serde::{Deserialize, Serialize};

use super::enums::{ProblemStatus, Severity};
use super::scheme::Scheme;

/// A condition the patient has or had.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalProblem {
    pub id: String,
    pub condition: String,
    pub status: ProblemStatus,
    pub onset_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
    pub severity: Severity,
    #[serde(default)]
    pub treatment: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Welfare schemes matched against this condition by the advisory bridge.
    #[serde(default)]
    pub applicable_schemes: Vec<Scheme>,
}

impl MedicalProblem {
    /// Past and recovered conditions are both historical.
    pub fn is_current(&self) -> bool {
        self.status == ProblemStatus::Present
    }
}
