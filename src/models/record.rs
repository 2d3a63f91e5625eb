use serde::{Deserialize, Serialize};

use super::allergy::Allergy;
use super::audit::AuditLog;
use super::enums::Role;
use super::family_history::FamilyHistory;
use super::insurance::Insurance;
use super::interaction::Interaction;
use super::medication::Medication;
use super::note::TreatmentNote;
use super::problem::MedicalProblem;
use super::profile::UserProfile;
use super::reminder::Reminder;
use super::surgery::Surgery;

/// Root aggregate: one per registered identity, persisted as a single unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    pub profile: UserProfile,
    #[serde(default)]
    pub problems: Vec<MedicalProblem>,
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub surgeries: Vec<Surgery>,
    #[serde(default)]
    pub allergies: Vec<Allergy>,
    #[serde(default)]
    pub notes: Vec<TreatmentNote>,
    #[serde(default)]
    pub family_history: Vec<FamilyHistory>,
    #[serde(default)]
    pub insurances: Vec<Insurance>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
    #[serde(default)]
    pub audit_logs: Vec<AuditLog>,
}

impl HealthRecord {
    /// A freshly registered record with every collection empty.
    pub fn new(profile: UserProfile) -> Self {
        Self {
            profile,
            problems: Vec::new(),
            medications: Vec::new(),
            surgeries: Vec::new(),
            allergies: Vec::new(),
            notes: Vec::new(),
            family_history: Vec::new(),
            insurances: Vec::new(),
            reminders: Vec::new(),
            interactions: Vec::new(),
            audit_logs: Vec::new(),
        }
    }

    pub fn health_id(&self) -> &str {
        &self.profile.health_id
    }

    pub fn role(&self) -> Role {
        self.profile.role
    }

    pub fn is_patient(&self) -> bool {
        self.profile.role == Role::Patient
    }

    pub fn is_doctor(&self) -> bool {
        self.profile.role == Role::Doctor
    }
}
