pub mod allergy;
pub mod audit;
pub mod enums;
pub mod family_history;
pub mod ids;
pub mod insurance;
pub mod interaction;
pub mod medication;
pub mod note;
pub mod problem;
pub mod profile;
pub mod record;
pub mod reminder;
pub mod scheme;
pub mod surgery;

pub use allergy::*;
pub use audit::*;
pub use family_history::*;
pub use insurance::*;
pub use interaction::*;
pub use medication::*;
pub use note::*;
pub use problem::*;
pub use profile::*;
pub use record::*;
pub use reminder::*;
pub use scheme::*;
pub use surgery::*;

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;

    use super::enums::*;
    use super::*;

    pub fn profile(name: &str, health_id: &str, role: Role) -> UserProfile {
        UserProfile {
            name: name.into(),
            age: 30,
            dob: "1995-04-12".into(),
            gender: "Female".into(),
            phone: "+91 98765 43210".into(),
            national_id: "1234-5678-9012".into(),
            health_id: health_id.into(),
            blood_group: "O+".into(),
            role,
            specialization: None,
            license_number: None,
            visiting_hours: None,
            notification_settings: NotificationSettings::default(),
            emergency_contact: None,
            profile_picture: None,
            is_premium: false,
            subscription_plan: None,
            subscription_expiry: None,
            last_updated: Utc::now(),
        }
    }

    pub fn patient(name: &str, health_id: &str) -> HealthRecord {
        HealthRecord::new(profile(name, health_id, Role::Patient))
    }

    pub fn doctor(name: &str, health_id: &str) -> HealthRecord {
        let mut record = HealthRecord::new(profile(name, health_id, Role::Doctor));
        record.profile.specialization = Some("Cardiology".into());
        record.profile.visiting_hours = Some(VisitingHours::default());
        record
    }

    pub fn problem(id: &str, condition: &str, severity: Severity) -> MedicalProblem {
        MedicalProblem {
            id: id.into(),
            condition: condition.into(),
            status: ProblemStatus::Present,
            onset_date: "2024-01-15".into(),
            end_date: None,
            severity,
            treatment: None,
            notes: None,
            applicable_schemes: Vec::new(),
        }
    }

    pub fn medication(id: &str, name: &str) -> Medication {
        Medication {
            id: id.into(),
            name: name.into(),
            dosage: "5mg".into(),
            duration: "90 days".into(),
            frequency: "once daily".into(),
            start_date: "2024-01-20".into(),
            instructions: None,
            prescribed_by: None,
            status: MedicationStatus::Active,
        }
    }

    pub fn scheme(id: &str, name: &str) -> Scheme {
        Scheme {
            id: id.into(),
            name: name.into(),
            benefits: "Cashless treatment".into(),
            coverage_amount: "5,00,000".into(),
            eligibility: "Low-income households".into(),
            match_reason: "Covers chronic conditions".into(),
            application_steps: vec!["Visit the portal".into()],
            required_documents: vec!["Identity card".into()],
            official_link: None,
        }
    }
}
