//! Typed mutations on a health record.
//!
//! Every change goes through a closed set of operations: upsert/remove per
//! entry kind, and [`ProfileUpdate`] for the profile. Each operation
//! persists the whole record in one write. When the actor is a doctor the
//! same write carries exactly one audit entry; the owner's own edits are
//! never audited.

use chrono::{DateTime, Local, Utc};
use rusqlite::Connection;
use thiserror::Error;

use crate::db::{self, DatabaseError};
use crate::models::enums::{AuditAction, SubscriptionPlan};
use crate::models::ids::entry_id;
use crate::models::*;

#[derive(Error, Debug)]
pub enum EditError {
    #[error("{field} {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("No {kind} with id {id}")]
    EntryNotFound { kind: &'static str, id: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Who is changing the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// The record's owner editing their own data.
    Owner,
    /// A doctor acting under an access grant.
    Doctor { id: String, name: String },
}

/// Outcome of an upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryChange {
    pub id: String,
    pub action: AuditAction,
}

// ═══════════════════════════════════════════
// Entry kinds
// ═══════════════════════════════════════════

/// A sub-entity living in one of the record's collections.
pub trait RecordEntry: Clone {
    /// Singular noun used in errors.
    const KIND: &'static str;
    const ID_PREFIX: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn collection(record: &HealthRecord) -> &Vec<Self>;
    fn collection_mut(record: &mut HealthRecord) -> &mut Vec<Self>;
    /// Audit resource label, e.g. `Condition: Hypertension`.
    fn resource(&self) -> String;
    /// Audit description of the entry kind, e.g. `a clinical diagnosis`.
    fn described_as() -> &'static str;
    fn validate(&self) -> Result<(), EditError>;
    /// Derived fields recomputed on every write.
    fn prepare(&mut self, _now: DateTime<Utc>) {}
}

fn require(field: &'static str, value: &str) -> Result<(), EditError> {
    if value.trim().is_empty() {
        return Err(EditError::Invalid {
            field,
            reason: "is required".into(),
        });
    }
    Ok(())
}

macro_rules! entry_kind {
    ($kind:literal, $prefix:literal, $field:ident) => {
        const KIND: &'static str = $kind;
        const ID_PREFIX: &'static str = $prefix;

        fn id(&self) -> &str {
            &self.id
        }

        fn set_id(&mut self, id: String) {
            self.id = id;
        }

        fn collection(record: &HealthRecord) -> &Vec<Self> {
            &record.$field
        }

        fn collection_mut(record: &mut HealthRecord) -> &mut Vec<Self> {
            &mut record.$field
        }
    };
}

impl RecordEntry for MedicalProblem {
    entry_kind!("problem", "PRB", problems);

    fn resource(&self) -> String {
        format!("Condition: {}", self.condition)
    }

    fn described_as() -> &'static str {
        "a clinical diagnosis"
    }

    fn validate(&self) -> Result<(), EditError> {
        require("condition", &self.condition)
    }
}

impl RecordEntry for Medication {
    entry_kind!("medication", "MED", medications);

    fn resource(&self) -> String {
        format!("Medication: {}", self.name)
    }

    fn described_as() -> &'static str {
        "a medication"
    }

    fn validate(&self) -> Result<(), EditError> {
        require("name", &self.name)?;
        require("dosage", &self.dosage)
    }
}

impl RecordEntry for Surgery {
    entry_kind!("surgery", "SRG", surgeries);

    fn resource(&self) -> String {
        format!("Surgery: {}", self.procedure)
    }

    fn described_as() -> &'static str {
        "a surgical history entry"
    }

    fn validate(&self) -> Result<(), EditError> {
        require("type", &self.procedure)?;
        require("date", &self.date)?;
        require("hospital", &self.hospital)
    }
}

impl RecordEntry for Allergy {
    entry_kind!("allergy", "ALG", allergies);

    fn resource(&self) -> String {
        format!("Allergy: {}", self.substance)
    }

    fn described_as() -> &'static str {
        "an allergy record"
    }

    fn validate(&self) -> Result<(), EditError> {
        require("substance", &self.substance)
    }
}

impl RecordEntry for TreatmentNote {
    entry_kind!("note", "NOTE", notes);

    fn resource(&self) -> String {
        format!("Note: {}", self.date)
    }

    fn described_as() -> &'static str {
        "a treatment note"
    }

    fn validate(&self) -> Result<(), EditError> {
        require("doctorName", &self.doctor_name)?;
        require("note", &self.note)
    }
}

impl RecordEntry for FamilyHistory {
    entry_kind!("family history entry", "FAM", family_history);

    fn resource(&self) -> String {
        format!("Family history: {}", self.relation)
    }

    fn described_as() -> &'static str {
        "a family history entry"
    }

    fn validate(&self) -> Result<(), EditError> {
        require("relation", &self.relation)?;
        require("condition", &self.condition)
    }
}

impl RecordEntry for Insurance {
    entry_kind!("insurance policy", "INS", insurances);

    fn resource(&self) -> String {
        format!("Insurance: {}", self.provider)
    }

    fn described_as() -> &'static str {
        "an insurance policy record"
    }

    fn validate(&self) -> Result<(), EditError> {
        require("provider", &self.provider)?;
        require("policyNumber", &self.policy_number)?;
        require("coverageAmount", &self.coverage_amount)?;
        require("expiryDate", &self.expiry_date)
    }

    fn prepare(&mut self, now: DateTime<Utc>) {
        self.refresh_status(now.with_timezone(&Local).date_naive());
    }
}

impl RecordEntry for Reminder {
    entry_kind!("reminder", "REM", reminders);

    fn resource(&self) -> String {
        format!("Reminder: {}", self.title)
    }

    fn described_as() -> &'static str {
        "a health reminder"
    }

    fn validate(&self) -> Result<(), EditError> {
        require("title", &self.title)?;
        require("date", &self.date)
    }
}

// ═══════════════════════════════════════════
// Entry operations
// ═══════════════════════════════════════════

/// Create or update an entry and persist the record.
///
/// An empty `id` creates a new entry (placed first, newest on top); an id
/// that matches an existing entry replaces it. An unknown non-empty id is an
/// error rather than a silent insert.
pub fn upsert_entry<E: RecordEntry>(
    conn: &Connection,
    record: &mut HealthRecord,
    mut entry: E,
    actor: &Actor,
) -> Result<EntryChange, EditError> {
    entry.validate()?;
    entry.prepare(Utc::now());

    let mut updated = record.clone();
    let items = E::collection_mut(&mut updated);
    let action = if entry.id().trim().is_empty() {
        entry.set_id(entry_id(E::ID_PREFIX));
        items.insert(0, entry.clone());
        AuditAction::Create
    } else {
        let slot = items
            .iter_mut()
            .find(|existing| existing.id() == entry.id())
            .ok_or_else(|| EditError::EntryNotFound {
                kind: E::KIND,
                id: entry.id().to_string(),
            })?;
        *slot = entry.clone();
        AuditAction::Update
    };

    if let Actor::Doctor { id, name } = actor {
        let verb = if action == AuditAction::Create { "added" } else { "updated" };
        updated.audit_logs.push(audit_entry(
            id,
            name,
            action,
            entry.resource(),
            format!("Medical professional {verb} {}.", E::described_as()),
        ));
    }

    commit(conn, record, updated)?;
    Ok(EntryChange {
        id: entry.id().to_string(),
        action,
    })
}

/// Remove an entry by id and persist the record. Returns the removed entry.
pub fn remove_entry<E: RecordEntry>(
    conn: &Connection,
    record: &mut HealthRecord,
    id: &str,
    actor: &Actor,
) -> Result<E, EditError> {
    let mut updated = record.clone();
    let items = E::collection_mut(&mut updated);
    let pos = items
        .iter()
        .position(|existing| existing.id() == id)
        .ok_or_else(|| EditError::EntryNotFound {
            kind: E::KIND,
            id: id.to_string(),
        })?;
    let removed = items.remove(pos);

    if let Actor::Doctor { id: doctor_id, name } = actor {
        updated.audit_logs.push(audit_entry(
            doctor_id,
            name,
            AuditAction::Delete,
            removed.resource(),
            format!("Medical professional removed {}.", E::described_as()),
        ));
    }

    commit(conn, record, updated)?;
    Ok(removed)
}

/// Find an entry by id.
pub fn find_entry<'a, E: RecordEntry>(record: &'a HealthRecord, id: &str) -> Option<&'a E> {
    E::collection(record).iter().find(|e| e.id() == id)
}

/// Build an audit entry stamped now.
pub fn audit_entry(
    doctor_id: &str,
    doctor_name: &str,
    action: AuditAction,
    resource: impl Into<String>,
    details: impl Into<String>,
) -> AuditLog {
    AuditLog {
        id: entry_id("LOG"),
        doctor_id: doctor_id.to_string(),
        doctor_name: doctor_name.to_string(),
        action,
        resource: resource.into(),
        details: details.into(),
        timestamp: Utc::now(),
    }
}

/// Persist `updated` and only then replace the caller's copy, so a failed
/// write leaves the in-memory record matching the store.
pub(crate) fn commit(
    conn: &Connection,
    record: &mut HealthRecord,
    mut updated: HealthRecord,
) -> Result<(), EditError> {
    db::save_record(conn, &mut updated)?;
    *record = updated;
    Ok(())
}

// ═══════════════════════════════════════════
// Profile operations (owner only)
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct PersonalDetails {
    pub name: String,
    pub age: u32,
    pub dob: String,
    pub gender: String,
    pub blood_group: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileUpdate {
    Personal(PersonalDetails),
    Phone(String),
    EmergencyContact(Option<EmergencyContact>),
    ToggleNotification(NotificationChannel),
    /// Doctor profiles only.
    Practice {
        specialization: Option<String>,
        license_number: Option<String>,
    },
    /// Doctor profiles only.
    VisitingTimes { start: String, end: String },
    /// Doctor profiles only.
    ToggleVisitingDay(String),
    ProfilePicture(Option<String>),
    /// Result of the (mocked) subscription checkout.
    Subscription {
        plan: SubscriptionPlan,
        expiry: String,
    },
}

/// Validate a person's age.
pub fn validate_age(age: u32) -> Result<(), EditError> {
    if age == 0 || age > 150 {
        return Err(EditError::Invalid {
            field: "age",
            reason: format!("must be between 1 and 150, got {age}"),
        });
    }
    Ok(())
}

/// Apply a profile update and persist the record.
pub fn update_profile(
    conn: &Connection,
    record: &mut HealthRecord,
    update: ProfileUpdate,
) -> Result<(), EditError> {
    let mut updated = record.clone();
    let is_doctor = updated.is_doctor();
    let profile = &mut updated.profile;

    match update {
        ProfileUpdate::Personal(details) => {
            require("name", &details.name)?;
            validate_age(details.age)?;
            profile.name = details.name.trim().to_string();
            profile.age = details.age;
            profile.dob = details.dob;
            profile.gender = details.gender;
            profile.blood_group = details.blood_group;
        }
        ProfileUpdate::Phone(phone) => {
            require("phone", &phone)?;
            profile.phone = phone.trim().to_string();
        }
        ProfileUpdate::EmergencyContact(contact) => {
            if let Some(c) = &contact {
                require("emergencyContact.name", &c.name)?;
                require("emergencyContact.phone", &c.phone)?;
            }
            profile.emergency_contact = contact;
        }
        ProfileUpdate::ToggleNotification(channel) => {
            profile.notification_settings.toggle(channel);
        }
        ProfileUpdate::Practice {
            specialization,
            license_number,
        } => {
            doctor_only(is_doctor, "specialization")?;
            profile.specialization = specialization;
            profile.license_number = license_number;
        }
        ProfileUpdate::VisitingTimes { start, end } => {
            doctor_only(is_doctor, "visitingHours")?;
            require("visitingHours.start", &start)?;
            require("visitingHours.end", &end)?;
            let hours = profile.visiting_hours.get_or_insert_with(VisitingHours::default);
            hours.start = start;
            hours.end = end;
        }
        ProfileUpdate::ToggleVisitingDay(day) => {
            doctor_only(is_doctor, "visitingHours")?;
            require("day", &day)?;
            profile
                .visiting_hours
                .get_or_insert_with(VisitingHours::default)
                .toggle_day(day.trim());
        }
        ProfileUpdate::ProfilePicture(picture) => {
            profile.profile_picture = picture;
        }
        ProfileUpdate::Subscription { plan, expiry } => {
            require("subscriptionExpiry", &expiry)?;
            profile.is_premium = true;
            profile.subscription_plan = Some(plan);
            profile.subscription_expiry = Some(expiry);
        }
    }

    commit(conn, record, updated)
}

fn doctor_only(is_doctor: bool, field: &'static str) -> Result<(), EditError> {
    if !is_doctor {
        return Err(EditError::Invalid {
            field,
            reason: "only applies to doctor profiles".into(),
        });
    }
    Ok(())
}

/// Store an advisory question and answer on the owner's record.
pub fn record_interaction(
    conn: &Connection,
    record: &mut HealthRecord,
    query: &str,
    response: &str,
) -> Result<(), EditError> {
    let mut updated = record.clone();
    updated.interactions.push(Interaction {
        id: entry_id("INT"),
        query: query.to_string(),
        response: response.to_string(),
        timestamp: Utc::now(),
    });
    commit(conn, record, updated)
}
