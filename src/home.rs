//! Home dashboard: clinical snapshot, record stats, upcoming reminders and
//! the audit feed, all derived from one record.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::enums::{
    AllergySeverity, InsuranceStatus, MedicationStatus, ReminderStatus, Severity,
};
use crate::models::{AuditLog, HealthRecord, Reminder};

/// Audit entries shown on the dashboard.
pub const AUDIT_FEED_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotCondition {
    pub id: String,
    pub condition: String,
    pub severity: Severity,
    pub scheme_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMedication {
    pub id: String,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotAllergy {
    pub substance: String,
    pub severity: AllergySeverity,
}

/// What a clinician needs at a glance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalSnapshot {
    pub blood_group: String,
    pub conditions: Vec<SnapshotCondition>,
    pub active_medications: Vec<SnapshotMedication>,
    pub allergies: Vec<SnapshotAllergy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordStats {
    pub problems: usize,
    pub medications: usize,
    pub surgeries: usize,
    pub allergies: usize,
    pub notes: usize,
    pub active_insurances: usize,
    pub pending_reminders: usize,
    pub audit_entries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeData {
    pub snapshot: ClinicalSnapshot,
    pub stats: RecordStats,
    pub upcoming_reminders: Vec<Reminder>,
    pub recent_audit: Vec<AuditLog>,
}

/// Present conditions, active medications and allergies.
pub fn clinical_snapshot(record: &HealthRecord) -> ClinicalSnapshot {
    ClinicalSnapshot {
        blood_group: record.profile.blood_group.clone(),
        conditions: record
            .problems
            .iter()
            .filter(|p| p.is_current())
            .map(|p| SnapshotCondition {
                id: p.id.clone(),
                condition: p.condition.clone(),
                severity: p.severity,
                scheme_count: p.applicable_schemes.len(),
            })
            .collect(),
        active_medications: record
            .medications
            .iter()
            .filter(|m| m.status == MedicationStatus::Active)
            .map(|m| SnapshotMedication {
                id: m.id.clone(),
                name: m.name.clone(),
                dosage: m.dosage.clone(),
                frequency: m.frequency.clone(),
            })
            .collect(),
        allergies: record
            .allergies
            .iter()
            .map(|a| SnapshotAllergy {
                substance: a.substance.clone(),
                severity: a.severity,
            })
            .collect(),
    }
}

/// Entry counts. Insurance status is evaluated against `today`.
pub fn record_stats(record: &HealthRecord, today: NaiveDate) -> RecordStats {
    RecordStats {
        problems: record.problems.len(),
        medications: record.medications.len(),
        surgeries: record.surgeries.len(),
        allergies: record.allergies.len(),
        notes: record.notes.len(),
        active_insurances: record
            .insurances
            .iter()
            .filter(|i| i.status_on(today) == InsuranceStatus::Active)
            .count(),
        pending_reminders: record
            .reminders
            .iter()
            .filter(|r| r.status == ReminderStatus::Pending)
            .count(),
        audit_entries: record.audit_logs.len(),
    }
}

/// Pending reminders dated today or later, soonest first. Reminders with
/// an unreadable date are kept at the end.
pub fn upcoming_reminders(record: &HealthRecord, today: NaiveDate) -> Vec<&Reminder> {
    let mut upcoming: Vec<(Option<NaiveDate>, &Reminder)> = record
        .reminders
        .iter()
        .filter(|r| r.status == ReminderStatus::Pending)
        .map(|r| (NaiveDate::parse_from_str(&r.date, "%Y-%m-%d").ok(), r))
        .filter(|(date, _)| date.map_or(true, |d| d >= today))
        .collect();
    upcoming.sort_by(|(a_date, a), (b_date, b)| match (a_date, b_date) {
        (Some(x), Some(y)) => x.cmp(y).then_with(|| a.time.cmp(&b.time)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    upcoming.into_iter().map(|(_, r)| r).collect()
}

/// Audit entries newest first. The stored list is append-only, oldest first,
/// so insertion order decides even when timestamps tie.
pub fn audit_feed(record: &HealthRecord, limit: usize) -> Vec<&AuditLog> {
    record.audit_logs.iter().rev().take(limit).collect()
}

/// Everything the home screen shows.
pub fn home_data(record: &HealthRecord, today: NaiveDate) -> HomeData {
    HomeData {
        snapshot: clinical_snapshot(record),
        stats: record_stats(record, today),
        upcoming_reminders: upcoming_reminders(record, today)
            .into_iter()
            .cloned()
            .collect(),
        recent_audit: audit_feed(record, AUDIT_FEED_LIMIT)
            .into_iter()
            .cloned()
            .collect(),
    }
}
