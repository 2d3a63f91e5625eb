//! Doctor workspace: search, token challenge, time-bounded grant, audited
//! edits, revoke.

use std::time::{Duration, Instant};

use rusqlite::Connection;

use super::token::AccessTokenRegistry;
use super::AccessError;
use crate::db;
use crate::models::enums::AuditAction;
use crate::models::ids::normalize_health_id;
use crate::models::HealthRecord;
use crate::records::{self, Actor, EntryChange, RecordEntry};
use crate::session::is_four_digit_code;

const VAULT_RESOURCE: &str = "Complete Medical Vault";

/// Search hit. Deliberately a summary; the full record is only loaded
/// once a grant is established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientMatch {
    pub health_id: String,
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub blood_group: String,
}

impl PatientMatch {
    fn from_record(record: &HealthRecord) -> Self {
        let p = &record.profile;
        Self {
            health_id: p.health_id.clone(),
            name: p.name.clone(),
            age: p.age,
            gender: p.gender.clone(),
            blood_group: p.blood_group.clone(),
        }
    }
}

/// Where the workspace is in the access workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessStage {
    Searching,
    Challenge,
    Granted,
}

struct Grant {
    patient: HealthRecord,
    expires_at: Instant,
}

enum Stage {
    Searching,
    Challenge(PatientMatch),
    Granted(Grant),
}

pub struct DoctorAccess {
    doctor_id: String,
    doctor_name: String,
    grant_duration: Duration,
    results: Vec<PatientMatch>,
    stage: Stage,
}

impl DoctorAccess {
    /// Open a workspace for a signed-in doctor.
    pub fn new(doctor: &HealthRecord, grant_duration: Duration) -> Result<Self, AccessError> {
        if !doctor.is_doctor() {
            return Err(AccessError::NotADoctor);
        }
        Ok(Self {
            doctor_id: doctor.health_id().to_string(),
            doctor_name: doctor.profile.name.clone(),
            grant_duration,
            results: Vec::new(),
            stage: Stage::Searching,
        })
    }

    pub fn doctor_id(&self) -> &str {
        &self.doctor_id
    }

    pub fn stage(&self) -> AccessStage {
        match self.stage {
            Stage::Searching => AccessStage::Searching,
            Stage::Challenge(_) => AccessStage::Challenge,
            Stage::Granted(_) => AccessStage::Granted,
        }
    }

    pub fn results(&self) -> &[PatientMatch] {
        &self.results
    }

    /// Search patient records by name or health identifier.
    ///
    /// Case-insensitive substring match over a full scan; a blank query
    /// returns nothing. Doctors never appear in results.
    pub fn search(&mut self, conn: &Connection, query: &str) -> Result<&[PatientMatch], AccessError> {
        let query = query.trim();
        self.results.clear();
        if query.is_empty() {
            return Ok(&self.results);
        }

        let name_query = query.to_lowercase();
        let id_query = query.to_uppercase();
        self.results = db::get_all_records(conn)?
            .iter()
            .filter(|r| r.is_patient())
            .filter(|r| {
                r.profile.name.to_lowercase().contains(&name_query)
                    || r.health_id().contains(&id_query)
            })
            .map(PatientMatch::from_record)
            .collect();

        tracing::debug!(matches = self.results.len(), "patient search");
        Ok(&self.results)
    }

    /// Pick a patient from the last search and move to the token challenge.
    /// Any grant still held is closed first.
    pub fn select(&mut self, conn: &Connection, health_id: &str) -> Result<PatientMatch, AccessError> {
        let health_id = normalize_health_id(health_id);
        let candidate = self
            .results
            .iter()
            .find(|m| m.health_id == health_id)
            .cloned()
            .ok_or_else(|| AccessError::NotInResults(health_id.clone()))?;

        if matches!(self.stage, Stage::Granted(_)) {
            self.revoke(conn)?;
        }
        self.stage = Stage::Challenge(candidate.clone());
        Ok(candidate)
    }

    /// The patient currently awaiting a token, if any.
    pub fn selected(&self) -> Option<&PatientMatch> {
        match &self.stage {
            Stage::Challenge(selected) => Some(selected),
            _ => None,
        }
    }

    /// Redeem the patient's token. On success the grant starts, one VIEW
    /// entry is appended to the patient's audit trail and persisted. The
    /// granted record is then available from [`DoctorAccess::patient`].
    pub fn verify_token(
        &mut self,
        conn: &Connection,
        tokens: &mut AccessTokenRegistry,
        code: &str,
    ) -> Result<(), AccessError> {
        let patient_id = match &self.stage {
            Stage::Challenge(selected) => selected.health_id.clone(),
            _ => return Err(AccessError::NoSelection),
        };
        let code = code.trim();
        if !is_four_digit_code(code) {
            return Err(AccessError::InvalidTokenFormat);
        }
        let expires_at = Instant::now()
            .checked_add(self.grant_duration)
            .ok_or(AccessError::InvalidGrantDuration)?;
        tokens.redeem(&patient_id, code)?;

        let mut patient = db::get_record(conn, &patient_id)?
            .filter(HealthRecord::is_patient)
            .ok_or(AccessError::PatientNotFound)?;
        let mut updated = patient.clone();
        updated.audit_logs.push(records::audit_entry(
            &self.doctor_id,
            &self.doctor_name,
            AuditAction::View,
            VAULT_RESOURCE,
            "Doctor initialized secure session via token verification.",
        ));
        records::commit(conn, &mut patient, updated)?;

        tracing::info!(
            doctor_id = %self.doctor_id,
            health_id = %patient_id,
            "access granted"
        );
        self.stage = Stage::Granted(Grant {
            patient,
            expires_at,
        });
        Ok(())
    }

    /// The granted patient record, while the grant is live.
    pub fn patient(&self) -> Option<&HealthRecord> {
        match &self.stage {
            Stage::Granted(grant) if Instant::now() < grant.expires_at => Some(&grant.patient),
            _ => None,
        }
    }

    /// Time left on the grant.
    pub fn remaining(&self) -> Option<Duration> {
        match &self.stage {
            Stage::Granted(grant) => Some(grant.expires_at.saturating_duration_since(Instant::now())),
            _ => None,
        }
    }

    /// Create or update an entry on the granted record. Audited.
    pub fn upsert_entry<E: RecordEntry>(
        &mut self,
        conn: &Connection,
        entry: E,
    ) -> Result<EntryChange, AccessError> {
        let actor = self.actor();
        let patient = self.active_patient(conn)?;
        Ok(records::upsert_entry(conn, patient, entry, &actor)?)
    }

    /// Remove an entry from the granted record. Audited.
    pub fn remove_entry<E: RecordEntry>(
        &mut self,
        conn: &Connection,
        id: &str,
    ) -> Result<E, AccessError> {
        let actor = self.actor();
        let patient = self.active_patient(conn)?;
        Ok(records::remove_entry(conn, patient, id, &actor)?)
    }

    /// End the grant. Appends a REVOKE entry to the patient's trail and
    /// drops the record. A workspace without a grant is left as is.
    pub fn revoke(&mut self, conn: &Connection) -> Result<(), AccessError> {
        self.close_grant(conn, "Doctor ended secure session.")
    }

    fn actor(&self) -> Actor {
        Actor::Doctor {
            id: self.doctor_id.clone(),
            name: self.doctor_name.clone(),
        }
    }

    /// The granted record, closing the grant if it has run out.
    fn active_patient(&mut self, conn: &Connection) -> Result<&mut HealthRecord, AccessError> {
        let expired = match &self.stage {
            Stage::Granted(grant) => Instant::now() >= grant.expires_at,
            _ => return Err(AccessError::NoActiveGrant),
        };
        if expired {
            self.close_grant(conn, "Access grant expired.")?;
            return Err(AccessError::GrantExpired);
        }
        match &mut self.stage {
            Stage::Granted(grant) => Ok(&mut grant.patient),
            _ => Err(AccessError::NoActiveGrant),
        }
    }

    fn close_grant(&mut self, conn: &Connection, details: &str) -> Result<(), AccessError> {
        let Stage::Granted(grant) = std::mem::replace(&mut self.stage, Stage::Searching) else {
            self.stage = Stage::Searching;
            return Ok(());
        };

        let mut patient = grant.patient;
        let mut updated = patient.clone();
        updated.audit_logs.push(records::audit_entry(
            &self.doctor_id,
            &self.doctor_name,
            AuditAction::Revoke,
            VAULT_RESOURCE,
            details,
        ));
        records::commit(conn, &mut patient, updated)?;
        tracing::info!(
            doctor_id = %self.doctor_id,
            health_id = %patient.health_id(),
            "access revoked"
        );
        Ok(())
    }
}
