//! Session manager: which identity is signed in on this device.
//!
//! The signed-in identifier survives restarts through a small pointer
//! file. The manager is an explicit object owned by the application
//! context; there is no global session.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use rusqlite::Connection;
use thiserror::Error;

use crate::db::{self, DatabaseError};
use crate::models::enums::Role;
use crate::models::ids::{generate_health_id, normalize_health_id};
use crate::models::{HealthRecord, NotificationSettings, UserProfile, VisitingHours};
use crate::records::{self, Actor, EditError, EntryChange, ProfileUpdate, RecordEntry};

/// Attempts at drawing an unused health identifier before giving up.
const MAX_ID_ATTEMPTS: usize = 8;

static FOUR_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{4}$").unwrap());

/// True when `code` is exactly four ASCII digits.
pub fn is_four_digit_code(code: &str) -> bool {
    FOUR_DIGITS.is_match(code)
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid Health ID or Role mismatch.")]
    UnknownIdentifier,

    #[error("Invalid Health ID or Role mismatch.")]
    RoleMismatch { expected: Role, actual: Role },

    #[error("Phone number not registered.")]
    PhoneNotRegistered,

    #[error("Access code must be 4 digits")]
    InvalidCode,

    #[error("No user is signed in")]
    NotAuthenticated,

    #[error("Could not allocate a unique health identifier")]
    IdentifierExhausted,

    #[error("Session pointer I/O error: {0}")]
    Pointer(#[from] io::Error),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

// ═══════════════════════════════════════════════════════════
// Session pointer
// ═══════════════════════════════════════════════════════════

/// Persisted identifier of the signed-in user. A missing file means
/// signed out.
#[derive(Debug, Clone)]
pub struct SessionPointer {
    path: PathBuf,
}

impl SessionPointer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<String>, io::Error> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => {
                let id = raw.trim();
                Ok((!id.is_empty()).then(|| id.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn store(&self, health_id: &str) -> Result<(), io::Error> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, health_id)
    }

    pub fn clear(&self) -> Result<(), io::Error> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Registration
// ═══════════════════════════════════════════════════════════

/// Sign-up form. The health identifier is generated, never supplied.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub name: String,
    pub age: u32,
    pub dob: String,
    pub gender: String,
    pub phone: String,
    pub national_id: String,
    pub blood_group: String,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
}

impl RegistrationForm {
    fn validate(&self) -> Result<(), EditError> {
        if self.name.trim().is_empty() {
            return Err(EditError::Invalid {
                field: "name",
                reason: "is required".into(),
            });
        }
        if self.phone.trim().is_empty() {
            return Err(EditError::Invalid {
                field: "phone",
                reason: "is required".into(),
            });
        }
        records::validate_age(self.age)
    }

    fn into_profile(self, health_id: String, role: Role) -> UserProfile {
        UserProfile {
            name: self.name.trim().to_string(),
            age: self.age,
            dob: self.dob,
            gender: if self.gender.is_empty() { "Male".into() } else { self.gender },
            phone: self.phone.trim().to_string(),
            national_id: self.national_id,
            health_id,
            blood_group: if self.blood_group.is_empty() { "O+".into() } else { self.blood_group },
            role,
            specialization: self.specialization,
            license_number: self.license_number,
            visiting_hours: (role == Role::Doctor).then(VisitingHours::default),
            notification_settings: NotificationSettings::default(),
            emergency_contact: None,
            profile_picture: None,
            is_premium: false,
            subscription_plan: None,
            subscription_expiry: None,
            last_updated: Utc::now(),
        }
    }
}

/// A phone login waiting for its one-time code.
///
/// No code is actually sent; the second step only checks that four
/// digits were entered. Not an identity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneChallenge {
    phone: String,
    role: Role,
}

impl PhoneChallenge {
    pub fn phone(&self) -> &str {
        &self.phone
    }
}

// ═══════════════════════════════════════════════════════════
// SessionManager
// ═══════════════════════════════════════════════════════════

pub struct SessionManager {
    pointer: SessionPointer,
    current: Option<HealthRecord>,
}

impl SessionManager {
    /// A signed-out manager. Call [`SessionManager::restore`] to pick up a
    /// previous session.
    pub fn new(pointer: SessionPointer) -> Self {
        Self {
            pointer,
            current: None,
        }
    }

    /// Resume the session recorded in the pointer file.
    ///
    /// A pointer to a record that no longer exists, or that cannot be
    /// read, is cleared and the session starts signed out.
    pub fn restore(&mut self, conn: &Connection) -> Result<bool, SessionError> {
        self.current = None;
        let Some(health_id) = self.pointer.load()? else {
            return Ok(false);
        };

        match db::get_record(conn, &health_id) {
            Ok(Some(record)) => {
                tracing::info!(health_id = %record.health_id(), "session restored");
                self.current = Some(record);
                Ok(true)
            }
            Ok(None) => {
                tracing::warn!("stale session pointer cleared");
                self.pointer.clear()?;
                Ok(false)
            }
            Err(DatabaseError::Serialization(e)) => {
                tracing::warn!(error = %e, "unreadable record behind session pointer");
                self.pointer.clear()?;
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create a record with a fresh identifier, persist it and sign in.
    pub fn register(
        &mut self,
        conn: &Connection,
        form: RegistrationForm,
        role: Role,
    ) -> Result<&HealthRecord, SessionError> {
        form.validate()?;

        let mut health_id = None;
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate = generate_health_id(role);
            if db::get_record(conn, &candidate)?.is_none() {
                health_id = Some(candidate);
                break;
            }
        }
        let health_id = health_id.ok_or(SessionError::IdentifierExhausted)?;

        let mut record = HealthRecord::new(form.into_profile(health_id, role));
        db::save_record(conn, &mut record)?;
        tracing::info!(health_id = %record.health_id(), role = %role, "identity registered");
        self.sign_in(record)
    }

    /// Sign in with a health identifier. The record's role must match.
    pub fn login(
        &mut self,
        conn: &Connection,
        identifier: &str,
        role: Role,
    ) -> Result<&HealthRecord, SessionError> {
        let record = db::get_record(conn, identifier)?.ok_or(SessionError::UnknownIdentifier)?;
        check_role(&record, role)?;
        self.sign_in(record)
    }

    /// First step of a phone login: the number must belong to a record of
    /// the expected role.
    pub fn begin_phone_login(
        &self,
        conn: &Connection,
        phone: &str,
        role: Role,
    ) -> Result<PhoneChallenge, SessionError> {
        match db::get_record_by_phone(conn, phone)? {
            Some(record) if record.role() == role => Ok(PhoneChallenge {
                phone: phone.trim().to_string(),
                role,
            }),
            _ => Err(SessionError::PhoneNotRegistered),
        }
    }

    /// Second step of a phone login.
    pub fn complete_phone_login(
        &mut self,
        conn: &Connection,
        challenge: &PhoneChallenge,
        code: &str,
    ) -> Result<&HealthRecord, SessionError> {
        if !is_four_digit_code(code.trim()) {
            return Err(SessionError::InvalidCode);
        }
        let record = db::get_record_by_phone(conn, &challenge.phone)?
            .ok_or(SessionError::PhoneNotRegistered)?;
        check_role(&record, challenge.role)?;
        self.sign_in(record)
    }

    /// Sign out. The record itself is kept.
    pub fn logout(&mut self) -> Result<(), SessionError> {
        if let Some(record) = self.current.take() {
            tracing::info!(health_id = %record.health_id(), "signed out");
        }
        self.pointer.clear()?;
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&HealthRecord> {
        self.current.as_ref()
    }

    pub fn require_current(&self) -> Result<&HealthRecord, SessionError> {
        self.current.as_ref().ok_or(SessionError::NotAuthenticated)
    }

    /// Reload the signed-in record from the store, e.g. after a doctor
    /// session wrote to it.
    pub fn refresh(&mut self, conn: &Connection) -> Result<(), SessionError> {
        let health_id = self.require_current()?.health_id().to_string();
        match db::get_record(conn, &health_id)? {
            Some(record) => self.current = Some(record),
            None => {
                self.current = None;
                self.pointer.clear()?;
            }
        }
        Ok(())
    }

    // ── owner edits ──────────────────────────────────────────

    /// Create or update an entry on the signed-in user's own record.
    pub fn upsert_entry<E: RecordEntry>(
        &mut self,
        conn: &Connection,
        entry: E,
    ) -> Result<EntryChange, SessionError> {
        let record = self.current.as_mut().ok_or(SessionError::NotAuthenticated)?;
        Ok(records::upsert_entry(conn, record, entry, &Actor::Owner)?)
    }

    pub fn remove_entry<E: RecordEntry>(
        &mut self,
        conn: &Connection,
        id: &str,
    ) -> Result<E, SessionError> {
        let record = self.current.as_mut().ok_or(SessionError::NotAuthenticated)?;
        Ok(records::remove_entry(conn, record, id, &Actor::Owner)?)
    }

    pub fn update_profile(
        &mut self,
        conn: &Connection,
        update: ProfileUpdate,
    ) -> Result<(), SessionError> {
        let record = self.current.as_mut().ok_or(SessionError::NotAuthenticated)?;
        Ok(records::update_profile(conn, record, update)?)
    }

    pub(crate) fn current_mut(&mut self) -> Option<&mut HealthRecord> {
        self.current.as_mut()
    }

    fn sign_in(&mut self, record: HealthRecord) -> Result<&HealthRecord, SessionError> {
        self.pointer.store(&normalize_health_id(record.health_id()))?;
        tracing::info!(health_id = %record.health_id(), "signed in");
        Ok(self.current.insert(record))
    }
}

fn check_role(record: &HealthRecord, expected: Role) -> Result<(), SessionError> {
    if record.role() != expected {
        return Err(SessionError::RoleMismatch {
            expected,
            actual: record.role(),
        });
    }
    Ok(())
}
