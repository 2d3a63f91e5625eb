//! Doctor-to-patient access grants.
//!
//! A patient issues a one-time 4-digit token; a doctor who searched for
//! and selected that patient redeems it to open a time-bounded grant.
//! Every transition of the grant and every edit made under it lands in
//! the patient's audit trail.

pub mod token;
pub mod workspace;

pub use token::{AccessTokenRegistry, TokenError, MAX_FAILED_ATTEMPTS};
pub use workspace::{AccessStage, DoctorAccess, PatientMatch};

use thiserror::Error;

use crate::db::DatabaseError;
use crate::records::EditError;

#[derive(Error, Debug)]
pub enum AccessError {
    #[error("Only doctor accounts can request record access")]
    NotADoctor,

    #[error("Patient {0} is not in the current search results")]
    NotInResults(String),

    #[error("No patient selected")]
    NoSelection,

    #[error("Access token must be 4 digits")]
    InvalidTokenFormat,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Patient record not found")]
    PatientNotFound,

    #[error("No active access grant")]
    NoActiveGrant,

    #[error("Access grant expired")]
    GrantExpired,

    #[error("Grant duration is too long to schedule")]
    InvalidGrantDuration,

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}
