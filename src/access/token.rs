//! One-time access tokens issued by a patient and redeemed by a doctor.
//!
//! A patient issues a 4-digit code and reads it out to the doctor. Only a
//! hash of the code is kept. Redemption compares hashes in constant time,
//! consumes the token on success and discards it after too many failures
//! or once its lifetime has passed.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::models::ids::normalize_health_id;

/// Token lifetime (5 minutes).
const ACCESS_TOKEN_TTL_SECS: u64 = 300;

/// Failed redemptions allowed before the token is discarded.
pub const MAX_FAILED_ATTEMPTS: u32 = 5;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("No access token has been issued for this patient")]
    NoTokenIssued,
    #[error("Access token expired")]
    Expired,
    #[error("Access token does not match ({remaining} attempts left)")]
    Mismatch { remaining: u32 },
    #[error("Too many failed attempts; ask the patient for a new token")]
    TooManyAttempts,
}

struct IssuedToken {
    hash: [u8; 32],
    issued_at: Instant,
    failed_attempts: u32,
}

/// In-memory registry of outstanding tokens, at most one per patient.
pub struct AccessTokenRegistry {
    tokens: HashMap<String, IssuedToken>,
    ttl: Duration,
}

impl Default for AccessTokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessTokenRegistry {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(ACCESS_TOKEN_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            tokens: HashMap::new(),
            ttl,
        }
    }

    /// Issue a fresh code for `patient_id`, replacing any outstanding one.
    /// The plaintext code is returned once and never stored.
    pub fn issue(&mut self, patient_id: &str) -> String {
        let patient_id = normalize_health_id(patient_id);
        let code = format!("{:04}", rand::thread_rng().gen_range(0..10_000u32));
        self.tokens.insert(
            patient_id.clone(),
            IssuedToken {
                hash: hash_code(&patient_id, &code),
                issued_at: Instant::now(),
                failed_attempts: 0,
            },
        );
        tracing::info!(health_id = %patient_id, "access token issued");
        code
    }

    /// Whether a live token exists for `patient_id`.
    pub fn is_outstanding(&self, patient_id: &str) -> bool {
        self.tokens
            .get(&normalize_health_id(patient_id))
            .is_some_and(|t| t.issued_at.elapsed() < self.ttl)
    }

    /// Withdraw the outstanding token, if any.
    pub fn cancel(&mut self, patient_id: &str) -> bool {
        self.tokens.remove(&normalize_health_id(patient_id)).is_some()
    }

    /// Redeem `code` against the token issued for `patient_id`.
    ///
    /// Success consumes the token. An expired token, or one that has
    /// reached [`MAX_FAILED_ATTEMPTS`], is discarded.
    pub fn redeem(&mut self, patient_id: &str, code: &str) -> Result<(), TokenError> {
        let patient_id = normalize_health_id(patient_id);
        let token = self
            .tokens
            .get_mut(&patient_id)
            .ok_or(TokenError::NoTokenIssued)?;

        if token.issued_at.elapsed() >= self.ttl {
            self.tokens.remove(&patient_id);
            tracing::warn!(health_id = %patient_id, "expired access token presented");
            return Err(TokenError::Expired);
        }

        let presented = hash_code(&patient_id, code.trim());
        if bool::from(token.hash.ct_eq(&presented)) {
            self.tokens.remove(&patient_id);
            return Ok(());
        }

        token.failed_attempts += 1;
        if token.failed_attempts >= MAX_FAILED_ATTEMPTS {
            self.tokens.remove(&patient_id);
            tracing::warn!(health_id = %patient_id, "access token discarded after failed attempts");
            return Err(TokenError::TooManyAttempts);
        }
        Err(TokenError::Mismatch {
            remaining: MAX_FAILED_ATTEMPTS - token.failed_attempts,
        })
    }
}

/// SHA-256 of the code bound to the patient it was issued for.
fn hash_code(patient_id: &str, code: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(patient_id.as_bytes());
    hasher.update(b":");
    hasher.update(code.as_bytes());
    hasher.finalize().into()
}
