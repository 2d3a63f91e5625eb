use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::{InsuranceStatus, PolicyType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insurance {
    pub id: String,
    pub provider: String,
    pub policy_number: String,
    pub coverage_amount: String,
    /// `YYYY-MM-DD`, optionally followed by a time part.
    pub expiry_date: String,
    pub policy_type: PolicyType,
    #[serde(default)]
    pub contact_phone: String,
    pub status: InsuranceStatus,
}

impl Insurance {
    /// Status on `today`: active while the expiry date lies in the future.
    /// An unreadable expiry date counts as expired.
    pub fn status_on(&self, today: NaiveDate) -> InsuranceStatus {
        match parse_expiry(&self.expiry_date) {
            Some(expiry) if expiry > today => InsuranceStatus::Active,
            _ => InsuranceStatus::Expired,
        }
    }

    /// Recompute `status` from the expiry date.
    pub fn refresh_status(&mut self, today: NaiveDate) {
        self.status = self.status_on(today);
    }
}

fn parse_expiry(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.trim().split('T').next()?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(expiry: &str) -> Insurance {
        Insurance {
            id: "INS-1".into(),
            provider: "Star Health".into(),
            policy_number: "POL123".into(),
            coverage_amount: "5,00,000".into(),
            expiry_date: expiry.into(),
            policy_type: PolicyType::Family,
            contact_phone: String::new(),
            status: InsuranceStatus::Active,
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn future_expiry_is_active() {
        assert_eq!(policy("2030-01-01").status_on(day("2026-06-01")), InsuranceStatus::Active);
    }

    #[test]
    fn past_or_same_day_expiry_is_expired() {
        assert_eq!(policy("2026-06-01").status_on(day("2026-06-01")), InsuranceStatus::Expired);
        assert_eq!(policy("2020-01-01").status_on(day("2026-06-01")), InsuranceStatus::Expired);
    }

    #[test]
    fn timestamp_suffix_is_ignored() {
        assert_eq!(
            policy("2030-01-01T00:00:00.000Z").status_on(day("2026-06-01")),
            InsuranceStatus::Active
        );
    }

    #[test]
    fn garbage_expiry_is_expired() {
        let mut p = policy("next year");
        p.refresh_status(day("2026-06-01"));
        assert_eq!(p.status, InsuranceStatus::Expired);
    }
}
