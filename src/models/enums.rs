use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The string form doubles as the serde representation inside stored records.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Role {
    Patient => "patient",
    Doctor => "doctor",
});

str_enum!(SubscriptionPlan {
    Standard => "standard",
    Pro => "pro",
    Family => "family",
});

str_enum!(ProblemStatus {
    Present => "present",
    Past => "past",
    Recovered => "recovered",
});

str_enum!(Severity {
    Mild => "mild",
    Moderate => "moderate",
    Severe => "severe",
});

str_enum!(MedicationStatus {
    Active => "active",
    Discontinued => "discontinued",
});

str_enum!(AllergySeverity {
    Low => "low",
    Moderate => "moderate",
    High => "high",
});

str_enum!(NoteCategory {
    Consultation => "Consultation",
    FollowUp => "Follow-up",
    Emergency => "Emergency",
    Surgery => "Surgery",
});

str_enum!(PolicyType {
    Individual => "individual",
    Family => "family",
    Government => "government",
    Corporate => "corporate",
});

str_enum!(InsuranceStatus {
    Active => "active",
    Expired => "expired",
});

str_enum!(ReminderType {
    Appointment => "appointment",
    Refill => "refill",
    FollowUp => "followup",
    Personal => "personal",
    Medication => "medication",
    Lifestyle => "lifestyle",
    Custom => "custom",
});

str_enum!(ReminderStatus {
    Pending => "pending",
    Completed => "completed",
    Dismissed => "dismissed",
});

str_enum!(AuditAction {
    View => "VIEW",
    Create => "CREATE",
    Update => "UPDATE",
    Delete => "DELETE",
    Revoke => "REVOKE",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_round_trips_through_str() {
        assert_eq!(Role::from_str("doctor").unwrap(), Role::Doctor);
        assert_eq!(Role::Patient.as_str(), "patient");
    }

    #[test]
    fn unknown_value_is_invalid_enum() {
        let err = ProblemStatus::from_str("chronic").unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::InvalidEnum { ref field, ref value }
                if field == "ProblemStatus" && value == "chronic"
        ));
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&AuditAction::Update).unwrap();
        assert_eq!(json, "\"UPDATE\"");
        let category: NoteCategory = serde_json::from_str("\"Follow-up\"").unwrap();
        assert_eq!(category, NoteCategory::FollowUp);
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(ReminderType::FollowUp.to_string(), "followup");
    }
}
