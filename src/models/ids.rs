//! Identifier generation for records and their entries.

use chrono::Utc;
use rand::Rng;

use super::enums::Role;

const BASE36: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate a user-facing health identifier, e.g. `HS-AB12-3456`.
///
/// Patients get the `HS` prefix, doctors `DR`.
pub fn generate_health_id(role: Role) -> String {
    let prefix = match role {
        Role::Patient => "HS",
        Role::Doctor => "DR",
    };
    let number: u16 = rand::thread_rng().gen_range(1000..=9999);
    format!("{prefix}-{}-{number}", random_base36(4))
}

/// Generate an entry identifier: `PREFIX-<unix millis>-<4 chars>`.
///
/// Unique enough within one record; collisions are not checked.
pub fn entry_id(prefix: &str) -> String {
    format!(
        "{prefix}-{}-{}",
        Utc::now().timestamp_millis(),
        random_base36(4)
    )
}

/// Canonical form of a health identifier: trimmed and uppercased.
pub fn normalize_health_id(raw: &str) -> String {
    raw.trim().to_uppercase()
}

fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn patient_id_shape() {
        let re = Regex::new(r"^HS-[0-9A-Z]{4}-[1-9][0-9]{3}$").unwrap();
        for _ in 0..50 {
            let id = generate_health_id(Role::Patient);
            assert!(re.is_match(&id), "unexpected id {id}");
        }
    }

    #[test]
    fn doctor_id_uses_dr_prefix() {
        assert!(generate_health_id(Role::Doctor).starts_with("DR-"));
    }

    #[test]
    fn entry_ids_carry_prefix_and_differ() {
        let a = entry_id("REM");
        let b = entry_id("REM");
        assert!(a.starts_with("REM-"));
        assert_ne!(a, b);
    }

    #[test]
    fn normalize_trims_and_uppercases() {
        assert_eq!(normalize_health_id("  hs-ab12-3456 "), "HS-AB12-3456");
    }
}
