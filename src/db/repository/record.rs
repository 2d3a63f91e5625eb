use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::ids::normalize_health_id;
use crate::models::HealthRecord;

/// Upsert a record under its health identifier.
///
/// Stamps `profile.last_updated` with the current time and stores the
/// normalised identifier back on the record before writing.
pub fn save_record(conn: &Connection, record: &mut HealthRecord) -> Result<(), DatabaseError> {
    let health_id = normalize_health_id(&record.profile.health_id);
    if health_id.is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "record has no health identifier".into(),
        ));
    }
    record.profile.health_id = health_id;
    record.profile.last_updated = Utc::now();

    let document = serde_json::to_string(record)?;
    conn.execute(
        "INSERT INTO records (health_id, phone, name, role, document, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(health_id) DO UPDATE SET
             phone = excluded.phone,
             name = excluded.name,
             role = excluded.role,
             document = excluded.document,
             last_updated = excluded.last_updated",
        params![
            record.profile.health_id,
            record.profile.phone.trim(),
            record.profile.name,
            record.profile.role.as_str(),
            document,
            record.profile.last_updated.to_rfc3339(),
        ],
    )
    .map_err(DatabaseError::from_write)?;

    tracing::debug!(health_id = %record.profile.health_id, "record saved");
    Ok(())
}

/// Look up a record by health identifier. Case and surrounding
/// whitespace are ignored; a miss is `Ok(None)`.
pub fn get_record(conn: &Connection, health_id: &str) -> Result<Option<HealthRecord>, DatabaseError> {
    let key = normalize_health_id(health_id);
    let document: Option<String> = conn
        .query_row(
            "SELECT document FROM records WHERE health_id = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;

    document
        .map(|doc| serde_json::from_str(&doc).map_err(DatabaseError::from))
        .transpose()
}

/// Look up a record by exact phone number.
///
/// The phone index is not unique. When several records share a number the
/// earliest registered one wins; use [`find_records_by_phone`] to see them all.
pub fn get_record_by_phone(
    conn: &Connection,
    phone: &str,
) -> Result<Option<HealthRecord>, DatabaseError> {
    let mut matches = find_records_by_phone(conn, phone)?;
    if matches.len() > 1 {
        tracing::warn!(count = matches.len(), "phone number shared by several records");
    }
    if matches.is_empty() {
        Ok(None)
    } else {
        Ok(Some(matches.swap_remove(0)))
    }
}

/// Every record registered with this exact phone number, oldest first.
/// Unreadable documents are skipped.
pub fn find_records_by_phone(
    conn: &Connection,
    phone: &str,
) -> Result<Vec<HealthRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT health_id, document FROM records WHERE phone = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![phone.trim()], id_and_document)?;
    decode_rows(rows)
}

/// Every record in registration order. Unreadable documents are skipped
/// with a warning so one bad row cannot hide the rest.
///
/// Search is a scan over this list; fine for a single-device store, a
/// shared deployment would want a real text index instead.
pub fn get_all_records(conn: &Connection) -> Result<Vec<HealthRecord>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT health_id, document FROM records ORDER BY rowid")?;
    let rows = stmt.query_map([], id_and_document)?;
    decode_rows(rows)
}

/// Remove a record permanently. Returns whether a row was deleted.
pub fn delete_record(conn: &Connection, health_id: &str) -> Result<bool, DatabaseError> {
    let deleted = conn
        .execute(
            "DELETE FROM records WHERE health_id = ?1",
            params![normalize_health_id(health_id)],
        )
        .map_err(DatabaseError::from_write)?;
    Ok(deleted > 0)
}

/// Number of stored records.
pub fn count_records(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
    Ok(count)
}

fn id_and_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String)> {
    Ok((row.get(0)?, row.get(1)?))
}

fn decode_rows(
    rows: impl Iterator<Item = rusqlite::Result<(String, String)>>,
) -> Result<Vec<HealthRecord>, DatabaseError> {
    let mut records = Vec::new();
    for row in rows {
        let (health_id, document) = row?;
        match serde_json::from_str(&document) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(%health_id, error = %e, "skipping unreadable record"),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::*;
    use crate::models::fixtures;

    fn test_db() -> Connection {
        open_memory_database().unwrap()
    }

    #[test]
    fn save_then_get_returns_same_record() {
        let conn = test_db();
        let mut record = fixtures::patient("Asha Rao", "HS-AB12-3456");
        record
            .problems
            .push(fixtures::problem("P-1", "Hypertension", Severity::Moderate));
        let before = record.profile.last_updated;

        save_record(&conn, &mut record).unwrap();
        assert!(record.profile.last_updated >= before);

        let loaded = get_record(&conn, "HS-AB12-3456").unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn unknown_id_is_none() {
        let conn = test_db();
        assert!(get_record(&conn, "HS-NOPE-0000").unwrap().is_none());
    }

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        let conn = test_db();
        let mut record = fixtures::patient("Asha Rao", "HID-AB12");
        save_record(&conn, &mut record).unwrap();

        let lower = get_record(&conn, "hid-ab12").unwrap().unwrap();
        let upper = get_record(&conn, " HID-AB12 ").unwrap().unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn save_normalizes_stored_key() {
        let conn = test_db();
        let mut record = fixtures::patient("Asha Rao", " hs-ab12-3456 ");
        save_record(&conn, &mut record).unwrap();
        assert_eq!(record.profile.health_id, "HS-AB12-3456");
        assert!(get_record(&conn, "HS-AB12-3456").unwrap().is_some());
    }

    #[test]
    fn save_without_id_is_rejected() {
        let conn = test_db();
        let mut record = fixtures::patient("Nobody", "   ");
        assert!(matches!(
            save_record(&conn, &mut record),
            Err(DatabaseError::ConstraintViolation(_))
        ));
        assert_eq!(count_records(&conn).unwrap(), 0);
    }

    #[test]
    fn save_is_an_upsert() {
        let conn = test_db();
        let mut record = fixtures::patient("Asha Rao", "HS-AB12-3456");
        save_record(&conn, &mut record).unwrap();
        record.profile.age = 31;
        save_record(&conn, &mut record).unwrap();

        assert_eq!(count_records(&conn).unwrap(), 1);
        let loaded = get_record(&conn, "HS-AB12-3456").unwrap().unwrap();
        assert_eq!(loaded.profile.age, 31);
    }

    #[test]
    fn phone_lookup_finds_record() {
        let conn = test_db();
        let mut record = fixtures::patient("Asha Rao", "HS-AB12-3456");
        record.profile.phone = "9876543210".into();
        save_record(&conn, &mut record).unwrap();

        let found = get_record_by_phone(&conn, "9876543210").unwrap().unwrap();
        assert_eq!(found.health_id(), "HS-AB12-3456");
        assert!(get_record_by_phone(&conn, "0000000000").unwrap().is_none());
    }

    #[test]
    fn shared_phone_returns_earliest_registration() {
        let conn = test_db();
        let mut first = fixtures::patient("Asha Rao", "HS-ZZZZ-9999");
        first.profile.phone = "555".into();
        let mut second = fixtures::patient("Ravi Rao", "HS-AAAA-1000");
        second.profile.phone = "555".into();
        save_record(&conn, &mut first).unwrap();
        save_record(&conn, &mut second).unwrap();
        // Re-saving the first record must not move it behind the second.
        save_record(&conn, &mut first).unwrap();

        let all = find_records_by_phone(&conn, "555").unwrap();
        assert_eq!(all.len(), 2);
        let chosen = get_record_by_phone(&conn, "555").unwrap().unwrap();
        assert_eq!(chosen.health_id(), "HS-ZZZZ-9999");
    }

    #[test]
    fn get_all_returns_every_record() {
        let conn = test_db();
        save_record(&conn, &mut fixtures::patient("Asha", "HS-0001-1000")).unwrap();
        save_record(&conn, &mut fixtures::doctor("Dr. Mehta", "DR-0001-1000")).unwrap();
        let all = get_all_records(&conn).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].role(), Role::Doctor);
    }

    #[test]
    fn delete_removes_record() {
        let conn = test_db();
        save_record(&conn, &mut fixtures::patient("Asha", "HS-0001-1000")).unwrap();
        assert!(delete_record(&conn, "hs-0001-1000").unwrap());
        assert!(get_record(&conn, "HS-0001-1000").unwrap().is_none());
        assert!(!delete_record(&conn, "HS-0001-1000").unwrap());
    }

    #[test]
    fn corrupt_document_is_serialization_error() {
        let conn = test_db();
        conn.execute(
            "INSERT INTO records (health_id, phone, name, role, document, last_updated)
             VALUES ('HS-BAD0-1000', '1', 'X', 'patient', 'not json', '2024-01-01')",
            [],
        )
        .unwrap();
        assert!(matches!(
            get_record(&conn, "HS-BAD0-1000"),
            Err(DatabaseError::Serialization(_))
        ));
    }

    #[test]
    fn scans_skip_corrupt_documents() {
        let conn = test_db();
        save_record(&conn, &mut fixtures::patient("Asha Rao", "HS-0001-1000")).unwrap();
        conn.execute(
            "INSERT INTO records (health_id, phone, name, role, document, last_updated)
             VALUES ('HS-BAD0-1000', '+91 98765 43210', 'X', 'patient', 'not json', '2024-01-01')",
            [],
        )
        .unwrap();

        let all = get_all_records(&conn).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].health_id(), "HS-0001-1000");
        assert_eq!(count_records(&conn).unwrap(), 2);
        assert_eq!(find_records_by_phone(&conn, "+91 98765 43210").unwrap().len(), 1);
    }
}
