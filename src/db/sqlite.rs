use std::path::Path;

use rusqlite::Connection;

use super::DatabaseError;

/// Open (or create) the record store at the given path and run migrations.
///
/// Safe to call on every start: migrations are versioned and every
/// statement is `IF NOT EXISTS`, so reopening never drops data.
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| DatabaseError::StorageUnavailable(e.to_string()))?;
    }
    let conn =
        Connection::open(path).map_err(|e| DatabaseError::StorageUnavailable(e.to_string()))?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing)
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()
        .map_err(|e| DatabaseError::StorageUnavailable(e.to_string()))?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

fn configure_pragmas(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "PRAGMA journal_mode=DELETE;
         PRAGMA foreign_keys=ON;",
    )
    .map_err(|e| DatabaseError::StorageUnavailable(e.to_string()))?;
    Ok(())
}

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current_version = get_current_version(conn);

    let migrations: Vec<(i64, &str)> = vec![(
        1,
        include_str!("../../resources/migrations/001_initial.sql"),
    )];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql).map_err(|e| DatabaseError::MigrationFailed {
                version,
                reason: e.to_string(),
            })?;
        }
    }

    Ok(())
}

/// Get the current schema version (0 if no schema exists yet)
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row(
        "SELECT MAX(version) FROM schema_version",
        [],
        |row| row.get::<_, i64>(0),
    )
    .unwrap_or(0)
}

/// Count indexes on the records table (for verification)
pub fn count_record_indexes(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master
         WHERE type='index' AND tbl_name='records' AND name LIKE 'idx_%'",
        [],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_initializes_records_table() {
        let conn = open_memory_database().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='records'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn secondary_indexes_created_once() {
        let conn = open_memory_database().unwrap();
        assert_eq!(count_record_indexes(&conn).unwrap(), 2);
        run_migrations(&conn).unwrap();
        assert_eq!(count_record_indexes(&conn).unwrap(), 2);
    }

    #[test]
    fn schema_version_is_current() {
        let conn = open_memory_database().unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn migration_idempotent() {
        let conn = open_memory_database().unwrap();
        // Running migrations again must not error
        assert!(run_migrations(&conn).is_ok());
    }

    #[test]
    fn reopening_from_disk_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.db");
        {
            let conn = open_database(&path).unwrap();
            conn.execute(
                "INSERT INTO records (health_id, phone, name, role, document, last_updated)
                 VALUES ('HS-TEST-1000', '1', 'A', 'patient', '{}', '2024-01-01')",
                [],
            )
            .unwrap();
        }
        let conn = open_database(&path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(count_record_indexes(&conn).unwrap(), 2);
    }

    #[test]
    fn unopenable_path_is_storage_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a database file.
        let result = open_database(dir.path());
        assert!(matches!(
            result,
            Err(DatabaseError::StorageUnavailable(_)) | Err(DatabaseError::MigrationFailed { .. })
        ));
    }
}
