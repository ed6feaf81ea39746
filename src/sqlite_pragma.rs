//! Connection PRAGMAs shared by every SQLite handle

use rusqlite::Connection;
use std::time::Duration;

/// Wait this long on a locked database before failing a statement
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Apply PRAGMAs for a single-writer batch + live-append workload
///
/// - `journal_mode = WAL` so readers never block the appender
/// - `synchronous = NORMAL` (safe with WAL)
/// - `temp_store = MEMORY`
/// - busy timeout of [`BUSY_TIMEOUT`]
pub fn apply_optimized_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    // journal_mode reports the resulting mode as a row
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        log::debug!("journal_mode stayed '{}' (in-memory or read-only database)", mode);
    }

    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_wal_enabled_on_file_database() {
        let dir = tempdir().unwrap();
        let conn = Connection::open(dir.path().join("pragma.db")).unwrap();

        apply_optimized_pragmas(&conn).unwrap();

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_in_memory_database_is_accepted() {
        let conn = Connection::open_in_memory().unwrap();
        apply_optimized_pragmas(&conn).unwrap();
    }
}
