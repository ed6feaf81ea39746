//! SQLite handle, schema loader and the backfill precondition check
//!
//! All SQL lives in the store modules (`recorder`, `cache`, `usage`,
//! `sources`). The aggregator and the backfill only call [`FunnelStore`]
//! methods.

use crate::error::FunnelError;
use crate::sqlite_pragma::apply_optimized_pragmas;
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Tables owned by this crate that must exist before a backfill
pub const REQUIRED_TABLES: [&str; 2] = ["promo_code_events", "promo_code_performance"];

/// Run schema migrations from SQL files
///
/// Reads every `.sql` file in `schema_dir`, sorted by filename (`01_`, `02_`,
/// ...), and executes it. Files must use `IF NOT EXISTS` so re-running is a
/// no-op.
pub fn run_schema_migrations(
    conn: &mut Connection,
    schema_dir: impl AsRef<Path>,
) -> Result<(), FunnelError> {
    let schema_path = schema_dir.as_ref();

    if !schema_path.is_dir() {
        return Err(FunnelError::Migration(format!(
            "schema directory not found: {}",
            schema_path.display()
        )));
    }

    let mut sql_files: Vec<_> = fs::read_dir(schema_path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();
    sql_files.sort();

    if sql_files.is_empty() {
        return Err(FunnelError::Migration(format!(
            "no .sql files in {}",
            schema_path.display()
        )));
    }

    log::info!("🔧 Running schema migrations from: {}", schema_path.display());

    let tx = conn.transaction()?;
    for path in &sql_files {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::info!("   ├─ Executing: {}", filename);

        let sql_content = fs::read_to_string(path)?;
        tx.execute_batch(&sql_content)
            .map_err(|e| FunnelError::Migration(format!("{}: {}", filename, e)))?;
    }
    tx.commit()?;

    log::info!("   └─ ✅ {} schema files applied", sql_files.len());
    Ok(())
}

/// Names from `tables` that are not present in the database
pub fn missing_tables(conn: &Connection, tables: &[&str]) -> Result<Vec<String>, FunnelError> {
    let mut stmt =
        conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?;

    let mut missing = Vec::new();
    for table in tables {
        if !stmt.exists([table])? {
            missing.push(table.to_string());
        }
    }
    Ok(missing)
}

/// Shared handle to the funnel database
///
/// Cloning is cheap; every clone serializes on the same connection. Live
/// recorder calls and the batch reconciler can share one store.
#[derive(Clone)]
pub struct FunnelStore {
    conn: Arc<Mutex<Connection>>,
}

impl FunnelStore {
    /// Open (or create) the database file and apply connection PRAGMAs
    ///
    /// Does NOT apply the schema; see [`run_schema_migrations`].
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, FunnelError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        apply_optimized_pragmas(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>, FunnelError> {
        self.conn.lock().map_err(|_| FunnelError::LockPoisoned)
    }

    /// Apply `sql/*.sql` through this handle
    pub fn migrate(&self, schema_dir: impl AsRef<Path>) -> Result<(), FunnelError> {
        let mut conn = self.conn()?;
        run_schema_migrations(&mut conn, schema_dir)
    }

    /// Fail fast with remediation guidance when the funnel tables are absent
    pub fn verify_schema(&self) -> Result<(), FunnelError> {
        let conn = self.conn()?;
        let missing = missing_tables(&conn, &REQUIRED_TABLES)?;
        if !missing.is_empty() {
            return Err(FunnelError::MissingTables { missing });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::schema_dir;
    use tempfile::tempdir;

    #[test]
    fn test_migrations_create_tables() {
        let dir = tempdir().unwrap();
        let store = FunnelStore::open(dir.path().join("funnel.db")).unwrap();

        assert!(matches!(
            store.verify_schema(),
            Err(FunnelError::MissingTables { ref missing }) if missing.len() == 2
        ));

        store.migrate(schema_dir()).unwrap();
        store.verify_schema().unwrap();
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let dir = tempdir().unwrap();
        let store = FunnelStore::open(dir.path().join("funnel.db")).unwrap();

        store.migrate(schema_dir()).unwrap();
        store.migrate(schema_dir()).unwrap();
        store.verify_schema().unwrap();
    }

    #[test]
    fn test_missing_schema_dir() {
        let dir = tempdir().unwrap();
        let store = FunnelStore::open(dir.path().join("funnel.db")).unwrap();

        let result = store.migrate(dir.path().join("does-not-exist"));
        assert!(matches!(result, Err(FunnelError::Migration(_))));
    }

    #[test]
    fn test_partial_schema_reports_only_missing_table() {
        let dir = tempdir().unwrap();
        let store = FunnelStore::open(dir.path().join("funnel.db")).unwrap();
        {
            let conn = store.conn().unwrap();
            conn.execute_batch(&std::fs::read_to_string(schema_dir().join("01_promo_code_events.sql")).unwrap())
                .unwrap();
        }

        match store.verify_schema() {
            Err(FunnelError::MissingTables { missing }) => {
                assert_eq!(missing, vec!["promo_code_performance".to_string()]);
            }
            other => panic!("expected MissingTables, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("data").join("funnel.db");

        FunnelStore::open(&path).unwrap();
        assert!(path.exists());
    }
}
