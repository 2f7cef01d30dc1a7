//! SQLite storage implementation

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use crate::{Result, Error};
use super::schema;
use super::value::{Row, Value};

/// Outcome of a write statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    /// Rowid of the last successful INSERT on this connection
    pub last_insert_id: i64,
    pub rows_affected: usize,
}

/// SQLite-backed record store.
///
/// Statements are serialized through one connection behind a mutex, so the
/// store can be shared as `Arc<SqliteStore>` while every `execute` still
/// commits on its own.
pub struct SqliteStore {
    conn: Mutex<Option<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::Initialization(format!("cannot open {}: {}", path.display(), e)))?;
        let store = Self {
            conn: Mutex::new(Some(conn)),
            path: Some(path.to_path_buf()),
        };
        store.ensure_schema()?;
        tracing::debug!("Opened store at {}", path.display());
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Initialization(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(Some(conn)),
            path: None,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Database file path, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Create tables, indexes and triggers if absent and set session pragmas.
    ///
    /// Safe to call repeatedly. Any failure is reported as an initialization
    /// error.
    pub fn ensure_schema(&self) -> Result<()> {
        self.with_conn(|conn| {
            let init = || -> rusqlite::Result<()> {
                conn.execute_batch(schema::SESSION_PRAGMAS)?;
                if self.path.is_some() {
                    let mode: String = conn.query_row(schema::WAL_PRAGMA, [], |row| row.get(0))?;
                    tracing::debug!("journal_mode = {}", mode);
                }
                for stmt in schema::all_schema_statements() {
                    conn.execute(stmt, [])?;
                }
                Ok(())
            };
            init().map_err(|e| Error::Initialization(e.to_string()))
        })
    }

    /// Release the connection. Later calls fail with `StoreClosed`.
    pub fn close(&self) -> Result<()> {
        let conn = self.lock().take();
        match conn {
            Some(conn) => {
                conn.close().map_err(|(_, e)| Error::from(e))?;
                tracing::debug!("Store closed");
                Ok(())
            }
            None => Err(Error::StoreClosed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    /// Run `f` with exclusive access to the live connection
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.lock();
        let conn = guard.as_ref().ok_or(Error::StoreClosed)?;
        f(conn)
    }

    /// Like `with_conn`, with mutable access (transactions)
    pub(crate) fn with_conn_mut<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        let conn = guard.as_mut().ok_or(Error::StoreClosed)?;
        f(conn)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        // A panic while holding the lock leaves the connection itself usable
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ========== Statement Operations ==========

    /// Execute an INSERT/UPDATE/DELETE statement.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<Execution> {
        self.with_conn(|conn| {
            tracing::debug!("execute: {}", sql.trim());
            let rows_affected = conn.execute(sql, params_from_iter(params.iter()))?;
            Ok(Execution {
                last_insert_id: conn.last_insert_rowid(),
                rows_affected,
            })
        })
    }

    /// Fetch the first matching row, `None` when nothing matches
    pub fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let columns = column_names(&stmt);
            stmt.query_row(params_from_iter(params.iter()), |row| Row::from_sqlite(row, &columns))
                .optional()
                .map_err(Into::into)
        })
    }

    /// Fetch every matching row in statement order
    pub fn query_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let columns = column_names(&stmt);
            let rows = stmt
                .query_map(params_from_iter(params.iter()), |row| Row::from_sqlite(row, &columns))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    // ========== Bulk Operations ==========

    /// Delete every row of every user table (children first)
    pub fn clear_all(&self) -> Result<()> {
        self.with_conn(|conn| {
            for table in schema::USER_TABLES.iter().rev() {
                conn.execute(&format!("DELETE FROM {table}"), [])?;
            }
            Ok(())
        })
    }

    /// Count rows in a user table
    pub fn count_rows(&self, table: &str) -> Result<usize> {
        if !schema::USER_TABLES.contains(&table) {
            return Err(Error::InvalidRequest(format!("unknown table: {table}")));
        }
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            profiles: self.count_rows("profiles")?,
            contacts: self.count_rows("contacts")?,
            scheduled_contacts: self.count_rows("scheduled_contacts")?,
            products: self.count_rows("products")?,
        })
    }
}

fn column_names(stmt: &rusqlite::Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(String::from).collect()
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub profiles: usize,
    pub contacts: usize,
    pub scheduled_contacts: usize,
    pub products: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Profiles: {}", self.profiles)?;
        writeln!(f, "  Contacts: {}", self.contacts)?;
        writeln!(f, "  Scheduled: {}", self.scheduled_contacts)?;
        writeln!(f, "  Products: {}", self.products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn insert_profile(store: &SqliteStore, first: &str) -> i64 {
        store
            .execute(
                "INSERT INTO profiles (first_name, last_name, status) VALUES (?1, ?2, ?3)",
                &[first.into(), "User".into(), "Lead".into()],
            )
            .unwrap()
            .last_insert_id
    }

    #[test]
    fn test_schema_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        store.ensure_schema().unwrap();
        assert_eq!(store.stats().unwrap().profiles, 0);
    }

    #[test]
    fn test_execute_and_query() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = insert_profile(&store, "Ada");

        let row = store
            .query_one("SELECT * FROM profiles WHERE id = ?1", &[id.into()])
            .unwrap()
            .unwrap();
        assert_eq!(row.get_str("first_name"), Some("Ada"));
        assert_eq!(row.get_str("company"), Some(""));
        assert!(row.get("email").unwrap().is_null());
    }

    #[test]
    fn test_missing_rows_are_not_errors() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.query_one("SELECT * FROM profiles WHERE id = 99", &[]).unwrap().is_none());
        assert!(store.query_all("SELECT * FROM contacts", &[]).unwrap().is_empty());

        let exec = store.execute("UPDATE profiles SET notes = 'x' WHERE id = 99", &[]).unwrap();
        assert_eq!(exec.rows_affected, 0);
    }

    #[test]
    fn test_binding_errors() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store
            .execute("INSERT INTO profiles (first_name) VALUES (?1, ?2)", &["a".into()])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxOrBinding);

        let err = store.execute("INSER INTO profiles VALUES (1)", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxOrBinding);

        let id = insert_profile(&store, "Ada");
        let err = store
            .execute("SELECT * FROM profiles WHERE id = ?1", &[id.into()])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxOrBinding);
    }

    #[test]
    fn test_missing_required_field_is_constraint() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store
            .execute("INSERT INTO profiles (first_name) VALUES (?1)", &["OnlyFirstName".into()])
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_created_at_is_immutable() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = insert_profile(&store, "Ada");
        let err = store
            .execute(
                "UPDATE profiles SET created_at = '2000-01-01' WHERE id = ?1",
                &[id.into()],
            )
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_closed_store_rejects_operations() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.close().unwrap();
        assert!(store.is_closed());
        assert!(matches!(store.query_all("SELECT 1", &[]), Err(Error::StoreClosed)));
        assert!(matches!(store.close(), Err(Error::StoreClosed)));
    }

    #[test]
    fn test_file_store_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("crm.db")).unwrap();
        let row = store.query_one("PRAGMA journal_mode", &[]).unwrap().unwrap();
        assert_eq!(row.values()[0].as_str().map(str::to_lowercase), Some("wal".to_string()));

        let fk = store.query_one("PRAGMA foreign_keys", &[]).unwrap().unwrap();
        assert_eq!(fk.values()[0], Value::Integer(1));
    }

    #[test]
    fn test_clear_all() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = insert_profile(&store, "Ada");
        store
            .execute(
                "INSERT INTO contacts (profile_id, date, type, details) VALUES (?1, ?2, ?3, ?4)",
                &[id.into(), "2025-01-01".into(), "Call".into(), "hello".into()],
            )
            .unwrap();
        store.clear_all().unwrap();
        let stats = store.stats().unwrap();
        assert_eq!((stats.profiles, stats.contacts), (0, 0));
    }
}
