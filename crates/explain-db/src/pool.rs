//! Database connection management.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::tenant::Tenant;

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(#[from] rusqlite::Error),

    #[error("Invalid tenant identifier: {0}")]
    InvalidTenant(String),

    #[error("Unsafe table name: {0}")]
    UnsafeTableName(String),

    #[error("Lock poisoned")]
    LockPoisoned,

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe handle to the request connection.
///
/// One connection serves a request end to end; the mutex guarantees the
/// queries inside a request never interleave with another holder's.
#[derive(Clone)]
pub struct DbPool {
    conn: Arc<Mutex<Connection>>,
}

impl DbPool {
    /// Open a connection backed by a file.
    pub fn new(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory connection (for testing).
    pub fn in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Attach a tenant database file under the tenant's schema name, so
    /// queries can address `{tenant}.craft_*` tables.
    ///
    /// The tenant identifier has already passed the regex gate in
    /// [`Tenant::parse`]; nothing else may reach the ATTACH statement.
    pub fn attach_tenant(&self, tenant: &Tenant, path: &Path) -> DbResult<()> {
        let file = path.to_string_lossy().into_owned();
        self.with_conn(|conn| {
            conn.execute(
                &format!("ATTACH DATABASE ?1 AS {}", tenant.as_str()),
                [file.as_str()],
            )?;
            Ok(())
        })
    }

    /// Attach an empty in-memory database under the tenant's schema name
    /// (for testing).
    pub fn attach_tenant_memory(&self, tenant: &Tenant) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!("ATTACH DATABASE ':memory:' AS {}", tenant.as_str()),
                [],
            )?;
            Ok(())
        })
    }

    /// Detach a tenant schema. Called on request teardown for file-backed
    /// tenants; a no-op failure here is not fatal to the response.
    pub fn detach_tenant(&self, tenant: &Tenant) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(&format!("DETACH DATABASE {}", tenant.as_str()), [])?;
            Ok(())
        })
    }

    /// Execute a function with access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&Connection) -> DbResult<T>,
    {
        let conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        f(&conn)
    }
}

/// Open the shared pool at the given path, creating parent directories.
pub fn open_pool(db_path: &Path) -> DbResult<DbPool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| DbError::NotFound(format!("database directory: {}", e)))?;
    }
    DbPool::new(db_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_pool_executes() {
        let pool = DbPool::in_memory().unwrap();
        pool.with_conn(|conn| {
            conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)", [])?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn attached_tenant_schema_is_addressable() {
        let pool = DbPool::in_memory().unwrap();
        let tenant = Tenant::parse("visityarra").unwrap();
        pool.attach_tenant_memory(&tenant).unwrap();

        pool.with_conn(|conn| {
            conn.execute("CREATE TABLE visityarra.craft_elements (id INTEGER)", [])?;
            conn.execute("INSERT INTO visityarra.craft_elements (id) VALUES (7)", [])?;
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM visityarra.craft_elements",
                [],
                |row| row.get(0),
            )?;
            assert_eq!(n, 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn detach_removes_schema() {
        let pool = DbPool::in_memory().unwrap();
        let tenant = Tenant::parse("t1").unwrap();
        pool.attach_tenant_memory(&tenant).unwrap();
        pool.detach_tenant(&tenant).unwrap();

        let err = pool.with_conn(|conn| {
            conn.execute("CREATE TABLE t1.x (id INTEGER)", [])?;
            Ok(())
        });
        assert!(err.is_err());
    }
}
