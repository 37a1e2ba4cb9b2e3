//! Durable persistence for jobs and schedules.
//!
//! [`JobStore`] owns the only shared mutable resource in the engine. All
//! mutation goes through its API; multi-statement operations run inside a
//! Diesel transaction.

pub mod jobs;
pub mod models;
pub mod schedules;
pub mod schema;

use diesel::RunQueryDsl;
use diesel::r2d2::{self, ConnectionManager};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use crate::error::StorageFailure;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

/// Busy-wait budget (ms) SQLite grants a writer before returning
/// `SQLITE_BUSY` when another connection in the pool holds the write lock.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Runs once per pooled connection on acquire: enables foreign-key
/// enforcement (off by default in SQLite) and WAL journaling, and gives
/// concurrent writers a busy-timeout instead of failing immediately.
#[derive(Debug)]
struct ConnectionOptions;

impl r2d2::CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        diesel::sql_query("PRAGMA foreign_keys = ON;")
            .execute(conn)
            .and_then(|_| diesel::sql_query("PRAGMA journal_mode = WAL;").execute(conn))
            .and_then(|_| diesel::sql_query(format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};")).execute(conn))
            .map(|_| ())
            .map_err(r2d2::Error::QueryError)
    }
}

/// Durable store for [`models::Job`]s and [`models::Schedule`]s, backed by
/// a pooled SQLite connection.
#[derive(Clone)]
pub struct JobStore {
    pool: DbPool,
}

impl JobStore {
    /// Open (creating if necessary) the SQLite database at `db_path` and run
    /// pending migrations.
    pub fn open(db_path: &str) -> Result<Self, StorageFailure> {
        if let Some(parent) = std::path::Path::new(db_path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageFailure::Init(format!("failed to create db directory: {e}")))?;
        }

        tracing::info!(path = db_path, "opening job store");

        let manager = ConnectionManager::<SqliteConnection>::new(db_path);
        let pool = r2d2::Pool::builder()
            .max_size(10)
            .connection_customizer(Box::new(ConnectionOptions))
            .build(manager)
            .map_err(|e| StorageFailure::Init(format!("failed to create connection pool: {e}")))?;

        let mut conn = pool
            .get()
            .map_err(|e| StorageFailure::Init(format!("failed to get database connection: {e}")))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| StorageFailure::Migration(e.to_string()))?;

        tracing::info!("job store ready");

        Ok(Self { pool })
    }

    /// Build a store directly from an existing pool (used by tests that want
    /// a shared in-process pool).
    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[cfg(test)]
pub(crate) fn test_store() -> (JobStore, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let db_path = dir.path().join("jobs.db");
    let store = JobStore::open(db_path.to_str().expect("utf8 path")).expect("open store");
    (store, dir)
}
