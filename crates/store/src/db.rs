//! Database connection and pool management.

use exn::ResultExt;
use shoebox_config::CacheConfig;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;

use crate::error::{ErrorKind, Result};
use crate::watch::ChangeBus;

/// Embedded migrations that are run automatically on connect.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
const MAX_CONNECTIONS: u32 = 5;

/// Connection pool for the album cache database.
///
/// The database mirrors a remote collection and can always be rebuilt by a
/// refresh, so it is a cache rather than a source of truth. One `Database`
/// owns the pool and the [`ChangeBus`] that repositories announce commit
/// notifications on; clone [`Repository`](crate::Repository) handles from it
/// rather than constructing pools elsewhere.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    bus: Arc<ChangeBus>,
}

impl Database {
    async fn new(options: SqliteConnectOptions, max: Option<u32>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // Applied to every pooled connection, not just the first one.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(max.unwrap_or(MAX_CONNECTIONS))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool, bus: Arc::new(ChangeBus::new()) };
        db.migrate().await?;
        Ok(db)
    }

    /// Connect to the cache database at the given path.
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options = Self::base_options().filename(path).create_if_missing(true);
        Self::new(options, None).await
    }

    /// Connect to an in-memory database (useful for testing).
    ///
    /// Note:
    /// - In-memory databases are destroyed when the connection closes.
    /// - Not gated behind `#[cfg(test)]` so other crates can use it in
    ///   their own tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        // An in-memory database is per-connection unless the cache is
        // shared; a single connection keeps every query on the same data.
        Self::new(options, Some(1)).await
    }

    /// Connect according to a [`CacheConfig`]: a file-backed database when a
    /// path is configured, in-memory otherwise.
    pub async fn from_config(config: &CacheConfig) -> Result<Self> {
        match &config.path {
            Some(path) => Self::connect(path).await,
            None => Self::connect_in_memory().await,
        }
    }

    /// Base connection options shared between file and in-memory databases.
    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // WAL keeps readers on the last-committed snapshot while a
            // write transaction is in flight.
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            // The albums->photos cascade and the photo->album constraint
            // both depend on this being ON.
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            // A refresh rewrites both tables in one transaction; give
            // concurrent readers some slack instead of SQLITE_BUSY.
            .busy_timeout(std::time::Duration::from_millis(1500))
    }

    /// Apply PRAGMA settings that aren't exposed via SqliteConnectOptions.
    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA wal_autocheckpoint = 800;
                PRAGMA cache_size = -8192;
                PRAGMA temp_store = MEMORY;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Run database migrations.
    ///
    /// Called automatically by the `connect` constructors.
    #[instrument(name = "migrate_cache_database", skip_all)]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The change-notification hub shared by all repositories over this
    /// database.
    pub(crate) fn bus(&self) -> &Arc<ChangeBus> {
        &self.bus
    }

    /// Close the database connection pool.
    ///
    /// Waits for all connections to be returned to the pool and then closes
    /// them. The instance should not be used afterwards.
    pub async fn close(&self) {
        // Let SQLite update query planner statistics on the way out.
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}
