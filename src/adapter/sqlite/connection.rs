//! Database connection management using Diesel ORM.
//!
//! Provides connection pooling, migration support, and connection
//! configuration for SQLite databases.

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::TradeError;

/// Embedded database migrations compiled from the migrations/ directory.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Type alias for a SQLite connection pool.
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

/// Create a connection pool for the given database URL.
///
/// An in-memory URL (`:memory:`) gives every pooled connection its own
/// private database, so pair it with `max_connections` of 1 or use a file.
///
/// # Errors
/// Returns [`TradeError::StoreUnavailable`] if the pool cannot be created.
pub fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, TradeError> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    Pool::builder()
        .max_size(max_connections)
        .build(manager)
        .map_err(|e| TradeError::StoreUnavailable(e.to_string()))
}

/// Run all pending database migrations.
///
/// # Errors
/// Returns [`TradeError::StoreUnavailable`] if migrations fail.
pub fn run_migrations(pool: &DbPool) -> Result<(), TradeError> {
    let mut conn = pool
        .get()
        .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;
    Ok(())
}

/// Configure SQLite connection pragmas used for trade writes.
///
/// # Errors
/// Returns [`TradeError::StoreUnavailable`] if a pragma fails to apply.
pub fn configure_connection(conn: &mut SqliteConnection) -> Result<(), TradeError> {
    diesel::sql_query("PRAGMA busy_timeout=5000")
        .execute(conn)
        .map_err(|e| TradeError::StoreUnavailable(e.to_string()))?;
    Ok(())
}
