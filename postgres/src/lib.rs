//! `PostgreSQL` stores for the studio booking core.
//!
//! Sessions and member accounts are kept as JSONB documents next to a `version` column. Every
//! write is a compare-and-swap:
//!
//! ```sql
//! UPDATE studio_sessions
//! SET document = $2, version = version + 1
//! WHERE id = $1 AND version = $3
//! RETURNING version
//! ```
//!
//! No row back means another process saved first, and the store answers with
//! [`StoreError::ConcurrencyConflict`] so the service layer can reload and retry. Several
//! application processes can therefore share one database without overselling a session.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use studio_postgres::{
//!     connect, migrate, PoolSettings, PostgresEntitlementStore, PostgresSessionStore,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = connect("postgres://localhost/studio", &PoolSettings::default()).await?;
//! migrate(&pool).await?;
//!
//! let sessions = Arc::new(PostgresSessionStore::new(pool.clone()));
//! let entitlements = Arc::new(PostgresEntitlementStore::new(pool));
//! # Ok(())
//! # }
//! ```

mod entitlements;
mod sessions;

pub use entitlements::PostgresEntitlementStore;
pub use sessions::PostgresSessionStore;

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use studio_core::error::StoreError;
use studio_core::store::Version;
use thiserror::Error;

/// Failure while preparing the database.
#[derive(Error, Debug)]
pub enum SetupError {
    /// Could not open the connection pool
    #[error("Failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// A migration failed to apply
    #[error("Migration failed: {0}")]
    Migrate(#[source] sqlx::migrate::MigrateError),
}

/// Connection pool sizing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections kept open
    pub min_connections: u32,
    /// How long to wait for a connection before giving up
    pub connect_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Open a connection pool.
///
/// # Errors
///
/// Returns [`SetupError::Connect`] if the database cannot be reached.
pub async fn connect(database_url: &str, settings: &PoolSettings) -> Result<PgPool, SetupError> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.connect_timeout)
        .connect(database_url)
        .await
        .map_err(SetupError::Connect)?;
    tracing::info!(
        max_connections = settings.max_connections,
        "Connected to PostgreSQL"
    );
    Ok(pool)
}

/// Create the session and account tables and their indexes if they do not exist.
///
/// # Errors
///
/// Returns [`SetupError::Migrate`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), SetupError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(SetupError::Migrate)?;
    tracing::info!("Studio schema is up to date");
    Ok(())
}

/// Map a driver error, keeping decode failures apart from connection and query failures.
fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| match e {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Serialization(format!("{context}: {e}"))
        },
        other => StoreError::Database(format!("{context}: {other}")),
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

/// Whether `error` is a unique violation of the named index or constraint.
fn violates(error: &sqlx::Error, constraint: &str) -> bool {
    error
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation() && db.constraint() == Some(constraint))
}

fn to_column(version: Version) -> Result<i64, StoreError> {
    i64::try_from(version.value())
        .map_err(|_| StoreError::Database(format!("version {version} exceeds BIGINT")))
}

fn from_column(version: i64) -> Result<Version, StoreError> {
    u64::try_from(version)
        .map(Version::new)
        .map_err(|_| StoreError::Database(format!("negative version {version} in database")))
}

fn version_mismatch(
    table: &'static str,
    document: String,
    expected: Option<Version>,
    actual: Option<Version>,
) -> StoreError {
    tracing::debug!(
        document = %document,
        expected = ?expected,
        actual = ?actual,
        "Version check rejected write"
    );
    metrics::counter!("studio_postgres_version_mismatches_total", "table" => table).increment(1);
    StoreError::ConcurrencyConflict {
        document,
        expected,
        actual,
    }
}
