//! Database access for the Merchkins `PostgreSQL` schema.
//!
//! One repository struct per feature, each borrowing the shared [`PgPool`].
//! Multi-row invariants (cart totals, denormalized snapshots, stock
//! movements, last-admin protection) are enforced inside transactions here,
//! never left to route handlers.
//!
//! # Migrations
//!
//! Migrations live in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p merchkins-cli -- migrate
//! ```

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub mod announcements;
pub mod audit;
pub mod carts;
pub mod categories;
pub mod chats;
pub mod orders;
pub mod organizations;
pub mod payments;
pub mod products;
pub mod refunds;
pub mod reviews;
pub mod tickets;
pub mod users;
pub mod vouchers;

/// Errors produced by repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The requested row does not exist (or is soft-deleted).
    #[error("not found")]
    NotFound,

    /// A uniqueness or state conflict (duplicate slug, invalid status
    /// transition, last-admin removal).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A business-rule violation in the request itself (insufficient stock,
    /// category too deep, voucher not applicable).
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// A stored value failed to parse back into its domain type.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

impl RepositoryError {
    /// Map a sqlx error, turning unique violations into a `Conflict`.
    pub(crate) fn from_unique(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
