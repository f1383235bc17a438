//! Database migration command.
//!
//! Migrations are embedded at compile time from `crates/server/migrations/`
//! and applied with sqlx's migrator. Running against an up-to-date database
//! is a no-op.

use super::CliError;

/// Run all pending database migrations.
pub async fn run() -> Result<(), CliError> {
    let pool = super::connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Migrations complete");
    Ok(())
}
