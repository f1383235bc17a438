//! CLI command implementations.

pub mod migrate;
pub mod seed;
pub mod user;

use thiserror::Error;

/// Shared database bootstrap errors for CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Repository error: {0}")]
    Repository(#[from] merchkins_server::db::RepositoryError),

    #[error("Auth error: {0}")]
    Auth(#[from] merchkins_server::services::auth::AuthError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Connect to the database named by `MERCHKINS_DATABASE_URL`, falling back
/// to `DATABASE_URL`.
pub(crate) async fn connect() -> Result<sqlx::PgPool, CliError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("MERCHKINS_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| CliError::MissingEnvVar("MERCHKINS_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(sqlx::PgPool::connect(&database_url).await?)
}
