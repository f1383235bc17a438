//! User management commands.

use merchkins_server::db::users::UserRepository;
use merchkins_server::services::auth::AuthService;

use super::CliError;

/// Create a user account, optionally granting the platform-admin flag.
///
/// Goes through [`AuthService`] so email validation, password rules, and
/// argon2 hashing match the API's registration path exactly.
pub async fn create(
    email: &str,
    name: &str,
    password: &str,
    platform_admin: bool,
) -> Result<(), CliError> {
    let pool = super::connect().await?;

    let user = AuthService::new(&pool).register(email, name, password).await?;

    if platform_admin {
        UserRepository::new(&pool)
            .set_platform_admin(user.id, true)
            .await?;
        tracing::info!(user_id = %user.id, email, "platform admin created");
    } else {
        tracing::info!(user_id = %user.id, email, "user created");
    }

    Ok(())
}
