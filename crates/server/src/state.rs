//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::search::SearchIndex;
use crate::services::audit::AuditService;
use crate::services::email::EmailService;
use crate::services::permissions::PermissionService;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    permissions: PermissionService,
    audit: AuditService,
    email: Option<EmailService>,
    search: SearchIndex,
}

impl AppState {
    /// Create a new application state.
    ///
    /// `email` is `None` when SMTP is not configured; notification sends
    /// become no-ops.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        pool: PgPool,
        email: Option<EmailService>,
        search: SearchIndex,
    ) -> Self {
        let permissions = PermissionService::new(pool.clone());
        let audit = AuditService::new(pool.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                permissions,
                audit,
                email,
                search,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the permission resolution service.
    #[must_use]
    pub fn permissions(&self) -> &PermissionService {
        &self.inner.permissions
    }

    /// Get a reference to the audit trail service.
    #[must_use]
    pub fn audit(&self) -> &AuditService {
        &self.inner.audit
    }

    /// Get a reference to the email service, if SMTP is configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailService> {
        self.inner.email.as_ref()
    }

    /// Get a reference to the announcement search index.
    #[must_use]
    pub fn search(&self) -> &SearchIndex {
        &self.inner.search
    }
}
