//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness check
//! GET  /ready                           - Readiness (database + search)
//!
//! # Auth
//! POST /auth/register                   - Create an account
//! POST /auth/login                      - Login
//! POST /auth/logout                     - Logout
//! GET  /auth/me                         - Current user
//! POST /auth/password                   - Change password
//!
//! # Organizations
//! POST   /orgs                          - Create organization
//! GET    /orgs                          - List organizations
//! GET    /orgs/{slug}                   - Organization detail
//! PATCH  /orgs/{slug}                   - Update (manage_org)
//! DELETE /orgs/{slug}                   - Soft-delete (manage_org)
//! POST   /orgs/{slug}/join              - Join with invite code
//! POST   /orgs/{slug}/leave             - Leave
//! POST   /orgs/{slug}/invite/rotate     - Rotate invite code (manage_org)
//! GET    /orgs/{slug}/members           - List members (manage_org)
//! DELETE /orgs/{slug}/members/{user_id} - Remove member (manage_org)
//! PATCH  /orgs/{slug}/members/{user_id}/role        - Change role (manage_org)
//! GET    /orgs/{slug}/members/{user_id}/permissions - List overrides (manage_org)
//! PUT    /orgs/{slug}/members/{user_id}/permissions - Set override (manage_org)
//! DELETE /orgs/{slug}/members/{user_id}/permissions/{permission} - Clear override
//!
//! # Catalog
//! GET    /orgs/{slug}/categories        - Category tree
//! POST   /orgs/{slug}/categories        - Create (manage_products)
//! PATCH  /orgs/{slug}/categories/{id}   - Rename / move (manage_products)
//! DELETE /orgs/{slug}/categories/{id}   - Delete (manage_products)
//! GET    /orgs/{slug}/products          - Product listing
//! POST   /orgs/{slug}/products          - Create (manage_products)
//! GET    /orgs/{slug}/products/{product_slug}          - Product detail
//! PATCH  /orgs/{slug}/products/{product_slug}          - Update (manage_products)
//! DELETE /orgs/{slug}/products/{product_slug}          - Soft-delete (manage_products)
//! POST   /orgs/{slug}/products/{product_slug}/variants - Add variant (manage_products)
//! PATCH  /orgs/{slug}/variants/{id}     - Update variant (manage_products)
//!
//! # Cart & Checkout
//! GET    /orgs/{slug}/cart              - Current user's cart
//! POST   /orgs/{slug}/cart/items        - Add item
//! PATCH  /orgs/{slug}/cart/items/{variant_id} - Set quantity (0 removes)
//! DELETE /orgs/{slug}/cart              - Clear cart
//! POST   /orgs/{slug}/checkout          - Place order
//!
//! # Orders
//! GET   /me/orders                      - Own order history
//! GET   /me/orders/{id}                 - Own order detail
//! GET   /orgs/{slug}/orders             - Org orders (view_reports)
//! GET   /orgs/{slug}/orders/{id}        - Org order detail (view_reports)
//! PATCH /orgs/{slug}/orders/{id}/status - Advance status (manage_orders)
//! POST  /orgs/{slug}/orders/{id}/payments - Record payment (manage_orders)
//! GET   /orgs/{slug}/orders/{id}/payments - List payments (view_reports)
//!
//! # Vouchers
//! GET   /orgs/{slug}/vouchers           - List (manage_orders)
//! POST  /orgs/{slug}/vouchers           - Create (manage_orders)
//! PATCH /orgs/{slug}/vouchers/{id}      - Enable/disable (manage_orders)
//!
//! # Refunds
//! POST  /me/orders/{id}/refund          - Request refund
//! GET   /me/refunds                     - Own refund requests
//! GET   /orgs/{slug}/refunds            - List (manage_refunds)
//! POST  /orgs/{slug}/refunds/{id}/decide - Approve/reject (manage_refunds)
//! POST  /orgs/{slug}/refunds/{id}/settle - Mark refunded (manage_refunds)
//!
//! # Reviews
//! GET    /orgs/{slug}/products/{product_slug}/reviews - List reviews
//! POST   /orgs/{slug}/products/{product_slug}/reviews - Create (verified purchase)
//! PATCH  /orgs/{slug}/reviews/{id}      - Edit own review
//! DELETE /orgs/{slug}/reviews/{id}      - Delete own (or moderate)
//!
//! # Announcements
//! GET    /orgs/{slug}/announcements         - Visible announcements
//! GET    /orgs/{slug}/announcements/search  - Full-text search
//! POST   /orgs/{slug}/announcements         - Publish (manage_announcements)
//! PATCH  /orgs/{slug}/announcements/{id}    - Edit (manage_announcements)
//! DELETE /orgs/{slug}/announcements/{id}    - Delete (manage_announcements)
//!
//! # Chat
//! POST /orgs/{slug}/chat                - Open own room / get existing
//! GET  /orgs/{slug}/chat/messages       - Own room messages
//! POST /orgs/{slug}/chat/messages       - Post as customer
//! GET  /me/chats                        - Own rooms
//! GET  /orgs/{slug}/chats               - Staff inbox (manage_tickets)
//! GET  /orgs/{slug}/chats/{id}/messages - Read as staff (manage_tickets)
//! POST /orgs/{slug}/chats/{id}/messages - Post as staff (manage_tickets)
//!
//! # Tickets
//! POST  /orgs/{slug}/tickets            - Open ticket
//! GET   /me/tickets                     - Own tickets
//! GET   /orgs/{slug}/tickets            - Staff queue (manage_tickets)
//! GET   /orgs/{slug}/tickets/{id}       - Thread
//! POST  /orgs/{slug}/tickets/{id}/messages - Reply
//! PATCH /orgs/{slug}/tickets/{id}       - Assign / priority / status (manage_tickets)
//!
//! # Audit
//! GET /orgs/{slug}/audit                - Audit trail (view_reports)
//! ```

pub mod announcements;
pub mod audit;
pub mod auth;
pub mod carts;
pub mod categories;
pub mod chats;
pub mod health;
pub mod orders;
pub mod organizations;
pub mod payments;
pub mod products;
pub mod refunds;
pub mod reviews;
pub mod tickets;
pub mod vouchers;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};

use merchkins_core::{Permission, Slug};

use crate::error::AppError;
use crate::models::CurrentUser;
use crate::models::organization::Organization;
use crate::services::permissions::ResolvedMember;
use crate::state::AppState;

/// Load a live organization by slug or 404.
pub(crate) async fn load_org(state: &AppState, slug: &str) -> Result<Organization, AppError> {
    let slug = Slug::parse(slug).map_err(|e| AppError::BadRequest(e.to_string()))?;
    crate::db::organizations::OrganizationRepository::new(state.pool())
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("organization {slug}")))
}

/// Resolve the user's membership in an organization, if any.
///
/// Platform admins without a membership row resolve to `None` here; use
/// [`require_permission`] for authority checks, which grants them
/// everything.
pub(crate) async fn resolve_member(
    state: &AppState,
    org: &Organization,
    user: &CurrentUser,
) -> Result<Option<ResolvedMember>, AppError> {
    Ok(state.permissions().resolve(org.id, user.id).await?)
}

/// Require a permission in the organization. Platform admins bypass.
pub(crate) async fn require_permission(
    state: &AppState,
    org: &Organization,
    user: &CurrentUser,
    permission: Permission,
) -> Result<(), AppError> {
    if user.is_platform_admin {
        return Ok(());
    }
    if state.permissions().has(org.id, user.id, permission).await? {
        return Ok(());
    }
    Err(AppError::Forbidden(format!(
        "requires {permission} in this organization"
    )))
}

/// Deserializer for "absent vs explicit null" PATCH fields.
///
/// Use with `#[serde(default, deserialize_with = "double_option")]` on an
/// `Option<Option<T>>`: absent stays `None`, `null` becomes `Some(None)`.
pub(crate) fn double_option<'de, T, D>(de: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(de).map(Some)
}

/// Default page size for listings.
pub(crate) const DEFAULT_LIMIT: i64 = 50;

/// Hard cap on page size.
pub(crate) const MAX_LIMIT: i64 = 200;

/// Common pagination query parameters.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct Pagination {
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Pagination {
    /// Build from already-extracted query fields.
    pub(crate) const fn from_parts(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self { limit, offset }
    }

    pub(crate) fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub(crate) fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/password", post(auth::change_password))
}

/// Routes for the caller's own resources.
pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(orders::list_mine))
        .route("/orders/{id}", get(orders::get_mine))
        .route("/orders/{id}/refund", post(refunds::request))
        .route("/refunds", get(refunds::list_mine))
        .route("/chats", get(chats::list_mine))
        .route("/tickets", get(tickets::list_mine))
}

/// Organization-scoped routes.
#[allow(clippy::too_many_lines)]
pub fn org_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/{slug}",
            get(organizations::show)
                .patch(organizations::update)
                .delete(organizations::remove),
        )
        .route("/{slug}/join", post(organizations::join))
        .route("/{slug}/leave", post(organizations::leave))
        .route("/{slug}/invite/rotate", post(organizations::rotate_invite))
        .route("/{slug}/members", get(organizations::members))
        .route(
            "/{slug}/members/{user_id}",
            delete(organizations::remove_member),
        )
        .route(
            "/{slug}/members/{user_id}/role",
            patch(organizations::change_role),
        )
        .route(
            "/{slug}/members/{user_id}/permissions",
            get(organizations::list_overrides).put(organizations::set_override),
        )
        .route(
            "/{slug}/members/{user_id}/permissions/{permission}",
            delete(organizations::clear_override),
        )
        // Catalog
        .route(
            "/{slug}/categories",
            get(categories::list).post(categories::create),
        )
        .route(
            "/{slug}/categories/{id}",
            patch(categories::update).delete(categories::remove),
        )
        .route(
            "/{slug}/products",
            get(products::list).post(products::create),
        )
        .route(
            "/{slug}/products/{product_slug}",
            get(products::show)
                .patch(products::update)
                .delete(products::remove),
        )
        .route(
            "/{slug}/products/{product_slug}/variants",
            post(products::add_variant),
        )
        .route("/{slug}/variants/{id}", patch(products::update_variant))
        // Cart & checkout
        .route("/{slug}/cart", get(carts::show).delete(carts::clear))
        .route("/{slug}/cart/items", post(carts::add_item))
        .route("/{slug}/cart/items/{variant_id}", patch(carts::set_quantity))
        .route("/{slug}/checkout", post(orders::checkout))
        // Orders
        .route("/{slug}/orders", get(orders::list_for_org))
        .route("/{slug}/orders/{id}", get(orders::get_for_org))
        .route("/{slug}/orders/{id}/status", patch(orders::update_status))
        .route(
            "/{slug}/orders/{id}/payments",
            get(payments::list).post(payments::record),
        )
        // Vouchers
        .route(
            "/{slug}/vouchers",
            get(vouchers::list).post(vouchers::create),
        )
        .route("/{slug}/vouchers/{id}", patch(vouchers::set_active))
        // Refunds
        .route("/{slug}/refunds", get(refunds::list_for_org))
        .route("/{slug}/refunds/{id}/decide", post(refunds::decide))
        .route("/{slug}/refunds/{id}/settle", post(refunds::settle))
        // Reviews
        .route(
            "/{slug}/products/{product_slug}/reviews",
            get(reviews::list).post(reviews::create),
        )
        .route(
            "/{slug}/reviews/{id}",
            patch(reviews::update).delete(reviews::remove),
        )
        // Announcements
        .route(
            "/{slug}/announcements",
            get(announcements::list).post(announcements::create),
        )
        .route("/{slug}/announcements/search", get(announcements::search))
        .route(
            "/{slug}/announcements/{id}",
            patch(announcements::update).delete(announcements::remove),
        )
        // Chat
        .route("/{slug}/chat", post(chats::open_own))
        .route(
            "/{slug}/chat/messages",
            get(chats::own_messages).post(chats::post_own),
        )
        .route("/{slug}/chats", get(chats::staff_inbox))
        .route(
            "/{slug}/chats/{id}/messages",
            get(chats::staff_messages).post(chats::staff_post),
        )
        // Tickets
        .route(
            "/{slug}/tickets",
            get(tickets::list_for_org).post(tickets::open),
        )
        .route(
            "/{slug}/tickets/{id}",
            get(tickets::show).patch(tickets::update),
        )
        .route("/{slug}/tickets/{id}/messages", post(tickets::reply))
        // Audit
        .route("/{slug}/audit", get(audit::list))
}

/// Create all routes for the server.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .nest(
            "/auth",
            auth_routes().layer(crate::middleware::rate_limit::auth_rate_limiter()),
        )
        .nest("/me", me_routes())
        .route(
            "/orgs",
            get(organizations::list).post(organizations::create),
        )
        .nest("/orgs", org_routes())
}
