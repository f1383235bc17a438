//! Seed the database with a demo storefront.
//!
//! Creates two accounts (an owner and a customer), one organization with a
//! small catalog, and a welcome voucher. Intended for empty development
//! databases; re-running against seeded data fails on the unique email.

use merchkins_core::Slug;
use merchkins_server::db::categories::CategoryRepository;
use merchkins_server::db::organizations::OrganizationRepository;
use merchkins_server::db::products::ProductRepository;
use merchkins_server::db::vouchers::VoucherRepository;
use merchkins_server::services::auth::AuthService;
use rust_decimal::Decimal;

use super::CliError;

const OWNER_EMAIL: &str = "owner@demo.merchkins.dev";
const CUSTOMER_EMAIL: &str = "customer@demo.merchkins.dev";
const DEMO_PASSWORD: &str = "demo-password-123";

/// Seed a demo storefront.
pub async fn run() -> Result<(), CliError> {
    let pool = super::connect().await?;

    let auth = AuthService::new(&pool);
    let owner = auth.register(OWNER_EMAIL, "Demo Owner", DEMO_PASSWORD).await?;
    let customer = auth
        .register(CUSTOMER_EMAIL, "Demo Customer", DEMO_PASSWORD)
        .await?;
    tracing::info!(%owner.id, %customer.id, "demo accounts created");

    let slug = Slug::parse("demo-goods").map_err(|e| CliError::InvalidInput(e.to_string()))?;
    let org = OrganizationRepository::new(&pool)
        .create(
            "Demo Goods",
            &slug,
            Some("Seeded demo storefront"),
            owner.id,
        )
        .await?;
    tracing::info!(org_id = %org.id, slug = %org.slug, "organization created");

    let categories = CategoryRepository::new(&pool);
    let apparel = categories.create(org.id, None, "Apparel").await?;
    let shirts = categories.create(org.id, Some(apparel.id), "Shirts").await?;

    let products = ProductRepository::new(&pool);
    let tee_slug = Slug::parse("classic-tee").map_err(|e| CliError::InvalidInput(e.to_string()))?;
    let tee = products
        .create(
            org.id,
            &org.name,
            Some(shirts.id),
            "Classic Tee",
            &tee_slug,
            Some("A plain, comfortable t-shirt."),
        )
        .await?;
    products
        .add_variant(tee.id, "Small", Decimal::new(1900, 2), "USD", 50)
        .await?;
    products
        .add_variant(tee.id, "Large", Decimal::new(2100, 2), "USD", 50)
        .await?;

    let mug_slug = Slug::parse("logo-mug").map_err(|e| CliError::InvalidInput(e.to_string()))?;
    let mug = products
        .create(
            org.id,
            &org.name,
            None,
            "Logo Mug",
            &mug_slug,
            Some("Ceramic mug, 350 ml."),
        )
        .await?;
    products
        .add_variant(mug.id, "Standard", Decimal::new(1250, 2), "USD", 100)
        .await?;

    VoucherRepository::new(&pool)
        .create(
            org.id,
            "WELCOME10",
            Some(10),
            None,
            Decimal::new(2000, 2),
            Some(100),
            None,
        )
        .await?;

    tracing::info!("seed complete: 2 users, 1 organization, 2 products, 1 voucher");
    Ok(())
}
