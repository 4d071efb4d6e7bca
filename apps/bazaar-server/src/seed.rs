use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use marketplace::contract::{Listing, ListingStatus, Role, User};
use marketplace::Repositories;

/// Load a demo data set: an admin, a buyer and a vendor with two listings.
/// Meant for a fresh database; re-running trips the unique email index.
pub async fn seed_demo_data(repos: &Repositories) -> Result<Vec<(&'static str, Uuid)>> {
    let now = Utc::now();

    let admin = User {
        id: Uuid::new_v4(),
        email: "admin@example.com".to_string(),
        display_name: "Admin User".to_string(),
        role: Role::Admin,
        is_vendor: false,
        points: 0,
        email_verified: true,
        phone_verified: true,
        kyc_verified: true,
        created_at: now,
    };
    let buyer = User {
        id: Uuid::new_v4(),
        email: "user@example.com".to_string(),
        display_name: "Regular User".to_string(),
        role: Role::User,
        is_vendor: false,
        points: 50,
        email_verified: true,
        phone_verified: false,
        kyc_verified: false,
        created_at: now,
    };
    let vendor = User {
        id: Uuid::new_v4(),
        email: "vendor@example.com".to_string(),
        display_name: "Vendor User".to_string(),
        role: Role::User,
        is_vendor: true,
        points: 120,
        email_verified: true,
        phone_verified: true,
        kyc_verified: true,
        created_at: now,
    };

    for user in [&admin, &buyer, &vendor] {
        repos
            .users
            .insert(user.clone())
            .await
            .with_context(|| format!("seeding user {} (fresh database required)", user.email))?;
    }

    let active_listing = Listing {
        id: Uuid::new_v4(),
        owner_id: vendor.id,
        title: "Vintage road bike".to_string(),
        description: "Steel frame, recently serviced, rides great.".to_string(),
        price: Decimal::new(24900, 2),
        currency: "EUR".to_string(),
        status: ListingStatus::Active,
        location: Some("Berlin".to_string()),
        created_at: now,
        updated_at: now,
    };
    let draft_listing = Listing {
        id: Uuid::new_v4(),
        owner_id: vendor.id,
        title: "Espresso machine".to_string(),
        description: "Dual boiler, needs a new gasket.".to_string(),
        price: Decimal::new(9900, 2),
        currency: "EUR".to_string(),
        status: ListingStatus::Draft,
        location: Some("Berlin".to_string()),
        created_at: now,
        updated_at: now,
    };

    for listing in [&active_listing, &draft_listing] {
        repos
            .listings
            .insert(listing.clone())
            .await
            .with_context(|| format!("seeding listing '{}'", listing.title))?;
    }

    Ok(vec![
        ("admin", admin.id),
        ("buyer", buyer.id),
        ("vendor", vendor.id),
        ("active listing", active_listing.id),
        ("draft listing", draft_listing.id),
    ])
}
