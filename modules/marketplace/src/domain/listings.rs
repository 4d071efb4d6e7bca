use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::MarketplaceConfig;
use crate::contract::{
    Listing, ListingFilter, ListingPatch, ListingStatus, NewListing, Page, PageRequest, Role,
};
use crate::domain::error::DomainError;
use crate::domain::repo::{ListingsRepository, UsersRepository};

/// Listing CRUD with the vendor-capability and owner-or-admin rules.
#[derive(Clone)]
pub struct ListingService {
    listings: Arc<dyn ListingsRepository>,
    users: Arc<dyn UsersRepository>,
    config: MarketplaceConfig,
}

impl ListingService {
    pub fn new(
        listings: Arc<dyn ListingsRepository>,
        users: Arc<dyn UsersRepository>,
        config: MarketplaceConfig,
    ) -> Self {
        Self {
            listings,
            users,
            config,
        }
    }

    /// Create a DRAFT listing. Only vendors may post.
    #[instrument(name = "marketplace.listings.create", skip(self, new_listing), fields(owner_id = %owner_id))]
    pub async fn create_listing(
        &self,
        owner_id: Uuid,
        new_listing: NewListing,
    ) -> Result<Listing, DomainError> {
        info!("Creating listing");

        let owner = self
            .users
            .find_by_id(owner_id)
            .await?
            .ok_or_else(|| DomainError::user_not_found(owner_id))?;

        if !owner.is_vendor {
            return Err(DomainError::forbidden(
                "only vendors can create listings; become a vendor first",
            ));
        }

        validate_title(&new_listing.title)?;
        validate_price(new_listing.price)?;
        validate_currency(&new_listing.currency)?;

        let now = Utc::now();
        let listing = Listing {
            id: Uuid::new_v4(),
            owner_id,
            title: new_listing.title,
            description: new_listing.description,
            price: new_listing.price,
            currency: new_listing.currency.to_ascii_uppercase(),
            status: ListingStatus::Draft,
            location: new_listing.location,
            created_at: now,
            updated_at: now,
        };

        self.listings.insert(listing.clone()).await?;

        info!("Listing {} created", listing.id);
        Ok(listing)
    }

    #[instrument(name = "marketplace.listings.get", skip(self), fields(listing_id = %id))]
    pub async fn get_listing(&self, id: Uuid) -> Result<Listing, DomainError> {
        debug!("Getting listing");
        self.listings
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::listing_not_found(id))
    }

    /// Public browse: ACTIVE listings only, newest first.
    #[instrument(name = "marketplace.listings.browse", skip(self, filter))]
    pub async fn list_listings(
        &self,
        filter: ListingFilter,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Result<Page<Listing>, DomainError> {
        debug!("Browsing listings");

        let request = PageRequest::clamped(
            page,
            limit,
            self.config.default_page_size,
            self.config.max_page_size,
        );
        Ok(self.listings.list_active(&filter, request).await?)
    }

    /// Everything the owner has posted, any status.
    #[instrument(name = "marketplace.listings.mine", skip(self), fields(owner_id = %owner_id))]
    pub async fn my_listings(
        &self,
        owner_id: Uuid,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Result<Page<Listing>, DomainError> {
        let request = PageRequest::clamped(
            page,
            limit,
            self.config.default_page_size,
            self.config.max_page_size,
        );
        Ok(self.listings.list_by_owner(owner_id, request).await?)
    }

    /// Patch a listing. Owner or admin only. SOLD cannot be set by hand;
    /// it is reachable only through offer completion.
    #[instrument(name = "marketplace.listings.update", skip(self, patch), fields(listing_id = %id))]
    pub async fn update_listing(
        &self,
        id: Uuid,
        acting_user: Uuid,
        acting_role: Role,
        patch: ListingPatch,
    ) -> Result<Listing, DomainError> {
        info!("Updating listing");

        let mut listing = self
            .listings
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::listing_not_found(id))?;

        if listing.owner_id != acting_user && acting_role != Role::Admin {
            return Err(DomainError::forbidden("not the owner of this listing"));
        }

        if let Some(status) = patch.status {
            if status == ListingStatus::Sold {
                return Err(DomainError::validation(
                    "status",
                    "a listing is sold through offer completion, not by edit",
                ));
            }
            if listing.status == ListingStatus::Sold {
                return Err(DomainError::invalid_state("sold listings cannot be edited"));
            }
            listing.status = status;
        }
        if let Some(title) = patch.title {
            validate_title(&title)?;
            listing.title = title;
        }
        if let Some(description) = patch.description {
            listing.description = description;
        }
        if let Some(price) = patch.price {
            validate_price(price)?;
            listing.price = price;
        }
        if let Some(location) = patch.location {
            listing.location = Some(location);
        }
        listing.updated_at = Utc::now();

        self.listings.update(listing.clone()).await?;

        info!("Listing {} updated", listing.id);
        Ok(listing)
    }

    /// Remove a listing. Owner or admin only.
    #[instrument(name = "marketplace.listings.delete", skip(self), fields(listing_id = %id))]
    pub async fn delete_listing(
        &self,
        id: Uuid,
        acting_user: Uuid,
        acting_role: Role,
    ) -> Result<(), DomainError> {
        info!("Deleting listing");

        let listing = self
            .listings
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::listing_not_found(id))?;

        if listing.owner_id != acting_user && acting_role != Role::Admin {
            return Err(DomainError::forbidden("not the owner of this listing"));
        }

        let deleted = self.listings.delete(id).await?;
        if !deleted {
            return Err(DomainError::listing_not_found(id));
        }

        info!("Listing {} deleted", id);
        Ok(())
    }
}

// --- validation helpers ---

fn validate_title(title: &str) -> Result<(), DomainError> {
    if title.trim().is_empty() {
        return Err(DomainError::validation("title", "must not be empty"));
    }
    if title.len() > 200 {
        return Err(DomainError::validation("title", "too long (max 200)"));
    }
    Ok(())
}

fn validate_price(price: rust_decimal::Decimal) -> Result<(), DomainError> {
    if price.is_sign_negative() {
        return Err(DomainError::validation("price", "must not be negative"));
    }
    Ok(())
}

fn validate_currency(currency: &str) -> Result<(), DomainError> {
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(DomainError::validation(
            "currency",
            "expected a three-letter currency code",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn currency_must_be_three_letters() {
        assert!(validate_currency("EUR").is_ok());
        assert!(validate_currency("usd").is_ok());
        assert!(validate_currency("EURO").is_err());
        assert!(validate_currency("E1R").is_err());
    }

    #[test]
    fn negative_prices_are_rejected() {
        assert!(validate_price(Decimal::ZERO).is_ok());
        assert!(validate_price(Decimal::new(-1, 2)).is_err());
    }
}
