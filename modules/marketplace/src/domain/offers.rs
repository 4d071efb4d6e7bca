use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::MarketplaceConfig;
use crate::contract::{
    ListingStatus, NewOffer, Offer, OfferDecision, OfferRole, OfferStatus, Page, PageRequest,
};
use crate::domain::error::DomainError;
use crate::domain::events::{MarketEvent, Notifier};
use crate::domain::repo::{ListingsRepository, OffersRepository, TxError};

/// The offer lifecycle manager.
///
/// Owns the PENDING → ACCEPTED/REJECTED → COMPLETED state machine for a
/// single offer, including the sibling-rejection sweep on acceptance and
/// the listing SOLD transition on completion. Authorization happens here,
/// against the stored buyer/seller ids, so the invariants hold no matter
/// which transport called in.
#[derive(Clone)]
pub struct OfferService {
    offers: Arc<dyn OffersRepository>,
    listings: Arc<dyn ListingsRepository>,
    notifier: Arc<dyn Notifier>,
    config: MarketplaceConfig,
}

impl OfferService {
    pub fn new(
        offers: Arc<dyn OffersRepository>,
        listings: Arc<dyn ListingsRepository>,
        notifier: Arc<dyn Notifier>,
        config: MarketplaceConfig,
    ) -> Self {
        Self {
            offers,
            listings,
            notifier,
            config,
        }
    }

    /// Create a PENDING offer for `buyer_id` against a listing.
    ///
    /// Guards, in order, first failure wins: listing exists, listing is
    /// ACTIVE, the buyer is not the owner, the price is valid, and the
    /// buyer has no other PENDING offer on this listing.
    #[instrument(
        name = "marketplace.offers.create",
        skip(self, new_offer),
        fields(listing_id = %new_offer.listing_id, buyer_id = %buyer_id)
    )]
    pub async fn create_offer(
        &self,
        buyer_id: Uuid,
        new_offer: NewOffer,
    ) -> Result<Offer, DomainError> {
        info!("Creating offer");

        let listing = self
            .listings
            .find_by_id(new_offer.listing_id)
            .await?
            .ok_or_else(|| DomainError::listing_not_found(new_offer.listing_id))?;

        if listing.status != ListingStatus::Active {
            return Err(DomainError::invalid_state("this listing is not available"));
        }

        if listing.owner_id == buyer_id {
            return Err(DomainError::OwnListing);
        }

        if new_offer.price.is_sign_negative() {
            return Err(DomainError::validation("price", "must not be negative"));
        }
        if let Some(ref message) = new_offer.message {
            if message.len() > self.config.max_message_length {
                return Err(DomainError::validation("message", "too long"));
            }
        }

        if self
            .offers
            .pending_exists(new_offer.listing_id, buyer_id)
            .await?
        {
            return Err(DomainError::conflict(
                "you already have a pending offer for this listing",
            ));
        }

        let now = Utc::now();
        let offer = Offer {
            id: Uuid::new_v4(),
            listing_id: listing.id,
            buyer_id,
            // the listing owner at creation time, immutable from here on
            seller_id: listing.owner_id,
            price: new_offer.price,
            message: new_offer.message,
            status: OfferStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        self.offers.insert(offer.clone()).await?;

        self.notifier.notify(
            offer.seller_id,
            &MarketEvent::OfferReceived {
                offer_id: offer.id,
                listing_id: offer.listing_id,
                buyer_id: offer.buyer_id,
                price: offer.price,
                at: now,
            },
        );

        info!("Offer {} created", offer.id);
        Ok(offer)
    }

    /// Accept or reject a PENDING offer. Only the seller may respond.
    ///
    /// Acceptance also rejects every sibling PENDING offer on the same
    /// listing; both writes land in one atomic storage unit, so no reader
    /// observes the accepted offer with siblings still pending.
    #[instrument(
        name = "marketplace.offers.respond",
        skip(self),
        fields(offer_id = %offer_id, acting_user = %acting_user)
    )]
    pub async fn respond_to_offer(
        &self,
        offer_id: Uuid,
        acting_user: Uuid,
        decision: OfferDecision,
    ) -> Result<Offer, DomainError> {
        info!("Responding to offer");

        let offer = self
            .offers
            .find_by_id(offer_id)
            .await?
            .ok_or_else(|| DomainError::offer_not_found(offer_id))?;

        if offer.seller_id != acting_user {
            return Err(DomainError::forbidden(
                "only the seller can respond to this offer",
            ));
        }

        if offer.status != OfferStatus::Pending {
            return Err(DomainError::invalid_state(
                "this offer can no longer be modified",
            ));
        }

        let updated = match decision {
            OfferDecision::Accepted => {
                self.run_guarded(|| self.offers.accept_and_reject_siblings(offer_id))
                    .await?
            }
            OfferDecision::Rejected => {
                self.run_guarded(|| self.offers.reject(offer_id)).await?
            }
        };

        self.notifier.notify(
            updated.buyer_id,
            &MarketEvent::OfferResponded {
                offer_id: updated.id,
                listing_id: updated.listing_id,
                accepted: updated.status == OfferStatus::Accepted,
                at: updated.updated_at,
            },
        );

        info!("Offer {} is now {}", updated.id, updated.status.as_str());
        Ok(updated)
    }

    /// Complete an ACCEPTED offer; the listing goes SOLD in the same
    /// atomic unit. Only the seller may complete.
    #[instrument(
        name = "marketplace.offers.complete",
        skip(self),
        fields(offer_id = %offer_id, acting_user = %acting_user)
    )]
    pub async fn mark_completed(
        &self,
        offer_id: Uuid,
        acting_user: Uuid,
    ) -> Result<Offer, DomainError> {
        info!("Completing offer");

        let offer = self
            .offers
            .find_by_id(offer_id)
            .await?
            .ok_or_else(|| DomainError::offer_not_found(offer_id))?;

        if offer.seller_id != acting_user {
            return Err(DomainError::forbidden(
                "only the seller can complete this offer",
            ));
        }

        if offer.status != OfferStatus::Accepted {
            return Err(DomainError::invalid_state(
                "only accepted offers can be marked as completed",
            ));
        }

        let updated = self
            .run_guarded(|| self.offers.complete_and_mark_sold(offer_id))
            .await?;

        self.notifier.notify(
            updated.buyer_id,
            &MarketEvent::OfferCompleted {
                offer_id: updated.id,
                listing_id: updated.listing_id,
                at: updated.updated_at,
            },
        );

        info!("Offer {} completed, listing sold", updated.id);
        Ok(updated)
    }

    /// Page through the offers a user is involved in. Pure read.
    #[instrument(name = "marketplace.offers.list", skip(self), fields(user_id = %user_id))]
    pub async fn list_offers(
        &self,
        user_id: Uuid,
        role: OfferRole,
        status: Option<OfferStatus>,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Result<Page<Offer>, DomainError> {
        debug!("Listing offers");

        let request = PageRequest::clamped(
            page,
            limit,
            self.config.default_page_size,
            self.config.max_page_size,
        );
        let page = self
            .offers
            .list_for_user(user_id, role, status, request)
            .await?;

        debug!("Found {} offers ({} total)", page.items.len(), page.total);
        Ok(page)
    }

    /// Run a guarded transition, retrying exactly once on a transient
    /// storage conflict. A failed guard means the state moved under us and
    /// is reported as InvalidState, the same answer a late caller gets.
    async fn run_guarded<F, Fut>(&self, op: F) -> Result<Offer, DomainError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<Offer, TxError>>,
    {
        match op().await {
            Ok(offer) => Ok(offer),
            Err(TxError::Conflict) => {
                warn!("Transient storage conflict, retrying once");
                match op().await {
                    Ok(offer) => Ok(offer),
                    Err(TxError::StateChanged) => Err(DomainError::invalid_state(
                        "this offer can no longer be modified",
                    )),
                    Err(TxError::Conflict) => {
                        Err(DomainError::storage("storage conflict persisted after retry"))
                    }
                    Err(TxError::Other(e)) => Err(e.into()),
                }
            }
            Err(TxError::StateChanged) => Err(DomainError::invalid_state(
                "this offer can no longer be modified",
            )),
            Err(TxError::Other(e)) => Err(e.into()),
        }
    }
}
