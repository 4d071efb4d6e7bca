//! Ports for the domain layer: persistence operations the services need.
//! Object-safe and async-friendly via `async_trait`.
//!
//! Services compute ids/timestamps/validation; repositories persist. The
//! multi-row offer transitions are single port methods so that every
//! implementation has to provide them as one atomic unit.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::contract::{
    Conversation, ConversationSummary, Listing, ListingFilter, Message, Offer, OfferRole,
    OfferStatus, Page, PageRequest, ProfilePatch, User,
};

/// Failure modes of the guarded multi-row transitions.
#[derive(Error, Debug)]
pub enum TxError {
    /// The row no longer satisfies the guard (e.g. the offer stopped being
    /// PENDING between the caller's check and the write). The concurrent
    /// loser of an accept race ends up here.
    #[error("state changed concurrently")]
    StateChanged,

    /// Transient storage conflict (deadlock, serialization failure, busy
    /// database). Safe to retry.
    #[error("storage conflict")]
    Conflict,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait UsersRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn insert(&self, user: User) -> anyhow::Result<()>;
    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> anyhow::Result<bool>;
    /// Atomically add to the points balance. Returns the new balance, or
    /// None when the user does not exist.
    async fn increment_points(&self, id: Uuid, delta: i64) -> anyhow::Result<Option<i64>>;
    async fn listing_count(&self, owner_id: Uuid) -> anyhow::Result<u64>;
}

#[async_trait]
pub trait ListingsRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Listing>>;
    async fn insert(&self, listing: Listing) -> anyhow::Result<()>;
    async fn update(&self, listing: Listing) -> anyhow::Result<()>;
    /// Delete by id. Returns true if a row was deleted.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
    /// Public browse: ACTIVE listings matching the filter, newest first.
    async fn list_active(
        &self,
        filter: &ListingFilter,
        page: PageRequest,
    ) -> anyhow::Result<Page<Listing>>;
    async fn list_by_owner(&self, owner_id: Uuid, page: PageRequest)
        -> anyhow::Result<Page<Listing>>;
}

#[async_trait]
pub trait OffersRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Offer>>;
    /// Uniqueness probe for the one-pending-offer-per-buyer invariant.
    async fn pending_exists(&self, listing_id: Uuid, buyer_id: Uuid) -> anyhow::Result<bool>;
    async fn insert(&self, offer: Offer) -> anyhow::Result<()>;

    /// Atomic unit: set the offer ACCEPTED and every sibling PENDING offer
    /// on the same listing REJECTED. The PENDING guard is re-checked
    /// inside the unit; partial application must never be observable.
    async fn accept_and_reject_siblings(&self, offer_id: Uuid) -> Result<Offer, TxError>;

    /// Set the offer REJECTED, guarded on it still being PENDING.
    async fn reject(&self, offer_id: Uuid) -> Result<Offer, TxError>;

    /// Atomic unit: set the offer COMPLETED and its listing SOLD, guarded
    /// on the offer still being ACCEPTED.
    async fn complete_and_mark_sold(&self, offer_id: Uuid) -> Result<Offer, TxError>;

    /// Offers where the user plays `role`, newest first.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        role: OfferRole,
        status: Option<OfferStatus>,
        page: PageRequest,
    ) -> anyhow::Result<Page<Offer>>;
}

#[async_trait]
pub trait MessagesRepository: Send + Sync {
    async fn find_conversation_for_pair(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> anyhow::Result<Option<Conversation>>;
    async fn insert_conversation(&self, conversation: Conversation) -> anyhow::Result<()>;
    /// Insert the message and bump the conversation's `last_message_at`
    /// in one storage unit.
    async fn insert_message(&self, message: Message) -> anyhow::Result<()>;
    async fn find_message(&self, id: Uuid) -> anyhow::Result<Option<Message>>;
    async fn mark_read(&self, id: Uuid) -> anyhow::Result<bool>;
    async fn unread_count(&self, receiver_id: Uuid) -> anyhow::Result<u64>;
    /// Messages exchanged between the two users, newest first.
    async fn list_between(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        page: PageRequest,
    ) -> anyhow::Result<Page<Message>>;
    /// The user's conversations by last activity, with previews.
    async fn list_conversations(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> anyhow::Result<Page<ConversationSummary>>;
}
