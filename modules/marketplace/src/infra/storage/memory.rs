//! In-memory implementation of the storage ports.
//!
//! One mutex over all tables gives the multi-row transitions the same
//! atomicity the database transaction provides. Used as the service-level
//! test double and for `--mock` runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::contract::{
    Conversation, ConversationSummary, Listing, ListingFilter, ListingStatus, Message, Offer,
    OfferRole, OfferStatus, Page, PageRequest, ProfilePatch, User,
};
use crate::domain::repo::{
    ListingsRepository, MessagesRepository, OffersRepository, TxError, UsersRepository,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    listings: HashMap<Uuid, Listing>,
    offers: HashMap<Uuid, Offer>,
    conversations: HashMap<Uuid, Conversation>,
    messages: HashMap<Uuid, Message>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T>(mut items: Vec<T>, page: PageRequest) -> Page<T> {
    let total = items.len() as u64;
    let start = (page.offset() as usize).min(items.len());
    let end = (start + page.limit as usize).min(items.len());
    let items = items.drain(start..end).collect();
    Page::new(items, total, page)
}

#[async_trait]
impl UsersRepository for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.tables.lock().users.get(&id).cloned())
    }

    async fn insert(&self, user: User) -> anyhow::Result<()> {
        self.tables.lock().users.insert(user.id, user);
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> anyhow::Result<bool> {
        let mut tables = self.tables.lock();
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(display_name) = patch.display_name {
            user.display_name = display_name;
        }
        if let Some(email) = patch.email {
            user.email = email;
        }
        Ok(true)
    }

    async fn increment_points(&self, id: Uuid, delta: i64) -> anyhow::Result<Option<i64>> {
        let mut tables = self.tables.lock();
        Ok(tables.users.get_mut(&id).map(|user| {
            user.points += delta;
            user.points
        }))
    }

    async fn listing_count(&self, owner_id: Uuid) -> anyhow::Result<u64> {
        let tables = self.tables.lock();
        Ok(tables
            .listings
            .values()
            .filter(|l| l.owner_id == owner_id)
            .count() as u64)
    }
}

#[async_trait]
impl ListingsRepository for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Listing>> {
        Ok(self.tables.lock().listings.get(&id).cloned())
    }

    async fn insert(&self, listing: Listing) -> anyhow::Result<()> {
        self.tables.lock().listings.insert(listing.id, listing);
        Ok(())
    }

    async fn update(&self, listing: Listing) -> anyhow::Result<()> {
        self.tables.lock().listings.insert(listing.id, listing);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.tables.lock().listings.remove(&id).is_some())
    }

    async fn list_active(
        &self,
        filter: &ListingFilter,
        page: PageRequest,
    ) -> anyhow::Result<Page<Listing>> {
        let tables = self.tables.lock();
        let mut matching: Vec<Listing> = tables
            .listings
            .values()
            .filter(|l| l.status == ListingStatus::Active)
            .filter(|l| {
                filter.search.as_ref().is_none_or(|s| {
                    let needle = s.to_lowercase();
                    l.title.to_lowercase().contains(&needle)
                        || l.description.to_lowercase().contains(&needle)
                })
            })
            .filter(|l| filter.min_price.is_none_or(|min| l.price >= min))
            .filter(|l| filter.max_price.is_none_or(|max| l.price <= max))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(matching, page))
    }

    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        page: PageRequest,
    ) -> anyhow::Result<Page<Listing>> {
        let tables = self.tables.lock();
        let mut matching: Vec<Listing> = tables
            .listings
            .values()
            .filter(|l| l.owner_id == owner_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(matching, page))
    }
}

#[async_trait]
impl OffersRepository for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Offer>> {
        Ok(self.tables.lock().offers.get(&id).cloned())
    }

    async fn pending_exists(&self, listing_id: Uuid, buyer_id: Uuid) -> anyhow::Result<bool> {
        let tables = self.tables.lock();
        Ok(tables.offers.values().any(|o| {
            o.listing_id == listing_id
                && o.buyer_id == buyer_id
                && o.status == OfferStatus::Pending
        }))
    }

    async fn insert(&self, offer: Offer) -> anyhow::Result<()> {
        self.tables.lock().offers.insert(offer.id, offer);
        Ok(())
    }

    async fn accept_and_reject_siblings(&self, offer_id: Uuid) -> Result<Offer, TxError> {
        let now = Utc::now();
        let mut tables = self.tables.lock();

        let (listing_id, accepted) = {
            let offer = tables
                .offers
                .get_mut(&offer_id)
                .ok_or(TxError::StateChanged)?;
            if offer.status != OfferStatus::Pending {
                return Err(TxError::StateChanged);
            }
            offer.status = OfferStatus::Accepted;
            offer.updated_at = now;
            (offer.listing_id, offer.clone())
        };

        for sibling in tables.offers.values_mut() {
            if sibling.listing_id == listing_id
                && sibling.id != offer_id
                && sibling.status == OfferStatus::Pending
            {
                sibling.status = OfferStatus::Rejected;
                sibling.updated_at = now;
            }
        }

        Ok(accepted)
    }

    async fn reject(&self, offer_id: Uuid) -> Result<Offer, TxError> {
        let mut tables = self.tables.lock();
        let offer = tables
            .offers
            .get_mut(&offer_id)
            .ok_or(TxError::StateChanged)?;
        if offer.status != OfferStatus::Pending {
            return Err(TxError::StateChanged);
        }
        offer.status = OfferStatus::Rejected;
        offer.updated_at = Utc::now();
        Ok(offer.clone())
    }

    async fn complete_and_mark_sold(&self, offer_id: Uuid) -> Result<Offer, TxError> {
        let now = Utc::now();
        let mut tables = self.tables.lock();

        let completed = {
            let offer = tables
                .offers
                .get_mut(&offer_id)
                .ok_or(TxError::StateChanged)?;
            if offer.status != OfferStatus::Accepted {
                return Err(TxError::StateChanged);
            }
            offer.status = OfferStatus::Completed;
            offer.updated_at = now;
            offer.clone()
        };

        if let Some(listing) = tables.listings.get_mut(&completed.listing_id) {
            listing.status = ListingStatus::Sold;
            listing.updated_at = now;
        }

        Ok(completed)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        role: OfferRole,
        status: Option<OfferStatus>,
        page: PageRequest,
    ) -> anyhow::Result<Page<Offer>> {
        let tables = self.tables.lock();
        let mut matching: Vec<Offer> = tables
            .offers
            .values()
            .filter(|o| match role {
                OfferRole::Buyer => o.buyer_id == user_id,
                OfferRole::Seller => o.seller_id == user_id,
                OfferRole::Either => o.buyer_id == user_id || o.seller_id == user_id,
            })
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(matching, page))
    }
}

#[async_trait]
impl MessagesRepository for InMemoryStore {
    async fn find_conversation_for_pair(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> anyhow::Result<Option<Conversation>> {
        let (a, b) = Conversation::normalize_pair(user_a, user_b);
        let tables = self.tables.lock();
        Ok(tables
            .conversations
            .values()
            .find(|c| c.user_a == a && c.user_b == b)
            .cloned())
    }

    async fn insert_conversation(&self, conversation: Conversation) -> anyhow::Result<()> {
        self.tables
            .lock()
            .conversations
            .insert(conversation.id, conversation);
        Ok(())
    }

    async fn insert_message(&self, message: Message) -> anyhow::Result<()> {
        let mut tables = self.tables.lock();
        if let Some(conversation) = tables.conversations.get_mut(&message.conversation_id) {
            conversation.last_message_at = message.created_at;
        }
        tables.messages.insert(message.id, message);
        Ok(())
    }

    async fn find_message(&self, id: Uuid) -> anyhow::Result<Option<Message>> {
        Ok(self.tables.lock().messages.get(&id).cloned())
    }

    async fn mark_read(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut tables = self.tables.lock();
        Ok(tables
            .messages
            .get_mut(&id)
            .map(|m| {
                m.read = true;
            })
            .is_some())
    }

    async fn unread_count(&self, receiver_id: Uuid) -> anyhow::Result<u64> {
        let tables = self.tables.lock();
        Ok(tables
            .messages
            .values()
            .filter(|m| m.receiver_id == receiver_id && !m.read)
            .count() as u64)
    }

    async fn list_between(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        page: PageRequest,
    ) -> anyhow::Result<Page<Message>> {
        let tables = self.tables.lock();
        let mut matching: Vec<Message> = tables
            .messages
            .values()
            .filter(|m| {
                (m.sender_id == user_a && m.receiver_id == user_b)
                    || (m.sender_id == user_b && m.receiver_id == user_a)
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(matching, page))
    }

    async fn list_conversations(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> anyhow::Result<Page<ConversationSummary>> {
        let tables = self.tables.lock();
        let mut matching: Vec<Conversation> = tables
            .conversations
            .values()
            .filter(|c| c.user_a == user_id || c.user_b == user_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));

        let page_of_conversations = paginate(matching, page);
        let items = page_of_conversations
            .items
            .iter()
            .map(|conversation| {
                let last_message = tables
                    .messages
                    .values()
                    .filter(|m| m.conversation_id == conversation.id)
                    .max_by_key(|m| m.created_at)
                    .cloned();
                ConversationSummary {
                    other_user_id: conversation.other_participant(user_id),
                    last_message,
                    conversation: conversation.clone(),
                }
            })
            .collect();

        Ok(Page {
            items,
            total: page_of_conversations.total,
            page: page_of_conversations.page,
            limit: page_of_conversations.limit,
        })
    }
}
