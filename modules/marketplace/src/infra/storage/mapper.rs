//! Database entity ↔ contract model conversions. Status strings that fail
//! to parse indicate corrupted rows and surface as errors rather than
//! being silently coerced.

use anyhow::{anyhow, Result};

use crate::contract::{
    Conversation, Listing, ListingStatus, Message, Offer, OfferStatus, Role, User,
};
use crate::infra::storage::entity;

pub fn user_to_contract(m: entity::users::Model) -> Result<User> {
    let role = Role::parse(&m.role).ok_or_else(|| anyhow!("unknown user role '{}'", m.role))?;
    Ok(User {
        id: m.id,
        email: m.email,
        display_name: m.display_name,
        role,
        is_vendor: m.is_vendor,
        points: m.points,
        email_verified: m.email_verified,
        phone_verified: m.phone_verified,
        kyc_verified: m.kyc_verified,
        created_at: m.created_at,
    })
}

pub fn listing_to_contract(m: entity::listings::Model) -> Result<Listing> {
    let status = ListingStatus::parse(&m.status)
        .ok_or_else(|| anyhow!("unknown listing status '{}'", m.status))?;
    Ok(Listing {
        id: m.id,
        owner_id: m.owner_id,
        title: m.title,
        description: m.description,
        price: m.price,
        currency: m.currency,
        status,
        location: m.location,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

pub fn offer_to_contract(m: entity::offers::Model) -> Result<Offer> {
    let status = OfferStatus::parse(&m.status)
        .ok_or_else(|| anyhow!("unknown offer status '{}'", m.status))?;
    Ok(Offer {
        id: m.id,
        listing_id: m.listing_id,
        buyer_id: m.buyer_id,
        seller_id: m.seller_id,
        price: m.price,
        message: m.message,
        status,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

pub fn conversation_to_contract(m: entity::conversations::Model) -> Conversation {
    Conversation {
        id: m.id,
        user_a: m.user_a,
        user_b: m.user_b,
        last_message_at: m.last_message_at,
        created_at: m.created_at,
    }
}

pub fn message_to_contract(m: entity::messages::Model) -> Message {
    Message {
        id: m.id,
        conversation_id: m.conversation_id,
        sender_id: m.sender_id,
        receiver_id: m.receiver_id,
        listing_id: m.listing_id,
        content: m.content,
        read: m.read,
        created_at: m.created_at,
    }
}
