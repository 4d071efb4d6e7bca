use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Transport-agnostic domain event, addressed to a single user.
#[derive(Debug, Clone)]
pub enum MarketEvent {
    OfferReceived {
        offer_id: Uuid,
        listing_id: Uuid,
        buyer_id: Uuid,
        price: Decimal,
        at: DateTime<Utc>,
    },
    OfferResponded {
        offer_id: Uuid,
        listing_id: Uuid,
        accepted: bool,
        at: DateTime<Utc>,
    },
    OfferCompleted {
        offer_id: Uuid,
        listing_id: Uuid,
        at: DateTime<Utc>,
    },
    MessageReceived {
        message_id: Uuid,
        conversation_id: Uuid,
        sender_id: Uuid,
        at: DateTime<Utc>,
    },
}

/// Output port: deliver an event to a user's live channel, best effort.
///
/// Called strictly after the storage transaction committed. Implementations
/// must never block the caller or surface delivery failures.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, user_id: Uuid, event: &MarketEvent);
}
