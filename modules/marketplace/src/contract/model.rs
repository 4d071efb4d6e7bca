use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// A marketplace account. Identity (signup, credentials, verification
/// flows) is owned by the external identity system; this module reads the
/// flags and maintains the vendor capability and the points balance.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub is_vendor: bool,
    pub points: i64,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub kyc_verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Some(Role::User),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub currency: String,
    pub status: ListingStatus,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingStatus {
    Draft,
    Active,
    Sold,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Draft => "DRAFT",
            ListingStatus::Active => "ACTIVE",
            ListingStatus::Sold => "SOLD",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(ListingStatus::Draft),
            "ACTIVE" => Some(ListingStatus::Active),
            "SOLD" => Some(ListingStatus::Sold),
            _ => None,
        }
    }
}

/// A buyer's proposed price against a listing. `seller_id` is the listing
/// owner captured at creation time and never changes afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub price: Decimal,
    pub message: Option<String>,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "PENDING",
            OfferStatus::Accepted => "ACCEPTED",
            OfferStatus::Rejected => "REJECTED",
            OfferStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OfferStatus::Pending),
            "ACCEPTED" => Some(OfferStatus::Accepted),
            "REJECTED" => Some(OfferStatus::Rejected),
            "COMPLETED" => Some(OfferStatus::Completed),
            _ => None,
        }
    }

    /// Terminal offers are retained as history and can never move again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OfferStatus::Rejected | OfferStatus::Completed)
    }
}

/// The seller's verdict on a pending offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferDecision {
    Accepted,
    Rejected,
}

/// Which side of an offer a listing query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferRole {
    Buyer,
    Seller,
    Either,
}

/// A private thread between two users. The pair is stored normalized
/// (`user_a < user_b`) so uniqueness is a storage constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub id: Uuid,
    pub user_a: Uuid,
    pub user_b: Uuid,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Normalize an unordered pair into storage order.
    pub fn normalize_pair(x: Uuid, y: Uuid) -> (Uuid, Uuid) {
        if x <= y {
            (x, y)
        } else {
            (y, x)
        }
    }

    pub fn other_participant(&self, user_id: Uuid) -> Uuid {
        if self.user_a == user_id {
            self.user_b
        } else {
            self.user_a
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub listing_id: Option<Uuid>,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// A conversation joined with what the conversation list screen needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub other_user_id: Uuid,
    pub last_message: Option<Message>,
}

// --- operation inputs ---

#[derive(Debug, Clone)]
pub struct NewListing {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub currency: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListingPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub location: Option<String>,
    pub status: Option<ListingStatus>,
}

#[derive(Debug, Clone)]
pub struct ListingFilter {
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct NewOffer {
    pub listing_id: Uuid,
    pub price: Decimal,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub receiver_id: Uuid,
    pub content: String,
    pub listing_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// Public projection of a user, as shown on their profile page.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: String,
    pub is_vendor: bool,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub kyc_verified: bool,
    pub listing_count: u64,
    pub member_since: DateTime<Utc>,
}

// --- pagination ---

/// 1-based page request. Use [`PageRequest::clamped`] before handing it to
/// a repository so defaults and the configured cap are applied.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn new(page: u64, limit: u64) -> Self {
        Self { page, limit }
    }

    pub fn clamped(page: Option<u64>, limit: Option<u64>, default_limit: u64, max_limit: u64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, max_limit),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.limit
    }
}

/// Page envelope: items plus the totals the wire format exposes.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            limit: request.limit,
        }
    }

    pub fn pages(&self) -> u64 {
        self.total.div_ceil(self.limit.max(1))
    }
}
