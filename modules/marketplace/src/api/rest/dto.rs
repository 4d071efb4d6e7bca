use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::contract::{
    ConversationSummary, Listing, ListingPatch, Message, NewListing, NewMessage, NewOffer, Offer,
    Page, Profile, ProfilePatch,
};
use crate::domain::events::MarketEvent;

// The wire format is camelCase throughout; the page envelope in
// particular is pinned to { total, pages, currentPage, limit }.

/// Pagination envelope shared by all list responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginationDto {
    pub total: u64,
    pub pages: u64,
    pub current_page: u64,
    pub limit: u64,
}

impl<T> From<&Page<T>> for PaginationDto {
    fn from(page: &Page<T>) -> Self {
        Self {
            total: page.total,
            pages: page.pages(),
            current_page: page.page,
            limit: page.limit,
        }
    }
}

// --- listings ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListingDto {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    #[schema(value_type = String)]
    pub price: Decimal,
    pub currency: String,
    pub status: String,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Listing> for ListingDto {
    fn from(listing: Listing) -> Self {
        Self {
            id: listing.id,
            owner_id: listing.owner_id,
            title: listing.title,
            description: listing.description,
            price: listing.price,
            currency: listing.currency,
            status: listing.status.as_str().to_string(),
            location: listing.location,
            created_at: listing.created_at,
            updated_at: listing.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingReq {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[schema(value_type = String)]
    pub price: Decimal,
    pub currency: String,
    pub location: Option<String>,
}

impl From<CreateListingReq> for NewListing {
    fn from(req: CreateListingReq) -> Self {
        Self {
            title: req.title,
            description: req.description,
            price: req.price,
            currency: req.currency,
            location: req.location,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListingReq {
    pub title: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    pub location: Option<String>,
    /// DRAFT or ACTIVE; SOLD is reached through offer completion only.
    pub status: Option<String>,
}

impl UpdateListingReq {
    /// Everything except `status`, which the handler validates separately.
    pub fn into_patch(self) -> ListingPatch {
        ListingPatch {
            title: self.title,
            description: self.description,
            price: self.price,
            location: self.location,
            status: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BrowseListingsQuery {
    pub search: Option<String>,
    #[serde(rename = "minPrice")]
    #[schema(value_type = Option<String>)]
    pub min_price: Option<Decimal>,
    #[serde(rename = "maxPrice")]
    #[schema(value_type = Option<String>)]
    pub max_price: Option<Decimal>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListingListDto {
    pub listings: Vec<ListingDto>,
    pub pagination: PaginationDto,
}

// --- offers ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OfferDto {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    #[schema(value_type = String)]
    pub price: Decimal,
    pub message: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Offer> for OfferDto {
    fn from(offer: Offer) -> Self {
        Self {
            id: offer.id,
            listing_id: offer.listing_id,
            buyer_id: offer.buyer_id,
            seller_id: offer.seller_id,
            price: offer.price,
            message: offer.message,
            status: offer.status.as_str().to_string(),
            created_at: offer.created_at,
            updated_at: offer.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOfferReq {
    pub listing_id: Uuid,
    #[schema(value_type = String)]
    pub price: Decimal,
    pub message: Option<String>,
}

impl From<CreateOfferReq> for NewOffer {
    fn from(req: CreateOfferReq) -> Self {
        Self {
            listing_id: req.listing_id,
            price: req.price,
            message: req.message,
        }
    }
}

/// The seller's verdict: ACCEPTED or REJECTED.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RespondOfferReq {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ListOffersQuery {
    /// buyer | seller | either (default)
    pub role: Option<String>,
    pub status: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OfferListDto {
    pub offers: Vec<OfferDto>,
    pub pagination: PaginationDto,
}

// --- messaging ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub listing_id: Option<Uuid>,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Message> for MessageDto {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            listing_id: message.listing_id,
            content: message.content,
            read: message.read,
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageReq {
    pub receiver_id: Uuid,
    pub content: String,
    pub listing_id: Option<Uuid>,
}

impl From<SendMessageReq> for NewMessage {
    fn from(req: SendMessageReq) -> Self {
        Self {
            receiver_id: req.receiver_id,
            content: req.content,
            listing_id: req.listing_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageListDto {
    pub messages: Vec<MessageDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummaryDto {
    pub id: Uuid,
    pub other_user_id: Uuid,
    pub last_message: Option<MessageDto>,
    pub last_message_time: DateTime<Utc>,
}

impl From<ConversationSummary> for ConversationSummaryDto {
    fn from(summary: ConversationSummary) -> Self {
        Self {
            id: summary.conversation.id,
            other_user_id: summary.other_user_id,
            last_message_time: summary.conversation.last_message_at,
            last_message: summary.last_message.map(MessageDto::from),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversationListDto {
    pub conversations: Vec<ConversationSummaryDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnreadCountDto {
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

// --- profiles & points ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    pub id: Uuid,
    pub display_name: String,
    pub is_vendor: bool,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub kyc_verified: bool,
    pub listing_count: u64,
    pub member_since: DateTime<Utc>,
}

impl From<Profile> for ProfileDto {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            display_name: profile.display_name,
            is_vendor: profile.is_vendor,
            email_verified: profile.email_verified,
            phone_verified: profile.phone_verified,
            kyc_verified: profile.kyc_verified,
            listing_count: profile.listing_count,
            member_since: profile.member_since,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileReq {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl From<UpdateProfileReq> for ProfilePatch {
    fn from(req: UpdateProfileReq) -> Self {
        Self {
            display_name: req.display_name,
            email: req.email,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PointsDto {
    pub user_id: Uuid,
    pub points: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AwardPointsReq {
    pub user_id: Uuid,
    pub points: i64,
    pub reason: Option<String>,
}

// --- notifications (SSE payload) ---

/// Transport-level notification event.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(title = "NotificationDto", description = "Server-sent marketplace event")]
pub struct NotificationDto {
    /// Addressee; the stream endpoint filters on this.
    pub user_id: Uuid,
    pub kind: String,
    pub offer_id: Option<Uuid>,
    pub listing_id: Option<Uuid>,
    pub message_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    #[schema(format = "date-time")]
    pub at: DateTime<Utc>,
}

impl NotificationDto {
    pub fn from_event(user_id: Uuid, event: &MarketEvent) -> Self {
        match event {
            MarketEvent::OfferReceived {
                offer_id,
                listing_id,
                at,
                ..
            } => Self {
                user_id,
                kind: "offer.received".into(),
                offer_id: Some(*offer_id),
                listing_id: Some(*listing_id),
                message_id: None,
                conversation_id: None,
                at: *at,
            },
            MarketEvent::OfferResponded {
                offer_id,
                listing_id,
                accepted,
                at,
            } => Self {
                user_id,
                kind: if *accepted {
                    "offer.accepted".into()
                } else {
                    "offer.rejected".into()
                },
                offer_id: Some(*offer_id),
                listing_id: Some(*listing_id),
                message_id: None,
                conversation_id: None,
                at: *at,
            },
            MarketEvent::OfferCompleted {
                offer_id,
                listing_id,
                at,
            } => Self {
                user_id,
                kind: "offer.completed".into(),
                offer_id: Some(*offer_id),
                listing_id: Some(*listing_id),
                message_id: None,
                conversation_id: None,
                at: *at,
            },
            MarketEvent::MessageReceived {
                message_id,
                conversation_id,
                at,
                ..
            } => Self {
                user_id,
                kind: "message.received".into(),
                offer_id: None,
                listing_id: None,
                message_id: Some(*message_id),
                conversation_id: Some(*conversation_id),
                at: *at,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    #[test]
    fn maps_domain_event_to_transport() {
        let at = chrono::Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let user = Uuid::new_v4();
        let offer = Uuid::new_v4();
        let listing = Uuid::new_v4();

        let out = NotificationDto::from_event(
            user,
            &MarketEvent::OfferReceived {
                offer_id: offer,
                listing_id: listing,
                buyer_id: Uuid::new_v4(),
                price: Decimal::new(100, 0),
                at,
            },
        );
        assert_eq!(out.kind, "offer.received");
        assert_eq!(out.user_id, user);
        assert_eq!(out.offer_id, Some(offer));
        assert_eq!(out.at, at);

        let out = NotificationDto::from_event(
            user,
            &MarketEvent::OfferResponded {
                offer_id: offer,
                listing_id: listing,
                accepted: false,
                at,
            },
        );
        assert_eq!(out.kind, "offer.rejected");
    }

    #[test]
    fn pagination_envelope_is_camel_case() {
        let page = Page::<u8>::new(vec![], 41, crate::contract::PageRequest::new(2, 20));
        let dto = PaginationDto::from(&page);
        let json = serde_json::to_value(&dto).expect("serialize");
        assert_eq!(json["total"], 41);
        assert_eq!(json["pages"], 3);
        assert_eq!(json["currentPage"], 2);
        assert_eq!(json["limit"], 20);
    }
}
