use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::{StatusCode, Uri},
    response::IntoResponse,
    Extension, Json,
};
use tracing::{error, info};
use uuid::Uuid;

use crate::api::rest::dto::{
    AwardPointsReq, BrowseListingsQuery, ConversationListDto, ConversationSummaryDto,
    CreateListingReq, CreateOfferReq, ListOffersQuery, ListingDto, ListingListDto, MessageDto,
    MessageListDto, NotificationDto, OfferDto, OfferListDto, PageQuery, PaginationDto, PointsDto,
    ProfileDto, RespondOfferReq, SendMessageReq, UnreadCountDto, UpdateListingReq,
    UpdateProfileReq,
};
use crate::api::rest::error::{from_parts, map_domain_error};
use crate::api::rest::extract::Identity;
use crate::api::rest::problem::{Problem, ProblemResponse};
use crate::api::rest::sse::SseBroadcaster;
use crate::contract::{
    ListingFilter, ListingStatus, OfferDecision, OfferRole, OfferStatus,
};
use crate::domain::listings::ListingService;
use crate::domain::messaging::MessagingService;
use crate::domain::offers::OfferService;
use crate::domain::profiles::ProfileService;

fn validation_problem(uri: &Uri, detail: impl Into<String>) -> ProblemResponse {
    from_parts(
        StatusCode::BAD_REQUEST,
        "VALIDATION",
        "Validation error",
        detail,
        uri.path(),
    )
}

// --- offers ---

/// Create a new offer on a listing
#[utoipa::path(
    post,
    path = "/api/offers",
    tag = "offers",
    request_body = CreateOfferReq,
    responses(
        (status = 201, description = "Offer created", body = OfferDto),
        (status = 400, description = "Listing not available or invalid input", body = Problem),
        (status = 404, description = "Listing not found", body = Problem),
        (status = 409, description = "A pending offer already exists", body = Problem)
    )
)]
pub async fn create_offer(
    identity: Identity,
    Extension(svc): Extension<Arc<OfferService>>,
    uri: Uri,
    Json(req_body): Json<CreateOfferReq>,
) -> Result<(StatusCode, Json<OfferDto>), ProblemResponse> {
    info!("Creating offer on listing {}", req_body.listing_id);

    match svc.create_offer(identity.user_id, req_body.into()).await {
        Ok(offer) => Ok((StatusCode::CREATED, Json(OfferDto::from(offer)))),
        Err(e) => {
            error!("Failed to create offer: {}", e);
            Err(map_domain_error(&e, uri.path()))
        }
    }
}

/// Accept or reject a pending offer (seller only)
#[utoipa::path(
    post,
    path = "/api/offers/{id}/response",
    tag = "offers",
    params(("id" = Uuid, Path, description = "Offer id")),
    request_body = RespondOfferReq,
    responses(
        (status = 200, description = "Updated offer", body = OfferDto),
        (status = 400, description = "Offer no longer pending", body = Problem),
        (status = 403, description = "Caller is not the seller", body = Problem),
        (status = 404, description = "Offer not found", body = Problem)
    )
)]
pub async fn respond_to_offer(
    identity: Identity,
    Extension(svc): Extension<Arc<OfferService>>,
    Path(id): Path<Uuid>,
    uri: Uri,
    Json(req_body): Json<RespondOfferReq>,
) -> Result<Json<OfferDto>, ProblemResponse> {
    info!("Responding to offer {}", id);

    let decision = match req_body.status.to_ascii_uppercase().as_str() {
        "ACCEPTED" => OfferDecision::Accepted,
        "REJECTED" => OfferDecision::Rejected,
        other => {
            return Err(validation_problem(
                &uri,
                format!("status must be ACCEPTED or REJECTED, got '{other}'"),
            ))
        }
    };

    match svc.respond_to_offer(id, identity.user_id, decision).await {
        Ok(offer) => Ok(Json(OfferDto::from(offer))),
        Err(e) => {
            error!("Failed to respond to offer {}: {}", id, e);
            Err(map_domain_error(&e, uri.path()))
        }
    }
}

/// Mark an accepted offer as completed; the listing goes SOLD
#[utoipa::path(
    post,
    path = "/api/offers/{id}/complete",
    tag = "offers",
    params(("id" = Uuid, Path, description = "Offer id")),
    responses(
        (status = 200, description = "Completed offer", body = OfferDto),
        (status = 400, description = "Offer is not accepted", body = Problem),
        (status = 403, description = "Caller is not the seller", body = Problem),
        (status = 404, description = "Offer not found", body = Problem)
    )
)]
pub async fn complete_offer(
    identity: Identity,
    Extension(svc): Extension<Arc<OfferService>>,
    Path(id): Path<Uuid>,
    uri: Uri,
) -> Result<Json<OfferDto>, ProblemResponse> {
    info!("Completing offer {}", id);

    match svc.mark_completed(id, identity.user_id).await {
        Ok(offer) => Ok(Json(OfferDto::from(offer))),
        Err(e) => {
            error!("Failed to complete offer {}: {}", id, e);
            Err(map_domain_error(&e, uri.path()))
        }
    }
}

/// List the caller's offers, as buyer, seller or either side
#[utoipa::path(
    get,
    path = "/api/offers",
    tag = "offers",
    params(
        ("role" = Option<String>, Query, description = "buyer | seller | either"),
        ("status" = Option<String>, Query, description = "Filter by offer status"),
        ("page" = Option<u64>, Query, description = "1-based page number"),
        ("limit" = Option<u64>, Query, description = "Page size")
    ),
    responses(
        (status = 200, description = "Page of offers", body = OfferListDto),
        (status = 400, description = "Bad query parameter", body = Problem)
    )
)]
pub async fn list_offers(
    identity: Identity,
    Extension(svc): Extension<Arc<OfferService>>,
    Query(query): Query<ListOffersQuery>,
    uri: Uri,
) -> Result<Json<OfferListDto>, ProblemResponse> {
    let role = match query.role.as_deref() {
        None | Some("either") => OfferRole::Either,
        Some("buyer") => OfferRole::Buyer,
        Some("seller") => OfferRole::Seller,
        Some(other) => {
            return Err(validation_problem(
                &uri,
                format!("role must be buyer, seller or either, got '{other}'"),
            ))
        }
    };
    let status = match query.status.as_deref() {
        None => None,
        Some(s) => Some(OfferStatus::parse(&s.to_ascii_uppercase()).ok_or_else(|| {
            validation_problem(&uri, format!("unknown offer status '{s}'"))
        })?),
    };

    match svc
        .list_offers(identity.user_id, role, status, query.page, query.limit)
        .await
    {
        Ok(page) => {
            let pagination = PaginationDto::from(&page);
            Ok(Json(OfferListDto {
                offers: page.items.into_iter().map(OfferDto::from).collect(),
                pagination,
            }))
        }
        Err(e) => {
            error!("Failed to list offers: {}", e);
            Err(map_domain_error(&e, uri.path()))
        }
    }
}

// --- listings ---

/// Create a new listing (vendors only); starts in DRAFT
#[utoipa::path(
    post,
    path = "/api/listings",
    tag = "listings",
    request_body = CreateListingReq,
    responses(
        (status = 201, description = "Listing created", body = ListingDto),
        (status = 400, description = "Invalid input", body = Problem),
        (status = 403, description = "Caller is not a vendor", body = Problem)
    )
)]
pub async fn create_listing(
    identity: Identity,
    Extension(svc): Extension<Arc<ListingService>>,
    uri: Uri,
    Json(req_body): Json<CreateListingReq>,
) -> Result<(StatusCode, Json<ListingDto>), ProblemResponse> {
    info!("Creating listing");

    match svc.create_listing(identity.user_id, req_body.into()).await {
        Ok(listing) => Ok((StatusCode::CREATED, Json(ListingDto::from(listing)))),
        Err(e) => {
            error!("Failed to create listing: {}", e);
            Err(map_domain_error(&e, uri.path()))
        }
    }
}

/// Public browse over ACTIVE listings
#[utoipa::path(
    get,
    path = "/api/listings",
    tag = "listings",
    params(
        ("search" = Option<String>, Query, description = "Title/description substring"),
        ("minPrice" = Option<String>, Query, description = "Minimum price"),
        ("maxPrice" = Option<String>, Query, description = "Maximum price"),
        ("page" = Option<u64>, Query, description = "1-based page number"),
        ("limit" = Option<u64>, Query, description = "Page size")
    ),
    responses((status = 200, description = "Page of active listings", body = ListingListDto))
)]
pub async fn browse_listings(
    Extension(svc): Extension<Arc<ListingService>>,
    Query(query): Query<BrowseListingsQuery>,
    uri: Uri,
) -> Result<Json<ListingListDto>, ProblemResponse> {
    let filter = ListingFilter {
        search: query.search,
        min_price: query.min_price,
        max_price: query.max_price,
    };

    match svc.list_listings(filter, query.page, query.limit).await {
        Ok(page) => {
            let pagination = PaginationDto::from(&page);
            Ok(Json(ListingListDto {
                listings: page.items.into_iter().map(ListingDto::from).collect(),
                pagination,
            }))
        }
        Err(e) => {
            error!("Failed to browse listings: {}", e);
            Err(map_domain_error(&e, uri.path()))
        }
    }
}

/// Get a specific listing by ID
#[utoipa::path(
    get,
    path = "/api/listings/{id}",
    tag = "listings",
    params(("id" = Uuid, Path, description = "Listing id")),
    responses(
        (status = 200, description = "Listing found", body = ListingDto),
        (status = 404, description = "Listing not found", body = Problem)
    )
)]
pub async fn get_listing(
    Extension(svc): Extension<Arc<ListingService>>,
    Path(id): Path<Uuid>,
    uri: Uri,
) -> Result<Json<ListingDto>, ProblemResponse> {
    match svc.get_listing(id).await {
        Ok(listing) => Ok(Json(ListingDto::from(listing))),
        Err(e) => {
            error!("Failed to get listing {}: {}", id, e);
            Err(map_domain_error(&e, uri.path()))
        }
    }
}

/// The caller's own listings, any status
#[utoipa::path(
    get,
    path = "/api/listings/mine",
    tag = "listings",
    params(
        ("page" = Option<u64>, Query, description = "1-based page number"),
        ("limit" = Option<u64>, Query, description = "Page size")
    ),
    responses((status = 200, description = "Page of own listings", body = ListingListDto))
)]
pub async fn my_listings(
    identity: Identity,
    Extension(svc): Extension<Arc<ListingService>>,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Result<Json<ListingListDto>, ProblemResponse> {
    match svc
        .my_listings(identity.user_id, query.page, query.limit)
        .await
    {
        Ok(page) => {
            let pagination = PaginationDto::from(&page);
            Ok(Json(ListingListDto {
                listings: page.items.into_iter().map(ListingDto::from).collect(),
                pagination,
            }))
        }
        Err(e) => {
            error!("Failed to list own listings: {}", e);
            Err(map_domain_error(&e, uri.path()))
        }
    }
}

/// Update a listing (owner or admin)
#[utoipa::path(
    put,
    path = "/api/listings/{id}",
    tag = "listings",
    params(("id" = Uuid, Path, description = "Listing id")),
    request_body = UpdateListingReq,
    responses(
        (status = 200, description = "Updated listing", body = ListingDto),
        (status = 400, description = "Invalid patch", body = Problem),
        (status = 403, description = "Not the owner", body = Problem),
        (status = 404, description = "Listing not found", body = Problem)
    )
)]
pub async fn update_listing(
    identity: Identity,
    Extension(svc): Extension<Arc<ListingService>>,
    Path(id): Path<Uuid>,
    uri: Uri,
    Json(req_body): Json<UpdateListingReq>,
) -> Result<Json<ListingDto>, ProblemResponse> {
    info!("Updating listing {}", id);

    let status = match req_body.status.as_deref() {
        None => None,
        Some(s) => Some(ListingStatus::parse(&s.to_ascii_uppercase()).ok_or_else(|| {
            validation_problem(&uri, format!("unknown listing status '{s}'"))
        })?),
    };
    let mut patch = req_body.into_patch();
    patch.status = status;

    match svc
        .update_listing(id, identity.user_id, identity.role, patch)
        .await
    {
        Ok(listing) => Ok(Json(ListingDto::from(listing))),
        Err(e) => {
            error!("Failed to update listing {}: {}", id, e);
            Err(map_domain_error(&e, uri.path()))
        }
    }
}

/// Delete a listing (owner or admin)
#[utoipa::path(
    delete,
    path = "/api/listings/{id}",
    tag = "listings",
    params(("id" = Uuid, Path, description = "Listing id")),
    responses(
        (status = 204, description = "Listing deleted"),
        (status = 403, description = "Not the owner", body = Problem),
        (status = 404, description = "Listing not found", body = Problem)
    )
)]
pub async fn delete_listing(
    identity: Identity,
    Extension(svc): Extension<Arc<ListingService>>,
    Path(id): Path<Uuid>,
    uri: Uri,
) -> Result<StatusCode, ProblemResponse> {
    info!("Deleting listing {}", id);

    match svc
        .delete_listing(id, identity.user_id, identity.role)
        .await
    {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => {
            error!("Failed to delete listing {}: {}", id, e);
            Err(map_domain_error(&e, uri.path()))
        }
    }
}

// --- messaging ---

/// Send a direct message; creates the conversation on first contact
#[utoipa::path(
    post,
    path = "/api/messages",
    tag = "messages",
    request_body = SendMessageReq,
    responses(
        (status = 201, description = "Message sent", body = MessageDto),
        (status = 400, description = "Invalid input", body = Problem),
        (status = 404, description = "Receiver or listing not found", body = Problem)
    )
)]
pub async fn send_message(
    identity: Identity,
    Extension(svc): Extension<Arc<MessagingService>>,
    uri: Uri,
    Json(req_body): Json<SendMessageReq>,
) -> Result<(StatusCode, Json<MessageDto>), ProblemResponse> {
    info!("Sending message to {}", req_body.receiver_id);

    match svc.send_message(identity.user_id, req_body.into()).await {
        Ok(message) => Ok((StatusCode::CREATED, Json(MessageDto::from(message)))),
        Err(e) => {
            error!("Failed to send message: {}", e);
            Err(map_domain_error(&e, uri.path()))
        }
    }
}

/// The caller's conversations, most recently active first
#[utoipa::path(
    get,
    path = "/api/messages/conversations",
    tag = "messages",
    params(
        ("page" = Option<u64>, Query, description = "1-based page number"),
        ("limit" = Option<u64>, Query, description = "Page size")
    ),
    responses((status = 200, description = "Page of conversations", body = ConversationListDto))
)]
pub async fn list_conversations(
    identity: Identity,
    Extension(svc): Extension<Arc<MessagingService>>,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Result<Json<ConversationListDto>, ProblemResponse> {
    match svc
        .list_conversations(identity.user_id, query.page, query.limit)
        .await
    {
        Ok(page) => {
            let pagination = PaginationDto::from(&page);
            Ok(Json(ConversationListDto {
                conversations: page
                    .items
                    .into_iter()
                    .map(ConversationSummaryDto::from)
                    .collect(),
                pagination,
            }))
        }
        Err(e) => {
            error!("Failed to list conversations: {}", e);
            Err(map_domain_error(&e, uri.path()))
        }
    }
}

/// The message thread with another user, newest first
#[utoipa::path(
    get,
    path = "/api/messages/conversations/{other_user_id}",
    tag = "messages",
    params(
        ("other_user_id" = Uuid, Path, description = "The other participant"),
        ("page" = Option<u64>, Query, description = "1-based page number"),
        ("limit" = Option<u64>, Query, description = "Page size")
    ),
    responses((status = 200, description = "Page of messages", body = MessageListDto))
)]
pub async fn conversation_with(
    identity: Identity,
    Extension(svc): Extension<Arc<MessagingService>>,
    Path(other_user_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
    uri: Uri,
) -> Result<Json<MessageListDto>, ProblemResponse> {
    match svc
        .conversation_with(identity.user_id, other_user_id, query.page, query.limit)
        .await
    {
        Ok(page) => {
            let pagination = PaginationDto::from(&page);
            Ok(Json(MessageListDto {
                messages: page.items.into_iter().map(MessageDto::from).collect(),
                pagination,
            }))
        }
        Err(e) => {
            error!("Failed to fetch conversation: {}", e);
            Err(map_domain_error(&e, uri.path()))
        }
    }
}

/// Mark a received message as read
#[utoipa::path(
    put,
    path = "/api/messages/{id}/read",
    tag = "messages",
    params(("id" = Uuid, Path, description = "Message id")),
    responses(
        (status = 204, description = "Marked as read"),
        (status = 404, description = "No such received message", body = Problem)
    )
)]
pub async fn mark_message_read(
    identity: Identity,
    Extension(svc): Extension<Arc<MessagingService>>,
    Path(id): Path<Uuid>,
    uri: Uri,
) -> Result<StatusCode, ProblemResponse> {
    match svc.mark_read(id, identity.user_id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => {
            error!("Failed to mark message {} read: {}", id, e);
            Err(map_domain_error(&e, uri.path()))
        }
    }
}

/// Number of unread messages for the caller
#[utoipa::path(
    get,
    path = "/api/messages/unread-count",
    tag = "messages",
    responses((status = 200, description = "Unread message count", body = UnreadCountDto))
)]
pub async fn unread_count(
    identity: Identity,
    Extension(svc): Extension<Arc<MessagingService>>,
    uri: Uri,
) -> Result<Json<UnreadCountDto>, ProblemResponse> {
    match svc.unread_count(identity.user_id).await {
        Ok(count) => Ok(Json(UnreadCountDto { count })),
        Err(e) => {
            error!("Failed to count unread messages: {}", e);
            Err(map_domain_error(&e, uri.path()))
        }
    }
}

// --- profiles & points ---

/// Public profile of a user
#[utoipa::path(
    get,
    path = "/api/profiles/{id}",
    tag = "profiles",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Profile found", body = ProfileDto),
        (status = 404, description = "User not found", body = Problem)
    )
)]
pub async fn get_profile(
    Extension(svc): Extension<Arc<ProfileService>>,
    Path(id): Path<Uuid>,
    uri: Uri,
) -> Result<Json<ProfileDto>, ProblemResponse> {
    match svc.get_profile(id).await {
        Ok(profile) => Ok(Json(ProfileDto::from(profile))),
        Err(e) => {
            error!("Failed to get profile {}: {}", id, e);
            Err(map_domain_error(&e, uri.path()))
        }
    }
}

/// Update the caller's own profile
#[utoipa::path(
    put,
    path = "/api/profiles/me",
    tag = "profiles",
    request_body = UpdateProfileReq,
    responses(
        (status = 200, description = "Updated profile", body = ProfileDto),
        (status = 400, description = "Invalid input", body = Problem)
    )
)]
pub async fn update_profile(
    identity: Identity,
    Extension(svc): Extension<Arc<ProfileService>>,
    uri: Uri,
    Json(req_body): Json<UpdateProfileReq>,
) -> Result<Json<ProfileDto>, ProblemResponse> {
    info!("Updating profile");

    match svc.update_profile(identity.user_id, req_body.into()).await {
        Ok(profile) => Ok(Json(ProfileDto::from(profile))),
        Err(e) => {
            error!("Failed to update profile: {}", e);
            Err(map_domain_error(&e, uri.path()))
        }
    }
}

/// Points balance of a user
#[utoipa::path(
    get,
    path = "/api/points/{user_id}",
    tag = "profiles",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Points balance", body = PointsDto),
        (status = 404, description = "User not found", body = Problem)
    )
)]
pub async fn get_points(
    _identity: Identity,
    Extension(svc): Extension<Arc<ProfileService>>,
    Path(user_id): Path<Uuid>,
    uri: Uri,
) -> Result<Json<PointsDto>, ProblemResponse> {
    match svc.points_of(user_id).await {
        Ok(points) => Ok(Json(PointsDto { user_id, points })),
        Err(e) => {
            error!("Failed to get points for {}: {}", user_id, e);
            Err(map_domain_error(&e, uri.path()))
        }
    }
}

/// Adjust a user's points balance (admin only)
#[utoipa::path(
    post,
    path = "/api/points",
    tag = "profiles",
    request_body = AwardPointsReq,
    responses(
        (status = 200, description = "New balance", body = PointsDto),
        (status = 403, description = "Caller is not an admin", body = Problem),
        (status = 404, description = "User not found", body = Problem)
    )
)]
pub async fn award_points(
    identity: Identity,
    Extension(svc): Extension<Arc<ProfileService>>,
    uri: Uri,
    Json(req_body): Json<AwardPointsReq>,
) -> Result<Json<PointsDto>, ProblemResponse> {
    info!("Awarding points to {}", req_body.user_id);

    match svc
        .award_points(
            identity.role,
            req_body.user_id,
            req_body.points,
            req_body.reason,
        )
        .await
    {
        Ok(points) => Ok(Json(PointsDto {
            user_id: req_body.user_id,
            points,
        })),
        Err(e) => {
            error!("Failed to award points: {}", e);
            Err(map_domain_error(&e, uri.path()))
        }
    }
}

// --- notifications ---

/// SSE stream of the caller's live notifications.
pub async fn events_stream(
    identity: Identity,
    Extension(sse): Extension<SseBroadcaster<NotificationDto>>,
) -> impl IntoResponse {
    info!("New SSE connection for user {}", identity.user_id);
    let me = identity.user_id;
    sse.sse_response_filtered(move |event| event.user_id == me)
}
