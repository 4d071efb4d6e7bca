use std::time::Duration;

use axum::{
    routing::{get, post, put},
    Extension, Json, Router,
};
use tower_http::timeout::TimeoutLayer;
use utoipa::OpenApi;

use crate::api::rest::dto::NotificationDto;
use crate::api::rest::sse::SseBroadcaster;
use crate::api::rest::{dto, handlers, problem};
use crate::module::Services;

/// OpenAPI document for the marketplace surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bazaar marketplace API",
        description = "Listings, offers, messaging, profiles and live notifications",
        version = "0.1.0"
    ),
    paths(
        handlers::create_offer,
        handlers::list_offers,
        handlers::respond_to_offer,
        handlers::complete_offer,
        handlers::browse_listings,
        handlers::create_listing,
        handlers::my_listings,
        handlers::get_listing,
        handlers::update_listing,
        handlers::delete_listing,
        handlers::send_message,
        handlers::list_conversations,
        handlers::conversation_with,
        handlers::mark_message_read,
        handlers::unread_count,
        handlers::get_profile,
        handlers::update_profile,
        handlers::get_points,
        handlers::award_points,
    ),
    components(schemas(
        problem::Problem,
        dto::PaginationDto,
        dto::ListingDto,
        dto::CreateListingReq,
        dto::UpdateListingReq,
        dto::ListingListDto,
        dto::OfferDto,
        dto::CreateOfferReq,
        dto::RespondOfferReq,
        dto::OfferListDto,
        dto::MessageDto,
        dto::SendMessageReq,
        dto::MessageListDto,
        dto::ConversationSummaryDto,
        dto::ConversationListDto,
        dto::UnreadCountDto,
        dto::ProfileDto,
        dto::UpdateProfileReq,
        dto::PointsDto,
        dto::AwardPointsReq,
        dto::NotificationDto,
    )),
    tags(
        (name = "offers", description = "Offer lifecycle"),
        (name = "listings", description = "Listing management and browse"),
        (name = "messages", description = "Direct messaging"),
        (name = "profiles", description = "Public profiles and points"),
        (name = "events", description = "Live notifications"),
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Assemble the full router: `/api/...` plus the OpenAPI document.
pub fn register_routes(services: &Services, sse: SseBroadcaster<NotificationDto>) -> Router {
    let api = Router::new()
        .route(
            "/offers",
            post(handlers::create_offer).get(handlers::list_offers),
        )
        .route("/offers/{id}/response", post(handlers::respond_to_offer))
        .route("/offers/{id}/complete", post(handlers::complete_offer))
        .route(
            "/listings",
            get(handlers::browse_listings).post(handlers::create_listing),
        )
        .route("/listings/mine", get(handlers::my_listings))
        .route(
            "/listings/{id}",
            get(handlers::get_listing)
                .put(handlers::update_listing)
                .delete(handlers::delete_listing),
        )
        .route("/messages", post(handlers::send_message))
        .route(
            "/messages/conversations",
            get(handlers::list_conversations),
        )
        .route(
            "/messages/conversations/{other_user_id}",
            get(handlers::conversation_with),
        )
        .route("/messages/unread-count", get(handlers::unread_count))
        .route("/messages/{id}/read", put(handlers::mark_message_read))
        .route("/profiles/me", put(handlers::update_profile))
        .route("/profiles/{id}", get(handlers::get_profile))
        .route(
            "/points",
            post(handlers::award_points),
        )
        .route("/points/{user_id}", get(handlers::get_points))
        // long-lived SSE connections get their own generous timeout
        .merge(
            Router::new()
                .route("/events/stream", get(handlers::events_stream))
                .layer(TimeoutLayer::new(Duration::from_secs(60 * 60))),
        )
        .layer(Extension(services.offers.clone()))
        .layer(Extension(services.listings.clone()))
        .layer(Extension(services.messaging.clone()))
        .layer(Extension(services.profiles.clone()))
        .layer(Extension(sse));

    Router::new()
        .nest("/api", api)
        .route("/api-docs/openapi.json", get(openapi_json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_builds() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_value(&doc).expect("openapi json");
        assert!(json.pointer("/paths/~1api~1offers/post").is_some());
        assert!(json
            .pointer("/components/schemas/OfferDto")
            .is_some());
    }
}
