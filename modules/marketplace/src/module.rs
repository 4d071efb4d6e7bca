use std::sync::Arc;

use crate::api::rest::dto::NotificationDto;
use crate::api::rest::sse::SseBroadcaster;
use crate::api::rest::sse_adapter::SseNotifier;
use crate::config::MarketplaceConfig;
use crate::domain::listings::ListingService;
use crate::domain::messaging::MessagingService;
use crate::domain::offers::OfferService;
use crate::domain::profiles::ProfileService;
use crate::domain::repo::{
    ListingsRepository, MessagesRepository, OffersRepository, UsersRepository,
};

/// The module's storage ports, bundled for wiring.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UsersRepository>,
    pub listings: Arc<dyn ListingsRepository>,
    pub offers: Arc<dyn OffersRepository>,
    pub messages: Arc<dyn MessagesRepository>,
}

/// All domain services plus the notification bus, wired together.
#[derive(Clone)]
pub struct Services {
    pub offers: Arc<OfferService>,
    pub listings: Arc<ListingService>,
    pub messaging: Arc<MessagingService>,
    pub profiles: Arc<ProfileService>,
    pub broadcaster: SseBroadcaster<NotificationDto>,
}

impl Services {
    /// Wire the services against a set of repositories. Domain events go
    /// to the returned broadcaster, which the SSE route also subscribes to.
    pub fn new(repos: Repositories, config: MarketplaceConfig) -> Self {
        let broadcaster = SseBroadcaster::new(config.event_buffer);
        let notifier = Arc::new(SseNotifier::new(broadcaster.clone()));

        let offers = Arc::new(OfferService::new(
            repos.offers.clone(),
            repos.listings.clone(),
            notifier.clone(),
            config.clone(),
        ));
        let listings = Arc::new(ListingService::new(
            repos.listings.clone(),
            repos.users.clone(),
            config.clone(),
        ));
        let messaging = Arc::new(MessagingService::new(
            repos.messages.clone(),
            repos.users.clone(),
            repos.listings.clone(),
            notifier,
            config.clone(),
        ));
        let profiles = Arc::new(ProfileService::new(repos.users.clone()));

        Self {
            offers,
            listings,
            messaging,
            profiles,
            broadcaster,
        }
    }

    /// The module's HTTP surface.
    pub fn router(&self) -> axum::Router {
        crate::api::rest::routes::register_routes(self, self.broadcaster.clone())
    }
}
