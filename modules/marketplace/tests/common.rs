#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use uuid::Uuid;

use marketplace::config::MarketplaceConfig;
use marketplace::contract::{Listing, ListingStatus, Role, User};
use marketplace::domain::events::{MarketEvent, Notifier};
use marketplace::domain::listings::ListingService;
use marketplace::domain::messaging::MessagingService;
use marketplace::domain::offers::OfferService;
use marketplace::domain::profiles::ProfileService;
use marketplace::domain::repo::{ListingsRepository, UsersRepository};
use marketplace::infra::storage::InMemoryStore;

/// Notifier test double that records every delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<(Uuid, MarketEvent)>>,
}

impl RecordingNotifier {
    pub fn kinds_for(&self, user_id: Uuid) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|(to, _)| *to == user_id)
            .map(|(_, event)| match event {
                MarketEvent::OfferReceived { .. } => "offer.received".to_string(),
                MarketEvent::OfferResponded { accepted, .. } => {
                    if *accepted {
                        "offer.accepted".to_string()
                    } else {
                        "offer.rejected".to_string()
                    }
                }
                MarketEvent::OfferCompleted { .. } => "offer.completed".to_string(),
                MarketEvent::MessageReceived { .. } => "message.received".to_string(),
            })
            .collect()
    }

    pub fn total(&self) -> usize {
        self.events.lock().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, user_id: Uuid, event: &MarketEvent) {
        self.events.lock().push((user_id, event.clone()));
    }
}

/// Everything an in-memory service test needs.
pub struct TestContext {
    pub store: Arc<InMemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub offers: OfferService,
    pub listings: ListingService,
    pub messaging: MessagingService,
    pub profiles: ProfileService,
}

pub fn test_context() -> TestContext {
    let store = Arc::new(InMemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let config = MarketplaceConfig::default();

    let offers = OfferService::new(
        store.clone(),
        store.clone(),
        notifier.clone(),
        config.clone(),
    );
    let listings = ListingService::new(store.clone(), store.clone(), config.clone());
    let messaging = MessagingService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        notifier.clone(),
        config.clone(),
    );
    let profiles = ProfileService::new(store.clone());

    TestContext {
        store,
        notifier,
        offers,
        listings,
        messaging,
        profiles,
    }
}

pub fn a_user(display_name: &str, role: Role, is_vendor: bool) -> User {
    User {
        id: Uuid::new_v4(),
        email: format!("{}@example.com", display_name.to_lowercase().replace(' ', ".")),
        display_name: display_name.to_string(),
        role,
        is_vendor,
        points: 0,
        email_verified: true,
        phone_verified: false,
        kyc_verified: false,
        created_at: Utc::now(),
    }
}

pub async fn seed_user(ctx: &TestContext, user: &User) {
    UsersRepository::insert(ctx.store.as_ref(), user.clone())
        .await
        .expect("seed user");
}

pub async fn seed_listing(ctx: &TestContext, owner: &User, status: ListingStatus) -> Listing {
    let now = Utc::now();
    let listing = Listing {
        id: Uuid::new_v4(),
        owner_id: owner.id,
        title: "Vintage road bike".to_string(),
        description: "Steel frame, recently serviced.".to_string(),
        price: Decimal::new(24900, 2),
        currency: "EUR".to_string(),
        status,
        location: None,
        created_at: now,
        updated_at: now,
    };
    ListingsRepository::insert(ctx.store.as_ref(), listing.clone())
        .await
        .expect("seed listing");
    listing
}
