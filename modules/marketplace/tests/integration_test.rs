//! End-to-end tests: in-memory sqlite, real migrations, the real router,
//! driven through tower's oneshot.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use marketplace::config::MarketplaceConfig;
use marketplace::contract::{Role, User};
use marketplace::domain::repo::UsersRepository;
use marketplace::infra::storage::{migrations::Migrator, SeaOrmStore};
use marketplace::{Repositories, Services};

struct TestApp {
    router: Router,
    admin: Uuid,
    vendor: Uuid,
    buyer1: Uuid,
    buyer2: Uuid,
}

async fn spawn_app() -> TestApp {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("connect test database");
    Migrator::up(&db, None).await.expect("run migrations");

    let store = Arc::new(SeaOrmStore::new(db));
    let repos = Repositories {
        users: store.clone(),
        listings: store.clone(),
        offers: store.clone(),
        messages: store.clone(),
    };

    let mut ids = Vec::new();
    for (name, role, is_vendor) in [
        ("admin", Role::Admin, false),
        ("vendor", Role::User, true),
        ("buyer1", Role::User, false),
        ("buyer2", Role::User, false),
    ] {
        let user = User {
            id: Uuid::new_v4(),
            email: format!("{name}@example.com"),
            display_name: name.to_string(),
            role,
            is_vendor,
            points: 10,
            email_verified: true,
            phone_verified: false,
            kyc_verified: false,
            created_at: Utc::now(),
        };
        UsersRepository::insert(store.as_ref(), user.clone())
            .await
            .expect("seed user");
        ids.push(user.id);
    }

    let services = Services::new(repos, MarketplaceConfig::default());
    TestApp {
        router: services.router(),
        admin: ids[0],
        vendor: ids[1],
        buyer1: ids[2],
        buyer2: ids[3],
    }
}

impl TestApp {
    async fn request(
        &self,
        method: &str,
        uri: &str,
        as_user: Option<(Uuid, Role)>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((user_id, role)) = as_user {
            builder = builder
                .header("x-user-id", user_id.to_string())
                .header("x-user-role", role.as_str());
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    async fn publish_listing(&self) -> Uuid {
        let (status, listing) = self
            .request(
                "POST",
                "/api/listings",
                Some((self.vendor, Role::User)),
                Some(json!({
                    "title": "Vintage road bike",
                    "description": "Steel frame, recently serviced.",
                    "price": "249.00",
                    "currency": "EUR",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(listing["status"], "DRAFT");
        let id: Uuid = serde_json::from_value(listing["id"].clone()).expect("listing id");

        let (status, updated) = self
            .request(
                "PUT",
                &format!("/api/listings/{id}"),
                Some((self.vendor, Role::User)),
                Some(json!({ "status": "ACTIVE" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "ACTIVE");
        id
    }
}

#[tokio::test]
async fn unauthenticated_requests_are_rejected_with_problem_json() {
    let app = spawn_app().await;

    let (status, body) = app.request("GET", "/api/offers", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    // public browse needs no identity
    let (status, _) = app.request("GET", "/api/listings", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn listing_lifecycle_over_http() {
    let app = spawn_app().await;

    // a non-vendor may not post
    let (status, body) = app
        .request(
            "POST",
            "/api/listings",
            Some((app.buyer1, Role::User)),
            Some(json!({
                "title": "Sneaky listing",
                "price": "1.00",
                "currency": "EUR",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let listing_id = app.publish_listing().await;

    // browse shows it with the pagination envelope
    let (status, body) = app
        .request("GET", "/api/listings?search=bike", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["pagination"]["currentPage"], 1);
    assert_eq!(body["pagination"]["limit"], 20);
    assert_eq!(body["listings"][0]["id"], listing_id.to_string());

    // hand-setting SOLD is rejected
    let (status, body) = app
        .request(
            "PUT",
            &format!("/api/listings/{listing_id}"),
            Some((app.vendor, Role::User)),
            Some(json!({ "status": "SOLD" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION");

    // a stranger cannot edit, an admin can
    let (status, _) = app
        .request(
            "PUT",
            &format!("/api/listings/{listing_id}"),
            Some((app.buyer1, Role::User)),
            Some(json!({ "title": "Hijacked" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .request(
            "PUT",
            &format!("/api/listings/{listing_id}"),
            Some((app.admin, Role::Admin)),
            Some(json!({ "title": "Vintage road bike (verified)" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Vintage road bike (verified)");
}

#[tokio::test]
async fn offer_lifecycle_over_http() {
    let app = spawn_app().await;
    let listing_id = app.publish_listing().await;

    // vendor cannot offer on their own listing
    let (status, body) = app
        .request(
            "POST",
            "/api/offers",
            Some((app.vendor, Role::User)),
            Some(json!({ "listingId": listing_id, "price": "10.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "OWN_LISTING");

    // two buyers bid
    let (status, offer1) = app
        .request(
            "POST",
            "/api/offers",
            Some((app.buyer1, Role::User)),
            Some(json!({ "listingId": listing_id, "price": "100.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(offer1["status"], "PENDING");

    let (status, body) = app
        .request(
            "POST",
            "/api/offers",
            Some((app.buyer1, Role::User)),
            Some(json!({ "listingId": listing_id, "price": "110.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (_, offer2) = app
        .request(
            "POST",
            "/api/offers",
            Some((app.buyer2, Role::User)),
            Some(json!({ "listingId": listing_id, "price": "120.00", "message": "cash today" })),
        )
        .await;
    let offer1_id = offer1["id"].as_str().expect("offer1 id").to_string();
    let offer2_id = offer2["id"].as_str().expect("offer2 id").to_string();

    // a buyer cannot respond
    let (status, _) = app
        .request(
            "POST",
            &format!("/api/offers/{offer2_id}/response"),
            Some((app.buyer2, Role::User)),
            Some(json!({ "status": "ACCEPTED" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // the seller accepts buyer2's offer
    let (status, accepted) = app
        .request(
            "POST",
            &format!("/api/offers/{offer2_id}/response"),
            Some((app.vendor, Role::User)),
            Some(json!({ "status": "ACCEPTED" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["status"], "ACCEPTED");

    // buyer1's sibling offer got swept to REJECTED
    let (status, body) = app
        .request(
            "GET",
            "/api/offers?role=buyer",
            Some((app.buyer1, Role::User)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["offers"][0]["id"], offer1_id);
    assert_eq!(body["offers"][0]["status"], "REJECTED");

    // responding again is invalid
    let (status, body) = app
        .request(
            "POST",
            &format!("/api/offers/{offer2_id}/response"),
            Some((app.vendor, Role::User)),
            Some(json!({ "status": "REJECTED" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_STATE");

    // completion marks the listing sold
    let (status, completed) = app
        .request(
            "POST",
            &format!("/api/offers/{offer2_id}/complete"),
            Some((app.vendor, Role::User)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "COMPLETED");

    let (_, listing) = app
        .request("GET", &format!("/api/listings/{listing_id}"), None, None)
        .await;
    assert_eq!(listing["status"], "SOLD");

    // no further offers on a sold listing
    let (status, body) = app
        .request(
            "POST",
            "/api/offers",
            Some((app.buyer1, Role::User)),
            Some(json!({ "listingId": listing_id, "price": "200.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_STATE");
}

#[tokio::test]
async fn messaging_over_http() {
    let app = spawn_app().await;

    let (status, message) = app
        .request(
            "POST",
            "/api/messages",
            Some((app.buyer1, Role::User)),
            Some(json!({ "receiverId": app.vendor, "content": "still available?" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message["read"], false);
    let message_id = message["id"].as_str().expect("message id").to_string();

    let (status, body) = app
        .request(
            "GET",
            "/api/messages/unread-count",
            Some((app.vendor, Role::User)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    // only the receiver can mark it read
    let (status, _) = app
        .request(
            "PUT",
            &format!("/api/messages/{message_id}/read"),
            Some((app.buyer1, Role::User)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request(
            "PUT",
            &format!("/api/messages/{message_id}/read"),
            Some((app.vendor, Role::User)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, conversations) = app
        .request(
            "GET",
            "/api/messages/conversations",
            Some((app.vendor, Role::User)),
            None,
        )
        .await;
    assert_eq!(conversations["pagination"]["total"], 1);
    assert_eq!(
        conversations["conversations"][0]["otherUserId"],
        app.buyer1.to_string()
    );
    assert_eq!(
        conversations["conversations"][0]["lastMessage"]["content"],
        "still available?"
    );

    let (_, thread) = app
        .request(
            "GET",
            &format!("/api/messages/conversations/{}", app.buyer1),
            Some((app.vendor, Role::User)),
            None,
        )
        .await;
    assert_eq!(thread["pagination"]["total"], 1);
    assert_eq!(thread["messages"][0]["id"], message_id);
}

#[tokio::test]
async fn profiles_and_points_over_http() {
    let app = spawn_app().await;

    let (status, profile) = app
        .request(
            "GET",
            &format!("/api/profiles/{}", app.vendor),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["isVendor"], true);
    assert_eq!(profile["listingCount"], 0);

    let (status, updated) = app
        .request(
            "PUT",
            "/api/profiles/me",
            Some((app.buyer1, Role::User)),
            Some(json!({ "displayName": "Buyer The First" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["displayName"], "Buyer The First");

    // a regular user cannot award points
    let (status, body) = app
        .request(
            "POST",
            "/api/points",
            Some((app.buyer1, Role::User)),
            Some(json!({ "userId": app.buyer2, "points": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, body) = app
        .request(
            "POST",
            "/api/points",
            Some((app.admin, Role::Admin)),
            Some(json!({ "userId": app.buyer2, "points": 5, "reason": "referral" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["points"], 15);

    let (status, body) = app
        .request(
            "GET",
            &format!("/api/points/{}", app.buyer2),
            Some((app.buyer2, Role::User)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["points"], 15);

    // unknown user is a problem document
    let (status, body) = app
        .request(
            "GET",
            &format!("/api/profiles/{}", Uuid::new_v4()),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = spawn_app().await;

    let (status, body) = app
        .request("GET", "/api-docs/openapi.json", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/offers"]["post"].is_object());
    assert!(body["components"]["schemas"]["Problem"].is_object());
}
