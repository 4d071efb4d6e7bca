mod common;

use common::{a_user, seed_listing, seed_user, test_context};
use uuid::Uuid;

use marketplace::contract::{ListingStatus, NewMessage, Role};
use marketplace::domain::error::DomainError;

fn text_to(receiver_id: Uuid, content: &str) -> NewMessage {
    NewMessage {
        receiver_id,
        content: content.to_string(),
        listing_id: None,
    }
}

#[tokio::test]
async fn first_message_creates_the_conversation_and_notifies() {
    let ctx = test_context();
    let alice = a_user("Alice", Role::User, false);
    let bob = a_user("Bob", Role::User, false);
    seed_user(&ctx, &alice).await;
    seed_user(&ctx, &bob).await;

    let message = ctx
        .messaging
        .send_message(alice.id, text_to(bob.id, "hi, is the bike available?"))
        .await
        .expect("message sent");

    assert!(!message.read);
    assert_eq!(message.sender_id, alice.id);
    assert_eq!(message.receiver_id, bob.id);
    assert_eq!(ctx.notifier.kinds_for(bob.id), vec!["message.received"]);

    let conversations = ctx
        .messaging
        .list_conversations(bob.id, None, None)
        .await
        .expect("bob's conversations");
    assert_eq!(conversations.total, 1);
    assert_eq!(conversations.items[0].other_user_id, alice.id);
}

#[tokio::test]
async fn pair_conversation_is_unique_regardless_of_direction() {
    let ctx = test_context();
    let alice = a_user("Alice", Role::User, false);
    let bob = a_user("Bob", Role::User, false);
    seed_user(&ctx, &alice).await;
    seed_user(&ctx, &bob).await;

    let first = ctx
        .messaging
        .send_message(alice.id, text_to(bob.id, "hello"))
        .await
        .expect("a → b");
    let reply = ctx
        .messaging
        .send_message(bob.id, text_to(alice.id, "hello back"))
        .await
        .expect("b → a");

    assert_eq!(first.conversation_id, reply.conversation_id);

    let conversations = ctx
        .messaging
        .list_conversations(alice.id, None, None)
        .await
        .expect("alice's conversations");
    assert_eq!(conversations.total, 1);

    let thread = ctx
        .messaging
        .conversation_with(alice.id, bob.id, None, None)
        .await
        .expect("thread");
    assert_eq!(thread.total, 2);
    // newest first
    assert!(thread.items[0].created_at >= thread.items[1].created_at);
}

#[tokio::test]
async fn send_message_validations() {
    let ctx = test_context();
    let alice = a_user("Alice", Role::User, false);
    let bob = a_user("Bob", Role::User, false);
    seed_user(&ctx, &alice).await;
    seed_user(&ctx, &bob).await;

    let err = ctx
        .messaging
        .send_message(alice.id, text_to(Uuid::new_v4(), "anyone there?"))
        .await
        .expect_err("missing receiver");
    assert!(matches!(err, DomainError::NotFound { .. }));

    let err = ctx
        .messaging
        .send_message(alice.id, text_to(alice.id, "note to self"))
        .await
        .expect_err("self message");
    assert!(matches!(err, DomainError::Validation { .. }));

    let err = ctx
        .messaging
        .send_message(alice.id, text_to(bob.id, "   "))
        .await
        .expect_err("blank content");
    assert!(matches!(err, DomainError::Validation { .. }));

    let err = ctx
        .messaging
        .send_message(
            alice.id,
            NewMessage {
                receiver_id: bob.id,
                content: "about your listing".to_string(),
                listing_id: Some(Uuid::new_v4()),
            },
        )
        .await
        .expect_err("missing listing reference");
    assert!(matches!(err, DomainError::NotFound { .. }));

    // nothing was delivered for any failed attempt
    assert_eq!(ctx.notifier.total(), 0);
}

#[tokio::test]
async fn message_may_reference_a_listing() {
    let ctx = test_context();
    let alice = a_user("Alice", Role::User, false);
    let vendor = a_user("Vendor", Role::User, true);
    seed_user(&ctx, &alice).await;
    seed_user(&ctx, &vendor).await;
    let listing = seed_listing(&ctx, &vendor, ListingStatus::Active).await;

    let message = ctx
        .messaging
        .send_message(
            alice.id,
            NewMessage {
                receiver_id: vendor.id,
                content: "would you take 200?".to_string(),
                listing_id: Some(listing.id),
            },
        )
        .await
        .expect("message with listing");
    assert_eq!(message.listing_id, Some(listing.id));
}

#[tokio::test]
async fn unread_count_tracks_read_transitions() {
    let ctx = test_context();
    let alice = a_user("Alice", Role::User, false);
    let bob = a_user("Bob", Role::User, false);
    seed_user(&ctx, &alice).await;
    seed_user(&ctx, &bob).await;

    let m1 = ctx
        .messaging
        .send_message(alice.id, text_to(bob.id, "one"))
        .await
        .expect("m1");
    ctx.messaging
        .send_message(alice.id, text_to(bob.id, "two"))
        .await
        .expect("m2");

    assert_eq!(ctx.messaging.unread_count(bob.id).await.expect("count"), 2);
    // the sender has nothing unread
    assert_eq!(ctx.messaging.unread_count(alice.id).await.expect("count"), 0);

    ctx.messaging
        .mark_read(m1.id, bob.id)
        .await
        .expect("mark read");
    assert_eq!(ctx.messaging.unread_count(bob.id).await.expect("count"), 1);
}

#[tokio::test]
async fn only_the_receiver_may_mark_read() {
    let ctx = test_context();
    let alice = a_user("Alice", Role::User, false);
    let bob = a_user("Bob", Role::User, false);
    let eve = a_user("Eve", Role::User, false);
    for u in [&alice, &bob, &eve] {
        seed_user(&ctx, u).await;
    }

    let message = ctx
        .messaging
        .send_message(alice.id, text_to(bob.id, "secret"))
        .await
        .expect("message");

    // the sender and a third party both get NotFound, not Forbidden:
    // message existence is not leaked
    for intruder in [alice.id, eve.id] {
        let err = ctx
            .messaging
            .mark_read(message.id, intruder)
            .await
            .expect_err("not the receiver");
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    assert_eq!(ctx.messaging.unread_count(bob.id).await.expect("count"), 1);
}

#[tokio::test]
async fn conversations_order_by_last_activity() {
    let ctx = test_context();
    let alice = a_user("Alice", Role::User, false);
    let bob = a_user("Bob", Role::User, false);
    let carol = a_user("Carol", Role::User, false);
    for u in [&alice, &bob, &carol] {
        seed_user(&ctx, u).await;
    }

    ctx.messaging
        .send_message(alice.id, text_to(bob.id, "first thread"))
        .await
        .expect("thread with bob");
    ctx.messaging
        .send_message(alice.id, text_to(carol.id, "second thread"))
        .await
        .expect("thread with carol");

    let conversations = ctx
        .messaging
        .list_conversations(alice.id, None, None)
        .await
        .expect("alice's conversations");
    assert_eq!(conversations.total, 2);
    assert_eq!(conversations.items[0].other_user_id, carol.id);

    // bob replies; his thread moves back to the top
    ctx.messaging
        .send_message(bob.id, text_to(alice.id, "pong"))
        .await
        .expect("bob reply");

    let conversations = ctx
        .messaging
        .list_conversations(alice.id, None, None)
        .await
        .expect("alice's conversations again");
    assert_eq!(conversations.items[0].other_user_id, bob.id);
    let preview = conversations.items[0]
        .last_message
        .as_ref()
        .expect("preview");
    assert_eq!(preview.content, "pong");
}
