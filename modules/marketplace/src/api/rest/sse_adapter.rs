use uuid::Uuid;

use crate::api::rest::dto::NotificationDto;
use crate::api::rest::sse::SseBroadcaster;
use crate::domain::events::{MarketEvent, Notifier};

/// Fans domain events into the SSE broadcast bus.
///
/// `notify` runs on the request path after commit, so it only does a
/// non-blocking channel send; delivery is best-effort by construction.
#[derive(Clone)]
pub struct SseNotifier {
    broadcaster: SseBroadcaster<NotificationDto>,
}

impl SseNotifier {
    pub fn new(broadcaster: SseBroadcaster<NotificationDto>) -> Self {
        Self { broadcaster }
    }
}

impl Notifier for SseNotifier {
    fn notify(&self, user_id: Uuid, event: &MarketEvent) {
        self.broadcaster
            .send(NotificationDto::from_event(user_id, event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use futures::StreamExt;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn adapter_publishes_domain_events() {
        let broadcaster = SseBroadcaster::<NotificationDto>::new(8);
        let adapter = SseNotifier::new(broadcaster.clone());
        let mut stream = Box::pin(broadcaster.subscribe_stream());

        let user = Uuid::new_v4();
        adapter.notify(
            user,
            &MarketEvent::OfferCompleted {
                offer_id: Uuid::new_v4(),
                listing_id: Uuid::new_v4(),
                at: Utc::now(),
            },
        );

        let received = timeout(Duration::from_millis(100), stream.next())
            .await
            .expect("timeout")
            .expect("event received");
        assert_eq!(received.kind, "offer.completed");
        assert_eq!(received.user_id, user);
    }

    #[tokio::test]
    async fn notify_without_subscribers_is_a_no_op() {
        let broadcaster = SseBroadcaster::<NotificationDto>::new(8);
        let adapter = SseNotifier::new(broadcaster);
        adapter.notify(
            Uuid::new_v4(),
            &MarketEvent::MessageReceived {
                message_id: Uuid::new_v4(),
                conversation_id: Uuid::new_v4(),
                sender_id: Uuid::new_v4(),
                at: Utc::now(),
            },
        );
    }
}
