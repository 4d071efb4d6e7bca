use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::MarketplaceConfig;
use crate::contract::{
    Conversation, ConversationSummary, Message, NewMessage, Page, PageRequest,
};
use crate::domain::error::DomainError;
use crate::domain::events::{MarketEvent, Notifier};
use crate::domain::repo::{ListingsRepository, MessagesRepository, UsersRepository};

/// Direct messaging between two users, threaded through a lazily created
/// pair conversation.
#[derive(Clone)]
pub struct MessagingService {
    messages: Arc<dyn MessagesRepository>,
    users: Arc<dyn UsersRepository>,
    listings: Arc<dyn ListingsRepository>,
    notifier: Arc<dyn Notifier>,
    config: MarketplaceConfig,
}

impl MessagingService {
    pub fn new(
        messages: Arc<dyn MessagesRepository>,
        users: Arc<dyn UsersRepository>,
        listings: Arc<dyn ListingsRepository>,
        notifier: Arc<dyn Notifier>,
        config: MarketplaceConfig,
    ) -> Self {
        Self {
            messages,
            users,
            listings,
            notifier,
            config,
        }
    }

    /// Send a message, creating the pair conversation on first contact.
    #[instrument(
        name = "marketplace.messages.send",
        skip(self, new_message),
        fields(sender_id = %sender_id, receiver_id = %new_message.receiver_id)
    )]
    pub async fn send_message(
        &self,
        sender_id: Uuid,
        new_message: NewMessage,
    ) -> Result<Message, DomainError> {
        info!("Sending message");

        if new_message.receiver_id == sender_id {
            return Err(DomainError::validation(
                "receiver_id",
                "cannot message yourself",
            ));
        }
        if new_message.content.trim().is_empty() {
            return Err(DomainError::validation("content", "must not be empty"));
        }
        if new_message.content.len() > self.config.max_message_length {
            return Err(DomainError::validation("content", "too long"));
        }

        self.users
            .find_by_id(new_message.receiver_id)
            .await?
            .ok_or_else(|| DomainError::user_not_found(new_message.receiver_id))?;

        if let Some(listing_id) = new_message.listing_id {
            self.listings
                .find_by_id(listing_id)
                .await?
                .ok_or_else(|| DomainError::listing_not_found(listing_id))?;
        }

        let conversation = self
            .find_or_create_conversation(sender_id, new_message.receiver_id)
            .await?;

        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: conversation.id,
            sender_id,
            receiver_id: new_message.receiver_id,
            listing_id: new_message.listing_id,
            content: new_message.content,
            read: false,
            created_at: Utc::now(),
        };

        // also bumps the conversation's last_message_at
        self.messages.insert_message(message.clone()).await?;

        self.notifier.notify(
            message.receiver_id,
            &MarketEvent::MessageReceived {
                message_id: message.id,
                conversation_id: message.conversation_id,
                sender_id,
                at: message.created_at,
            },
        );

        info!("Message {} sent", message.id);
        Ok(message)
    }

    /// The thread between the caller and another user, newest first.
    #[instrument(name = "marketplace.messages.thread", skip(self), fields(user_id = %user_id, other = %other_user_id))]
    pub async fn conversation_with(
        &self,
        user_id: Uuid,
        other_user_id: Uuid,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Result<Page<Message>, DomainError> {
        debug!("Fetching conversation thread");

        let request = PageRequest::clamped(
            page,
            limit,
            self.config.default_page_size,
            self.config.max_page_size,
        );
        Ok(self
            .messages
            .list_between(user_id, other_user_id, request)
            .await?)
    }

    /// All the caller's conversations, most recently active first.
    #[instrument(name = "marketplace.messages.conversations", skip(self), fields(user_id = %user_id))]
    pub async fn list_conversations(
        &self,
        user_id: Uuid,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Result<Page<ConversationSummary>, DomainError> {
        let request = PageRequest::clamped(
            page,
            limit,
            self.config.default_page_size,
            self.config.max_page_size,
        );
        Ok(self.messages.list_conversations(user_id, request).await?)
    }

    /// Mark a received message as read. Only the receiver may; anyone
    /// else gets NotFound so existence is not leaked.
    #[instrument(name = "marketplace.messages.mark_read", skip(self), fields(message_id = %message_id))]
    pub async fn mark_read(&self, message_id: Uuid, user_id: Uuid) -> Result<(), DomainError> {
        let message = self
            .messages
            .find_message(message_id)
            .await?
            .filter(|m| m.receiver_id == user_id)
            .ok_or_else(|| DomainError::message_not_found(message_id))?;

        self.messages.mark_read(message.id).await?;
        Ok(())
    }

    #[instrument(name = "marketplace.messages.unread", skip(self), fields(user_id = %user_id))]
    pub async fn unread_count(&self, user_id: Uuid) -> Result<u64, DomainError> {
        Ok(self.messages.unread_count(user_id).await?)
    }

    async fn find_or_create_conversation(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
    ) -> Result<Conversation, DomainError> {
        if let Some(existing) = self
            .messages
            .find_conversation_for_pair(sender_id, receiver_id)
            .await?
        {
            return Ok(existing);
        }

        let (user_a, user_b) = Conversation::normalize_pair(sender_id, receiver_id);
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_a,
            user_b,
            last_message_at: now,
            created_at: now,
        };
        self.messages
            .insert_conversation(conversation.clone())
            .await?;

        debug!("Created conversation {}", conversation.id);
        Ok(conversation)
    }
}
