//! sea-orm-backed implementation of the storage ports.
//!
//! The multi-row offer transitions run inside one explicit transaction and
//! use guarded updates (`WHERE id = ? AND status = ?`, checked via
//! `rows_affected`) so a concurrent writer that got there first turns the
//! second caller into [`TxError::StateChanged`] instead of a double win.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::contract::{
    Conversation, ConversationSummary, Listing, ListingFilter, ListingStatus, Message, Offer,
    OfferRole, OfferStatus, Page, PageRequest, ProfilePatch, User,
};
use crate::domain::repo::{
    ListingsRepository, MessagesRepository, OffersRepository, TxError, UsersRepository,
};
use crate::infra::storage::entity::{conversations, listings, messages, offers, users};
use crate::infra::storage::mapper;

/// One store serving all four ports against a shared connection pool.
#[derive(Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Classify a database error for the retry decision: transient conflicts
/// (deadlock, serialization failure, busy sqlite) are retryable.
fn classify(e: DbErr) -> TxError {
    let msg = e.to_string().to_ascii_lowercase();
    if msg.contains("deadlock")
        || msg.contains("serialization")
        || msg.contains("database is locked")
        || msg.contains("busy")
    {
        TxError::Conflict
    } else {
        TxError::Other(anyhow::Error::new(e))
    }
}

async fn load_offer<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<Option<Offer>, TxError> {
    let found = offers::Entity::find_by_id(id)
        .one(conn)
        .await
        .map_err(classify)?;
    found
        .map(mapper::offer_to_contract)
        .transpose()
        .map_err(TxError::Other)
}

#[async_trait]
impl UsersRepository for SeaOrmStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let found = users::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("user find_by_id failed")?;
        found.map(mapper::user_to_contract).transpose()
    }

    async fn insert(&self, u: User) -> anyhow::Result<()> {
        let m = users::ActiveModel {
            id: Set(u.id),
            email: Set(u.email),
            display_name: Set(u.display_name),
            role: Set(u.role.as_str().to_string()),
            is_vendor: Set(u.is_vendor),
            points: Set(u.points),
            email_verified: Set(u.email_verified),
            phone_verified: Set(u.phone_verified),
            kyc_verified: Set(u.kyc_verified),
            created_at: Set(u.created_at),
        };
        let _ = m.insert(&self.db).await.context("user insert failed")?;
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> anyhow::Result<bool> {
        if patch.display_name.is_none() && patch.email.is_none() {
            return Ok(UsersRepository::find_by_id(self, id).await?.is_some());
        }

        let mut m = users::ActiveModel {
            id: Set(id),
            ..Default::default()
        };
        if let Some(display_name) = patch.display_name {
            m.display_name = Set(display_name);
        }
        if let Some(email) = patch.email {
            m.email = Set(email);
        }
        match m.update(&self.db).await {
            Ok(_) => Ok(true),
            Err(DbErr::RecordNotUpdated) => Ok(false),
            Err(e) => Err(e).context("user update failed"),
        }
    }

    async fn increment_points(&self, id: Uuid, delta: i64) -> anyhow::Result<Option<i64>> {
        let res = users::Entity::update_many()
            .col_expr(
                users::Column::Points,
                Expr::col(users::Column::Points).add(delta),
            )
            .filter(users::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .context("points increment failed")?;
        if res.rows_affected == 0 {
            return Ok(None);
        }

        let user = UsersRepository::find_by_id(self, id).await?;
        Ok(user.map(|u| u.points))
    }

    async fn listing_count(&self, owner_id: Uuid) -> anyhow::Result<u64> {
        listings::Entity::find()
            .filter(listings::Column::OwnerId.eq(owner_id))
            .count(&self.db)
            .await
            .context("listing count failed")
    }
}

#[async_trait]
impl ListingsRepository for SeaOrmStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Listing>> {
        let found = listings::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("listing find_by_id failed")?;
        found.map(mapper::listing_to_contract).transpose()
    }

    async fn insert(&self, l: Listing) -> anyhow::Result<()> {
        let m = listings::ActiveModel {
            id: Set(l.id),
            owner_id: Set(l.owner_id),
            title: Set(l.title),
            description: Set(l.description),
            price: Set(l.price),
            currency: Set(l.currency),
            status: Set(l.status.as_str().to_string()),
            location: Set(l.location),
            created_at: Set(l.created_at),
            updated_at: Set(l.updated_at),
        };
        let _ = m.insert(&self.db).await.context("listing insert failed")?;
        Ok(())
    }

    async fn update(&self, l: Listing) -> anyhow::Result<()> {
        let m = listings::ActiveModel {
            id: Set(l.id),
            owner_id: Set(l.owner_id),
            title: Set(l.title),
            description: Set(l.description),
            price: Set(l.price),
            currency: Set(l.currency),
            status: Set(l.status.as_str().to_string()),
            location: Set(l.location),
            created_at: Set(l.created_at),
            updated_at: Set(l.updated_at),
        };
        let _ = m.update(&self.db).await.context("listing update failed")?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = listings::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .context("listing delete failed")?;
        Ok(res.rows_affected > 0)
    }

    async fn list_active(
        &self,
        filter: &ListingFilter,
        page: PageRequest,
    ) -> anyhow::Result<Page<Listing>> {
        let mut query = listings::Entity::find()
            .filter(listings::Column::Status.eq(ListingStatus::Active.as_str()));

        if let Some(ref search) = filter.search {
            query = query.filter(
                Condition::any()
                    .add(listings::Column::Title.contains(search))
                    .add(listings::Column::Description.contains(search)),
            );
        }
        if let Some(min) = filter.min_price {
            query = query.filter(listings::Column::Price.gte(min));
        }
        if let Some(max) = filter.max_price {
            query = query.filter(listings::Column::Price.lte(max));
        }

        let total = query
            .clone()
            .count(&self.db)
            .await
            .context("listing browse count failed")?;
        let rows = query
            .order_by_desc(listings::Column::CreatedAt)
            .offset(page.offset())
            .limit(page.limit)
            .all(&self.db)
            .await
            .context("listing browse failed")?;
        let items = rows
            .into_iter()
            .map(mapper::listing_to_contract)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Page::new(items, total, page))
    }

    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        page: PageRequest,
    ) -> anyhow::Result<Page<Listing>> {
        let query = listings::Entity::find().filter(listings::Column::OwnerId.eq(owner_id));

        let total = query
            .clone()
            .count(&self.db)
            .await
            .context("own listing count failed")?;
        let rows = query
            .order_by_desc(listings::Column::CreatedAt)
            .offset(page.offset())
            .limit(page.limit)
            .all(&self.db)
            .await
            .context("own listing query failed")?;
        let items = rows
            .into_iter()
            .map(mapper::listing_to_contract)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Page::new(items, total, page))
    }
}

#[async_trait]
impl OffersRepository for SeaOrmStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Offer>> {
        let found = offers::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("offer find_by_id failed")?;
        found.map(mapper::offer_to_contract).transpose()
    }

    async fn pending_exists(&self, listing_id: Uuid, buyer_id: Uuid) -> anyhow::Result<bool> {
        let count = offers::Entity::find()
            .filter(offers::Column::ListingId.eq(listing_id))
            .filter(offers::Column::BuyerId.eq(buyer_id))
            .filter(offers::Column::Status.eq(OfferStatus::Pending.as_str()))
            .count(&self.db)
            .await
            .context("pending offer probe failed")?;
        Ok(count > 0)
    }

    async fn insert(&self, o: Offer) -> anyhow::Result<()> {
        let m = offers::ActiveModel {
            id: Set(o.id),
            listing_id: Set(o.listing_id),
            buyer_id: Set(o.buyer_id),
            seller_id: Set(o.seller_id),
            price: Set(o.price),
            message: Set(o.message),
            status: Set(o.status.as_str().to_string()),
            created_at: Set(o.created_at),
            updated_at: Set(o.updated_at),
        };
        let _ = m.insert(&self.db).await.context("offer insert failed")?;
        Ok(())
    }

    async fn accept_and_reject_siblings(&self, offer_id: Uuid) -> Result<Offer, TxError> {
        let now = Utc::now();
        let txn = self.db.begin().await.map_err(classify)?;

        let offer = load_offer(&txn, offer_id)
            .await?
            .ok_or_else(|| TxError::Other(anyhow!("offer {offer_id} disappeared")))?;

        // guarded CAS: only the first accept for this listing can win
        let res = offers::Entity::update_many()
            .col_expr(
                offers::Column::Status,
                Expr::value(OfferStatus::Accepted.as_str()),
            )
            .col_expr(offers::Column::UpdatedAt, Expr::value(now))
            .filter(offers::Column::Id.eq(offer_id))
            .filter(offers::Column::Status.eq(OfferStatus::Pending.as_str()))
            .exec(&txn)
            .await
            .map_err(classify)?;
        if res.rows_affected == 0 {
            let _ = txn.rollback().await;
            return Err(TxError::StateChanged);
        }

        let _ = offers::Entity::update_many()
            .col_expr(
                offers::Column::Status,
                Expr::value(OfferStatus::Rejected.as_str()),
            )
            .col_expr(offers::Column::UpdatedAt, Expr::value(now))
            .filter(offers::Column::ListingId.eq(offer.listing_id))
            .filter(offers::Column::Id.ne(offer_id))
            .filter(offers::Column::Status.eq(OfferStatus::Pending.as_str()))
            .exec(&txn)
            .await
            .map_err(classify)?;

        txn.commit().await.map_err(classify)?;

        Ok(Offer {
            status: OfferStatus::Accepted,
            updated_at: now,
            ..offer
        })
    }

    async fn reject(&self, offer_id: Uuid) -> Result<Offer, TxError> {
        let now = Utc::now();

        let offer = load_offer(&self.db, offer_id)
            .await?
            .ok_or_else(|| TxError::Other(anyhow!("offer {offer_id} disappeared")))?;

        let res = offers::Entity::update_many()
            .col_expr(
                offers::Column::Status,
                Expr::value(OfferStatus::Rejected.as_str()),
            )
            .col_expr(offers::Column::UpdatedAt, Expr::value(now))
            .filter(offers::Column::Id.eq(offer_id))
            .filter(offers::Column::Status.eq(OfferStatus::Pending.as_str()))
            .exec(&self.db)
            .await
            .map_err(classify)?;
        if res.rows_affected == 0 {
            return Err(TxError::StateChanged);
        }

        Ok(Offer {
            status: OfferStatus::Rejected,
            updated_at: now,
            ..offer
        })
    }

    async fn complete_and_mark_sold(&self, offer_id: Uuid) -> Result<Offer, TxError> {
        let now = Utc::now();
        let txn = self.db.begin().await.map_err(classify)?;

        let offer = load_offer(&txn, offer_id)
            .await?
            .ok_or_else(|| TxError::Other(anyhow!("offer {offer_id} disappeared")))?;

        let res = offers::Entity::update_many()
            .col_expr(
                offers::Column::Status,
                Expr::value(OfferStatus::Completed.as_str()),
            )
            .col_expr(offers::Column::UpdatedAt, Expr::value(now))
            .filter(offers::Column::Id.eq(offer_id))
            .filter(offers::Column::Status.eq(OfferStatus::Accepted.as_str()))
            .exec(&txn)
            .await
            .map_err(classify)?;
        if res.rows_affected == 0 {
            let _ = txn.rollback().await;
            return Err(TxError::StateChanged);
        }

        let _ = listings::Entity::update_many()
            .col_expr(
                listings::Column::Status,
                Expr::value(ListingStatus::Sold.as_str()),
            )
            .col_expr(listings::Column::UpdatedAt, Expr::value(now))
            .filter(listings::Column::Id.eq(offer.listing_id))
            .exec(&txn)
            .await
            .map_err(classify)?;

        txn.commit().await.map_err(classify)?;

        Ok(Offer {
            status: OfferStatus::Completed,
            updated_at: now,
            ..offer
        })
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        role: OfferRole,
        status: Option<OfferStatus>,
        page: PageRequest,
    ) -> anyhow::Result<Page<Offer>> {
        let role_condition = match role {
            OfferRole::Buyer => Condition::all().add(offers::Column::BuyerId.eq(user_id)),
            OfferRole::Seller => Condition::all().add(offers::Column::SellerId.eq(user_id)),
            OfferRole::Either => Condition::any()
                .add(offers::Column::BuyerId.eq(user_id))
                .add(offers::Column::SellerId.eq(user_id)),
        };

        let mut query = offers::Entity::find().filter(role_condition);
        if let Some(status) = status {
            query = query.filter(offers::Column::Status.eq(status.as_str()));
        }

        let total = query
            .clone()
            .count(&self.db)
            .await
            .context("offer count failed")?;
        let rows = query
            .order_by_desc(offers::Column::CreatedAt)
            .offset(page.offset())
            .limit(page.limit)
            .all(&self.db)
            .await
            .context("offer query failed")?;
        let items = rows
            .into_iter()
            .map(mapper::offer_to_contract)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Page::new(items, total, page))
    }
}

#[async_trait]
impl MessagesRepository for SeaOrmStore {
    async fn find_conversation_for_pair(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> anyhow::Result<Option<Conversation>> {
        let (a, b) = Conversation::normalize_pair(user_a, user_b);
        let found = conversations::Entity::find()
            .filter(conversations::Column::UserA.eq(a))
            .filter(conversations::Column::UserB.eq(b))
            .one(&self.db)
            .await
            .context("conversation lookup failed")?;
        Ok(found.map(mapper::conversation_to_contract))
    }

    async fn insert_conversation(&self, c: Conversation) -> anyhow::Result<()> {
        let m = conversations::ActiveModel {
            id: Set(c.id),
            user_a: Set(c.user_a),
            user_b: Set(c.user_b),
            last_message_at: Set(c.last_message_at),
            created_at: Set(c.created_at),
        };
        let _ = m
            .insert(&self.db)
            .await
            .context("conversation insert failed")?;
        Ok(())
    }

    async fn insert_message(&self, msg: Message) -> anyhow::Result<()> {
        let txn = self.db.begin().await.context("begin failed")?;

        let m = messages::ActiveModel {
            id: Set(msg.id),
            conversation_id: Set(msg.conversation_id),
            sender_id: Set(msg.sender_id),
            receiver_id: Set(msg.receiver_id),
            listing_id: Set(msg.listing_id),
            content: Set(msg.content),
            read: Set(msg.read),
            created_at: Set(msg.created_at),
        };
        let _ = m.insert(&txn).await.context("message insert failed")?;

        let _ = conversations::Entity::update_many()
            .col_expr(
                conversations::Column::LastMessageAt,
                Expr::value(msg.created_at),
            )
            .filter(conversations::Column::Id.eq(msg.conversation_id))
            .exec(&txn)
            .await
            .context("conversation bump failed")?;

        txn.commit().await.context("commit failed")?;
        Ok(())
    }

    async fn find_message(&self, id: Uuid) -> anyhow::Result<Option<Message>> {
        let found = messages::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("message find_by_id failed")?;
        Ok(found.map(mapper::message_to_contract))
    }

    async fn mark_read(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = messages::Entity::update_many()
            .col_expr(messages::Column::Read, Expr::value(true))
            .filter(messages::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .context("mark read failed")?;
        Ok(res.rows_affected > 0)
    }

    async fn unread_count(&self, receiver_id: Uuid) -> anyhow::Result<u64> {
        messages::Entity::find()
            .filter(messages::Column::ReceiverId.eq(receiver_id))
            .filter(messages::Column::Read.eq(false))
            .count(&self.db)
            .await
            .context("unread count failed")
    }

    async fn list_between(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        page: PageRequest,
    ) -> anyhow::Result<Page<Message>> {
        let condition = Condition::any()
            .add(
                Condition::all()
                    .add(messages::Column::SenderId.eq(user_a))
                    .add(messages::Column::ReceiverId.eq(user_b)),
            )
            .add(
                Condition::all()
                    .add(messages::Column::SenderId.eq(user_b))
                    .add(messages::Column::ReceiverId.eq(user_a)),
            );

        let query = messages::Entity::find().filter(condition);
        let total = query
            .clone()
            .count(&self.db)
            .await
            .context("thread count failed")?;
        let rows = query
            .order_by_desc(messages::Column::CreatedAt)
            .offset(page.offset())
            .limit(page.limit)
            .all(&self.db)
            .await
            .context("thread query failed")?;
        let items = rows.into_iter().map(mapper::message_to_contract).collect();
        Ok(Page::new(items, total, page))
    }

    async fn list_conversations(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> anyhow::Result<Page<ConversationSummary>> {
        let condition = Condition::any()
            .add(conversations::Column::UserA.eq(user_id))
            .add(conversations::Column::UserB.eq(user_id));

        let query = conversations::Entity::find().filter(condition);
        let total = query
            .clone()
            .count(&self.db)
            .await
            .context("conversation count failed")?;
        let rows = query
            .order_by_desc(conversations::Column::LastMessageAt)
            .offset(page.offset())
            .limit(page.limit)
            .all(&self.db)
            .await
            .context("conversation query failed")?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let conversation = mapper::conversation_to_contract(row);
            let last_message = messages::Entity::find()
                .filter(messages::Column::ConversationId.eq(conversation.id))
                .order_by_desc(messages::Column::CreatedAt)
                .one(&self.db)
                .await
                .context("last message query failed")?
                .map(mapper::message_to_contract);
            items.push(ConversationSummary {
                other_user_id: conversation.other_participant(user_id),
                last_message,
                conversation,
            });
        }
        Ok(Page::new(items, total, page))
    }
}
