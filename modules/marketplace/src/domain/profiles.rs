use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::contract::{Profile, ProfilePatch, Role};
use crate::domain::error::DomainError;
use crate::domain::repo::UsersRepository;

/// Public profiles plus the points/rewards balance.
#[derive(Clone)]
pub struct ProfileService {
    users: Arc<dyn UsersRepository>,
}

impl ProfileService {
    pub fn new(users: Arc<dyn UsersRepository>) -> Self {
        Self { users }
    }

    /// Public projection of a user.
    #[instrument(name = "marketplace.profiles.get", skip(self), fields(user_id = %user_id))]
    pub async fn get_profile(&self, user_id: Uuid) -> Result<Profile, DomainError> {
        debug!("Fetching profile");

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::user_not_found(user_id))?;
        let listing_count = self.users.listing_count(user_id).await?;

        Ok(Profile {
            id: user.id,
            display_name: user.display_name,
            is_vendor: user.is_vendor,
            email_verified: user.email_verified,
            phone_verified: user.phone_verified,
            kyc_verified: user.kyc_verified,
            listing_count,
            member_since: user.created_at,
        })
    }

    /// Self-service profile edit.
    #[instrument(name = "marketplace.profiles.update", skip(self, patch), fields(user_id = %acting_user))]
    pub async fn update_profile(
        &self,
        acting_user: Uuid,
        patch: ProfilePatch,
    ) -> Result<Profile, DomainError> {
        info!("Updating profile");

        if let Some(ref display_name) = patch.display_name {
            if display_name.trim().is_empty() {
                return Err(DomainError::validation("display_name", "must not be empty"));
            }
            if display_name.len() > 100 {
                return Err(DomainError::validation("display_name", "too long (max 100)"));
            }
        }
        if let Some(ref email) = patch.email {
            if email.is_empty() || !email.contains('@') || !email.contains('.') {
                return Err(DomainError::validation("email", "invalid email address"));
            }
        }

        let updated = self.users.update_profile(acting_user, patch).await?;
        if !updated {
            return Err(DomainError::user_not_found(acting_user));
        }

        self.get_profile(acting_user).await
    }

    /// Current points balance.
    #[instrument(name = "marketplace.points.get", skip(self), fields(user_id = %user_id))]
    pub async fn points_of(&self, user_id: Uuid) -> Result<i64, DomainError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::user_not_found(user_id))?;
        Ok(user.points)
    }

    /// Admin-only: add (or subtract) points and return the new balance.
    #[instrument(
        name = "marketplace.points.award",
        skip(self),
        fields(user_id = %user_id, points = points)
    )]
    pub async fn award_points(
        &self,
        acting_role: Role,
        user_id: Uuid,
        points: i64,
        reason: Option<String>,
    ) -> Result<i64, DomainError> {
        if acting_role != Role::Admin {
            return Err(DomainError::forbidden("only admins can award points"));
        }

        let balance = self
            .users
            .increment_points(user_id, points)
            .await?
            .ok_or_else(|| DomainError::user_not_found(user_id))?;

        info!(
            "Awarded {} points to {} ({}), balance now {}",
            points,
            user_id,
            reason.as_deref().unwrap_or("no reason given"),
            balance
        );
        Ok(balance)
    }
}
