use crate::{
    db::DbPool,
    entities::user::{self, Entity as User},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use tracing::{info, instrument};

use super::require_text;

/// Identity already verified by the external provider
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub email: String,
    pub name: Option<String>,
}

pub struct UserService {
    db_pool: Arc<DbPool>,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Finds the user by email, creating it on first login.
    #[instrument(skip(self, identity), fields(email = %identity.email))]
    pub async fn resolve_identity(
        &self,
        identity: ResolvedIdentity,
    ) -> Result<user::Model, ServiceError> {
        let email = require_text("email", &identity.email)?.to_lowercase();
        if !email.contains('@') {
            return Err(ServiceError::ValidationError(format!(
                "'{}' is not an email address",
                email
            )));
        }
        let name = identity
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        if let Some(existing) = self.find_by_email(&email).await? {
            return Ok(existing);
        }

        let created = user::ActiveModel {
            email: Set(email.clone()),
            name: Set(name),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(self.db_pool.as_ref())
        .await;

        match created {
            Ok(user) => {
                info!(user_id = user.id, "User created on first login");
                Ok(user)
            }
            // A concurrent first login inserted the same email
            Err(err) => match ServiceError::db_error(err) {
                ServiceError::Conflict(_) => self.find_by_email(&email).await?.ok_or_else(|| {
                    ServiceError::InternalError(format!("user {} vanished after conflict", email))
                }),
                other => Err(other),
            },
        }
    }

    pub async fn get_user(&self, id: i32) -> Result<user::Model, ServiceError> {
        User::find_by_id(id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("user {} does not exist", id)))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError> {
        User::find()
            .filter(user::Column::Email.eq(email))
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }
}
