use crate::{
    db::DbPool,
    entities::meter::{self, Entity as Meter, MeterKind},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use std::sync::Arc;
use tracing::{info, instrument};

use super::require_text;

/// Fields supplied when registering or editing a meter
#[derive(Debug, Clone)]
pub struct MeterInput {
    pub nickname: String,
    pub kind: MeterKind,
    pub tenant: String,
}

impl MeterInput {
    fn normalized(self) -> Result<Self, ServiceError> {
        Ok(Self {
            nickname: require_text("nickname", &self.nickname)?,
            kind: self.kind,
            tenant: require_text("tenant", &self.tenant)?,
        })
    }
}

/// Registry of utility meters. Meters are never deleted.
pub struct MeterService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl MeterService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn create_meter(&self, input: MeterInput) -> Result<meter::Model, ServiceError> {
        let input = input.normalized()?;
        let now = Utc::now();

        let created = meter::ActiveModel {
            nickname: Set(input.nickname),
            kind: Set(input.kind),
            tenant: Set(input.tenant),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self.db_pool.as_ref())
        .await
        .map_err(ServiceError::db_error)?;

        info!(meter_id = created.id, kind = %created.kind, "Meter registered");
        self.event_sender.publish(Event::MeterRegistered {
            meter_id: created.id,
            kind: created.kind.to_string(),
            tenant: created.tenant.clone(),
        });

        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn update_meter(
        &self,
        id: i32,
        input: MeterInput,
    ) -> Result<meter::Model, ServiceError> {
        let input = input.normalized()?;
        let existing = self.get_meter(id).await?;

        let mut active: meter::ActiveModel = existing.into();
        active.nickname = Set(input.nickname);
        active.kind = Set(input.kind);
        active.tenant = Set(input.tenant);
        active.updated_at = Set(Utc::now());

        let updated = active
            .update(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        info!(meter_id = updated.id, "Meter updated");
        Ok(updated)
    }

    pub async fn get_meter(&self, id: i32) -> Result<meter::Model, ServiceError> {
        Meter::find_by_id(id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("meter {} does not exist", id)))
    }

    /// All meters, optionally of one kind, ordered by id
    pub async fn list_meters(
        &self,
        kind: Option<MeterKind>,
    ) -> Result<Vec<meter::Model>, ServiceError> {
        let mut query = Meter::find();
        if let Some(kind) = kind {
            query = query.filter(meter::Column::Kind.eq(kind));
        }

        query
            .order_by_asc(meter::Column::Id)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }
}
