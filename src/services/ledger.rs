use crate::{
    db::{self, DbPool},
    entities::{
        ingredient::{self, Entity as Ingredient},
        stock_transaction::{self, Entity as StockTransaction, StockAction},
        user::Entity as User,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    middleware_helpers::retry::{with_retry, ConflictRetryPolicy, RetryConfig},
};
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use super::recognition::IngredientRecognizer;
use super::{require_finite, require_text};

// Float sums of the ledger may differ from the stored value in the last bits
const DRIFT_TOLERANCE: f64 = 1e-9;

/// Fields for registering a new ingredient
#[derive(Debug, Clone)]
pub struct NewIngredient {
    pub name: String,
    pub quantity: f64,
    pub critical_quantity: f64,
    pub image_ref: Option<String>,
}

/// A purchase or consumption to apply to an ingredient by name
#[derive(Debug, Clone)]
pub struct StockMovement {
    pub name: String,
    pub action: StockAction,
    pub quantity: f64,
    pub actor: Option<i32>,
    pub image_ref: Option<String>,
}

/// Ledger row together with the ingredient state it produced
#[derive(Debug, Clone, Serialize)]
pub struct LedgerReceipt {
    pub transaction: stock_transaction::Model,
    pub ingredient: ingredient::Model,
    pub previous_quantity: f64,
}

/// Activity feed entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ActivityEntry {
    pub id: i32,
    pub ingredient_id: i32,
    pub ingredient_name: String,
    pub user_id: Option<i32>,
    #[schema(value_type = String, example = "purchase")]
    pub action: StockAction,
    pub quantity: f64,
    /// Positive for purchases, negative for consumption
    pub signed_quantity: f64,
    pub image_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Stored quantity compared against the sum of the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Reconciliation {
    pub ingredient_id: i32,
    pub name: String,
    pub stored_quantity: f64,
    pub derived_quantity: f64,
    /// `stored_quantity - derived_quantity`
    pub drift: f64,
    pub transaction_count: u64,
}

/// Result of one attempt inside the store transaction
struct Applied {
    receipt: LedgerReceipt,
    created: bool,
}

/// Sum of signed ledger quantities
pub fn derive_quantity<'a>(rows: impl IntoIterator<Item = &'a stock_transaction::Model>) -> f64 {
    rows.into_iter().map(|row| row.signed_quantity()).sum()
}

/// True when a write moves stock from above the threshold to at or below it
pub fn crosses_into_critical(previous: f64, current: f64, critical_quantity: f64) -> bool {
    !ingredient::is_critical(previous, critical_quantity)
        && ingredient::is_critical(current, critical_quantity)
}

/// Writes new stock for `current` if nobody else has since the read.
async fn write_stock<C: ConnectionTrait>(
    db: &C,
    current: &ingredient::Model,
    new_quantity: f64,
    now: DateTime<Utc>,
) -> Result<ingredient::Model, ServiceError> {
    let result = Ingredient::update_many()
        .col_expr(ingredient::Column::Quantity, Expr::value(new_quantity))
        .col_expr(ingredient::Column::Version, Expr::value(current.version + 1))
        .col_expr(ingredient::Column::UpdatedAt, Expr::value(now))
        .filter(ingredient::Column::Id.eq(current.id))
        .filter(ingredient::Column::Version.eq(current.version))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        counter!("household_ledger.version_conflicts", 1);
        return Err(ServiceError::Conflict(format!(
            "ingredient '{}' was modified concurrently",
            current.name
        )));
    }

    Ok(ingredient::Model {
        quantity: new_quantity,
        version: current.version + 1,
        updated_at: now,
        ..current.clone()
    })
}

async fn ensure_actor<C: ConnectionTrait>(db: &C, actor: Option<i32>) -> Result<(), ServiceError> {
    if let Some(user_id) = actor {
        User::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {} does not exist", user_id)))?;
    }
    Ok(())
}

async fn insert_entry<C: ConnectionTrait>(
    db: &C,
    ingredient_id: i32,
    movement: &StockMovement,
    now: DateTime<Utc>,
) -> Result<stock_transaction::Model, ServiceError> {
    let row = stock_transaction::ActiveModel {
        ingredient_id: Set(ingredient_id),
        user_id: Set(movement.actor),
        action: Set(movement.action),
        quantity: Set(movement.quantity),
        image_ref: Set(movement.image_ref.clone()),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(row)
}

/// One attempt at a stock movement: stock update and ledger row together.
async fn apply_movement<C: ConnectionTrait>(
    db: &C,
    movement: &StockMovement,
) -> Result<Applied, ServiceError> {
    ensure_actor(db, movement.actor).await?;
    let now = Utc::now();

    let existing = Ingredient::find()
        .filter(ingredient::Column::Name.eq(movement.name.as_str()))
        .one(db)
        .await?;

    let (current, created) = match (existing, movement.action) {
        (Some(found), _) => (found, false),
        (None, StockAction::Purchase) => {
            let fresh = ingredient::ActiveModel {
                name: Set(movement.name.clone()),
                quantity: Set(0.0),
                critical_quantity: Set(0.0),
                image_ref: Set(None),
                version: Set(1),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            (fresh, true)
        }
        (None, StockAction::Consume) => {
            return Err(ServiceError::NotFound(format!(
                "ingredient '{}' does not exist",
                movement.name
            )));
        }
    };

    let previous_quantity = current.quantity;
    let new_quantity = previous_quantity + movement.action.signed(movement.quantity);
    let updated = write_stock(db, &current, new_quantity, now).await?;
    let transaction = insert_entry(db, updated.id, movement, now).await?;

    Ok(Applied {
        receipt: LedgerReceipt {
            transaction,
            ingredient: updated,
            previous_quantity,
        },
        created,
    })
}

/// Kitchen stock and its append-only ledger
pub struct LedgerService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    recognizer: Arc<dyn IngredientRecognizer>,
    retry: RetryConfig,
}

impl LedgerService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        recognizer: Arc<dyn IngredientRecognizer>,
        max_attempts: u32,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            recognizer,
            retry: RetryConfig::with_max_attempts(max_attempts),
        }
    }

    /// Registers an ingredient. A positive opening quantity is logged as a
    /// purchase in the same store transaction.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_ingredient(
        &self,
        input: NewIngredient,
        actor: Option<i32>,
    ) -> Result<ingredient::Model, ServiceError> {
        let name = require_text("name", &input.name)?;
        let quantity = require_finite("quantity", input.quantity)?;
        let critical_quantity = require_finite("critical_quantity", input.critical_quantity)?;
        if quantity < 0.0 {
            return Err(ServiceError::ValidationError(
                "quantity must not be negative".to_string(),
            ));
        }
        let image_ref = input.image_ref.filter(|r| !r.trim().is_empty());

        let created = db::transaction(
            self.db_pool.as_ref(),
            "ledger.create_ingredient",
            move |txn| {
                Box::pin(async move {
                    ensure_actor(txn, actor).await?;
                    let now = Utc::now();

                    if Ingredient::find()
                        .filter(ingredient::Column::Name.eq(name.as_str()))
                        .one(txn)
                        .await?
                        .is_some()
                    {
                        return Err(ServiceError::Conflict(format!(
                            "ingredient '{}' already exists",
                            name
                        )));
                    }

                    let created = ingredient::ActiveModel {
                        name: Set(name.clone()),
                        quantity: Set(quantity),
                        critical_quantity: Set(critical_quantity),
                        image_ref: Set(image_ref.clone()),
                        version: Set(1),
                        created_at: Set(now),
                        updated_at: Set(now),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    if quantity > 0.0 {
                        let opening = StockMovement {
                            name,
                            action: StockAction::Purchase,
                            quantity,
                            actor,
                            image_ref,
                        };
                        insert_entry(txn, created.id, &opening, now).await?;
                    }

                    Ok(created)
                })
            },
        )
        .await?;

        info!(ingredient_id = created.id, quantity, "Ingredient created");
        counter!("household_ledger.ingredients_created", 1);
        self.event_sender.publish(Event::IngredientCreated {
            ingredient_id: created.id,
            name: created.name.clone(),
        });
        if created.is_critical() {
            self.warn_critical(&created);
        }

        Ok(created)
    }

    /// Applies a purchase or consumption and appends it to the ledger.
    ///
    /// A purchase of an unknown name creates the ingredient at zero stock.
    /// Consumption of an unknown name is `NotFound`. Stock is not clamped.
    #[instrument(skip(self, movement), fields(action = %movement.action, quantity = movement.quantity))]
    pub async fn record_transaction(
        &self,
        movement: StockMovement,
    ) -> Result<LedgerReceipt, ServiceError> {
        let quantity = require_finite("quantity", movement.quantity)?;
        if quantity <= 0.0 {
            return Err(ServiceError::ValidationError(
                "quantity must be greater than zero".to_string(),
            ));
        }
        let image_ref = movement.image_ref.filter(|r| !r.trim().is_empty());

        let mut name = movement.name;
        if let (StockAction::Consume, Some(image)) = (movement.action, image_ref.as_deref()) {
            if let Some(detected) = self.recognizer.recognize(image).await {
                info!(submitted = %name, detected = %detected, "Recognizer replaced ingredient name");
                name = detected;
            }
        }

        let movement = StockMovement {
            name: require_text("name", &name)?,
            action: movement.action,
            quantity,
            actor: movement.actor,
            image_ref,
        };

        let start = Instant::now();
        let applied = with_retry(&self.retry, ConflictRetryPolicy, || {
            let movement = movement.clone();
            async move {
                db::transaction(self.db_pool.as_ref(), "ledger.record_transaction", move |txn| {
                    Box::pin(async move { apply_movement(txn, &movement).await })
                })
                .await
            }
        })
        .await
        .map_err(|err| {
            if err.is_conflict() {
                warn!(name = %movement.name, "Giving up on ledger write after repeated conflicts");
            }
            err
        })?;
        histogram!("household_ledger.write_duration", start.elapsed());
        counter!(
            "household_ledger.transactions",
            1,
            "action" => movement.action.to_string()
        );

        let Applied { receipt, created } = applied;
        let ingredient = &receipt.ingredient;
        info!(
            ingredient_id = ingredient.id,
            transaction_id = receipt.transaction.id,
            new_quantity = ingredient.quantity,
            "Stock recorded"
        );

        if created {
            self.event_sender.publish(Event::IngredientCreated {
                ingredient_id: ingredient.id,
                name: ingredient.name.clone(),
            });
        }
        self.event_sender.publish(Event::StockRecorded {
            ingredient_id: ingredient.id,
            transaction_id: receipt.transaction.id,
            action: receipt.transaction.action.to_string(),
            quantity: receipt.transaction.quantity,
            new_quantity: ingredient.quantity,
            actor: receipt.transaction.user_id,
        });
        if crosses_into_critical(
            receipt.previous_quantity,
            ingredient.quantity,
            ingredient.critical_quantity,
        ) {
            self.warn_critical(ingredient);
        }

        Ok(receipt)
    }

    /// Changes the alert threshold of an ingredient
    #[instrument(skip(self))]
    pub async fn set_critical_quantity(
        &self,
        id: i32,
        critical_quantity: f64,
    ) -> Result<ingredient::Model, ServiceError> {
        let critical_quantity = require_finite("critical_quantity", critical_quantity)?;
        let existing = self.get_ingredient(id).await?;

        let mut active: ingredient::ActiveModel = existing.into();
        active.critical_quantity = Set(critical_quantity);
        active.updated_at = Set(Utc::now());
        let updated = active
            .update(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        info!(ingredient_id = id, critical_quantity, "Critical quantity updated");
        Ok(updated)
    }

    pub async fn get_ingredient(&self, id: i32) -> Result<ingredient::Model, ServiceError> {
        Ingredient::find_by_id(id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("ingredient {} does not exist", id)))
    }

    /// All ingredients ordered by name
    pub async fn list_ingredients(&self) -> Result<Vec<ingredient::Model>, ServiceError> {
        Ingredient::find()
            .order_by_asc(ingredient::Column::Name)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Ingredients at or below their critical quantity
    pub async fn list_critical(&self) -> Result<Vec<ingredient::Model>, ServiceError> {
        Ingredient::find()
            .filter(
                Expr::col(ingredient::Column::Quantity)
                    .lte(Expr::col(ingredient::Column::CriticalQuantity)),
            )
            .order_by_asc(ingredient::Column::Name)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Every ledger row, newest first. `limit` caps the count when given.
    pub async fn list_activity(
        &self,
        limit: Option<u64>,
    ) -> Result<Vec<ActivityEntry>, ServiceError> {
        let mut query = StockTransaction::find()
            .find_also_related(Ingredient)
            .order_by_desc(stock_transaction::Column::CreatedAt)
            .order_by_desc(stock_transaction::Column::Id);
        if let Some(limit) = limit {
            query = query.limit(limit.max(1));
        }

        let rows = query
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        Ok(rows
            .into_iter()
            .map(|(row, ingredient)| ActivityEntry {
                id: row.id,
                ingredient_id: row.ingredient_id,
                ingredient_name: ingredient.map(|i| i.name).unwrap_or_default(),
                user_id: row.user_id,
                action: row.action,
                quantity: row.quantity,
                signed_quantity: row.signed_quantity(),
                image_ref: row.image_ref,
                created_at: row.created_at,
            })
            .collect())
    }

    /// Compares the stored quantity with the quantity the ledger implies
    pub async fn reconcile(&self, ingredient_id: i32) -> Result<Reconciliation, ServiceError> {
        let ingredient = self.get_ingredient(ingredient_id).await?;
        let rows = StockTransaction::find()
            .filter(stock_transaction::Column::IngredientId.eq(ingredient_id))
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let derived_quantity = derive_quantity(&rows);
        let drift = ingredient.quantity - derived_quantity;
        if drift.abs() > DRIFT_TOLERANCE {
            warn!(ingredient_id, drift, "Stored quantity drifted from ledger");
        }

        Ok(Reconciliation {
            ingredient_id,
            name: ingredient.name,
            stored_quantity: ingredient.quantity,
            derived_quantity,
            drift,
            transaction_count: rows.len() as u64,
        })
    }

    fn warn_critical(&self, ingredient: &ingredient::Model) {
        warn!(
            ingredient_id = ingredient.id,
            name = %ingredient.name,
            quantity = ingredient.quantity,
            critical_quantity = ingredient.critical_quantity,
            "Ingredient at critical stock"
        );
        counter!("household_ledger.critical_reached", 1);
        self.event_sender.publish(Event::CriticalStockReached {
            ingredient_id: ingredient.id,
            name: ingredient.name.clone(),
            quantity: ingredient.quantity,
            critical_quantity: ingredient.critical_quantity,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::recognition::NoopRecognizer;
    use tempfile::TempDir;

    async fn ledger(dir: &TempDir) -> (LedgerService, Arc<DbPool>) {
        let url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("ledger.sqlite").display()
        );
        let pool = db::establish_connection_with_config(&db::DbConfig {
            url,
            max_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        db::run_migrations(&pool).await.unwrap();
        let pool = Arc::new(pool);
        let (sender, _rx) = EventSender::channel(16);
        let service = LedgerService::new(
            pool.clone(),
            Arc::new(sender),
            Arc::new(NoopRecognizer),
            3,
        );
        (service, pool)
    }

    fn purchase(name: &str, quantity: f64) -> StockMovement {
        StockMovement {
            name: name.into(),
            action: StockAction::Purchase,
            quantity,
            actor: None,
            image_ref: None,
        }
    }

    #[test]
    fn crossing_requires_leaving_the_ok_band() {
        assert!(crosses_into_critical(5.0, 2.0, 2.0));
        assert!(!crosses_into_critical(2.0, 1.0, 2.0));
        assert!(!crosses_into_critical(5.0, 3.0, 2.0));
    }

    #[tokio::test]
    async fn stale_version_is_a_conflict() {
        let dir = TempDir::new().unwrap();
        let (service, pool) = ledger(&dir).await;

        let receipt = service.record_transaction(purchase("Salt", 4.0)).await.unwrap();
        let stale = ingredient::Model {
            version: receipt.ingredient.version - 1,
            ..receipt.ingredient.clone()
        };

        let result = write_stock(pool.as_ref(), &stale, 99.0, Utc::now()).await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));

        let stored = service.get_ingredient(stale.id).await.unwrap();
        assert_eq!(stored.quantity, 4.0);
    }

    #[tokio::test]
    async fn non_positive_quantities_are_rejected() {
        let dir = TempDir::new().unwrap();
        let (service, _pool) = ledger(&dir).await;

        for quantity in [0.0, -1.0, f64::NAN] {
            let result = service.record_transaction(purchase("Salt", quantity)).await;
            assert!(matches!(result, Err(ServiceError::ValidationError(_))));
        }
    }
}
