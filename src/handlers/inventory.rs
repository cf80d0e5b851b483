use crate::{
    entities::{
        ingredient::{self, StockStatus},
        stock_transaction::StockAction,
    },
    errors::ServiceError,
    handlers::common::{created_response, success_response, validate_input, Actor},
    services::ledger::{ActivityEntry, NewIngredient, Reconciliation, StockMovement},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Ingredient as shown to clients
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IngredientView {
    pub id: i32,
    pub name: String,
    pub quantity: f64,
    pub critical_quantity: f64,
    pub status: StockStatus,
    pub image_ref: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<ingredient::Model> for IngredientView {
    fn from(model: ingredient::Model) -> Self {
        Self {
            status: model.status(),
            id: model.id,
            name: model.name,
            quantity: model.quantity,
            critical_quantity: model.critical_quantity,
            image_ref: model.image_ref,
            updated_at: model.updated_at,
        }
    }
}

/// Outcome of a purchase or consumption
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StockReceiptView {
    pub transaction_id: i32,
    pub action: StockAction,
    pub quantity: f64,
    pub previous_quantity: f64,
    pub ingredient: IngredientView,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateIngredientRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub critical_quantity: f64,
    /// Reference returned by the upload endpoint
    pub image_ref: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct StockRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub quantity: f64,
    /// Reference returned by the upload endpoint
    pub image_ref: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CriticalQuantityRequest {
    pub critical_quantity: f64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ActivityQuery {
    /// Maximum entries, newest first. All entries when absent.
    pub limit: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/ingredients",
    responses((status = 200, description = "Ingredients ordered by name", body = [IngredientView])),
    tag = "inventory"
)]
pub async fn list_ingredients(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let items: Vec<IngredientView> = state
        .services
        .ledger
        .list_ingredients()
        .await?
        .into_iter()
        .map(IngredientView::from)
        .collect();
    Ok(success_response(items))
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/ingredients",
    request_body = CreateIngredientRequest,
    responses(
        (status = 201, description = "Ingredient created", body = IngredientView),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 401, description = "Login required", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already taken", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn create_ingredient(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreateIngredientRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let actor = actor.require(state.config.inventory_require_login)?;
    validate_input(&payload)?;

    let created = state
        .services
        .ledger
        .create_ingredient(
            NewIngredient {
                name: payload.name,
                quantity: payload.quantity,
                critical_quantity: payload.critical_quantity,
                image_ref: payload.image_ref,
            },
            actor,
        )
        .await?;
    Ok(created_response(IngredientView::from(created)))
}

#[utoipa::path(
    put,
    path = "/api/v1/inventory/ingredients/{id}/critical",
    params(("id" = i32, Path, description = "Ingredient id")),
    request_body = CriticalQuantityRequest,
    responses(
        (status = 200, description = "Threshold updated", body = IngredientView),
        (status = 401, description = "Login required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Ingredient not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn set_critical_quantity(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
    Json(payload): Json<CriticalQuantityRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    actor.require(state.config.inventory_require_login)?;
    let updated = state
        .services
        .ledger
        .set_critical_quantity(id, payload.critical_quantity)
        .await?;
    Ok(success_response(IngredientView::from(updated)))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/ingredients/{id}/reconciliation",
    params(("id" = i32, Path, description = "Ingredient id")),
    responses(
        (status = 200, description = "Stored versus ledger-derived quantity", body = Reconciliation),
        (status = 404, description = "Ingredient not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn reconcile_ingredient(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let report = state.services.ledger.reconcile(id).await?;
    Ok(success_response(report))
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/purchases",
    request_body = StockRequest,
    responses(
        (status = 201, description = "Purchase recorded", body = StockReceiptView),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
        (status = 401, description = "Login required", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent writes kept conflicting", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn record_purchase(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<StockRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    record_stock(state, actor, StockAction::Purchase, payload).await
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/consumptions",
    request_body = StockRequest,
    responses(
        (status = 201, description = "Consumption recorded", body = StockReceiptView),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
        (status = 401, description = "Login required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Ingredient not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent writes kept conflicting", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn record_consumption(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<StockRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    record_stock(state, actor, StockAction::Consume, payload).await
}

async fn record_stock(
    state: AppState,
    actor: Actor,
    action: StockAction,
    payload: StockRequest,
) -> Result<axum::response::Response, ServiceError> {
    let actor = actor.require(state.config.inventory_require_login)?;
    validate_input(&payload)?;

    let receipt = state
        .services
        .ledger
        .record_transaction(StockMovement {
            name: payload.name,
            action,
            quantity: payload.quantity,
            actor,
            image_ref: payload.image_ref,
        })
        .await?;

    Ok(created_response(StockReceiptView {
        transaction_id: receipt.transaction.id,
        action: receipt.transaction.action,
        quantity: receipt.transaction.quantity,
        previous_quantity: receipt.previous_quantity,
        ingredient: IngredientView::from(receipt.ingredient),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/critical",
    responses((status = 200, description = "Ingredients at or below their threshold", body = [IngredientView])),
    tag = "inventory"
)]
pub async fn list_critical(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let items: Vec<IngredientView> = state
        .services
        .ledger
        .list_critical()
        .await?
        .into_iter()
        .map(IngredientView::from)
        .collect();
    Ok(success_response(items))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/activity",
    params(ActivityQuery),
    responses((status = 200, description = "Ledger entries, newest first", body = [ActivityEntry])),
    tag = "inventory"
)]
pub async fn list_activity(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let entries = state.services.ledger.list_activity(query.limit).await?;
    Ok(success_response(entries))
}
