use axum::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Household API",
        version = "0.1.0",
        description = r#"
# Household API

Utility-meter billing and kitchen-inventory tracking.

## Billing

Register meters, record one cumulative reading per meter and month, and derive
invoice lines as the difference to the latest earlier reading.

## Inventory

Purchases and consumptions adjust ingredient stock and append to an immutable
ledger. Ingredients at or below their critical quantity are reported as critical.
Write endpoints expect the `x-user-id` header obtained from `/api/v1/auth/login`.

## Error Handling

Failures return a JSON body with `error`, `message`, `request_id` and `timestamp`.
"#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "billing", description = "Meters, readings and invoices"),
        (name = "inventory", description = "Ingredients, stock movements and alerts"),
        (name = "auth", description = "Identity resolution"),
        (name = "uploads", description = "Image uploads"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        crate::health_check,
        crate::status,
        // Billing
        crate::handlers::meters::list_meters,
        crate::handlers::meters::create_meter,
        crate::handlers::meters::get_meter,
        crate::handlers::meters::update_meter,
        crate::handlers::readings::month_readings,
        crate::handlers::readings::record_readings,
        crate::handlers::readings::upsert_reading,
        crate::handlers::readings::list_invoices,
        crate::handlers::readings::meter_invoice,
        // Inventory
        crate::handlers::inventory::list_ingredients,
        crate::handlers::inventory::create_ingredient,
        crate::handlers::inventory::set_critical_quantity,
        crate::handlers::inventory::reconcile_ingredient,
        crate::handlers::inventory::record_purchase,
        crate::handlers::inventory::record_consumption,
        crate::handlers::inventory::list_critical,
        crate::handlers::inventory::list_activity,
        // Identity and uploads
        crate::handlers::users::login,
        crate::handlers::users::get_user,
        crate::handlers::uploads::upload,
    ),
    components(
        schemas(
            crate::ResponseMeta,
            crate::entities::meter::MeterKind,
            crate::entities::ingredient::StockStatus,
            crate::entities::stock_transaction::StockAction,
            crate::handlers::meters::MeterRequest,
            crate::handlers::readings::RecordReadingsRequest,
            crate::handlers::readings::ReadingValueRequest,
            crate::handlers::inventory::IngredientView,
            crate::handlers::inventory::StockReceiptView,
            crate::handlers::inventory::CreateIngredientRequest,
            crate::handlers::inventory::StockRequest,
            crate::handlers::inventory::CriticalQuantityRequest,
            crate::handlers::users::LoginRequest,
            crate::handlers::uploads::UploadResponse,
            crate::services::readings::InvoiceLine,
            crate::services::readings::ReadingEntry,
            crate::services::ledger::ActivityEntry,
            crate::services::ledger::Reconciliation,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

/// Serves the generated document at `/api-docs/openapi.json`
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDocV1::openapi())
}
