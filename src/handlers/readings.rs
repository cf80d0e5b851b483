use crate::{
    errors::ServiceError,
    handlers::common::{parse_kind, parse_month, success_response},
    services::readings::{InvoiceLine, ReadingEntry},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

/// Month and meter kind selecting a billing view
#[derive(Debug, Deserialize, IntoParams)]
pub struct BillingPeriodQuery {
    /// YYYY-MM, defaults to the current month
    pub month: Option<String>,
    /// electricity, water or gas; defaults to electricity
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordReadingsRequest {
    /// YYYY-MM, defaults to the current month
    #[schema(example = "2024-02")]
    pub month: Option<String>,
    /// electricity, water or gas; defaults to electricity. Every meter in
    /// `readings` must be of this kind.
    pub kind: Option<String>,
    pub readings: Vec<ReadingEntry>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReadingValueRequest {
    pub value: f64,
}

#[utoipa::path(
    get,
    path = "/api/v1/billing/readings",
    params(BillingPeriodQuery),
    responses(
        (status = 200, description = "Meters of the kind and their values for the month"),
        (status = 400, description = "Invalid month or kind", body = crate::errors::ErrorResponse)
    ),
    tag = "billing"
)]
pub async fn month_readings(
    State(state): State<AppState>,
    Query(query): Query<BillingPeriodQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let month = parse_month(query.month.as_deref())?;
    let kind = parse_kind(query.kind.as_deref())?;
    let view = state.services.readings.month_readings(kind, month).await?;
    Ok(success_response(view))
}

#[utoipa::path(
    post,
    path = "/api/v1/billing/readings",
    request_body = RecordReadingsRequest,
    responses(
        (status = 200, description = "All readings stored"),
        (status = 400, description = "Invalid month, kind or value, or a meter of another kind", body = crate::errors::ErrorResponse),
        (status = 404, description = "A referenced meter does not exist", body = crate::errors::ErrorResponse)
    ),
    tag = "billing"
)]
pub async fn record_readings(
    State(state): State<AppState>,
    Json(payload): Json<RecordReadingsRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let month = parse_month(payload.month.as_deref())?;
    let kind = parse_kind(payload.kind.as_deref())?;
    let saved = state
        .services
        .readings
        .record_readings(kind, month, payload.readings)
        .await?;
    Ok(success_response(saved))
}

#[utoipa::path(
    put,
    path = "/api/v1/billing/meters/{id}/readings/{month}",
    params(
        ("id" = i32, Path, description = "Meter id"),
        ("month" = String, Path, description = "YYYY-MM")
    ),
    request_body = ReadingValueRequest,
    responses(
        (status = 200, description = "Reading stored"),
        (status = 400, description = "Invalid month or value", body = crate::errors::ErrorResponse),
        (status = 404, description = "Meter not found", body = crate::errors::ErrorResponse)
    ),
    tag = "billing"
)]
pub async fn upsert_reading(
    State(state): State<AppState>,
    Path((meter_id, month)): Path<(i32, String)>,
    Json(payload): Json<ReadingValueRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let month = parse_month(Some(&month))?;
    let reading = state
        .services
        .readings
        .upsert_reading(meter_id, month, payload.value)
        .await?;
    Ok(success_response(reading))
}

#[utoipa::path(
    get,
    path = "/api/v1/billing/invoices",
    params(BillingPeriodQuery),
    responses(
        (status = 200, description = "Invoice lines for meters with a reading that month", body = [InvoiceLine]),
        (status = 400, description = "Invalid month or kind", body = crate::errors::ErrorResponse)
    ),
    tag = "billing"
)]
pub async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<BillingPeriodQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let month = parse_month(query.month.as_deref())?;
    let kind = parse_kind(query.kind.as_deref())?;
    let lines = state.services.readings.list_invoices(kind, month).await?;
    Ok(success_response(lines))
}

#[utoipa::path(
    get,
    path = "/api/v1/billing/meters/{id}/invoices/{month}",
    params(
        ("id" = i32, Path, description = "Meter id"),
        ("month" = String, Path, description = "YYYY-MM")
    ),
    responses(
        (status = 200, description = "Invoice line", body = InvoiceLine),
        (status = 404, description = "Meter not found or no reading that month", body = crate::errors::ErrorResponse)
    ),
    tag = "billing"
)]
pub async fn meter_invoice(
    State(state): State<AppState>,
    Path((meter_id, month)): Path<(i32, String)>,
) -> Result<impl IntoResponse, ServiceError> {
    let month = parse_month(Some(&month))?;
    let line = state
        .services
        .readings
        .compute_invoice(meter_id, month)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("meter {} has no reading for {}", meter_id, month))
        })?;
    Ok(success_response(line))
}
