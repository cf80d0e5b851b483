use crate::{
    entities::meter::MeterKind,
    errors::ServiceError,
    handlers::common::{created_response, parse_kind, success_response, validate_input},
    services::meters::MeterInput,
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MeterRequest {
    #[validate(length(min = 1, max = 100))]
    pub nickname: String,
    /// electricity, water or gas; defaults to electricity
    #[schema(example = "electricity")]
    pub kind: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub tenant: String,
}

impl MeterRequest {
    fn into_input(self) -> Result<MeterInput, ServiceError> {
        let kind: MeterKind = parse_kind(self.kind.as_deref())?;
        Ok(MeterInput {
            nickname: self.nickname,
            kind,
            tenant: self.tenant,
        })
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MeterFilter {
    /// Only meters of this kind
    pub kind: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/billing/meters",
    params(MeterFilter),
    responses(
        (status = 200, description = "Meters ordered by id"),
        (status = 400, description = "Unknown meter kind", body = crate::errors::ErrorResponse)
    ),
    tag = "billing"
)]
pub async fn list_meters(
    State(state): State<AppState>,
    Query(filter): Query<MeterFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let kind = match filter.kind.as_deref() {
        Some(raw) => Some(parse_kind(Some(raw))?),
        None => None,
    };
    let meters = state.services.meters.list_meters(kind).await?;
    Ok(success_response(meters))
}

#[utoipa::path(
    post,
    path = "/api/v1/billing/meters",
    request_body = MeterRequest,
    responses(
        (status = 201, description = "Meter registered"),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    tag = "billing"
)]
pub async fn create_meter(
    State(state): State<AppState>,
    Json(payload): Json<MeterRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let meter = state
        .services
        .meters
        .create_meter(payload.into_input()?)
        .await?;
    Ok(created_response(meter))
}

#[utoipa::path(
    get,
    path = "/api/v1/billing/meters/{id}",
    params(("id" = i32, Path, description = "Meter id")),
    responses(
        (status = 200, description = "Meter found"),
        (status = 404, description = "Meter not found", body = crate::errors::ErrorResponse)
    ),
    tag = "billing"
)]
pub async fn get_meter(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let meter = state.services.meters.get_meter(id).await?;
    Ok(success_response(meter))
}

#[utoipa::path(
    put,
    path = "/api/v1/billing/meters/{id}",
    params(("id" = i32, Path, description = "Meter id")),
    request_body = MeterRequest,
    responses(
        (status = 200, description = "Meter updated"),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 404, description = "Meter not found", body = crate::errors::ErrorResponse)
    ),
    tag = "billing"
)]
pub async fn update_meter(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<MeterRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let meter = state
        .services
        .meters
        .update_meter(id, payload.into_input()?)
        .await?;
    Ok(success_response(meter))
}
