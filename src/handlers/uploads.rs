use crate::{
    errors::ServiceError,
    handlers::common::{created_response, Actor},
    AppState,
};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Path under which stored uploads are served
pub const UPLOADS_ROUTE: &str = "/uploads";

#[derive(Debug, Deserialize, IntoParams)]
pub struct UploadQuery {
    /// Client-side file name; sanitised before storage
    pub filename: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    /// Pass as `image_ref` on ingredient and stock requests
    pub reference: String,
    pub url: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/uploads",
    params(UploadQuery),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 400, description = "Empty upload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Login required", body = crate::errors::ErrorResponse)
    ),
    tag = "uploads"
)]
pub async fn upload(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    actor.require(state.config.inventory_require_login)?;
    let filename = query.filename.unwrap_or_default();
    let reference = state.services.blobs.put(&filename, body).await?;

    Ok(created_response(UploadResponse {
        url: format!("{}/{}", UPLOADS_ROUTE, reference),
        reference,
    }))
}
