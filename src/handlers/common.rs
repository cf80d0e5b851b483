use crate::{
    entities::meter::MeterKind, errors::ServiceError, models::BillingMonth, ApiResponse,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::str::FromStr;
use validator::Validate;

/// Header carrying the id of the logged-in user
pub const USER_ID_HEADER: &str = "x-user-id";

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input
        .validate()
        .map_err(|e| ServiceError::ValidationError(format!("Validation failed: {}", e)))
}

/// `YYYY-MM` from a query or path, current UTC month when absent
pub fn parse_month(raw: Option<&str>) -> Result<BillingMonth, ServiceError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => value.parse(),
        None => Ok(BillingMonth::current()),
    }
}

/// Meter kind from a query or body, electricity when absent
pub fn parse_kind(raw: Option<&str>) -> Result<MeterKind, ServiceError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => MeterKind::from_str(value).map_err(|_| {
            ServiceError::ValidationError(format!(
                "unknown meter kind '{}', expected electricity, water or gas",
                value
            ))
        }),
        None => Ok(MeterKind::default()),
    }
}

/// The user on whose behalf a request acts, read from `x-user-id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Actor(pub Option<i32>);

impl Actor {
    /// Returns the user id, or `Unauthorized` when login is required and absent
    pub fn require(self, login_required: bool) -> Result<Option<i32>, ServiceError> {
        match self.0 {
            None if login_required => Err(ServiceError::Unauthorized(
                "login required for inventory changes".to_string(),
            )),
            actor => Ok(actor),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(USER_ID_HEADER) else {
            return Ok(Actor(None));
        };
        let raw = raw
            .to_str()
            .map_err(|_| ServiceError::ValidationError("invalid x-user-id header".to_string()))?
            .trim();
        if raw.is_empty() {
            return Ok(Actor(None));
        }
        raw.parse::<i32>()
            .map(|id| Actor(Some(id)))
            .map_err(|_| ServiceError::ValidationError(format!("invalid user id '{}'", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn actor_from(header: Option<&str>) -> Result<Actor, ServiceError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn actor_header_is_parsed() {
        assert_eq!(actor_from(Some("7")).await.unwrap(), Actor(Some(7)));
        assert_eq!(actor_from(None).await.unwrap(), Actor(None));
        assert!(matches!(
            actor_from(Some("bob")).await,
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn missing_actor_is_unauthorized_only_when_required() {
        assert!(matches!(
            Actor(None).require(true),
            Err(ServiceError::Unauthorized(_))
        ));
        assert_eq!(Actor(None).require(false).unwrap(), None);
        assert_eq!(Actor(Some(3)).require(true).unwrap(), Some(3));
    }

    #[test]
    fn defaults_for_month_and_kind() {
        assert_eq!(parse_kind(None).unwrap(), MeterKind::Electricity);
        assert_eq!(parse_kind(Some("GAS")).unwrap(), MeterKind::Gas);
        assert!(parse_kind(Some("steam")).is_err());
        assert_eq!(parse_month(Some("")).unwrap(), BillingMonth::current());
        assert!(parse_month(Some("2024-13")).is_err());
    }
}
