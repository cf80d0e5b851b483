//! Household API: utility-meter billing and kitchen-inventory tracking.
//!
//! Billing keeps one cumulative reading per meter and month and bills the
//! difference to the latest earlier reading. Inventory keeps ingredient stock
//! in step with an append-only ledger of purchases and consumptions.

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use utoipa::ToSchema;

pub use errors::ServiceError;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: Arc<events::EventSender>,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), event_sender.clone(), &config);
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Routes mounted under `/api/v1`
pub fn api_v1_routes() -> Router<AppState> {
    let billing = Router::new()
        .route(
            "/meters",
            get(handlers::meters::list_meters).post(handlers::meters::create_meter),
        )
        .route(
            "/meters/:id",
            get(handlers::meters::get_meter).put(handlers::meters::update_meter),
        )
        .route(
            "/meters/:id/readings/:month",
            put(handlers::readings::upsert_reading),
        )
        .route(
            "/meters/:id/invoices/:month",
            get(handlers::readings::meter_invoice),
        )
        .route(
            "/readings",
            get(handlers::readings::month_readings).post(handlers::readings::record_readings),
        )
        .route("/invoices", get(handlers::readings::list_invoices));

    let inventory = Router::new()
        .route(
            "/ingredients",
            get(handlers::inventory::list_ingredients)
                .post(handlers::inventory::create_ingredient),
        )
        .route(
            "/ingredients/:id/critical",
            put(handlers::inventory::set_critical_quantity),
        )
        .route(
            "/ingredients/:id/reconciliation",
            get(handlers::inventory::reconcile_ingredient),
        )
        .route("/purchases", post(handlers::inventory::record_purchase))
        .route(
            "/consumptions",
            post(handlers::inventory::record_consumption),
        )
        .route("/critical", get(handlers::inventory::list_critical))
        .route("/activity", get(handlers::inventory::list_activity));

    Router::new()
        .nest("/billing", billing)
        .nest("/inventory", inventory)
        .route("/auth/login", post(handlers::users::login))
        .route("/users/:id", get(handlers::users::get_user))
        .route("/uploads", post(handlers::uploads::upload))
}

/// CORS from configured origins, permissive when none are configured
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Full application router with middleware applied
pub fn build_router(state: AppState) -> Router {
    let uploads = ServeDir::new(&state.config.upload_dir);
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .nest("/api/v1", api_v1_routes())
        .nest_service(handlers::uploads::UPLOADS_ROUTE, uploads)
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(cors)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Store reachable"),
        (status = 503, description = "Store unreachable")
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = db::check_connection(&state.db).await.is_ok();
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "checks": {
            "database": if healthy { "healthy" } else { "unhealthy" },
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    (status, Json(ApiResponse::success(body)))
}

#[utoipa::path(
    get,
    path = "/status",
    responses((status = 200, description = "Service metadata")),
    tag = "health"
)]
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "inventory_require_login": state.config.inventory_require_login,
    })))
}
