#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    Router,
};
use household_api::{
    config::AppConfig,
    db,
    entities::meter::{self, MeterKind},
    events::{self, EventSender},
    models::BillingMonth,
    services::meters::MeterInput,
    AppState,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

/// Application state and router backed by a throwaway SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Fresh app that requires `x-user-id` on inventory writes.
    pub async fn new() -> Self {
        Self::with_login_required(true).await
    }

    pub async fn with_login_required(login_required: bool) -> Self {
        Self::with_options(login_required, 1).await
    }

    /// Fresh app over a pool of `max_connections`. More than one connection
    /// lets writers overlap the way they do in production.
    pub async fn with_options(login_required: bool, max_connections: u32) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("household_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = max_connections;
        cfg.db_min_connections = 1;
        cfg.upload_dir = dir.path().join("uploads").display().to_string();
        cfg.inventory_require_login = login_required;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let (event_sender, event_rx) = EventSender::channel(cfg.event_channel_capacity);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, Arc::new(event_sender));
        let router = household_api::build_router(state.clone());

        Self {
            router,
            state,
            _dir: dir,
            _event_task: event_task,
        }
    }

    /// Send a JSON request, optionally acting as `user_id`.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        user_id: Option<i32>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = user_id {
            builder = builder.header("x-user-id", id.to_string());
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Logs in `email` and returns the user id.
    pub async fn login(&self, email: &str) -> i32 {
        let user = self
            .state
            .services
            .users
            .resolve_identity(household_api::services::users::ResolvedIdentity {
                email: email.to_string(),
                name: None,
            })
            .await
            .expect("login");
        user.id
    }

    pub async fn seed_meter(&self, nickname: &str, kind: MeterKind, tenant: &str) -> meter::Model {
        self.state
            .services
            .meters
            .create_meter(MeterInput {
                nickname: nickname.to_string(),
                kind,
                tenant: tenant.to_string(),
            })
            .await
            .expect("seed meter")
    }

    pub async fn seed_reading(&self, meter_id: i32, month: &str, value: f64) {
        self.state
            .services
            .readings
            .upsert_reading(meter_id, month_of(month), value)
            .await
            .expect("seed reading");
    }
}

pub fn month_of(raw: &str) -> BillingMonth {
    raw.parse().expect("valid month")
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json body")
}
