pub mod dto;
pub mod errors;
pub mod handlers;

use std::sync::Arc;

use axum::{routing::get, Router};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::{auth::CapabilityVerifier, db::TelemetryStore};
use handlers::ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TelemetryStore>,
    pub verifier: CapabilityVerifier,
}

impl AppState {
    pub fn new(store: Arc<dyn TelemetryStore>, verifier: CapabilityVerifier) -> Self {
        Self { store, verifier }
    }
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route(
            "/telemetry",
            get(handlers::list_readings).post(handlers::ingest_reading),
        )
        .route("/telemetry/{location}/window", get(handlers::get_window))
        .route("/telemetry/{location}/latest", get(handlers::get_latest))
        .route(
            "/telemetry/{location}/daily/average",
            get(handlers::get_daily_average),
        )
        .route(
            "/telemetry/{location}/daily/range",
            get(handlers::get_daily_range),
        )
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}
