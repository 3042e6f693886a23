use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::info;
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use super::{
    dto::{IngestRequest, OwnerParams, ReadingDto, StoredReadingDto, WindowParams},
    errors::AppError,
    AppState,
};
use crate::{
    aggregation::{self, DailyAverage, DailyRange, LatestValue},
    auth::AuthenticatedOwner,
    db::models::{Reading, ReadingQuery},
};

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// Append one decoded reading. Not idempotent: resending the same payload
/// stores a second row.
#[utoipa::path(
    post,
    path = "/telemetry",
    request_body = IngestRequest,
    responses(
        (status = 201, description = "Reading stored", body = StoredReadingDto),
        (status = 400, description = "Missing or malformed field"),
        (status = 500, description = "Store unavailable"),
        (status = 504, description = "Store timed out"),
    ),
    tag = "telemetry"
)]
pub async fn ingest_reading(
    State(state): State<AppState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StoredReadingDto>), AppError> {
    let Json(payload) = payload?;
    let reading = payload.validate()?;

    let stored = state.store.append(reading).await?;
    info!(
        owner_id = %stored.owner_id,
        device_serial = %stored.device_serial,
        location = %stored.location_label,
        value = stored.value,
        "Reading stored"
    );

    Ok((StatusCode::CREATED, Json(stored.into())))
}

// ---------------------------------------------------------------------------
// Viewer queries
// ---------------------------------------------------------------------------

async fn owner_readings(
    state: &AppState,
    owner_id: &str,
    location: Option<&str>,
) -> Result<Vec<Reading>, AppError> {
    let mut query = ReadingQuery::for_owner(owner_id);
    if let Some(location) = location {
        query = query.location(location);
    }
    Ok(state.store.fetch(&query).await?)
}

/// All readings visible to the credential's owner, newest first.
#[utoipa::path(
    get,
    path = "/telemetry",
    params(OwnerParams),
    responses(
        (status = 200, description = "Owner's readings", body = Vec<ReadingDto>),
        (status = 401, description = "Missing or invalid credential"),
        (status = 403, description = "ownerId does not match the credential"),
        (status = 500, description = "Store unavailable"),
    ),
    security(("bearer" = [])),
    tag = "telemetry"
)]
pub async fn list_readings(
    State(state): State<AppState>,
    AuthenticatedOwner(owner_id): AuthenticatedOwner,
    params: Result<Query<OwnerParams>, QueryRejection>,
) -> Result<Json<Vec<ReadingDto>>, AppError> {
    let Query(params) = params?;
    if let Some(requested) = params.owner_id {
        if requested != owner_id {
            return Err(AppError::Forbidden(requested));
        }
    }

    let rows = owner_readings(&state, &owner_id, None).await?;
    Ok(Json(rows.iter().map(ReadingDto::from).collect()))
}

/// Readings for one location within a trailing window, newest first.
#[utoipa::path(
    get,
    path = "/telemetry/{location}/window",
    params(
        ("location" = String, Path, description = "Location label"),
        WindowParams,
    ),
    responses(
        (status = 200, description = "Windowed readings", body = Vec<ReadingDto>),
        (status = 401, description = "Missing or invalid credential"),
        (status = 500, description = "Store unavailable"),
    ),
    security(("bearer" = [])),
    tag = "telemetry"
)]
pub async fn get_window(
    State(state): State<AppState>,
    AuthenticatedOwner(owner_id): AuthenticatedOwner,
    Path(location): Path<String>,
    params: Result<Query<WindowParams>, QueryRejection>,
) -> Result<Json<Vec<ReadingDto>>, AppError> {
    let Query(params) = params?;
    let rows = owner_readings(&state, &owner_id, Some(location.as_str())).await?;
    let hits = aggregation::windowed(&rows, &location, params.minutes(), Utc::now());
    Ok(Json(hits.into_iter().map(ReadingDto::from).collect()))
}

/// Most recent value for one location within a trailing window. Returns
/// `{ "value": 0, "recordedAt": null }` when the window is empty.
#[utoipa::path(
    get,
    path = "/telemetry/{location}/latest",
    params(
        ("location" = String, Path, description = "Location label"),
        WindowParams,
    ),
    responses(
        (status = 200, description = "Latest value", body = LatestValue),
        (status = 401, description = "Missing or invalid credential"),
        (status = 500, description = "Store unavailable"),
    ),
    security(("bearer" = [])),
    tag = "telemetry"
)]
pub async fn get_latest(
    State(state): State<AppState>,
    AuthenticatedOwner(owner_id): AuthenticatedOwner,
    Path(location): Path<String>,
    params: Result<Query<WindowParams>, QueryRejection>,
) -> Result<Json<LatestValue>, AppError> {
    let Query(params) = params?;
    let rows = owner_readings(&state, &owner_id, Some(location.as_str())).await?;
    Ok(Json(aggregation::latest_value(
        &rows,
        &location,
        params.minutes(),
        Utc::now(),
    )))
}

/// Mean value per calendar day (Asia/Seoul) for one location.
#[utoipa::path(
    get,
    path = "/telemetry/{location}/daily/average",
    params(("location" = String, Path, description = "Location label")),
    responses(
        (status = 200, description = "Daily averages, ascending by day", body = Vec<DailyAverage>),
        (status = 401, description = "Missing or invalid credential"),
        (status = 500, description = "Store unavailable"),
    ),
    security(("bearer" = [])),
    tag = "telemetry"
)]
pub async fn get_daily_average(
    State(state): State<AppState>,
    AuthenticatedOwner(owner_id): AuthenticatedOwner,
    Path(location): Path<String>,
) -> Result<Json<Vec<DailyAverage>>, AppError> {
    let rows = owner_readings(&state, &owner_id, Some(location.as_str())).await?;
    Ok(Json(aggregation::daily_average(&rows, &location)))
}

/// Min and max value per calendar day (Asia/Seoul) for one location.
#[utoipa::path(
    get,
    path = "/telemetry/{location}/daily/range",
    params(("location" = String, Path, description = "Location label")),
    responses(
        (status = 200, description = "Daily min/max, ascending by day", body = Vec<DailyRange>),
        (status = 401, description = "Missing or invalid credential"),
        (status = 500, description = "Store unavailable"),
    ),
    security(("bearer" = [])),
    tag = "telemetry"
)]
pub async fn get_daily_range(
    State(state): State<AppState>,
    AuthenticatedOwner(owner_id): AuthenticatedOwner,
    Path(location): Path<String>,
) -> Result<Json<Vec<DailyRange>>, AppError> {
    let rows = owner_readings(&state, &owner_id, Some(location.as_str())).await?;
    Ok(Json(aggregation::daily_min_max(&rows, &location)))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        ingest_reading,
        list_readings,
        get_window,
        get_latest,
        get_daily_average,
        get_daily_range,
        health
    ),
    components(schemas(
        IngestRequest,
        StoredReadingDto,
        ReadingDto,
        LatestValue,
        DailyAverage,
        DailyRange
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "telemetry", description = "Reading ingestion and viewer statistics"),
        (name = "system",    description = "System endpoints"),
    ),
    info(
        title = "Telemetry Service API",
        version = "0.1.0",
        description = "Ingestion, retention and aggregation of field device telemetry"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
