use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::errors::AppError;
use crate::db::models::{NewReading, Reading};

/// Body of `POST /telemetry`. The device has already decoded the frame and
/// resolved the location label.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub owner_id: String,
    pub device_serial: String,
    pub location_label: String,
    pub sensor_kind: String,
    /// Raw decoded value. Not range-checked here.
    pub value: i64,
}

impl IngestRequest {
    /// Reject blank fields. Presence and types are already enforced by
    /// deserialization.
    pub fn validate(self) -> Result<NewReading, AppError> {
        for (field, v) in [
            ("ownerId", &self.owner_id),
            ("deviceSerial", &self.device_serial),
            ("locationLabel", &self.location_label),
            ("sensorKind", &self.sensor_kind),
        ] {
            if v.trim().is_empty() {
                return Err(AppError::Validation(format!("{field} must not be blank")));
            }
        }

        Ok(NewReading {
            owner_id: self.owner_id,
            device_serial: self.device_serial,
            location_label: self.location_label,
            sensor_kind: self.sensor_kind,
            value: self.value,
        })
    }
}

/// A stored row as acknowledged to the device.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredReadingDto {
    pub id: Uuid,
    pub owner_id: String,
    pub device_serial: String,
    pub location_label: String,
    pub sensor_kind: String,
    pub value: i64,
    pub recorded_at: DateTime<Utc>,
}

impl From<Reading> for StoredReadingDto {
    fn from(r: Reading) -> Self {
        Self {
            id: r.id,
            owner_id: r.owner_id,
            device_serial: r.device_serial,
            location_label: r.location_label,
            sensor_kind: r.sensor_kind,
            value: r.value,
            recorded_at: r.recorded_at,
        }
    }
}

/// A reading as served to the viewer.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadingDto {
    pub location_label: String,
    pub sensor_kind: String,
    pub value: i64,
    pub recorded_at: DateTime<Utc>,
}

impl From<&Reading> for ReadingDto {
    fn from(r: &Reading) -> Self {
        Self {
            location_label: r.location_label.clone(),
            sensor_kind: r.sensor_kind.clone(),
            value: r.value,
            recorded_at: r.recorded_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct OwnerParams {
    /// Must match the credential's owner when given.
    pub owner_id: Option<String>,
}

pub const DEFAULT_WINDOW_MINUTES: u32 = 60;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WindowParams {
    /// Trailing window length in minutes (default 60).
    pub minutes: Option<u32>,
}

impl WindowParams {
    pub fn minutes(&self) -> u32 {
        self.minutes.unwrap_or(DEFAULT_WINDOW_MINUTES)
    }
}
