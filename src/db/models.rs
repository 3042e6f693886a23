use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One stored telemetry sample. Immutable once written.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Reading {
    pub id: Uuid,
    pub owner_id: String,
    pub device_serial: String,
    pub location_label: String,
    pub sensor_kind: String,
    /// Raw device value. Devices send a `u16`; stored as `BIGINT` and not
    /// re-checked at ingestion.
    pub value: i64,
    /// Server clock at insert time.
    pub recorded_at: DateTime<Utc>,
}

/// Fields supplied by the caller; `id` and `recorded_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReading {
    pub owner_id: String,
    pub device_serial: String,
    pub location_label: String,
    pub sensor_kind: String,
    pub value: i64,
}

/// Read-path filter. Results are always scoped to one owner and ordered by
/// `recorded_at DESC`.
#[derive(Debug, Clone, Default)]
pub struct ReadingQuery {
    pub owner_id: String,
    pub location_label: Option<String>,
    /// Inclusive lower bound.
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub until: Option<DateTime<Utc>>,
}

impl ReadingQuery {
    pub fn for_owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            ..Self::default()
        }
    }

    pub fn location(mut self, label: impl Into<String>) -> Self {
        self.location_label = Some(label.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Whether `reading` falls inside this filter.
    pub fn matches(&self, reading: &Reading) -> bool {
        reading.owner_id == self.owner_id
            && self
                .location_label
                .as_deref()
                .map_or(true, |l| reading.location_label == l)
            && self.since.map_or(true, |s| reading.recorded_at >= s)
            && self.until.map_or(true, |u| reading.recorded_at <= u)
    }
}
