//! Viewer statistics computed in memory over readings already fetched for a
//! single owner. Nothing here does I/O; `now` is always passed in.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::models::Reading;

/// Zone whose calendar days define the "daily" buckets. Pinned rather than
/// taken from the server or the owner so bucket keys stay stable across
/// deployments.
pub const BUCKET_TIMEZONE: &str = "Asia/Seoul";

/// UTC offset of [`BUCKET_TIMEZONE`] in seconds. The zone has no daylight
/// saving time, so a fixed offset reproduces its calendar exactly.
const BUCKET_UTC_OFFSET_SECS: i32 = 9 * 60 * 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LatestValue {
    /// `0` when the window holds no readings.
    pub value: i64,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyAverage {
    pub day: NaiveDate,
    pub average: f64,
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyRange {
    pub day: NaiveDate,
    pub min: i64,
    pub max: i64,
}

/// Calendar day of `ts` in [`BUCKET_TIMEZONE`].
pub fn bucket_day(ts: DateTime<Utc>) -> NaiveDate {
    ts.with_timezone(&bucket_offset()).date_naive()
}

fn bucket_offset() -> FixedOffset {
    FixedOffset::east_opt(BUCKET_UTC_OFFSET_SECS).expect("+09:00 is a valid offset")
}

/// Readings for `location` recorded at or after `now - window_minutes`,
/// newest first.
pub fn windowed<'a>(
    readings: &'a [Reading],
    location: &str,
    window_minutes: u32,
    now: DateTime<Utc>,
) -> Vec<&'a Reading> {
    let cutoff = now - Duration::minutes(i64::from(window_minutes));
    let mut hits: Vec<&Reading> = readings
        .iter()
        .filter(|r| r.location_label == location && r.recorded_at >= cutoff)
        .collect();
    hits.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
    hits
}

/// Head of [`windowed`], or the zero value.
pub fn latest_value(
    readings: &[Reading],
    location: &str,
    window_minutes: u32,
    now: DateTime<Utc>,
) -> LatestValue {
    windowed(readings, location, window_minutes, now)
        .first()
        .map(|r| LatestValue {
            value: r.value,
            recorded_at: Some(r.recorded_at),
        })
        .unwrap_or_default()
}

/// Mean value per bucket day for `location`, ascending by day. Days without
/// readings are absent, not zero-filled.
pub fn daily_average(readings: &[Reading], location: &str) -> Vec<DailyAverage> {
    let mut days: BTreeMap<NaiveDate, (i128, usize)> = BTreeMap::new();
    for r in readings.iter().filter(|r| r.location_label == location) {
        let (sum, count) = days.entry(bucket_day(r.recorded_at)).or_default();
        *sum += i128::from(r.value);
        *count += 1;
    }

    days.into_iter()
        .map(|(day, (sum, count))| DailyAverage {
            day,
            average: sum as f64 / count as f64,
            samples: count,
        })
        .collect()
}

/// Min and max value per bucket day for `location`, ascending by day.
pub fn daily_min_max(readings: &[Reading], location: &str) -> Vec<DailyRange> {
    let mut days: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
    for r in readings.iter().filter(|r| r.location_label == location) {
        days.entry(bucket_day(r.recorded_at))
            .and_modify(|(min, max)| {
                *min = (*min).min(r.value);
                *max = (*max).max(r.value);
            })
            .or_insert((r.value, r.value));
    }

    days.into_iter()
        .map(|(day, (min, max))| DailyRange { day, min, max })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;

    fn reading(location: &str, value: i64, recorded_at: DateTime<Utc>) -> Reading {
        Reading {
            id: Uuid::new_v4(),
            owner_id: "owner".to_owned(),
            device_serial: "SN-1".to_owned(),
            location_label: location.to_owned(),
            sensor_kind: "co2".to_owned(),
            value,
            recorded_at,
        }
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // -----------------------------------------------------------------------
    // windowed / latest_value
    // -----------------------------------------------------------------------

    #[test]
    fn window_keeps_only_recent_readings() {
        let now = utc(2024, 3, 1, 12, 0);
        let rows = vec![
            reading("Qwave", 1, now - Duration::minutes(2)),
            reading("Qwave", 2, now - Duration::minutes(6)),
            reading("Qwave", 3, now - Duration::minutes(20)),
        ];
        let hits = windowed(&rows, "Qwave", 5, now);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value, 1);
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let now = utc(2024, 3, 1, 12, 0);
        let rows = vec![reading("Qwave", 9, now - Duration::minutes(5))];
        assert_eq!(windowed(&rows, "Qwave", 5, now).len(), 1);
    }

    #[test]
    fn window_orders_newest_first_regardless_of_input_order() {
        let now = utc(2024, 3, 1, 12, 0);
        let rows = vec![
            reading("Qwave", 3, now - Duration::minutes(3)),
            reading("Qwave", 1, now - Duration::minutes(1)),
            reading("Qwave", 2, now - Duration::minutes(2)),
        ];
        let values: Vec<i64> = windowed(&rows, "Qwave", 10, now)
            .iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn window_filters_by_location() {
        let now = utc(2024, 3, 1, 12, 0);
        let rows = vec![
            reading("Qwave", 1, now - Duration::minutes(1)),
            reading("Office", 2, now - Duration::minutes(1)),
        ];
        let hits = windowed(&rows, "Office", 5, now);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value, 2);
    }

    #[test]
    fn latest_value_is_newest_in_window() {
        let now = utc(2024, 3, 1, 12, 0);
        let newest = now - Duration::seconds(30);
        let rows = vec![
            reading("Qwave", 10, now - Duration::minutes(3)),
            reading("Qwave", 42, newest),
        ];
        let latest = latest_value(&rows, "Qwave", 5, now);
        assert_eq!(latest.value, 42);
        assert_eq!(latest.recorded_at, Some(newest));
    }

    #[test]
    fn latest_value_on_empty_window_is_zero() {
        let now = utc(2024, 3, 1, 12, 0);
        let rows = vec![reading("Qwave", 10, now - Duration::minutes(30))];
        assert_eq!(latest_value(&rows, "Qwave", 5, now), LatestValue::default());
        assert_eq!(latest_value(&[], "Qwave", 5, now).value, 0);
    }

    // -----------------------------------------------------------------------
    // daily buckets
    // -----------------------------------------------------------------------

    #[test]
    fn bucket_day_uses_fixed_zone_not_utc() {
        // 15:30 UTC is 00:30 the next day in Seoul.
        assert_eq!(bucket_day(utc(2024, 3, 1, 15, 30)), day(2024, 3, 2));
        assert_eq!(bucket_day(utc(2024, 3, 1, 14, 59)), day(2024, 3, 1));
    }

    #[test]
    fn seoul_midnight_starts_a_new_bucket() {
        assert_eq!(bucket_day(utc(2024, 12, 31, 15, 0)), day(2025, 1, 1));
        assert_eq!(bucket_offset().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn daily_average_groups_by_day() {
        let rows = vec![
            reading("Qwave", 10, utc(2024, 3, 1, 1, 0)),
            reading("Qwave", 20, utc(2024, 3, 1, 2, 0)),
            reading("Qwave", 30, utc(2024, 3, 2, 1, 0)),
        ];
        let avg = daily_average(&rows, "Qwave");
        assert_eq!(
            avg,
            vec![
                DailyAverage { day: day(2024, 3, 1), average: 15.0, samples: 2 },
                DailyAverage { day: day(2024, 3, 2), average: 30.0, samples: 1 },
            ]
        );
    }

    #[test]
    fn daily_min_max_groups_by_day() {
        let rows = vec![
            reading("Qwave", 20, utc(2024, 3, 1, 2, 0)),
            reading("Qwave", 10, utc(2024, 3, 1, 1, 0)),
            reading("Qwave", 30, utc(2024, 3, 2, 1, 0)),
        ];
        assert_eq!(
            daily_min_max(&rows, "Qwave"),
            vec![
                DailyRange { day: day(2024, 3, 1), min: 10, max: 20 },
                DailyRange { day: day(2024, 3, 2), min: 30, max: 30 },
            ]
        );
    }

    #[test]
    fn daily_series_skip_empty_days_and_other_locations() {
        let rows = vec![
            reading("Qwave", 10, utc(2024, 3, 1, 1, 0)),
            reading("Qwave", 50, utc(2024, 3, 5, 1, 0)),
            reading("Office", 99, utc(2024, 3, 3, 1, 0)),
        ];
        let days: Vec<NaiveDate> = daily_average(&rows, "Qwave").iter().map(|d| d.day).collect();
        assert_eq!(days, vec![day(2024, 3, 1), day(2024, 3, 5)]);
    }

    #[test]
    fn daily_buckets_straddle_utc_midnight_into_one_day() {
        // 16:00 UTC on the 1st and 01:00 UTC on the 2nd are both the 2nd in Seoul.
        let rows = vec![
            reading("Qwave", 4, utc(2024, 3, 1, 16, 0)),
            reading("Qwave", 8, utc(2024, 3, 2, 1, 0)),
        ];
        let avg = daily_average(&rows, "Qwave");
        assert_eq!(avg.len(), 1);
        assert_eq!(avg[0].day, day(2024, 3, 2));
        assert_eq!(avg[0].average, 6.0);
    }

    #[test]
    fn daily_functions_on_empty_input_return_empty() {
        assert!(daily_average(&[], "Qwave").is_empty());
        assert!(daily_min_max(&[], "Qwave").is_empty());
    }
}
