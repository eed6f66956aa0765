//! Trip and vehicle descriptors, shared by every entity kind.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use super::enums::display_name;
use super::record::OutputRecord;
use super::TransformContext;
use crate::error::TransformError;
use crate::gtfs_rt::{trip_descriptor, TripDescriptor, VehicleDescriptor};

/// Copies a trip descriptor under `trip.*`.
pub(crate) fn put_trip(
    record: &mut OutputRecord,
    trip: &TripDescriptor,
    ctx: &TransformContext<'_>,
) -> Result<(), TransformError> {
    record.put_text("trip.id", trip.trip_id.as_deref());
    record.put_text("trip.route_id", trip.route_id.as_deref());
    record.put_opt("trip.direction_id", trip.direction_id);
    record.put_opt(
        "trip.schedule_relationship",
        trip.schedule_relationship
            .map(display_name::<trip_descriptor::ScheduleRelationship>),
    );

    if let Some(start_time) = trip.start_time.as_deref().filter(|t| !t.is_empty()) {
        let start = trip_start_time(
            trip.start_date.as_deref(),
            start_time,
            ctx.timezone,
            ctx.processed_at,
        )?;
        record.put("trip.start_time", start.to_rfc3339());
    }

    Ok(())
}

/// Copies a vehicle descriptor under `vehicle.*`.
pub(crate) fn put_vehicle_descriptor(record: &mut OutputRecord, vehicle: &VehicleDescriptor) {
    record.put_text("vehicle.id", vehicle.id.as_deref());
    record.put_text("vehicle.label", vehicle.label.as_deref());
    record.put_text("vehicle.license_plate", vehicle.license_plate.as_deref());
}

/// Resolves a trip's scheduled start to an instant.
///
/// GTFS times count from "noon minus 12h" on the service date in the agency
/// timezone, so `25:10:00` is 01:10 the next calendar day. Without a
/// `start_date` the processing date stands in, which mis-dates trips that
/// started before midnight.
pub fn trip_start_time(
    start_date: Option<&str>,
    start_time: &str,
    timezone: Tz,
    processed_at: DateTime<Utc>,
) -> Result<DateTime<Utc>, TransformError> {
    let date = match start_date.filter(|d| !d.is_empty()) {
        Some(raw) => parse_service_date(raw)?,
        None => processed_at.with_timezone(&timezone).date_naive(),
    };
    let offset = parse_time_of_day(start_time)?;

    let noon = date
        .and_hms_opt(12, 0, 0)
        .and_then(|noon| timezone.from_local_datetime(&noon).earliest())
        .ok_or_else(|| TransformError::LocalTime {
            date: date.to_string(),
            time: start_time.to_string(),
        })?;

    Ok((noon - Duration::hours(12) + offset).with_timezone(&Utc))
}

fn parse_service_date(raw: &str) -> Result<NaiveDate, TransformError> {
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TransformError::StartDate(raw.to_string()));
    }
    NaiveDate::parse_from_str(raw, "%Y%m%d").map_err(|_| TransformError::StartDate(raw.to_string()))
}

/// `HH:MM:SS` where the hour may run past 23.
fn parse_time_of_day(raw: &str) -> Result<Duration, TransformError> {
    let invalid = || TransformError::StartTime(raw.to_string());

    let mut parts = raw.trim().split(':');
    let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };

    let field = |part: &str, max: i64| -> Result<i64, TransformError> {
        if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        part.parse::<i64>()
            .ok()
            .filter(|v| *v <= max)
            .ok_or_else(invalid)
    };

    let hours = field(h, 99)?;
    let minutes = field(m, 59)?;
    let seconds = field(s, 59)?;

    Ok(Duration::seconds(hours * 3600 + minutes * 60 + seconds))
}
