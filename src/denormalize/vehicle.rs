use tracing::debug;

use super::enums::display_name;
use super::record::{OutputRecord, RecordKind};
use super::trip::{put_trip, put_vehicle_descriptor};
use super::{epoch_seconds, TransformContext};
use crate::error::TransformError;
use crate::gtfs_rt::{vehicle_position, VehiclePosition};
use crate::stops::StopRecord;

/// Meters per second to miles per hour.
pub const MPS_TO_MPH: f64 = 2.2369362921;

pub fn speed_mph(meters_per_sec: f32) -> f64 {
    f64::from(meters_per_sec) * MPS_TO_MPH
}

/// Flattens a vehicle position, enriching it with the stop it refers to.
///
/// The record is stamped with the vehicle's own timestamp, or the processing
/// time when the feed leaves it out.
pub fn transform_vehicle(
    vehicle: &VehiclePosition,
    ctx: &TransformContext<'_>,
) -> Result<OutputRecord, TransformError> {
    let timestamp = vehicle
        .timestamp
        .and_then(epoch_seconds)
        .unwrap_or(ctx.processed_at);
    let mut record = OutputRecord::new(RecordKind::Vehicle, timestamp);

    if let Some(trip) = &vehicle.trip {
        put_trip(&mut record, trip, ctx)?;
    }
    if let Some(descriptor) = &vehicle.vehicle {
        put_vehicle_descriptor(&mut record, descriptor);
    }

    if let Some(position) = &vehicle.position {
        record.put(
            "position",
            format!("{},{}", position.latitude, position.longitude),
        );
        record.put_opt("bearing", position.bearing);
        record.put_opt("odometer_meters", position.odometer);
        record.put_opt("speed_meters_per_sec", position.speed);
        record.put_opt("speed_mph", position.speed.map(speed_mph));
    }

    record.put_opt("stop_seq", vehicle.current_stop_sequence);
    record.put_opt(
        "stop_status",
        vehicle
            .current_status
            .map(display_name::<vehicle_position::VehicleStopStatus>),
    );
    record.put_opt(
        "congestion",
        vehicle
            .congestion_level
            .map(display_name::<vehicle_position::CongestionLevel>),
    );
    record.put_opt(
        "occupancy",
        vehicle
            .occupancy_status
            .map(display_name::<vehicle_position::OccupancyStatus>),
    );
    record.put_opt("occupancy_percentage", vehicle.occupancy_percentage);

    if let Some(stop_id) = vehicle.stop_id.as_deref().filter(|id| !id.is_empty()) {
        record.put("stop_id", stop_id);
        match ctx.stops.get(stop_id) {
            Some(stop) => put_stop(&mut record, stop),
            None => debug!(stop_id, "Unrecognized stop id"),
        }
    }

    Ok(record)
}

/// Copies a static stop under `stop.*`.
fn put_stop(record: &mut OutputRecord, stop: &StopRecord) {
    record.put("stop.id", stop.id.as_str());
    record.put_text("stop.code", stop.code.as_deref());
    record.put_text("stop.name", stop.name.as_deref());
    record.put_text("stop.desc", stop.description.as_deref());
    if let (Some(lat), Some(lon)) = (stop.latitude, stop.longitude) {
        record.put("stop.position", format!("{lat},{lon}"));
    }
    record.put_text("stop.zone_id", stop.zone_id.as_deref());
    record.put_text("stop.url", stop.url.as_deref());
    record.put_text("stop.location_type", stop.location_type.as_deref());
    record.put_text("stop.parent_station", stop.parent_station.as_deref());
    record.put_text("stop.timezone", stop.timezone.as_deref());
    record.put("stop.wheelchair_boarding", stop.wheelchair_boarding);
}
