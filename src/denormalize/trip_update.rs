use serde_json::{Map, Value};

use super::enums::display_name;
use super::record::{OutputRecord, RecordKind};
use super::trip::{put_trip, put_vehicle_descriptor};
use super::{epoch_seconds, TransformContext};
use crate::error::TransformError;
use crate::gtfs_rt::trip_update::{stop_time_update, StopTimeEvent, StopTimeUpdate};
use crate::gtfs_rt::TripUpdate;

/// Flattens a trip update into one record.
///
/// Trip and vehicle identity use the same `trip.*` / `vehicle.*` keys as
/// vehicle positions. Per-stop predictions stay nested in `stop_time_updates`.
pub fn transform_trip_update(
    update: &TripUpdate,
    ctx: &TransformContext<'_>,
) -> Result<OutputRecord, TransformError> {
    let timestamp = update
        .timestamp
        .and_then(epoch_seconds)
        .unwrap_or(ctx.processed_at);
    let mut record = OutputRecord::new(RecordKind::TripUpdate, timestamp);

    put_trip(&mut record, &update.trip, ctx)?;
    if let Some(descriptor) = &update.vehicle {
        put_vehicle_descriptor(&mut record, descriptor);
    }
    record.put_opt("delay", update.delay);

    if !update.stop_time_update.is_empty() {
        let stops: Vec<Value> = update
            .stop_time_update
            .iter()
            .map(stop_time_update_value)
            .collect();
        record.put("stop_time_updates", stops);
    }

    Ok(record)
}

fn stop_time_update_value(update: &StopTimeUpdate) -> Value {
    let mut out = Map::new();
    if let Some(seq) = update.stop_sequence {
        out.insert("stop_seq".into(), seq.into());
    }
    if let Some(stop_id) = update.stop_id.as_deref().filter(|id| !id.is_empty()) {
        out.insert("stop_id".into(), stop_id.into());
    }
    if let Some(arrival) = &update.arrival {
        out.insert("arrival".into(), stop_time_event_value(arrival));
    }
    if let Some(departure) = &update.departure {
        out.insert("departure".into(), stop_time_event_value(departure));
    }
    if let Some(raw) = update.schedule_relationship {
        out.insert(
            "schedule_relationship".into(),
            display_name::<stop_time_update::ScheduleRelationship>(raw).into(),
        );
    }
    Value::Object(out)
}

fn stop_time_event_value(event: &StopTimeEvent) -> Value {
    let mut out = Map::new();
    if let Some(delay) = event.delay {
        out.insert("delay".into(), delay.into());
    }
    if let Some(time) = event.time {
        out.insert("time".into(), time.into());
    }
    if let Some(uncertainty) = event.uncertainty {
        out.insert("uncertainty".into(), uncertainty.into());
    }
    Value::Object(out)
}
