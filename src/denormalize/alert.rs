use serde_json::{Map, Value};
use tracing::warn;

use super::enums::display_name;
use super::record::{OutputRecord, RecordKind};
use super::trip::put_trip;
use super::TransformContext;
use crate::error::TransformError;
use crate::gtfs_rt::alert::{Cause, Effect};
use crate::gtfs_rt::{Alert, EntitySelector, TimeRange, TranslatedString};

const FNV32_OFFSET: u32 = 0x811c9dc5;
const FNV32_PRIME: u32 = 0x01000193;

/// Fans an alert out into one record per informed entity.
///
/// Every record shares the alert-wide fields (cause, effect, active periods,
/// texts) and carries the selector fields of its own informed entity. An
/// alert with no informed entities produces nothing. An informed entity whose
/// trip cannot be denormalized is logged and left out; its siblings are kept.
pub fn transform_alert(alert: &Alert, ctx: &TransformContext<'_>) -> Vec<OutputRecord> {
    let cause = alert
        .cause
        .map_or("UNKNOWN_CAUSE", display_name::<Cause>);
    let effect = alert
        .effect
        .map_or("UNKNOWN_EFFECT", display_name::<Effect>);
    let active_period: Vec<Value> = alert.active_period.iter().map(time_range).collect();

    let url = first_translation(alert.url.as_ref());
    let header = first_translation(alert.header_text.as_ref());
    let description = first_translation(alert.description_text.as_ref());
    let description_hash = description.map(fnv1a_32);

    let informed_record = |informed: &EntitySelector| -> Result<OutputRecord, TransformError> {
        let mut record = OutputRecord::new(RecordKind::Alert, ctx.processed_at);
        record.id = Some(alert_identity(informed, description_hash));

        record.put("alert_cause", cause);
        record.put("alert_effect", effect);
        if !active_period.is_empty() {
            record.put("active_period", active_period.clone());
        }
        record.put_text("url", url);
        record.put_text("header", header);
        record.put_text("description", description);

        record.put_text("agency_id", informed.agency_id.as_deref());
        record.put_text("route_id", informed.route_id.as_deref());
        record.put_opt("route_type", informed.route_type);
        record.put_text("stop_id", informed.stop_id.as_deref());
        record.put_opt("direction_id", informed.direction_id);
        if let Some(trip) = &informed.trip {
            put_trip(&mut record, trip, ctx)?;
        }

        Ok(record)
    };

    alert
        .informed_entity
        .iter()
        .filter_map(|informed| match informed_record(informed) {
            Ok(record) => Some(record),
            Err(e) => {
                let trip = informed.trip.as_ref();
                warn!(
                    route_id = ?informed.route_id,
                    stop_id = ?informed.stop_id,
                    trip_id = ?trip.and_then(|t| t.trip_id.as_deref()),
                    start_date = ?trip.and_then(|t| t.start_date.as_deref()),
                    start_time = ?trip.and_then(|t| t.start_time.as_deref()),
                    error = %e,
                    "Skipping alert informed entity"
                );
                None
            }
        })
        .collect()
}

/// Identity of one fanned-out alert record: agency, route, stop and trip ids
/// of the informed entity, then the FNV-1a hash of the description when there
/// is one. Identical alert content always yields the same identity.
pub fn alert_identity(informed: &EntitySelector, description_hash: Option<u32>) -> String {
    let mut id = String::new();
    id.push_str(informed.agency_id.as_deref().unwrap_or_default());
    id.push_str(informed.route_id.as_deref().unwrap_or_default());
    id.push_str(informed.stop_id.as_deref().unwrap_or_default());
    if let Some(trip_id) = informed.trip.as_ref().and_then(|t| t.trip_id.as_deref()) {
        id.push_str(trip_id);
    }
    if let Some(hash) = description_hash {
        id.push_str(&format!("{hash:08x}"));
    }
    id
}

fn first_translation(text: Option<&TranslatedString>) -> Option<&str> {
    text.and_then(|t| t.translation.first())
        .map(|t| t.text.as_str())
}

fn time_range(range: &TimeRange) -> Value {
    let mut out = Map::new();
    if let Some(start) = range.start {
        out.insert("start".into(), start.into());
    }
    if let Some(end) = range.end {
        out.insert("end".into(), end.into());
    }
    Value::Object(out)
}

fn fnv1a_32(text: &str) -> u32 {
    let mut hash = FNV32_OFFSET;
    for byte in text.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV32_PRIME);
    }
    hash
}
