//! Turns decoded feed entities into flat [`OutputRecord`]s.
//!
//! Each entity kind has its own transform. [`denormalize_feed`] drives them
//! over a whole feed and keeps going past entities that fail.

mod alert;
mod enums;
mod record;
mod trip;
mod trip_update;
mod vehicle;

pub use alert::{alert_identity, transform_alert};
pub use enums::{display_name, DisplayName};
pub use record::{OutputRecord, RecordKind};
pub use trip::trip_start_time;
pub use trip_update::transform_trip_update;
pub use vehicle::{speed_mph, transform_vehicle, MPS_TO_MPH};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::error::TransformError;
use crate::gtfs_rt::{FeedEntity, FeedMessage};
use crate::stops::StopIndex;

/// Everything a transform needs besides the entity itself.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    pub stops: &'a StopIndex,
    /// Timezone trip start times are written in.
    pub timezone: Tz,
    /// Wall-clock time of the fetch, used when the feed carries no timestamp.
    pub processed_at: DateTime<Utc>,
}

impl<'a> TransformContext<'a> {
    pub fn new(stops: &'a StopIndex, processed_at: DateTime<Utc>) -> Self {
        Self {
            stops,
            timezone: Tz::UTC,
            processed_at,
        }
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }
}

/// Output of one feed's worth of entities.
#[derive(Debug, Default)]
pub struct DenormalizedBatch {
    pub records: Vec<OutputRecord>,
    /// Entities dropped because their transform failed.
    pub skipped: usize,
}

/// Denormalizes every entity in `feed`.
///
/// A failing entity is logged and counted in
/// [`DenormalizedBatch::skipped`]; the rest of the feed is still processed.
pub fn denormalize_feed(feed: &FeedMessage, ctx: &TransformContext<'_>) -> DenormalizedBatch {
    let mut batch = DenormalizedBatch::default();

    for entity in &feed.entity {
        if entity.is_deleted == Some(true) {
            debug!(entity_id = %entity.id, "Skipping deleted entity");
            continue;
        }

        match denormalize_entity(entity, ctx) {
            Ok(records) => batch.records.extend(records),
            Err(e) => {
                warn!(entity_id = %entity.id, error = %e, "Skipping entity that failed to denormalize");
                batch.skipped += 1;
            }
        }
    }

    batch
}

fn denormalize_entity(
    entity: &FeedEntity,
    ctx: &TransformContext<'_>,
) -> Result<Vec<OutputRecord>, TransformError> {
    let mut records = Vec::new();

    if let Some(vehicle) = &entity.vehicle {
        records.push(transform_vehicle(vehicle, ctx)?);
    }
    if let Some(update) = &entity.trip_update {
        records.push(transform_trip_update(update, ctx)?);
    }
    if let Some(alert) = &entity.alert {
        records.extend(transform_alert(alert, ctx));
    }

    if records.is_empty() {
        debug!(entity_id = %entity.id, "Entity carries nothing to denormalize");
    }

    let entity_id = (!entity.id.is_empty()).then(|| entity.id.clone());
    for record in &mut records {
        record.entity_id = entity_id.clone();
    }

    Ok(records)
}

/// Converts feed epoch seconds, rejecting values chrono cannot represent.
pub(crate) fn epoch_seconds(secs: u64) -> Option<DateTime<Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}
