//! Display names for the feed's enum fields.
//!
//! Values outside the schema we were compiled against map to an explicit
//! fallback instead of failing, since agencies ship newer schema revisions.

use crate::gtfs_rt::{alert, trip_descriptor, trip_update, vehicle_position};

pub trait DisplayName {
    /// Schema name of a raw enum value.
    fn display_name(raw: i32) -> &'static str;
}

macro_rules! display_names {
    ($($ty:ty => $fallback:literal),* $(,)?) => {
        $(
            impl DisplayName for $ty {
                fn display_name(raw: i32) -> &'static str {
                    <$ty>::try_from(raw)
                        .map(|value| value.as_str_name())
                        .unwrap_or($fallback)
                }
            }
        )*
    };
}

display_names! {
    trip_descriptor::ScheduleRelationship => "UNKNOWN_SCHEDULE_RELATIONSHIP",
    trip_update::stop_time_update::ScheduleRelationship => "UNKNOWN_SCHEDULE_RELATIONSHIP",
    vehicle_position::VehicleStopStatus => "UNKNOWN_STOP_STATUS",
    vehicle_position::CongestionLevel => "UNKNOWN_CONGESTION_LEVEL",
    vehicle_position::OccupancyStatus => "UNKNOWN_OCCUPANCY_STATUS",
    alert::Cause => "UNKNOWN_CAUSE",
    alert::Effect => "UNKNOWN_EFFECT",
}

pub fn display_name<E: DisplayName>(raw: i32) -> &'static str {
    E::display_name(raw)
}
