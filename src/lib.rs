pub mod config;
pub mod denormalize;
pub mod error;
pub mod fetch;
pub mod parser;
pub mod pipeline;
pub mod scheduler;
pub mod sink;
pub mod stops;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
