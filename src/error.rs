//! Error taxonomy for the ingestion pipeline.
//!
//! Only [`ReferenceDataError`] is fatal, and only at startup. Everything raised
//! inside a poll cycle is logged and the loop carries on.

use std::path::PathBuf;

/// Failure loading the static stop table.
#[derive(thiserror::Error, Debug)]
pub enum ReferenceDataError {
    #[error("cannot open stop table {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed stop table at line {line}: {source}")]
    Csv {
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("stop table line {line} has {found} columns, expected {expected}")]
    MissingColumns {
        line: u64,
        found: usize,
        expected: usize,
    },

    #[error("stop table line {line} has an empty stop_id")]
    MissingStopId { line: u64 },

    #[error("stop table line {line}: column {column} is not a number: {value:?}")]
    InvalidNumber {
        line: u64,
        column: &'static str,
        value: String,
    },
}

/// The feed endpoint could not be reached or answered with an error.
#[derive(thiserror::Error, Debug)]
pub enum UpstreamError {
    #[error("upstream returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The payload is not a valid GTFS-realtime `FeedMessage`.
#[derive(thiserror::Error, Debug)]
#[error("feed decode error: {0}")]
pub struct DecodeError(#[from] pub prost::DecodeError);

/// A single feed entity could not be denormalized.
#[derive(thiserror::Error, Debug)]
pub enum TransformError {
    #[error("invalid trip start_date {0:?}, expected YYYYMMDD")]
    StartDate(String),

    #[error("invalid trip start_time {0:?}, expected HH:MM:SS")]
    StartTime(String),

    #[error("start time {time} on {date} does not exist in the agency timezone")]
    LocalTime { date: String, time: String },
}

/// The downstream sink rejected a batch.
#[derive(thiserror::Error, Debug)]
pub enum PublishError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Anything that ends a poll cycle early.
#[derive(thiserror::Error, Debug)]
pub enum CycleError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}
