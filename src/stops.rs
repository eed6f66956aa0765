//! Static GTFS stop table, loaded once at startup and used to enrich realtime
//! records.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ReferenceDataError;

/// Column order expected in `stops.txt`.
pub const STOP_COLUMNS: [&str; 12] = [
    "stop_id",
    "stop_code",
    "stop_name",
    "stop_desc",
    "stop_lat",
    "stop_lon",
    "zone_id",
    "stop_url",
    "location_type",
    "parent_station",
    "stop_timezone",
    "wheelchair_boarding",
];

/// One row of the stop table. Empty cells are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopRecord {
    pub id: String,
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub zone_id: Option<String>,
    pub url: Option<String>,
    pub location_type: Option<String>,
    pub parent_station: Option<String>,
    pub timezone: Option<String>,
    /// 0 = no information, 1 = accessible, 2 = not accessible.
    pub wheelchair_boarding: u8,
}

/// Stops keyed by `stop_id`. Read-only once built.
#[derive(Debug, Default, Clone)]
pub struct StopIndex {
    stops: HashMap<String, StopRecord>,
}

impl StopIndex {
    /// Loads a stop table from disk.
    ///
    /// # Errors
    ///
    /// Fails on the first unreadable file, short row, empty `stop_id` or
    /// unparsable numeric cell. There is no partial result.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReferenceDataError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ReferenceDataError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let index = Self::from_reader(file)?;
        info!(path = %path.display(), stops = index.len(), "Stop table loaded");
        Ok(index)
    }

    /// Parses a stop table from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ReferenceDataError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut stops = HashMap::new();

        for (idx, result) in rdr.records().enumerate() {
            let line = idx as u64 + 1;
            let row = result.map_err(|source| ReferenceDataError::Csv { line, source })?;

            if idx == 0 && is_header(&row) {
                debug!("Skipping stop table header");
                continue;
            }

            let stop = parse_row(line, &row)?;
            stops.insert(stop.id.clone(), stop);
        }

        Ok(Self { stops })
    }

    /// Returns the stop with this id, if the table has one.
    pub fn get(&self, stop_id: &str) -> Option<&StopRecord> {
        self.stops.get(stop_id)
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

impl FromIterator<StopRecord> for StopIndex {
    fn from_iter<I: IntoIterator<Item = StopRecord>>(iter: I) -> Self {
        Self {
            stops: iter.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }
}

fn is_header(row: &StringRecord) -> bool {
    row.get(0)
        .map(|id| id.trim_start_matches('\u{feff}') == STOP_COLUMNS[0])
        .unwrap_or(false)
}

fn parse_row(line: u64, row: &StringRecord) -> Result<StopRecord, ReferenceDataError> {
    if row.len() < STOP_COLUMNS.len() {
        return Err(ReferenceDataError::MissingColumns {
            line,
            found: row.len(),
            expected: STOP_COLUMNS.len(),
        });
    }

    let text = |i: usize| -> Option<String> {
        let value = row[i].trim();
        (!value.is_empty()).then(|| value.to_string())
    };

    let Some(id) = text(0) else {
        return Err(ReferenceDataError::MissingStopId { line });
    };

    Ok(StopRecord {
        id,
        code: text(1),
        name: text(2),
        description: text(3),
        latitude: parse_number(line, row, 4)?,
        longitude: parse_number(line, row, 5)?,
        zone_id: text(6),
        url: text(7),
        location_type: text(8),
        parent_station: text(9),
        timezone: text(10),
        wheelchair_boarding: parse_number(line, row, 11)?.unwrap_or(0),
    })
}

fn parse_number<T: std::str::FromStr>(
    line: u64,
    row: &StringRecord,
    column: usize,
) -> Result<Option<T>, ReferenceDataError> {
    let value = row[column].trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| ReferenceDataError::InvalidNumber {
            line,
            column: STOP_COLUMNS[column],
            value: value.to_string(),
        })
}
