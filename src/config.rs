//! Command-line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use clap::Args;
use reqwest::Url;

use crate::scheduler::OverlapPolicy;

pub const DEFAULT_FEED_URL: &str = "http://gtfs.viainfo.net/gtfs-realtime/trapezerealtimefeed.pb";

/// Settings shared by the poll loop and one-shot mode.
#[derive(Debug, Clone, Args)]
pub struct PipelineConfig {
    /// GTFS stops.txt used to enrich vehicle positions
    #[arg(long, env = "GTFS_STOPS", default_value = "./stops.txt")]
    pub stops: PathBuf,

    /// IANA timezone trip start times are interpreted in
    #[arg(long, env = "GTFS_TIMEZONE", default_value = "UTC", value_parser = parse_timezone)]
    pub timezone: Tz,

    /// Request timeout for feed downloads (e.g. "30s", "2m")
    #[arg(long, env = "GTFS_RT_TIMEOUT", default_value = "30s", value_parser = parse_duration)]
    pub timeout: Duration,

    /// JSON-lines file to append records to; stdout when omitted
    #[arg(short, long, env = "GTFS_RT_OUTPUT")]
    pub output: Option<PathBuf>,
}

/// Settings for the long-running poll loop.
#[derive(Debug, Clone, Args)]
pub struct PollConfig {
    /// GTFS-realtime feed URL
    #[arg(long, env = "GTFS_RT_URL", default_value = DEFAULT_FEED_URL)]
    pub url: Url,

    /// Time between polls (e.g. "5m", "30s")
    #[arg(long, env = "GTFS_RT_PERIOD", default_value = "5m", value_parser = parse_duration)]
    pub period: Duration,

    /// What to do with ticks that fire while a poll is still running
    #[arg(long, env = "GTFS_RT_OVERLAP", value_enum, default_value_t = OverlapPolicy::Skip)]
    pub overlap: OverlapPolicy,

    #[command(flatten)]
    pub pipeline: PipelineConfig,
}

/// Parses `<n>ms`, `<n>s`, `<n>m`, `<n>h` or bare seconds. Zero is rejected.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration {raw:?}"))?;

    let duration = match unit {
        "ms" => Duration::from_millis(value),
        "" | "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value.saturating_mul(60)),
        "h" => Duration::from_secs(value.saturating_mul(3600)),
        other => return Err(format!("unknown duration unit {other:?} in {raw:?}")),
    };

    if duration.is_zero() {
        return Err(format!("duration must be greater than zero, got {raw:?}"));
    }
    Ok(duration)
}

pub fn parse_timezone(raw: &str) -> Result<Tz, String> {
    raw.parse::<Tz>()
        .map_err(|_| format!("unknown timezone {raw:?}"))
}
