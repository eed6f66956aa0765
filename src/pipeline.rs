//! One fetch, decode, denormalize and publish cycle.

use chrono::Utc;
use chrono_tz::Tz;
use tracing::{debug, info};

use crate::denormalize::{denormalize_feed, TransformContext};
use crate::error::CycleError;
use crate::fetch::{FeedFetcher, FetchOutcome, HttpClient};
use crate::parser::parse_feed;
use crate::sink::RecordSink;
use crate::stops::StopIndex;

/// Counts from one processed payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub entities: usize,
    pub records: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleReport {
    /// The feed had not changed since the last accepted payload.
    Unchanged,
    Processed(CycleSummary),
}

/// Decodes a payload, denormalizes it and hands the records to `sink`.
///
/// Nothing is published when decoding fails. An empty batch is not published.
pub async fn process_bytes<S: RecordSink + ?Sized>(
    bytes: &[u8],
    ctx: &TransformContext<'_>,
    sink: &S,
) -> Result<CycleSummary, CycleError> {
    let feed = parse_feed(bytes)?;
    debug!(entity_count = feed.entity.len(), "Feed parsed successfully");

    let batch = denormalize_feed(&feed, ctx);
    if !batch.records.is_empty() {
        sink.publish(&batch.records).await?;
    }

    Ok(CycleSummary {
        entities: feed.entity.len(),
        records: batch.records.len(),
        skipped: batch.skipped,
    })
}

/// Owns everything a poll cycle touches. The stop index is only read.
pub struct Pipeline<C, S> {
    fetcher: FeedFetcher<C>,
    stops: StopIndex,
    timezone: Tz,
    sink: S,
}

impl<C: HttpClient, S: RecordSink> Pipeline<C, S> {
    pub fn new(fetcher: FeedFetcher<C>, stops: StopIndex, sink: S) -> Self {
        Self {
            fetcher,
            stops,
            timezone: Tz::UTC,
            sink,
        }
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn fetcher(&self) -> &FeedFetcher<C> {
        &self.fetcher
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Runs a single cycle against the configured feed.
    ///
    /// The fetcher's last-updated time advances only when the payload was
    /// decoded and published, so a failed cycle sees the same payload again.
    #[tracing::instrument(skip(self), fields(url = %self.fetcher.url()))]
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let processed_at = Utc::now();

        let (body, last_modified) = match self.fetcher.fetch().await? {
            FetchOutcome::Changed {
                body,
                last_modified,
            } => (body, last_modified),
            FetchOutcome::Unchanged { .. } => return Ok(CycleReport::Unchanged),
        };

        let ctx = TransformContext::new(&self.stops, processed_at).with_timezone(self.timezone);
        let summary = process_bytes(&body, &ctx, &self.sink).await?;
        // Only a delivered payload counts as processed; a failed one is retried.
        self.fetcher.commit(last_modified);

        info!(
            entities = summary.entities,
            records = summary.records,
            skipped = summary.skipped,
            "Records published"
        );

        Ok(CycleReport::Processed(summary))
    }
}
