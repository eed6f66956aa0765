//! Fixed-period poll loop.
//!
//! The loop alternates between two states. While idle it waits for the next
//! tick or for cancellation; while processing it runs one pipeline cycle to
//! completion. Cancellation is only observed while idle, so an in-flight fetch
//! finishes (or hits its timeout) before the loop exits.

use std::time::Duration;

use async_trait::async_trait;
use clap::ValueEnum;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::CycleError;
use crate::fetch::HttpClient;
use crate::pipeline::{CycleReport, Pipeline};
use crate::sink::RecordSink;

/// A tick firing later than this counts as missed.
const LATE_TOLERANCE: Duration = Duration::from_millis(5);

/// What to do with ticks that elapse while a cycle is still running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OverlapPolicy {
    /// Drop them and wait for the next aligned tick.
    #[default]
    Skip,
    /// Run one catch-up cycle as soon as the current one ends.
    Queue,
}

/// Work the loop runs on every tick.
#[async_trait]
pub trait PollCycle: Send {
    async fn run_cycle(&mut self) -> Result<CycleReport, CycleError>;
}

#[async_trait]
impl<C: HttpClient, S: RecordSink> PollCycle for Pipeline<C, S> {
    async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        Pipeline::run_cycle(self).await
    }
}

/// Cycle counts reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles: u64,
    pub failed: u64,
    pub unchanged: u64,
}

/// Tick deadlines, aligned to the moment the loop started.
#[derive(Debug)]
struct Ticks {
    period: Duration,
    overlap: OverlapPolicy,
    next: Instant,
}

impl Ticks {
    fn new(period: Duration, overlap: OverlapPolicy) -> Self {
        Self {
            period,
            overlap,
            next: Instant::now(),
        }
    }

    fn deadline(&self) -> Instant {
        self.next
    }

    /// Picks the deadline after the tick that fired at `fired`, given that its
    /// cycle ended at `finished`.
    fn advance(&mut self, fired: Instant, finished: Instant) {
        self.next = match self.overlap {
            OverlapPolicy::Skip => {
                let mut next = self.next + self.period;
                while next < finished {
                    next += self.period;
                }
                next
            }
            OverlapPolicy::Queue if fired > self.next + LATE_TOLERANCE => fired + self.period,
            OverlapPolicy::Queue => self.next + self.period,
        };
    }
}

/// Runs `cycle` every `period` until `cancel` fires.
///
/// The first cycle starts immediately. A failed cycle is logged and the loop
/// waits for the next tick. With [`OverlapPolicy::Skip`] no cycle ever starts
/// off the `period` grid, however long the previous one took.
///
/// # Panics
///
/// If `period` is zero.
pub async fn run<P: PollCycle>(
    mut cycle: P,
    period: Duration,
    overlap: OverlapPolicy,
    cancel: CancellationToken,
) -> LoopStats {
    assert!(!period.is_zero(), "poll period must be non-zero");
    let mut ticks = Ticks::new(period, overlap);

    info!(period_secs = period.as_secs_f64(), ?overlap, "Poll loop started");

    let mut stats = LoopStats::default();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Stop requested, leaving poll loop");
                break;
            }
            _ = tokio::time::sleep_until(ticks.deadline()) => {}
        }

        let fired = Instant::now();
        stats.cycles += 1;
        match cycle.run_cycle().await {
            Ok(CycleReport::Processed(_)) => {}
            Ok(CycleReport::Unchanged) => stats.unchanged += 1,
            Err(e) => {
                stats.failed += 1;
                error!(cycle = stats.cycles, error = %e, "Poll cycle failed");
            }
        }

        let finished = Instant::now();
        ticks.advance(fired, finished);
        debug!(
            took_ms = (finished - fired).as_millis() as u64,
            next_in_ms = ticks.deadline().saturating_duration_since(finished).as_millis() as u64,
            "Cycle finished"
        );
    }

    info!(
        cycles = stats.cycles,
        failed = stats.failed,
        unchanged = stats.unchanged,
        "Poll loop stopped"
    );
    stats
}
