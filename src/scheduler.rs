//! The polling loop: state queries, history enrichment and pause cadence.
//!
//! Each iteration issues one state query for the configured box, then one
//! history lookup per returned aircraft. Lookups within a poll run with a
//! bounded fan-out and each record is emitted as soon as its lookup
//! finishes. Only the loop itself writes to the sink.
//!
//! ```text
//!            ┌──────────┐ traffic ┌──────────┐
//!   ┌───────▶│ Polling  │────────▶│ Emitting │──┐
//!   │        └──────────┘         └──────────┘  │
//!   │             │ empty / failed              │
//!   │             ▼                             │
//!   │        ┌──────────┐                       │
//!   │        │  Quiet   │                       │
//!   │        └──────────┘                       │
//!   │             │                             │
//!   └──── pause ◀─┴─────────────────────────────┘
//!                 │ limit reached / cancelled
//!                 ▼
//!            ┌──────────┐
//!            │ Stopped  │
//!            └──────────┘
//! ```

use crate::classify::{CategoryTable, Classifier};
use crate::client::{ClientError, HistoryEnricher, StateFetcher};
use crate::record::{build_record, RecordSink};
use crate::retry::{pause, with_retry, Attempt, RetryPolicy};
use crate::types::{BoundingBox, FlightHistoryEntry, StateVector};
use chrono::Local;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Statistics for the scheduler.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    pub polls: AtomicU64,
    pub failed_polls: AtomicU64,
    pub aircraft_seen: AtomicU64,
    pub history_hits: AtomicU64,
    pub history_misses: AtomicU64,
    pub records_emitted: AtomicU64,
}

impl SchedulerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            polls: self.polls.load(Ordering::Relaxed),
            failed_polls: self.failed_polls.load(Ordering::Relaxed),
            aircraft_seen: self.aircraft_seen.load(Ordering::Relaxed),
            history_hits: self.history_hits.load(Ordering::Relaxed),
            history_misses: self.history_misses.load(Ordering::Relaxed),
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub polls: u64,
    pub failed_polls: u64,
    pub aircraft_seen: u64,
    pub history_hits: u64,
    pub history_misses: u64,
    pub records_emitted: u64,
}

/// Configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Pause between iterations
    pub poll_interval: Duration,
    /// Number of poll iterations before stopping
    pub limit: u32,
    /// History lookups in flight at once within one poll
    pub history_concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            limit: 1000,
            history_concurrency: 4,
            retry: RetryPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_history_concurrency(mut self, concurrency: usize) -> Self {
        self.history_concurrency = concurrency.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// How a completed iteration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    Traffic,
    Empty,
    /// The state query failed after all retries
    Failed,
}

/// What to tell the user after an iteration.
///
/// Every variant pauses for the same interval; they only differ in the
/// message surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuietStatus {
    Productive,
    /// Nothing seen since the run started
    QuietFromStart,
    /// First empty poll after one with traffic
    QuietAfterTraffic,
    /// Empty again after an already reported empty poll
    StillQuiet,
}

/// Classify an iteration given what came before it.
pub fn quiet_status(previous_productive: bool, iterations_completed: u32, empty: bool) -> QuietStatus {
    if !empty {
        QuietStatus::Productive
    } else if previous_productive {
        QuietStatus::QuietAfterTraffic
    } else if iterations_completed == 0 {
        QuietStatus::QuietFromStart
    } else {
        QuietStatus::StillQuiet
    }
}

/// Counters owned by one run of the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState {
    iterations_completed: u32,
    previous_productive: bool,
    limit: u32,
}

impl PollState {
    pub fn new(limit: u32) -> Self {
        Self {
            iterations_completed: 0,
            previous_productive: false,
            limit,
        }
    }

    pub fn iterations_completed(&self) -> u32 {
        self.iterations_completed
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn is_exhausted(&self) -> bool {
        self.iterations_completed >= self.limit
    }

    /// Count one finished iteration. Failed iterations produce no status
    /// and leave the quiet tracking untouched.
    pub fn complete(&mut self, result: PollResult) -> Option<QuietStatus> {
        let status = match result {
            PollResult::Traffic => {
                self.previous_productive = true;
                Some(QuietStatus::Productive)
            }
            PollResult::Empty => {
                let status = quiet_status(self.previous_productive, self.iterations_completed, true);
                self.previous_productive = false;
                Some(status)
            }
            PollResult::Failed => None,
        };
        self.iterations_completed += 1;
        status
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    LimitReached,
    Cancelled,
}

/// Summary of one [`PollScheduler::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub iterations: u32,
    pub records_emitted: u64,
    pub stop_reason: StopReason,
}

enum PollOutcome {
    Empty,
    Traffic { emitted: u64 },
    Failed(ClientError),
    Cancelled { emitted: u64 },
}

/// Outcome of one aircraft's history lookup.
enum Lookup {
    Finished(StateVector, Option<FlightHistoryEntry>),
    Cancelled,
}

/// Drives the poll/enrich/emit loop for one bounding box.
pub struct PollScheduler<F, H, C = CategoryTable> {
    fetcher: F,
    enricher: H,
    classifier: C,
    sink: Arc<dyn RecordSink>,
    bbox: BoundingBox,
    config: SchedulerConfig,
    stats: Arc<SchedulerStats>,
}

impl<F, H> PollScheduler<F, H, CategoryTable>
where
    F: StateFetcher,
    H: HistoryEnricher,
{
    pub fn new(fetcher: F, enricher: H, bbox: BoundingBox, sink: Arc<dyn RecordSink>) -> Self {
        Self {
            fetcher,
            enricher,
            classifier: CategoryTable,
            sink,
            bbox,
            config: SchedulerConfig::default(),
            stats: Arc::new(SchedulerStats::new()),
        }
    }
}

impl<F, H, C> PollScheduler<F, H, C>
where
    F: StateFetcher,
    H: HistoryEnricher,
    C: Classifier,
{
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_classifier<C2: Classifier>(self, classifier: C2) -> PollScheduler<F, H, C2> {
        PollScheduler {
            fetcher: self.fetcher,
            enricher: self.enricher,
            classifier,
            sink: self.sink,
            bbox: self.bbox,
            config: self.config,
            stats: self.stats,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// Get a reference to the scheduler stats.
    pub fn stats(&self) -> Arc<SchedulerStats> {
        Arc::clone(&self.stats)
    }

    /// Poll until the iteration limit is reached or `cancel` fires.
    ///
    /// Records already emitted stay in the sink when the run is cancelled.
    pub async fn run(&self, cancel: &CancellationToken) -> PollReport {
        let mut state = PollState::new(self.config.limit);
        let mut records_emitted = 0;

        tracing::info!(
            "Polling {} every {:?} for up to {} iterations",
            self.bbox,
            self.config.poll_interval,
            state.limit()
        );

        let stop_reason = loop {
            if state.is_exhausted() {
                break StopReason::LimitReached;
            }
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            let result = match self.poll_once(cancel).await {
                PollOutcome::Traffic { emitted } => {
                    records_emitted += emitted;
                    PollResult::Traffic
                }
                PollOutcome::Empty => PollResult::Empty,
                PollOutcome::Failed(e) => {
                    tracing::warn!("State query failed after retries: {}", e);
                    self.stats.failed_polls.fetch_add(1, Ordering::Relaxed);
                    PollResult::Failed
                }
                PollOutcome::Cancelled { emitted } => {
                    records_emitted += emitted;
                    break StopReason::Cancelled;
                }
            };

            let status = state.complete(result);
            self.stats.polls.fetch_add(1, Ordering::Relaxed);

            let more = !state.is_exhausted();
            if let Some(status) = status {
                self.announce(status, more);
            }
            if !more {
                break StopReason::LimitReached;
            }

            if !pause(self.config.poll_interval, cancel).await {
                break StopReason::Cancelled;
            }
        };

        tracing::info!(
            "Stopped after {} iterations ({:?}), {} records",
            state.iterations_completed(),
            stop_reason,
            records_emitted
        );

        PollReport {
            iterations: state.iterations_completed(),
            records_emitted,
            stop_reason,
        }
    }

    async fn poll_once(&self, cancel: &CancellationToken) -> PollOutcome {
        let states = match with_retry(&self.config.retry, cancel, "State query", || {
            self.fetcher.fetch_states(self.bbox)
        })
        .await
        {
            Attempt::Done(states) => states,
            Attempt::Failed(e) => return PollOutcome::Failed(e),
            Attempt::Cancelled => return PollOutcome::Cancelled { emitted: 0 },
        };

        if states.is_empty() {
            return PollOutcome::Empty;
        }

        tracing::debug!("{} aircraft in {}", states.len(), self.bbox);
        self.stats
            .aircraft_seen
            .fetch_add(states.len() as u64, Ordering::Relaxed);

        let mut enriched = stream::iter(states)
            .map(|state| async move {
                match self.lookup_history(&state.icao24, cancel).await {
                    Some(history) => Lookup::Finished(state, history),
                    None => Lookup::Cancelled,
                }
            })
            .buffer_unordered(self.config.history_concurrency.max(1));

        let mut emitted = 0;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = enriched.next() => next,
            };
            match next {
                Some(Lookup::Finished(state, history)) => {
                    self.emit(&state, history.as_ref());
                    emitted += 1;
                }
                Some(Lookup::Cancelled) => {}
                None => return PollOutcome::Traffic { emitted },
            }
        }

        // Keep lookups that already completed; anything still in flight
        // resolves to Cancelled on this poll.
        while let Some(Some(lookup)) = enriched.next().now_or_never() {
            if let Lookup::Finished(state, history) = lookup {
                self.emit(&state, history.as_ref());
                emitted += 1;
            }
        }

        PollOutcome::Cancelled { emitted }
    }

    fn emit(&self, state: &StateVector, history: Option<&FlightHistoryEntry>) {
        let category = self.classifier.classify(state.category_code);
        self.sink.emit(build_record(state, history, category));
        self.stats.records_emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// History for one aircraft; the inner `None` whenever it cannot be had.
    ///
    /// Returns `None` only when cancelled before the lookup settled.
    async fn lookup_history(
        &self,
        icao24: &str,
        cancel: &CancellationToken,
    ) -> Option<Option<FlightHistoryEntry>> {
        let what = format!("History lookup for {}", icao24);
        let attempt = with_retry(&self.config.retry, cancel, &what, || {
            self.enricher.fetch_history(icao24)
        })
        .await;

        match attempt {
            Attempt::Done(Some(entry)) => {
                self.stats.history_hits.fetch_add(1, Ordering::Relaxed);
                Some(Some(entry))
            }
            Attempt::Done(None) => {
                self.stats.history_misses.fetch_add(1, Ordering::Relaxed);
                Some(None)
            }
            Attempt::Failed(e) => {
                tracing::warn!("{} gave up: {}", what, e);
                self.stats.history_misses.fetch_add(1, Ordering::Relaxed);
                Some(None)
            }
            Attempt::Cancelled => None,
        }
    }

    fn announce(&self, status: QuietStatus, pausing: bool) {
        let now = Local::now().format("%H:%M:%S");
        match status {
            QuietStatus::Productive if pausing => {
                tracing::info!("Pausing at {} for {:?}...", now, self.config.poll_interval)
            }
            QuietStatus::Productive => {}
            QuietStatus::QuietFromStart | QuietStatus::QuietAfterTraffic => {
                tracing::info!("No flights found in airspace since {}", now)
            }
            QuietStatus::StillQuiet => tracing::debug!("Airspace still quiet"),
        }
    }
}
