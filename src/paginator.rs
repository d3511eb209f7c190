//! Rate-limited batch iteration
//!
//! One loop drives every remote operation of the toolkit:
//! - paged mode walks an offset-paginated collection until a short page,
//! - unit mode walks a local list of targets (users to add, groups to post to).
//!
//! Both modes sleep a fixed delay between calls, sleep exactly the provider's
//! wait on a backoff signal and retry the same position, skip units that fail
//! for any other reason, and abort on permission errors.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::ProviderError;
use crate::error_log::ErrorLog;

/// Offset into a remote ordered collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct BatchCursor(pub usize);

impl BatchCursor {
    pub fn offset(self) -> usize {
        self.0
    }

    pub fn advance(self, by: usize) -> Self {
        BatchCursor(self.0 + by)
    }
}

/// One page returned by a [`BatchSource`].
///
/// `size` is the number of raw records the provider returned and decides
/// end-of-data; `items` are the identifiers extracted from them, which may be
/// fewer (e.g. members without a username).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    pub size: usize,
    pub items: Vec<T>,
}

impl<T> Batch<T> {
    pub fn new(size: usize, items: Vec<T>) -> Self {
        Self { size, items }
    }

    /// Batch whose size equals its item count.
    pub fn full(items: Vec<T>) -> Self {
        Self {
            size: items.len(),
            items,
        }
    }
}

/// Attempted / succeeded / failed counters for one operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl Tally {
    /// Units that reached a verdict (success or failure).
    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Share of completed units that succeeded, in percent.
    pub fn success_rate(&self) -> f64 {
        let completed = self.completed();
        if completed == 0 {
            0.0
        } else {
            self.succeeded as f64 / completed as f64 * 100.0
        }
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempted {}, succeeded {}, failed {} ({:.2}% success)",
            self.attempted,
            self.succeeded,
            self.failed,
            self.success_rate()
        )
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The last page was shorter than the page size.
    EndOfData,
    /// The success cap was hit.
    CapReached,
    /// Every unit of the input list was processed.
    Exhausted,
    /// A permission or visibility error ended the operation.
    Aborted(String),
    /// The caller raised the cancel flag.
    Cancelled,
}

impl StopReason {
    pub fn is_aborted(&self) -> bool {
        matches!(self, StopReason::Aborted(_))
    }
}

/// Everything an operation produced.
#[derive(Debug, Clone)]
pub struct PaginatorOutcome<T> {
    pub items: BTreeSet<T>,
    pub tally: Tally,
    pub stop: StopReason,
}

/// Fetches one page at a cursor.
pub trait BatchSource<T> {
    fn fetch(
        &mut self,
        cursor: BatchCursor,
    ) -> impl Future<Output = Result<Batch<T>, ProviderError>> + Send;
}

/// Performs the remote action for one unit.
pub trait UnitWorker<U> {
    fn process(&mut self, unit: &U) -> impl Future<Output = Result<(), ProviderError>> + Send;
}

/// Suspends the operation between calls.
pub trait Pacer {
    fn pause(&mut self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Pacer backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

impl Pacer for TokioPacer {
    fn pause(&mut self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// Knobs for one run.
#[derive(Debug, Clone)]
pub struct PaginatorConfig {
    pub page_size: usize,
    pub delay: Duration,
    pub cap: Option<usize>,
    /// Print running totals every N successful batches (paged mode) or
    /// processed units (unit mode); 0 disables.
    pub progress_every: usize,
    pub label: String,
}

impl PaginatorConfig {
    pub fn new(label: impl Into<String>, page_size: usize, delay: Duration) -> Self {
        Self {
            page_size,
            delay,
            cap: None,
            progress_every: 0,
            label: label.into(),
        }
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = Some(cap);
        self
    }

    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every;
        self
    }
}

pub struct RateLimitedPaginator<P> {
    config: PaginatorConfig,
    pacer: P,
    error_log: Option<ErrorLog>,
    cancel: Option<Arc<AtomicBool>>,
    progress_marks: Vec<usize>,
}

impl<P: Pacer> RateLimitedPaginator<P> {
    pub fn new(config: PaginatorConfig, pacer: P) -> Self {
        Self {
            config,
            pacer,
            error_log: None,
            cancel: None,
            progress_marks: Vec::new(),
        }
    }

    /// Append unit failures to this log as they happen.
    pub fn with_error_log(mut self, log: ErrorLog) -> Self {
        self.error_log = Some(log);
        self
    }

    /// Stop before the next call once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &PaginatorConfig {
        &self.config
    }

    /// Counts at which a progress line was printed.
    pub fn progress_marks(&self) -> &[usize] {
        &self.progress_marks
    }

    pub fn pacer(&self) -> &P {
        &self.pacer
    }

    /// Walk a paginated collection from offset zero.
    pub async fn run_pages<T, S>(&mut self, source: &mut S) -> PaginatorOutcome<T>
    where
        T: Ord,
        S: BatchSource<T>,
    {
        let mut items = BTreeSet::new();
        let mut tally = Tally::default();
        let mut cursor = BatchCursor::default();

        let stop = loop {
            if self.is_cancelled() {
                break StopReason::Cancelled;
            }
            if self.cap_reached(&tally) {
                break StopReason::CapReached;
            }

            tally.attempted += 1;
            match source.fetch(cursor).await {
                Ok(batch) => {
                    tally.succeeded += 1;
                    let size = batch.size;
                    items.extend(batch.items);
                    cursor = cursor.advance(size);
                    self.report_progress(tally.succeeded, &tally, items.len());

                    if size < self.config.page_size {
                        break StopReason::EndOfData;
                    }
                    if self.cap_reached(&tally) {
                        break StopReason::CapReached;
                    }
                    self.pacer.pause(self.config.delay).await;
                }
                Err(ProviderError::Backoff(wait)) => {
                    tally.failed += 1;
                    warn!(
                        "{}: rate limit at offset {}, waiting {}s",
                        self.config.label,
                        cursor.offset(),
                        wait.as_secs()
                    );
                    println!("\n⚠️ Rate limit hit. Waiting {} seconds...", wait.as_secs());
                    self.pacer.pause(wait).await;
                }
                Err(ProviderError::Permission(reason)) => {
                    self.log_failure(&format!("{}: {}", self.config.label, reason));
                    break StopReason::Aborted(reason);
                }
                Err(ProviderError::Transient(reason)) => {
                    tally.failed += 1;
                    self.log_failure(&format!(
                        "{} at offset {}: {}",
                        self.config.label,
                        cursor.offset(),
                        reason
                    ));
                    cursor = cursor.advance(self.config.page_size);
                    self.pacer.pause(self.config.delay).await;
                }
            }
        };

        info!("{} finished: {} ({:?})", self.config.label, tally, stop);
        PaginatorOutcome { items, tally, stop }
    }

    /// Process every unit in order. Successful units end up in the outcome set.
    pub async fn run_units<U, W>(&mut self, units: &[U], worker: &mut W) -> PaginatorOutcome<U>
    where
        U: Ord + Clone + fmt::Display,
        W: UnitWorker<U>,
    {
        let mut items = BTreeSet::new();
        let mut tally = Tally::default();
        let mut index = 0;

        let stop = loop {
            let Some(unit) = units.get(index) else {
                break StopReason::Exhausted;
            };
            if self.is_cancelled() {
                break StopReason::Cancelled;
            }
            if self.cap_reached(&tally) {
                break StopReason::CapReached;
            }

            tally.attempted += 1;
            match worker.process(unit).await {
                Ok(()) => {
                    tally.succeeded += 1;
                    items.insert(unit.clone());
                    index += 1;
                    self.report_progress(index, &tally, items.len());

                    if self.cap_reached(&tally) {
                        break StopReason::CapReached;
                    }
                    if index < units.len() {
                        self.pacer.pause(self.config.delay).await;
                    }
                }
                Err(ProviderError::Backoff(wait)) => {
                    tally.failed += 1;
                    warn!(
                        "{}: rate limit on {}, waiting {}s",
                        self.config.label,
                        unit,
                        wait.as_secs()
                    );
                    println!("\n⚠️ Rate limit hit. Waiting {} seconds...", wait.as_secs());
                    self.pacer.pause(wait).await;
                }
                Err(ProviderError::Permission(reason)) => {
                    self.log_failure(&format!("{} {}: {}", self.config.label, unit, reason));
                    break StopReason::Aborted(reason);
                }
                Err(ProviderError::Transient(reason)) => {
                    tally.failed += 1;
                    self.log_failure(&format!("{} {}: {}", self.config.label, unit, reason));
                    println!("❌ {}: {}", unit, reason);
                    index += 1;
                    self.report_progress(index, &tally, items.len());
                    if index < units.len() {
                        self.pacer.pause(self.config.delay).await;
                    }
                }
            }
        };

        info!("{} finished: {} ({:?})", self.config.label, tally, stop);
        PaginatorOutcome { items, tally, stop }
    }

    fn cap_reached(&self, tally: &Tally) -> bool {
        self.config
            .cap
            .map(|cap| tally.succeeded >= cap)
            .unwrap_or(false)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// `done` is successful batches in paged mode, processed units in unit mode.
    fn report_progress(&mut self, done: usize, tally: &Tally, collected: usize) {
        let every = self.config.progress_every;
        if every == 0 || done == 0 || done % every != 0 {
            return;
        }
        self.progress_marks.push(done);
        info!("{} progress: {}, {} collected", self.config.label, tally, collected);
        println!(
            "\n📊 {}: {} collected, {} succeeded, {} failed",
            self.config.label, collected, tally.succeeded, tally.failed
        );
    }

    fn log_failure(&self, message: &str) {
        warn!("{}", message);
        if let Some(log) = &self.error_log {
            if let Err(e) = log.record(message) {
                warn!("Failed to write error log: {}", e);
            }
        }
    }
}
