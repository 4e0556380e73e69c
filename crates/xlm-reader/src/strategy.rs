//! Read Strategy Selector (C5). Modeled on the teacher's node-executor
//! registry: a set of strategies, each declaring a priority and a predicate,
//! with the highest-priority match winning (spec §4.5).

use std::sync::Arc;
use std::time::Duration;

use xlm_model::ReaderConfig;

use crate::reader::{BatchSink, ReadOutcome, ReaderError, StreamingWorkbookReader};
use crate::type_cache::{DescribedRecord, TypeIntrospectionCache};

/// A decision input for strategy selection — just the config flags §4.5's
/// predicates inspect.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext {
    pub parallel_requested: bool,
    pub reactive_requested: bool,
    pub multi_sheet_requested: bool,
}

impl StrategyContext {
    pub fn from_config(config: &ReaderConfig) -> Self {
        Self {
            parallel_requested: config.parallel_processing,
            reactive_requested: config.parallel_processing && config.reactive_processing,
            multi_sheet_requested: config.read_all_sheets || config.sheet_names.len() > 1,
        }
    }
}

pub trait ReadStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn priority(&self) -> i32;
    fn supports(&self, ctx: &StrategyContext) -> bool;
}

pub struct SingleSheetStreaming;
impl ReadStrategy for SingleSheetStreaming {
    fn name(&self) -> &'static str {
        "single-sheet-streaming"
    }
    fn priority(&self) -> i32 {
        0
    }
    fn supports(&self, _ctx: &StrategyContext) -> bool {
        true
    }
}

pub struct MultiSheetStreaming;
impl ReadStrategy for MultiSheetStreaming {
    fn name(&self) -> &'static str {
        "multi-sheet-streaming"
    }
    fn priority(&self) -> i32 {
        5
    }
    fn supports(&self, ctx: &StrategyContext) -> bool {
        ctx.multi_sheet_requested
    }
}

pub struct ParallelDispatch;
impl ReadStrategy for ParallelDispatch {
    fn name(&self) -> &'static str {
        "parallel-dispatch"
    }
    fn priority(&self) -> i32 {
        10
    }
    fn supports(&self, ctx: &StrategyContext) -> bool {
        ctx.parallel_requested
    }
}

pub struct ReactiveBackpressured;
impl ReadStrategy for ReactiveBackpressured {
    fn name(&self) -> &'static str {
        "reactive-backpressured"
    }
    fn priority(&self) -> i32 {
        15
    }
    fn supports(&self, ctx: &StrategyContext) -> bool {
        ctx.parallel_requested && ctx.reactive_requested
    }
}

/// Registry mirroring the teacher's executor registry shape: strategies are
/// registered once, the selector picks the highest-priority match.
pub struct ReadStrategySelector {
    strategies: Vec<Box<dyn ReadStrategy>>,
}

impl ReadStrategySelector {
    pub fn new() -> Self {
        let mut strategies: Vec<Box<dyn ReadStrategy>> = vec![
            Box::new(SingleSheetStreaming),
            Box::new(MultiSheetStreaming),
            Box::new(ParallelDispatch),
            Box::new(ReactiveBackpressured),
        ];
        strategies.sort_by_key(|s| -s.priority());
        Self { strategies }
    }

    /// Highest-priority strategy whose predicate holds; falls back to the
    /// baseline single-sheet streamer if somehow none match (spec §4.5).
    pub fn select(&self, ctx: &StrategyContext) -> &dyn ReadStrategy {
        self.strategies
            .iter()
            .find(|s| s.supports(ctx))
            .map(|b| b.as_ref())
            .unwrap_or(&SingleSheetStreaming)
    }
}

impl Default for ReadStrategySelector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Reader(#[from] ReaderError),
    #[error("batch dispatch timed out after {0:?}")]
    Timeout(Duration),
    #[error("worker task panicked: {0}")]
    WorkerPanic(String),
}

/// Executes the parallel-dispatch contract (spec §4.5, normative): the SAX
/// producer runs synchronously on the calling thread and hands completed
/// batches to a work-stealing `rayon` pool; every submission is tracked so
/// the strategy can wait for all in-flight work before shutting the pool
/// down. An earlier design that didn't track completions is explicitly
/// disallowed by the spec — this tracking is not optional.
pub struct ParallelDispatchRunner {
    pool: Arc<rayon::ThreadPool>,
    timeout: Duration,
    graceful_shutdown: Duration,
    forced_shutdown: Duration,
}

impl ParallelDispatchRunner {
    pub fn new(timeout: Duration) -> Result<Self, DispatchError> {
        Self::with_shutdown(timeout, Duration::from_secs(30), Duration::from_secs(10))
    }

    /// Same as [`Self::new`] but with explicit graceful/forced pool-shutdown
    /// windows (spec §4.5/§5: "a soft stop is attempted for up to 30 s, then
    /// a forceful cancel, then a final 10 s wait").
    pub fn with_shutdown(
        timeout: Duration,
        graceful_shutdown: Duration,
        forced_shutdown: Duration,
    ) -> Result<Self, DispatchError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .build()
            .map_err(|e| DispatchError::WorkerPanic(e.to_string()))?;
        Ok(Self {
            pool: Arc::new(pool),
            timeout,
            graceful_shutdown,
            forced_shutdown,
        })
    }

    /// Runs `read` with a sink that forwards each batch into the pool,
    /// tracking every dispatched task, then waits for all of them (bounded
    /// by `self.timeout`), propagating the first error encountered, and
    /// finally shuts the pool down per the graceful/forced sequence.
    pub fn run<R, T>(
        &self,
        config: &ReaderConfig,
        type_cache: &TypeIntrospectionCache,
        source: R,
        downstream: Arc<dyn BatchSink<T>>,
    ) -> Result<ReadOutcome, DispatchError>
    where
        R: std::io::Read + std::io::Seek,
        T: DescribedRecord,
    {
        let tracked = TrackingSink {
            pool: self.pool.clone(),
            downstream,
            handles: std::sync::Mutex::new(Vec::new()),
        };

        let reader = StreamingWorkbookReader::new(config, type_cache);
        let outcome = reader.read(source, &tracked)?;

        let handles = std::mem::take(&mut *tracked.handles.lock().unwrap());
        let wait_result = wait_for_all(handles, self.timeout);

        shutdown_pool(self.pool.clone(), self.graceful_shutdown, self.forced_shutdown);

        wait_result?;
        Ok(outcome)
    }
}

/// Shuts a work-stealing pool down per the spec's normative sequence: a soft
/// stop window, then escalation to a forced window, then give up and return
/// (spec §4.5/§5). `rayon` has no cooperative-cancel API, so "forceful
/// cancel" here means we stop waiting for the pool's worker threads to
/// drain rather than actually interrupting in-flight tasks — the escalation
/// is in how long the caller blocks, not in killing running work.
pub fn shutdown_pool(pool: Arc<rayon::ThreadPool>, graceful: Duration, forced: Duration) {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        // Dropping the last handle blocks until every worker thread has gone
        // idle and exited.
        drop(pool);
        let _ = tx.send(());
    });

    if rx.recv_timeout(graceful).is_err() {
        tracing::warn!(?graceful, "pool did not shut down gracefully, forcing");
        if rx.recv_timeout(forced).is_err() {
            tracing::error!(?forced, "pool still running after forced shutdown window, abandoning wait");
        }
    }
}

struct TrackingSink<T> {
    pool: Arc<rayon::ThreadPool>,
    downstream: Arc<dyn BatchSink<T>>,
    handles: std::sync::Mutex<Vec<std::sync::mpsc::Receiver<Result<(), String>>>>,
}

impl<T: Send + 'static> BatchSink<T> for TrackingSink<T> {
    fn accept(
        &self,
        sheet_name: &str,
        batch: Vec<crate::reader::RowRecord<T>>,
    ) -> Result<(), ReaderError> {
        let (tx, rx) = std::sync::mpsc::channel();
        let downstream = self.downstream.clone();
        let sheet_name = sheet_name.to_string();
        self.pool.spawn(move || {
            let result = downstream
                .accept(&sheet_name, batch)
                .map_err(|e| e.to_string());
            let _ = tx.send(result);
        });
        self.handles.lock().unwrap().push(rx);
        Ok(())
    }
}

/// Waits for every tracked batch to complete, bounded by `timeout`. Returns
/// the first error encountered across all tasks, if any.
fn wait_for_all(
    handles: Vec<std::sync::mpsc::Receiver<Result<(), String>>>,
    timeout: Duration,
) -> Result<(), DispatchError> {
    let deadline = std::time::Instant::now() + timeout;
    let mut first_error = None;
    for rx in handles {
        let remaining = deadline.saturating_duration_since(std::time::Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                if first_error.is_none() {
                    first_error = Some(DispatchError::WorkerPanic(e));
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                return Err(DispatchError::Timeout(timeout));
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                if first_error.is_none() {
                    first_error = Some(DispatchError::WorkerPanic(
                        "worker dropped its result channel".to_string(),
                    ));
                }
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// `max(4, min(2 * cores, 32))` per the reactive-backpressured contract
/// (spec §4.5).
pub fn reactive_max_concurrency() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    (2 * cores).clamp(4, 32)
}

pub fn reactive_buffer_size(max_concurrent: usize) -> usize {
    2 * max_concurrent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_picks_highest_priority_match() {
        let selector = ReadStrategySelector::new();
        let ctx = StrategyContext {
            parallel_requested: true,
            reactive_requested: true,
            multi_sheet_requested: true,
        };
        assert_eq!(selector.select(&ctx).name(), "reactive-backpressured");
    }

    #[test]
    fn selector_falls_back_to_baseline() {
        let selector = ReadStrategySelector::new();
        let ctx = StrategyContext {
            parallel_requested: false,
            reactive_requested: false,
            multi_sheet_requested: false,
        };
        assert_eq!(selector.select(&ctx).name(), "single-sheet-streaming");
    }

    #[test]
    fn multi_sheet_wins_over_baseline_without_parallel() {
        let selector = ReadStrategySelector::new();
        let ctx = StrategyContext {
            parallel_requested: false,
            reactive_requested: false,
            multi_sheet_requested: true,
        };
        assert_eq!(selector.select(&ctx).name(), "multi-sheet-streaming");
    }

    #[test]
    fn reactive_concurrency_is_bounded() {
        assert!(reactive_max_concurrency() >= 4);
        assert!(reactive_max_concurrency() <= 32);
        assert_eq!(reactive_buffer_size(4), 8);
    }
}
