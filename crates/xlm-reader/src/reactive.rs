//! Reactive-backpressured dispatch runner (spec §4.5). Same dispatch target
//! as [`crate::strategy::ParallelDispatchRunner`] — a work-stealing `rayon`
//! pool — but batches pass through a bounded queue first. When the queue is
//! full, the oldest buffered batch is dropped and a warning logged, rather
//! than blocking the SAX producer.
//!
//! The SAX producer and the queue-draining dispatcher run on separate
//! threads *concurrently* (via `std::thread::scope`): the producer pushes
//! batches as it parses, a consumer loop pops and dispatches to the pool as
//! they arrive. Running the parse to completion before ever draining the
//! queue would make drop-oldest eviction fire on almost every batch of any
//! realistically-sized workbook, defeating the backpressure design entirely.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use xlm_model::ReaderConfig;

use crate::reader::{BatchSink, ReadOutcome, ReaderError, RowRecord, StreamingWorkbookReader};
use crate::strategy::{reactive_buffer_size, reactive_max_concurrency, shutdown_pool, DispatchError};
use crate::type_cache::{DescribedRecord, TypeIntrospectionCache};

struct QueueState<T> {
    queue: VecDeque<T>,
    closed: bool,
}

struct BoundedDropOldest<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    capacity: usize,
    dropped: AtomicUsize,
}

impl<T> BoundedDropOldest<T> {
    fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                queue: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            capacity,
            dropped: AtomicUsize::new(0),
        }
    }

    /// Pushes an item, dropping the oldest buffered one if already full.
    fn push(&self, item: T) {
        let mut state = self.state.lock().unwrap();
        if state.queue.len() >= self.capacity {
            state.queue.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(capacity = self.capacity, "reactive buffer overflow, dropped oldest batch");
        }
        state.queue.push_back(item);
        self.not_empty.notify_one();
    }

    /// Marks the queue closed (no more pushes coming) and wakes any blocked
    /// consumer so it can drain what remains and exit.
    fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        self.not_empty.notify_all();
    }

    /// Blocks until an item is available, or returns `None` once the queue
    /// is closed and empty — the consumer's stop signal.
    fn pop_blocking(&self) -> Option<T> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(item) = state.queue.pop_front() {
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self.not_empty.wait(state).unwrap();
        }
    }

    #[cfg(test)]
    fn drain_for_test(&self) -> Vec<T> {
        std::mem::take(&mut self.state.lock().unwrap().queue).into_iter().collect()
    }
}

pub struct ReactiveDispatchRunner {
    pool: Arc<rayon::ThreadPool>,
    max_concurrent: usize,
    buffer_capacity: usize,
    timeout: Duration,
    graceful_shutdown: Duration,
    forced_shutdown: Duration,
}

impl ReactiveDispatchRunner {
    pub fn new(timeout: Duration) -> Result<Self, DispatchError> {
        Self::with_shutdown(timeout, Duration::from_secs(30), Duration::from_secs(10))
    }

    /// Same as [`Self::new`] but with explicit graceful/forced pool-shutdown
    /// windows (spec §4.5/§5: "30 s graceful + 10 s forced").
    pub fn with_shutdown(
        timeout: Duration,
        graceful_shutdown: Duration,
        forced_shutdown: Duration,
    ) -> Result<Self, DispatchError> {
        let max_concurrent = reactive_max_concurrency();
        let buffer_capacity = reactive_buffer_size(max_concurrent);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_concurrent)
            .build()
            .map_err(|e| DispatchError::WorkerPanic(e.to_string()))?;
        Ok(Self {
            pool: Arc::new(pool),
            max_concurrent,
            buffer_capacity,
            timeout,
            graceful_shutdown,
            forced_shutdown,
        })
    }

    pub fn run<R, T>(
        &self,
        config: &ReaderConfig,
        type_cache: &TypeIntrospectionCache,
        source: R,
        downstream: Arc<dyn BatchSink<T>>,
    ) -> Result<ReadOutcome, DispatchError>
    where
        R: std::io::Read + std::io::Seek + Send,
        T: DescribedRecord,
    {
        tracing::debug!(
            max_concurrent = self.max_concurrent,
            buffer_capacity = self.buffer_capacity,
            "starting reactive dispatch"
        );

        let buffer: Arc<BoundedDropOldest<(String, Vec<RowRecord<T>>)>> =
            Arc::new(BoundedDropOldest::new(self.buffer_capacity));
        let buffering_sink = BufferingSink { buffer: buffer.clone() };

        let deadline = Instant::now() + self.timeout;
        let mut handles = Vec::new();

        // Producer and consumer run concurrently for the lifetime of this
        // scope: the producer pushes batches as it parses, the consumer
        // drains and dispatches to the pool as they arrive, so the bounded
        // queue only ever holds the backlog the pool hasn't caught up to
        // yet — not the whole workbook.
        let producer_result = std::thread::scope(|scope| {
            let producer_buffer = buffer.clone();
            let producer = scope.spawn(move || {
                let reader = StreamingWorkbookReader::new(config, type_cache);
                let result = reader.read(source, &buffering_sink);
                producer_buffer.close();
                result
            });

            while let Some((sheet_name, batch)) = buffer.pop_blocking() {
                let (tx, rx) = std::sync::mpsc::channel();
                let downstream = downstream.clone();
                self.pool.spawn(move || {
                    let result = downstream.accept(&sheet_name, batch).map_err(|e| e.to_string());
                    let _ = tx.send(result);
                });
                handles.push(rx);
            }

            producer.join().unwrap_or_else(|_| {
                Err(ReaderError::Sink("reactive producer thread panicked".to_string()))
            })
        })?;

        for rx in handles {
            let remaining_time = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining_time) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(DispatchError::WorkerPanic(e)),
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                    return Err(DispatchError::Timeout(self.timeout))
                }
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(DispatchError::WorkerPanic(
                        "worker dropped its result channel".to_string(),
                    ))
                }
            }
        }

        shutdown_pool(self.pool.clone(), self.graceful_shutdown, self.forced_shutdown);

        let dropped = buffer.dropped.load(Ordering::Relaxed);
        if dropped > 0 {
            tracing::warn!(dropped, "reactive run completed with dropped batches");
        }

        Ok(producer_result)
    }
}

struct BufferingSink<T> {
    buffer: Arc<BoundedDropOldest<(String, Vec<RowRecord<T>>)>>,
}

impl<T: Send + 'static> BatchSink<T> for BufferingSink<T> {
    fn accept(&self, sheet_name: &str, batch: Vec<RowRecord<T>>) -> Result<(), ReaderError> {
        self.buffer.push((sheet_name.to_string(), batch));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_queue_drops_oldest_on_overflow() {
        let q: BoundedDropOldest<i32> = BoundedDropOldest::new(2);
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.drain_for_test(), vec![2, 3]);
    }

    #[test]
    fn pop_blocking_drains_then_observes_close() {
        let q: Arc<BoundedDropOldest<i32>> = Arc::new(BoundedDropOldest::new(4));
        q.push(1);
        q.push(2);
        assert_eq!(q.pop_blocking(), Some(1));
        assert_eq!(q.pop_blocking(), Some(2));
        q.close();
        assert_eq!(q.pop_blocking(), None);
    }

    #[test]
    fn pop_blocking_wakes_on_push_from_another_thread() {
        let q: Arc<BoundedDropOldest<i32>> = Arc::new(BoundedDropOldest::new(4));
        let producer = {
            let q = q.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                q.push(42);
                q.close();
            })
        };
        assert_eq!(q.pop_blocking(), Some(42));
        assert_eq!(q.pop_blocking(), None);
        producer.join().unwrap();
    }
}
