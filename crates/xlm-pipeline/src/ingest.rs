//! Ingest Service (C9, spec §4.6). Wraps the Streaming Workbook Reader (C4)
//! behind the Read Strategy Selector (C5) with a sink that turns each batch
//! into `StagingRaw` rows and bulk-inserts them (spec §4.6: "bulk-inserts
//! each full buffer in its own transaction").

use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;

use xlm_db::StagingRepository;
use xlm_model::StagingRaw;
use xlm_reader::reader::{BatchSink, ReadOutcome, ReaderError, RowRecord};
use xlm_reader::strategy::{ParallelDispatchRunner, ReadStrategySelector, StrategyContext};
use xlm_reader::{DescribedRecord, ReactiveDispatchRunner, StreamingWorkbookReader, TypeIntrospectionCache};
use xlm_model::ReaderConfig;

use crate::error::{PipelineError, PipelineResult};
use crate::source_row::SourceRow;

/// Bridges the reader's synchronous [`BatchSink`] to the async staging
/// repository by blocking on a handle to the caller's tokio runtime — the
/// sink may run on a `rayon` worker thread that has no runtime of its own
/// (spec §4.6 thread-safety note: "safe to call concurrently from
/// independent worker threads").
struct StagingSink {
    job_id: String,
    staging: StagingRepository,
    rows_ingested: AtomicU64,
    error_rows: AtomicU64,
    /// Per-sheet row counts, since a single `read()` call walks every sheet
    /// the job selected — the orchestrator needs these to update each
    /// `JobSheet`'s counters individually after one ingest pass.
    rows_by_sheet: DashMap<String, u64>,
    runtime: tokio::runtime::Handle,
}

impl BatchSink<SourceRow> for StagingSink {
    fn accept(&self, sheet_name: &str, batch: Vec<RowRecord<SourceRow>>) -> Result<(), ReaderError> {
        let mut staging_rows = Vec::with_capacity(batch.len());
        let mut error_rows_in_batch = 0u64;

        for row in &batch {
            if row.parse_errors.is_some() {
                error_rows_in_batch += 1;
            }
            let fields = row.record.to_field_map();
            let mut staging = StagingRaw::new(self.job_id.clone(), Some(sheet_name.to_string()), row.row_num as i64);
            staging.normalized_fields = fields.clone();
            staging.fields = fields;
            staging.parse_errors = row.parse_errors.clone();
            staging.created_at = Utc::now();
            staging_rows.push(staging);
        }

        let inserted = self
            .runtime
            .block_on(self.staging.bulk_insert_raw(&staging_rows))
            .map_err(|e| ReaderError::Sink(e.to_string()))?;

        self.rows_ingested.fetch_add(inserted, Ordering::Relaxed);
        self.error_rows.fetch_add(error_rows_in_batch, Ordering::Relaxed);
        *self.rows_by_sheet.entry(sheet_name.to_string()).or_insert(0) += inserted;
        Ok(())
    }
}

pub struct IngestOutcome {
    pub rows_ingested: u64,
    pub error_rows: u64,
    pub rows_by_sheet: std::collections::HashMap<String, u64>,
    pub read_outcome: ReadOutcome,
}

#[derive(Clone)]
pub struct IngestService {
    staging: StagingRepository,
    type_cache: Arc<TypeIntrospectionCache>,
    dispatch_timeout: Duration,
    graceful_shutdown: Duration,
    forced_shutdown: Duration,
}

impl IngestService {
    pub fn new(staging: StagingRepository, dispatch_timeout: Duration) -> Self {
        Self::with_shutdown(
            staging,
            dispatch_timeout,
            Duration::from_secs(30),
            Duration::from_secs(10),
        )
    }

    /// Same as [`Self::new`] but with explicit pool graceful/forced shutdown
    /// windows (spec §4.5/§5), forwarded to whichever parallel/reactive
    /// runner the read strategy selects.
    pub fn with_shutdown(
        staging: StagingRepository,
        dispatch_timeout: Duration,
        graceful_shutdown: Duration,
        forced_shutdown: Duration,
    ) -> Self {
        Self {
            staging,
            type_cache: Arc::new(TypeIntrospectionCache::new()),
            dispatch_timeout,
            graceful_shutdown,
            forced_shutdown,
        }
    }

    /// Streams `workbook_path` into `staging_raw` for `job_id`, selecting a
    /// read strategy per spec §4.5 from `config`'s flags.
    pub async fn ingest(
        &self,
        job_id: &str,
        workbook_path: &Path,
        config: &ReaderConfig,
    ) -> PipelineResult<IngestOutcome> {
        let file = File::open(workbook_path).map_err(|e| PipelineError::Reader(ReaderError::Io(e)))?;

        let sink = Arc::new(StagingSink {
            job_id: job_id.to_string(),
            staging: self.staging.clone(),
            rows_ingested: AtomicU64::new(0),
            error_rows: AtomicU64::new(0),
            rows_by_sheet: DashMap::new(),
            runtime: tokio::runtime::Handle::current(),
        });

        let selector = ReadStrategySelector::new();
        let ctx = StrategyContext::from_config(config);
        let strategy_name = selector.select(&ctx).name();

        let read_outcome = tokio::task::block_in_place(|| -> PipelineResult<ReadOutcome> {
            match strategy_name {
                "reactive-backpressured" => {
                    let runner = ReactiveDispatchRunner::with_shutdown(
                        self.dispatch_timeout,
                        self.graceful_shutdown,
                        self.forced_shutdown,
                    )
                    .map_err(|e| PipelineError::Internal(e.to_string()))?;
                    runner
                        .run::<_, SourceRow>(config, &self.type_cache, file, sink.clone())
                        .map_err(|e| PipelineError::Internal(e.to_string()))
                }
                "parallel-dispatch" => {
                    let runner = ParallelDispatchRunner::with_shutdown(
                        self.dispatch_timeout,
                        self.graceful_shutdown,
                        self.forced_shutdown,
                    )
                    .map_err(|e| PipelineError::Internal(e.to_string()))?;
                    runner
                        .run::<_, SourceRow>(config, &self.type_cache, file, sink.clone())
                        .map_err(|e| PipelineError::Internal(e.to_string()))
                }
                _ => {
                    let reader = StreamingWorkbookReader::new(config, &self.type_cache);
                    reader
                        .read::<_, SourceRow>(file, sink.as_ref())
                        .map_err(PipelineError::Reader)
                }
            }
        })?;

        let rows_by_sheet = sink.rows_by_sheet.iter().map(|e| (e.key().clone(), *e.value())).collect();

        Ok(IngestOutcome {
            rows_ingested: sink.rows_ingested.load(Ordering::Relaxed),
            error_rows: sink.error_rows.load(Ordering::Relaxed),
            rows_by_sheet,
            read_outcome,
        })
    }
}

/// Lists the sheets `config` selects for `workbook_path`, in workbook order,
/// without buffering any sheet body — used by callers that need to create a
/// `JobSheet` row per sheet before the single `ingest()` pass that visits
/// them all (spec §4.8).
pub fn discover_sheets(workbook_path: &Path, config: &ReaderConfig) -> PipelineResult<Vec<String>> {
    let file = File::open(workbook_path).map_err(|e| PipelineError::Reader(ReaderError::Io(e)))?;
    let mut archive = zip::ZipArchive::new(file).map_err(ReaderError::from).map_err(PipelineError::Reader)?;
    let all_sheets = xlm_reader::package::list_sheets(&mut archive)
        .map_err(ReaderError::from)
        .map_err(PipelineError::Reader)?;

    let names = if config.read_all_sheets {
        all_sheets.into_iter().map(|s| s.name).collect()
    } else {
        all_sheets
            .into_iter()
            .filter(|s| config.sheet_names.iter().any(|n| n == &s.name))
            .map(|s| s.name)
            .collect()
    };
    Ok(names)
}

#[allow(dead_code)]
fn assert_source_row_is_described() {
    fn takes<T: DescribedRecord>() {}
    takes::<SourceRow>();
}
