//! Configuration structs shared by the reader and the pipeline (spec §6
//! "Configuration"). Plain structs populated once at startup — no ambient or
//! thread-local config lookup anywhere downstream (spec §9 Design Notes).

use serde::{Deserialize, Serialize};

/// Options controlling how the streaming reader walks a workbook (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderConfig {
    pub batch_size: usize,
    pub memory_threshold_mb: u64,
    pub parallel_processing: bool,
    /// Selects the reactive/backpressured strategy over plain parallel-dispatch
    /// when `parallel_processing` is also set (spec §4.5: "parallel flag set
    /// and reactive selected").
    pub reactive_processing: bool,
    pub enable_progress_tracking: bool,
    pub enable_memory_monitoring: bool,
    /// 0 means unbounded.
    pub max_rows: u64,
    pub start_row: u32,
    pub read_all_sheets: bool,
    pub sheet_names: Vec<String>,
    pub strict_validation: bool,
    pub sxssf_row_access_window_size: u32,
    pub progress_interval_rows: u64,
    /// Number of leading rows consumed to build the column map before data
    /// rows begin (spec §4.4, default 1).
    pub header_rows: u32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 5000,
            memory_threshold_mb: 500,
            parallel_processing: true,
            reactive_processing: false,
            enable_progress_tracking: true,
            enable_memory_monitoring: true,
            max_rows: 0,
            start_row: 0,
            read_all_sheets: true,
            sheet_names: Vec::new(),
            strict_validation: false,
            sxssf_row_access_window_size: 100,
            progress_interval_rows: 10000,
            header_rows: 1,
        }
    }
}

impl ReaderConfig {
    pub fn header_rows_or_default(&self) -> u32 {
        self.header_rows
    }

    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("XLM_BATCH_SIZE") {
            if let Ok(n) = v.parse() {
                cfg.batch_size = n;
            }
        }
        if let Ok(v) = std::env::var("XLM_MEMORY_THRESHOLD_MB") {
            if let Ok(n) = v.parse() {
                cfg.memory_threshold_mb = n;
            }
        }
        if let Ok(v) = std::env::var("XLM_MAX_ROWS") {
            if let Ok(n) = v.parse() {
                cfg.max_rows = n;
            }
        }
        if let Ok(v) = std::env::var("XLM_STRICT_VALIDATION") {
            cfg.strict_validation = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("XLM_REACTIVE_PROCESSING") {
            cfg.reactive_processing = v == "1" || v.eq_ignore_ascii_case("true");
        }
        cfg
    }
}

/// Options controlling the orchestrator's parallel/reactive dispatch (spec
/// §4.8, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    pub reader: ReaderConfig,
    /// Batch-dispatch wall-clock budget per job, in seconds.
    pub batch_dispatch_timeout_secs: u64,
    /// Graceful shutdown window before forced cancellation.
    pub graceful_shutdown_secs: u64,
    pub forced_shutdown_secs: u64,
    /// Reactive strategy's max concurrency; `None` derives
    /// `max(4, min(2 * num_cpus, 32))` at construction time.
    pub reactive_max_concurrency: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reader: ReaderConfig::default(),
            batch_dispatch_timeout_secs: 10 * 60,
            graceful_shutdown_secs: 30,
            forced_shutdown_secs: 10,
            reactive_max_concurrency: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self {
            reader: ReaderConfig::from_env(),
            ..Self::default()
        }
    }

    /// `max(4, min(2 * cores, 32))` per the reactive dispatch contract.
    pub fn reactive_concurrency(&self, cpu_count: usize) -> usize {
        self.reactive_max_concurrency
            .unwrap_or_else(|| (2 * cpu_count).clamp(4, 32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_defaults_match_spec() {
        let cfg = ReaderConfig::default();
        assert_eq!(cfg.batch_size, 5000);
        assert_eq!(cfg.memory_threshold_mb, 500);
        assert_eq!(cfg.max_rows, 0);
        assert!(cfg.read_all_sheets);
        assert!(!cfg.strict_validation);
    }

    #[test]
    fn reactive_concurrency_is_clamped() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.reactive_concurrency(1), 4);
        assert_eq!(cfg.reactive_concurrency(8), 16);
        assert_eq!(cfg.reactive_concurrency(64), 32);
    }
}
