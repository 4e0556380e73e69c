//! Memory monitor daemon: pure observation, never throttles the reader
//! (spec §4.4). Samples resident memory every 5 seconds; warns in the
//! 80-95% band and logs a forced-collection trigger above 95%.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct MemoryMonitor {
    stop_flag: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl MemoryMonitor {
    /// Spawns the sampling loop as a background task. Requires a Tokio
    /// runtime to already be running (the reader is always invoked from
    /// within one, per the orchestrator's async path).
    pub fn spawn() -> Self {
        Self::spawn_with_threshold(500)
    }

    pub fn spawn_with_threshold(threshold_mb: u64) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let flag = stop_flag.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(5));
            while !flag.load(Ordering::Relaxed) {
                interval.tick().await;
                if let Some(rss_mb) = current_rss_mb() {
                    let pct = (rss_mb as f64 / threshold_mb as f64) * 100.0;
                    if pct > 95.0 {
                        tracing::warn!(rss_mb, threshold_mb, "memory usage above 95%, forcing collection");
                        force_collection();
                    } else if pct >= 80.0 {
                        tracing::warn!(rss_mb, threshold_mb, "memory usage in 80-95% band");
                    }
                }
            }
        });
        Self {
            stop_flag,
            handle: Some(handle),
        }
    }

    pub fn stop(mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            h.abort();
        }
    }
}

/// Rust has no forced-GC hook; the closest equivalent observation is simply
/// logging, since the allocator reclaims eagerly. Kept as an explicit no-op
/// hook so the 95% branch above has somewhere to act if a future allocator
/// exposes a trim/compact call.
fn force_collection() {}

#[cfg(target_os = "linux")]
fn current_rss_mb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kb: u64 = rest.trim().trim_end_matches(" kB").trim().parse().ok()?;
            return Some(kb / 1024);
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
fn current_rss_mb() -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_and_stop_does_not_panic() {
        let monitor = MemoryMonitor::spawn_with_threshold(1);
        tokio::time::sleep(Duration::from_millis(10)).await;
        monitor.stop();
    }
}
