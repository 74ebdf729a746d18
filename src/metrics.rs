// Scan metrics module
//
// Lightweight counters for classification and install runs

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters shared by the builder, its scanner and the installer.
///
/// Lock-free; clone the surrounding `Arc` to share one instance across
/// background workers.
#[derive(Debug)]
pub struct ScanMetrics {
    /// Directories claimed as mod, dlc or ambiguous roots
    pub roots_classified: AtomicUsize,

    /// Mod records produced (including bin and patch records)
    pub mods_built: AtomicUsize,

    pub archives_extracted: AtomicUsize,

    /// Top-level builds that ended in an error
    pub scans_failed: AtomicUsize,

    pub mods_installed: AtomicUsize,

    /// Bytes fed through the content hasher
    pub bytes_hashed: AtomicU64,

    /// Wall time spent inside top-level builds, in milliseconds
    pub total_scan_time_ms: AtomicU64,

    start_time: Instant,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self {
            roots_classified: AtomicUsize::new(0),
            mods_built: AtomicUsize::new(0),
            archives_extracted: AtomicUsize::new(0),
            scans_failed: AtomicUsize::new(0),
            mods_installed: AtomicUsize::new(0),
            bytes_hashed: AtomicU64::new(0),
            total_scan_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_root(&self) {
        self.roots_classified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mods_built(&self, count: usize) {
        self.mods_built.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_archive(&self) {
        self.archives_extracted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.scans_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_install(&self) {
        self.mods_installed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes_hashed(&self, bytes: u64) {
        self.bytes_hashed.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_scan_time(&self, duration: Duration) {
        self.total_scan_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average wall time per produced Mod in milliseconds
    pub fn avg_scan_time_ms(&self) -> f64 {
        let total = self.total_scan_time_ms.load(Ordering::Relaxed);
        let count = self.mods_built.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Scan Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Roots: {} classified, mods: {} built, {} installed",
            self.roots_classified.load(Ordering::Relaxed),
            self.mods_built.load(Ordering::Relaxed),
            self.mods_installed.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Archives extracted: {}, failed scans: {}",
            self.archives_extracted.load(Ordering::Relaxed),
            self.scans_failed.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Scan time: {:.2}s (avg: {:.2}ms per mod), hashed {} bytes",
            self.total_scan_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.avg_scan_time_ms(),
            self.bytes_hashed.load(Ordering::Relaxed)
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}
