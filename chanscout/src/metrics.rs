use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::search::format::FileFormat;

/// Tracks concurrency and throughput of a scan
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    // Admission metrics
    in_flight: Arc<AtomicU64>,
    peak_in_flight: Arc<AtomicU64>,
    pool_active: Arc<AtomicU64>,
    peak_pool_active: Arc<AtomicU64>,

    // Retry metrics
    rate_limited: Arc<AtomicU64>,
    connection_resets: Arc<AtomicU64>,

    // Throughput metrics
    bytes_downloaded: Arc<AtomicU64>,
    archives_walked: Arc<AtomicU64>,
    text_files: Arc<AtomicU64>,
    csv_files: Arc<AtomicU64>,
    spreadsheet_files: Arc<AtomicU64>,
    gzip_files: Arc<AtomicU64>,
    pdf_files: Arc<AtomicU64>,
}

/// Decrements a gauge when dropped
#[derive(Debug)]
pub struct GaugeGuard {
    gauge: Arc<AtomicU64>,
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.gauge.fetch_sub(1, Ordering::SeqCst);
    }
}

fn raise_peak(peak: &AtomicU64, value: u64) {
    let mut current = peak.load(Ordering::Relaxed);
    while value > current {
        match peak.compare_exchange_weak(current, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}

impl ScanMetrics {
    /// Creates a new ScanMetrics instance
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(AtomicU64::new(0)),
            peak_in_flight: Arc::new(AtomicU64::new(0)),
            pool_active: Arc::new(AtomicU64::new(0)),
            peak_pool_active: Arc::new(AtomicU64::new(0)),
            rate_limited: Arc::new(AtomicU64::new(0)),
            connection_resets: Arc::new(AtomicU64::new(0)),
            bytes_downloaded: Arc::new(AtomicU64::new(0)),
            archives_walked: Arc::new(AtomicU64::new(0)),
            text_files: Arc::new(AtomicU64::new(0)),
            csv_files: Arc::new(AtomicU64::new(0)),
            spreadsheet_files: Arc::new(AtomicU64::new(0)),
            gzip_files: Arc::new(AtomicU64::new(0)),
            pdf_files: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Marks a work item as downloading/extracting until the guard drops
    pub fn enter_in_flight(&self) -> GaugeGuard {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        raise_peak(&self.peak_in_flight, now);
        debug!("Work items in flight: {}", now);
        GaugeGuard {
            gauge: Arc::clone(&self.in_flight),
        }
    }

    /// Marks a worker pool job as running until the guard drops
    pub fn enter_pool_job(&self) -> GaugeGuard {
        let now = self.pool_active.fetch_add(1, Ordering::SeqCst) + 1;
        raise_peak(&self.peak_pool_active, now);
        GaugeGuard {
            gauge: Arc::clone(&self.pool_active),
        }
    }

    pub fn record_rate_limit(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_reset(&self) {
        self.connection_resets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_download(&self, bytes: u64) {
        let total = self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed) + bytes;
        debug!("Downloaded {} bytes, total: {} bytes", bytes, total);
    }

    /// Records that a file of the given format was opened for searching
    pub fn record_file(&self, format: FileFormat) {
        let counter = match format {
            FileFormat::PlainText => &self.text_files,
            FileFormat::Csv => &self.csv_files,
            FileFormat::Spreadsheet => &self.spreadsheet_files,
            FileFormat::GzipText => &self.gzip_files,
            FileFormat::Pdf => &self.pdf_files,
            FileFormat::Archive(_) => &self.archives_walked,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets a snapshot of the counters
    pub fn get_stats(&self) -> ScanStats {
        ScanStats {
            in_flight: self.in_flight.load(Ordering::SeqCst),
            peak_in_flight: self.peak_in_flight.load(Ordering::Relaxed),
            pool_active: self.pool_active.load(Ordering::SeqCst),
            peak_pool_active: self.peak_pool_active.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            connection_resets: self.connection_resets.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            archives_walked: self.archives_walked.load(Ordering::Relaxed),
            text_files: self.text_files.load(Ordering::Relaxed),
            csv_files: self.csv_files.load(Ordering::Relaxed),
            spreadsheet_files: self.spreadsheet_files.load(Ordering::Relaxed),
            gzip_files: self.gzip_files.load(Ordering::Relaxed),
            pdf_files: self.pdf_files.load(Ordering::Relaxed),
        }
    }

    /// Logs the current counters
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Scan stats:\n\
             Peak attachments in flight: {}\n\
             Peak worker pool jobs: {}\n\
             Rate limits/connection resets: {}/{}\n\
             Bytes downloaded: {}\n\
             Archives walked: {}\n\
             Files searched (text/csv/spreadsheet/gzip/pdf): {}/{}/{}/{}/{}",
            stats.peak_in_flight,
            stats.peak_pool_active,
            stats.rate_limited,
            stats.connection_resets,
            stats.bytes_downloaded,
            stats.archives_walked,
            stats.text_files,
            stats.csv_files,
            stats.spreadsheet_files,
            stats.gzip_files,
            stats.pdf_files
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`ScanMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub in_flight: u64,
    pub peak_in_flight: u64,
    pub pool_active: u64,
    pub peak_pool_active: u64,
    pub rate_limited: u64,
    pub connection_resets: u64,
    pub bytes_downloaded: u64,
    pub archives_walked: u64,
    pub text_files: u64,
    pub csv_files: u64,
    pub spreadsheet_files: u64,
    pub gzip_files: u64,
    pub pdf_files: u64,
}
