//! Metrics recorder for file transfer operations.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize metric descriptions (call once at startup).
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    describe_counter!("filemesh_chunks_sent_total", "Total number of chunks sent");
    describe_counter!("filemesh_chunks_received_total", "Total number of chunks received");
    describe_counter!("filemesh_bytes_sent_total", "Total bytes sent");
    describe_counter!("filemesh_bytes_received_total", "Total bytes received");

    describe_counter!("filemesh_transfers_started_total", "Total number of transfers started");
    describe_counter!(
        "filemesh_transfers_completed_total",
        "Total number of transfers completed successfully"
    );
    describe_counter!("filemesh_transfers_failed_total", "Total number of transfers that failed");

    describe_gauge!("filemesh_active_transfers", "Number of currently active transfers");
    describe_gauge!("filemesh_store_bytes_used", "Current chunk store usage in bytes");

    describe_histogram!(
        "filemesh_chunk_transfer_duration_seconds",
        "Time to persist and acknowledge a single chunk"
    );
    describe_histogram!("filemesh_transfer_duration_seconds", "Total transfer duration");
    describe_histogram!(
        "filemesh_throughput_bytes_per_second",
        "Transfer throughput in bytes per second"
    );
}

// ============== Chunk Operations ==============

pub fn record_chunk_sent(file_id: &str, chunk_size: usize) {
    counter!("filemesh_chunks_sent_total", "file_id" => file_id.to_string()).increment(1);
    counter!("filemesh_bytes_sent_total", "file_id" => file_id.to_string()).increment(chunk_size as u64);
}

pub fn record_chunk_received(file_id: &str, chunk_size: usize) {
    counter!("filemesh_chunks_received_total", "file_id" => file_id.to_string()).increment(1);
    counter!("filemesh_bytes_received_total", "file_id" => file_id.to_string())
        .increment(chunk_size as u64);
}

pub fn record_chunk_duration(duration: Duration) {
    histogram!("filemesh_chunk_transfer_duration_seconds").record(duration.as_secs_f64());
}

// ============== Transfer Operations ==============

pub fn record_transfer_started(file_id: &str) {
    counter!("filemesh_transfers_started_total", "file_id" => file_id.to_string()).increment(1);
    gauge!("filemesh_active_transfers").increment(1.0);
}

pub fn record_transfer_complete(file_id: &str, duration: Duration, bytes_transferred: u64) {
    counter!("filemesh_transfers_completed_total", "file_id" => file_id.to_string()).increment(1);
    gauge!("filemesh_active_transfers").decrement(1.0);

    histogram!("filemesh_transfer_duration_seconds").record(duration.as_secs_f64());

    let throughput = if duration.as_secs_f64() > 0.0 {
        bytes_transferred as f64 / duration.as_secs_f64()
    } else {
        0.0
    };
    histogram!("filemesh_throughput_bytes_per_second").record(throughput);
}

pub fn record_transfer_failed(file_id: &str, reason: &str) {
    counter!("filemesh_transfers_failed_total", "file_id" => file_id.to_string(), "reason" => reason.to_string())
        .increment(1);
    gauge!("filemesh_active_transfers").decrement(1.0);
}

// ============== Storage Metrics ==============

pub fn set_store_bytes_used(bytes: u64) {
    gauge!("filemesh_store_bytes_used").set(bytes as f64);
}

/// Tracks one transfer's wall-clock duration and bytes moved, and records
/// the completion/failure metrics when dropped via `complete`/`fail`.
pub struct TransferMetrics {
    file_id: String,
    start_time: Instant,
    bytes_transferred: u64,
}

impl TransferMetrics {
    pub fn start(file_id: impl Into<String>) -> Self {
        let id = file_id.into();
        record_transfer_started(&id);
        Self {
            file_id: id,
            start_time: Instant::now(),
            bytes_transferred: 0,
        }
    }

    pub fn add_bytes(&mut self, bytes: u64) {
        self.bytes_transferred += bytes;
    }

    pub fn complete(self) {
        let duration = self.start_time.elapsed();
        record_transfer_complete(&self.file_id, duration, self.bytes_transferred);
    }

    pub fn fail(self, reason: &str) {
        record_transfer_failed(&self.file_id, reason);
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn throughput(&self) -> f64 {
        let secs = self.start_time.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.bytes_transferred as f64 / secs
        } else {
            0.0
        }
    }
}

pub struct ChunkTimer {
    start_time: Instant,
}

impl ChunkTimer {
    pub fn start() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    pub fn stop(self) {
        record_chunk_duration(self.start_time.elapsed());
    }
}
