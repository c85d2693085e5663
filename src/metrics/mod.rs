//! Metrics and observability module.
//!
//! Exposes Prometheus-compatible counters/gauges/histograms for chunk and
//! transfer lifecycle events, off by default and enabled by supplying a
//! listen address to `start_metrics_server`.

pub mod exporter;
pub mod recorder;

pub use exporter::{start_metrics_server, MetricsConfig};
pub use recorder::{
    record_chunk_received, record_chunk_sent, record_transfer_complete, record_transfer_failed,
    record_transfer_started, set_store_bytes_used, ChunkTimer, TransferMetrics,
};
