// Prometheus metrics for scan execution
//
// Exposed on the HTTP API's /metrics endpoint:
// - Scans run, by tool and outcome (counter)
// - Scan wall-clock duration (histogram)
// - Scans stopped by their timeout (counter)

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use crate::tools::{ExecutionResult, ToolKind};

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    pub static ref SCANS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("kalidocker_scans_total", "Total number of tool runs"),
        &["tool", "status"]
    ).expect("Failed to create scans total metric");

    pub static ref SCAN_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("kalidocker_scan_duration_seconds", "Tool run duration in seconds")
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["tool"]
    ).expect("Failed to create scan duration metric");

    pub static ref SCAN_TIMEOUTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("kalidocker_scan_timeouts_total", "Total number of tool runs stopped by their timeout"),
        &["tool"]
    ).expect("Failed to create scan timeouts metric");
}

/// Register every metric with [`REGISTRY`]
///
/// Safe to call more than once; already-registered collectors are skipped.
pub fn init() -> prometheus::Result<()> {
    for collector in [
        Box::new(SCANS_TOTAL.clone()) as Box<dyn prometheus::core::Collector>,
        Box::new(SCAN_DURATION_SECONDS.clone()),
        Box::new(SCAN_TIMEOUTS_TOTAL.clone()),
    ] {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Record the outcome of one tool run
pub fn record_scan(tool: ToolKind, result: &ExecutionResult) {
    let status = if result.timed_out {
        "timeout"
    } else if result.success {
        "success"
    } else {
        "failure"
    };

    SCANS_TOTAL
        .with_label_values(&[tool.binary(), status])
        .inc();
    SCAN_DURATION_SECONDS
        .with_label_values(&[tool.binary()])
        .observe(result.duration_ms as f64 / 1000.0);
    if result.timed_out {
        SCAN_TIMEOUTS_TOTAL.with_label_values(&[tool.binary()]).inc();
    }
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}
