use prometheus::{
    Counter, Histogram, Registry, Opts, HistogramOpts,
    register_counter_with_registry, register_histogram_with_registry,
    Encoder, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;
use crate::Result;

/// Prometheus observations of the sends a template performs.
#[derive(Clone)]
pub struct TemplateMetrics {
    registry: Arc<Registry>,

    pub sends: Counter,
    pub send_errors: Counter,
    pub send_duration: Histogram,
    pub flushes: Counter,
}

impl TemplateMetrics {
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let sends = register_counter_with_registry!(
            Opts::new("kafka_template_sends_total", "Total number of records resolved by the broker client"),
            registry
        )?;

        let send_errors = register_counter_with_registry!(
            Opts::new("kafka_template_send_errors_total", "Total number of records that failed to send"),
            registry
        )?;

        let send_duration = register_histogram_with_registry!(
            HistogramOpts::new("kafka_template_send_duration_seconds", "Time from send to delivery outcome")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            registry
        )?;

        let flushes = register_counter_with_registry!(
            Opts::new("kafka_template_flushes_total", "Total number of explicit flushes"),
            registry
        )?;

        Ok(Self {
            registry,
            sends,
            send_errors,
            send_duration,
            flushes,
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Export metrics in Prometheus format
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn record_send(&self, duration: Duration, success: bool) {
        self.sends.inc();
        self.send_duration.observe(duration.as_secs_f64());
        if !success {
            self.send_errors.inc();
        }
    }

    pub fn record_flush(&self) {
        self.flushes.inc();
    }
}
