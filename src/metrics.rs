//! Prometheus metrics for the petitions exporter
//!
//! This module provides metrics instrumentation for tracking:
//! - Signature counts per open petition (gauge)
//! - Fetcher failures per upstream base URL (counter)
//! - Fetch cycle latency per upstream base URL (histogram)
//! - HTTP requests served by the exporter itself
//! - Process CPU, memory and file descriptor usage (Linux)
//!
//! Metrics are exposed via the `/metrics` endpoint in Prometheus text format.
//! A `Metrics` value owns its own registry; nothing is registered globally,
//! so tests can build isolated instances.

use crate::petitions::Petition;
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Metric name of the per-petition signature gauge
pub const SIGNATURES_METRIC: &str = "petitions_signatures";

/// Metric name of the fetcher failure counter
pub const FETCHER_ERRORS_METRIC: &str = "petitions_fetcher_errors_total";

/// Metric name of the fetch latency histogram
pub const FETCHER_FETCHES_METRIC: &str = "petitions_fetcher_fetches";

const SIGNATURE_LABELS: [&str; 5] = ["url", "id", "action", "opened_at", "petition_url"];

/// Label set identifying one `petitions_signatures` series
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureLabels {
    url: String,
    id: String,
    action: String,
    opened_at: String,
    petition_url: String,
}

impl SignatureLabels {
    /// Labels for `petition` as fetched from `base_url`
    pub fn new(base_url: &str, petition: &Petition) -> Self {
        Self {
            url: base_url.to_string(),
            id: petition.id().to_string(),
            action: petition.action().to_string(),
            opened_at: petition.opened_at_label(),
            petition_url: petition.url().to_string(),
        }
    }

    /// Label values in registration order
    fn values(&self) -> [&str; 5] {
        [
            &self.url,
            &self.id,
            &self.action,
            &self.opened_at,
            &self.petition_url,
        ]
    }
}

/// Metrics collector for the petitions exporter
///
/// Cheap to clone; all clones share the same registry and collectors.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    signatures: GaugeVec,
    fetcher_errors: CounterVec,
    fetches: HistogramVec,
    http_requests: IntCounterVec,
    http_request_duration: HistogramVec,
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// Registers all metrics with a new Prometheus registry.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Gauge: latest signature count per petition
        //
        // Cardinality grows with the number of petitions ever seen unless
        // stale label sets are retracted by the fetcher.
        let signatures = GaugeVec::new(
            Opts::new(SIGNATURES_METRIC, "Number of signatures for a petition"),
            &SIGNATURE_LABELS,
        )?;

        let fetcher_errors = CounterVec::new(
            Opts::new(
                FETCHER_ERRORS_METRIC,
                "Number of errors encountered by the petitions fetcher",
            ),
            &["url"],
        )?;

        // Histogram: whole fetch cycle latency in seconds, default buckets
        let fetches = HistogramVec::new(
            HistogramOpts::new(
                FETCHER_FETCHES_METRIC,
                "Number of fetches performed by the petitions fetcher",
            ),
            &["url"],
        )?;

        // Counter: HTTP requests served, by route template (not raw URI) to
        // keep cardinality bounded
        let http_requests = IntCounterVec::new(
            Opts::new(
                "petitions_exporter_http_requests_total",
                "Total number of HTTP requests served by the exporter",
            ),
            &["method", "path", "status"],
        )?;

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "petitions_exporter_http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["method", "path"],
        )?;

        registry.register(Box::new(signatures.clone()))?;
        registry.register(Box::new(fetcher_errors.clone()))?;
        registry.register(Box::new(fetches.clone()))?;
        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;

        // process_* metrics: CPU, memory, open fds, start time
        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry: Arc::new(registry),
            signatures,
            fetcher_errors,
            fetches,
            http_requests,
            http_request_duration,
        })
    }

    /// Overwrite the signature gauge for one petition
    ///
    /// Returns the label set that was written so callers can track which
    /// series they published.
    pub fn set_signatures(&self, base_url: &str, petition: &Petition) -> SignatureLabels {
        let labels = SignatureLabels::new(base_url, petition);
        self.signatures
            .with_label_values(&labels.values())
            .set(petition.signature_count() as f64);
        labels
    }

    /// Current value of a signature series
    ///
    /// Test support only: reading an absent series creates it at 0, which
    /// would then be scraped. The fetcher never calls this.
    pub fn signatures(&self, labels: &SignatureLabels) -> f64 {
        self.signatures.with_label_values(&labels.values()).get()
    }

    /// Remove a signature series
    ///
    /// Returns `false` if the series did not exist.
    pub fn remove_signatures(&self, labels: &SignatureLabels) -> bool {
        self.signatures.remove_label_values(&labels.values()).is_ok()
    }

    /// Record one failed fetch cycle against `base_url`
    pub fn fetch_error(&self, base_url: &str) {
        self.fetcher_errors.with_label_values(&[base_url]).inc();
    }

    /// Total failed fetch cycles recorded against `base_url`
    pub fn fetch_errors_count(&self, base_url: &str) -> u64 {
        self.fetcher_errors.with_label_values(&[base_url]).get() as u64
    }

    /// Record the duration of one fetch cycle, successful or not
    ///
    /// # Errors
    ///
    /// Returns an error if `seconds` is NaN, infinite, or negative. Such
    /// values would corrupt every percentile computed from the histogram.
    pub fn observe_fetch(&self, base_url: &str, seconds: f64) -> Result<(), prometheus::Error> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(prometheus::Error::Msg(format!(
                "Fetch duration must be finite and non-negative, got: {}",
                seconds
            )));
        }

        self.fetches
            .get_metric_with_label_values(&[base_url])?
            .observe(seconds);
        Ok(())
    }

    /// Number of fetch cycles observed against `base_url`
    pub fn fetch_count(&self, base_url: &str) -> u64 {
        self.fetches
            .with_label_values(&[base_url])
            .get_sample_count()
    }

    /// Record one HTTP request served by the exporter
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, seconds: f64) {
        let status = status.to_string();
        self.http_requests
            .with_label_values(&[method, path, status.as_str()])
            .inc();

        if seconds.is_finite() && seconds >= 0.0 {
            self.http_request_duration
                .with_label_values(&[method, path])
                .observe(seconds);
        }
    }

    /// Number of HTTP requests served for a method, path and status
    pub fn http_requests_count(&self, method: &str, path: &str, status: u16) -> u64 {
        let status = status.to_string();
        self.http_requests
            .with_label_values(&[method, path, status.as_str()])
            .get()
    }

    /// Gather all metrics and encode them in Prometheus text format
    ///
    /// # Errors
    ///
    /// Returns an error if metric encoding fails.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();

        tracing::debug!(
            metric_family_count = metric_families.len(),
            "Encoding metrics to Prometheus text format"
        );

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| {
            tracing::error!(
                invalid_byte_index = e.utf8_error().valid_up_to(),
                "Prometheus encoder produced invalid UTF-8"
            );
            prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn petition(id: i64, action: &str, signatures: u64) -> Petition {
        Petition::new(
            id,
            action,
            signatures,
            DateTime::parse_from_rfc3339("2020-07-04T13:40:09.021Z").unwrap(),
            format!("http://localhost/petitions/{}", id),
        )
    }

    #[test]
    fn test_metrics_new_creates_registry() {
        let metrics = Metrics::new().expect("Failed to create metrics");

        metrics.set_signatures("http://localhost", &petition(1, "start a thing", 123));
        metrics.fetch_error("http://localhost");
        metrics
            .observe_fetch("http://localhost", 0.25)
            .expect("Test operation should succeed");

        let output = metrics.gather().unwrap();
        assert!(output.contains("# TYPE petitions_signatures gauge"));
        assert!(output.contains("# TYPE petitions_fetcher_errors_total counter"));
        assert!(output.contains("# TYPE petitions_fetcher_fetches histogram"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_gather_includes_process_metrics() {
        let metrics = Metrics::new().unwrap();
        let output = metrics.gather().unwrap();
        assert!(output.contains("process_resident_memory_bytes"));
        assert!(output.contains("process_start_time_seconds"));
    }

    #[test]
    fn test_set_signatures_overwrites_rather_than_accumulates() {
        let metrics = Metrics::new().unwrap();

        let labels = metrics.set_signatures("http://localhost", &petition(3, "change a thing", 789));
        assert_eq!(metrics.signatures(&labels), 789.0);

        metrics.set_signatures("http://localhost", &petition(3, "change a thing", 800));
        assert_eq!(metrics.signatures(&labels), 800.0);
    }

    #[test]
    fn test_signature_labels_use_petition_fields() {
        let labels = SignatureLabels::new("http://localhost", &petition(3, "change a thing", 789));
        assert_eq!(
            labels.values(),
            [
                "http://localhost",
                "3",
                "change a thing",
                "2020-07-04T13:40:09Z",
                "http://localhost/petitions/3",
            ]
        );
    }

    #[test]
    fn test_remove_signatures_drops_series() {
        let metrics = Metrics::new().unwrap();
        let labels = metrics.set_signatures("http://localhost", &petition(1, "a", 5));

        assert!(metrics.remove_signatures(&labels));
        assert!(!metrics.remove_signatures(&labels));
        assert!(!metrics.gather().unwrap().contains("petitions_signatures{"));
    }

    #[test]
    fn test_fetch_error_increments_per_url() {
        let metrics = Metrics::new().unwrap();

        metrics.fetch_error("http://a");
        metrics.fetch_error("http://a");
        metrics.fetch_error("http://b");

        assert_eq!(metrics.fetch_errors_count("http://a"), 2);
        assert_eq!(metrics.fetch_errors_count("http://b"), 1);
    }

    #[test]
    fn test_observe_fetch_counts_samples() {
        let metrics = Metrics::new().unwrap();

        metrics.observe_fetch("http://a", 0.0).unwrap();
        metrics.observe_fetch("http://a", 1.5).unwrap();

        assert_eq!(metrics.fetch_count("http://a"), 2);
    }

    #[test]
    fn test_observe_fetch_rejects_invalid_durations() {
        let metrics = Metrics::new().unwrap();

        assert!(metrics.observe_fetch("http://a", f64::NAN).is_err());
        assert!(metrics.observe_fetch("http://a", f64::INFINITY).is_err());
        assert!(metrics.observe_fetch("http://a", -1.0).is_err());
        assert_eq!(metrics.fetch_count("http://a"), 0);
    }

    #[test]
    fn test_gather_produces_prometheus_text_format() {
        let metrics = Metrics::new().unwrap();
        metrics.set_signatures("http://localhost", &petition(3, "change a thing", 789));

        let output = metrics.gather().unwrap();

        assert!(output.contains("# HELP petitions_signatures"));
        assert!(output.contains("# TYPE petitions_signatures gauge"));
        assert!(output.contains(r#"action="change a thing""#));
        assert!(output.contains(r#"petition_url="http://localhost/petitions/3""#));
    }

    #[test]
    fn test_gather_escapes_quotes_in_action_labels() {
        let metrics = Metrics::new().unwrap();
        metrics.set_signatures("http://localhost", &petition(9, r#"ban "things""#, 1));

        let output = metrics.gather().unwrap();
        assert!(output.contains(r#"action="ban \"things\"""#));
    }

    #[test]
    fn test_record_http_request() {
        let metrics = Metrics::new().unwrap();

        metrics.record_http_request("GET", "/metrics", 200, 0.002);
        metrics.record_http_request("GET", "/metrics", 200, f64::NAN);

        assert_eq!(metrics.http_requests_count("GET", "/metrics", 200), 2);
        assert_eq!(metrics.http_requests_count("GET", "/health", 200), 0);
    }

    #[test]
    fn test_metrics_is_clonable() {
        let metrics = Metrics::new().unwrap();
        let clone = metrics.clone();

        clone.fetch_error("http://a");
        assert_eq!(metrics.fetch_errors_count("http://a"), 1);
    }

    #[test]
    fn test_isolated_registries_do_not_share_state() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();

        first.fetch_error("http://a");
        assert_eq!(second.fetch_errors_count("http://a"), 0);
    }

    #[test]
    fn test_concurrent_metric_recording() {
        use std::thread;

        let metrics = Metrics::new().unwrap();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let metrics = metrics.clone();
                thread::spawn(move || {
                    for j in 0..100 {
                        metrics.fetch_error("http://a");
                        metrics.set_signatures("http://a", &petition(i, "x", j));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("thread should not panic");
        }

        assert_eq!(metrics.fetch_errors_count("http://a"), 800);
    }
}
