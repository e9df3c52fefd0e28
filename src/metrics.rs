//! Prometheus-style metrics registry.
//!
//! Tracks categorization job throughput, search latency, bulk-mutation
//! outcomes, and cache hit rate across all tenants sharing this process.
//!
//! # Example
//!
//! ```rust,no_run
//! use mailindex::metrics::{MetricsRegistry, track_search};
//!
//! # async fn example() {
//! let registry = MetricsRegistry::new();
//! registry.record_search("advanced", 10, 45).await;
//! let metrics = registry.export_prometheus().await;
//! println!("{}", metrics);
//! # }
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

// ============================================================================
// Metrics Registry
// ============================================================================

/// Main metrics registry
pub struct MetricsRegistry {
    counters: Arc<RwLock<HashMap<String, Counter>>>,
    gauges: Arc<RwLock<HashMap<String, Gauge>>>,
    histograms: Arc<RwLock<HashMap<String, Histogram>>>,
    start_time: Instant,
}

impl MetricsRegistry {
    /// Create a new metrics registry
    pub fn new() -> Self {
        Self {
            counters: Arc::new(RwLock::new(HashMap::new())),
            gauges: Arc::new(RwLock::new(HashMap::new())),
            histograms: Arc::new(RwLock::new(HashMap::new())),
            start_time: Instant::now(),
        }
    }

    /// Increment a counter
    pub async fn increment_counter(&self, name: &str, labels: HashMap<String, String>) {
        let mut counters = self.counters.write().await;
        let key = Self::metric_key(name, &labels);
        counters
            .entry(key)
            .or_insert_with(|| Counter::new(name.to_string(), labels))
            .increment();
    }

    /// Set a gauge value
    pub async fn set_gauge(&self, name: &str, value: f64, labels: HashMap<String, String>) {
        let mut gauges = self.gauges.write().await;
        let key = Self::metric_key(name, &labels);
        gauges
            .entry(key)
            .or_insert_with(|| Gauge::new(name.to_string(), labels))
            .set(value);
    }

    /// Observe a histogram value
    pub async fn observe_histogram(&self, name: &str, value: f64, labels: HashMap<String, String>) {
        let mut histograms = self.histograms.write().await;
        let key = Self::metric_key(name, &labels);
        histograms
            .entry(key)
            .or_insert_with(|| Histogram::new(name.to_string(), labels))
            .observe(value);
    }

    /// Record search metrics
    pub async fn record_search(&self, search_type: &str, results_count: usize, duration_ms: u64) {
        let mut labels = HashMap::new();
        labels.insert("search_type".to_string(), search_type.to_string());

        self.increment_counter("search_requests_total", labels.clone())
            .await;

        self.set_gauge("search_results_count", results_count as f64, labels.clone())
            .await;

        self.observe_histogram("search_duration_ms", duration_ms as f64, labels)
            .await;
    }

    /// Record a categorization job's outcome.
    pub async fn record_categorization_job(&self, emails_processed: usize, duration_ms: u64, success: bool) {
        let mut labels = HashMap::new();
        labels.insert(
            "status".to_string(),
            if success { "success" } else { "failed" }.to_string(),
        );

        self.increment_counter("categorization_jobs_total", labels.clone())
            .await;

        self.set_gauge("categorization_emails_count", emails_processed as f64, labels.clone())
            .await;

        self.observe_histogram("categorization_duration_ms", duration_ms as f64, labels)
            .await;
    }

    /// Record cache metrics
    pub async fn record_cache_hit(&self, cache_type: &str) {
        let mut labels = HashMap::new();
        labels.insert("cache_type".to_string(), cache_type.to_string());
        labels.insert("result".to_string(), "hit".to_string());

        self.increment_counter("cache_requests_total", labels).await;
    }

    pub async fn record_cache_miss(&self, cache_type: &str) {
        let mut labels = HashMap::new();
        labels.insert("cache_type".to_string(), cache_type.to_string());
        labels.insert("result".to_string(), "miss".to_string());

        self.increment_counter("cache_requests_total", labels).await;
    }

    /// Record a bulk-mutation call (delete/restore/archive).
    pub async fn record_bulk_mutation(&self, operation: &str, batch_count: usize, failed_batches: usize) {
        let mut labels = HashMap::new();
        labels.insert("operation".to_string(), operation.to_string());

        self.increment_counter("bulk_mutation_calls_total", labels.clone())
            .await;
        self.set_gauge("bulk_mutation_batches", batch_count as f64, labels.clone())
            .await;
        self.set_gauge("bulk_mutation_failed_batches", failed_batches as f64, labels)
            .await;
    }

    /// Get system uptime in seconds
    pub fn uptime_seconds(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    /// Export metrics in Prometheus format
    pub async fn export_prometheus(&self) -> String {
        let mut output = String::new();

        // System uptime
        output.push_str(&format!(
            "# HELP process_uptime_seconds Time since server started\n\
             # TYPE process_uptime_seconds gauge\n\
             process_uptime_seconds {}\n\n",
            self.uptime_seconds()
        ));

        // Export counters
        let counters = self.counters.read().await;
        for counter in counters.values() {
            output.push_str(&counter.export_prometheus());
        }

        // Export gauges
        let gauges = self.gauges.read().await;
        for gauge in gauges.values() {
            output.push_str(&gauge.export_prometheus());
        }

        // Export histograms
        let histograms = self.histograms.read().await;
        for histogram in histograms.values() {
            output.push_str(&histogram.export_prometheus());
        }

        output
    }

    /// Export metrics as JSON
    pub async fn export_json(&self) -> serde_json::Value {
        let counters = self.counters.read().await;
        let gauges = self.gauges.read().await;
        let histograms = self.histograms.read().await;

        serde_json::json!({
            "uptime_seconds": self.uptime_seconds(),
            "timestamp": Utc::now().to_rfc3339(),
            "counters": counters.values().collect::<Vec<_>>(),
            "gauges": gauges.values().collect::<Vec<_>>(),
            "histograms": histograms.values().map(|h| h.to_summary()).collect::<Vec<_>>(),
        })
    }

    /// Get metric statistics
    pub async fn get_stats(&self) -> MetricsStats {
        let counters = self.counters.read().await;
        let gauges = self.gauges.read().await;
        let histograms = self.histograms.read().await;

        MetricsStats {
            total_counters: counters.len(),
            total_gauges: gauges.len(),
            total_histograms: histograms.len(),
            uptime_seconds: self.uptime_seconds(),
        }
    }

    /// Reset all metrics
    pub async fn reset(&self) {
        self.counters.write().await.clear();
        self.gauges.write().await.clear();
        self.histograms.write().await.clear();
    }

    fn metric_key(name: &str, labels: &HashMap<String, String>) -> String {
        let mut label_pairs: Vec<_> = labels.iter().collect();
        label_pairs.sort_by_key(|(k, _)| *k);

        let label_str = label_pairs
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, v))
            .collect::<Vec<_>>()
            .join(",");

        format!("{}:{}", name, label_str)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Metric Types
// ============================================================================

/// Counter metric (monotonically increasing)
#[derive(Debug, Clone, Serialize)]
pub struct Counter {
    name: String,
    labels: HashMap<String, String>,
    value: u64,
}

impl Counter {
    fn new(name: String, labels: HashMap<String, String>) -> Self {
        Self {
            name,
            labels,
            value: 0,
        }
    }

    fn increment(&mut self) {
        self.value += 1;
    }

    fn export_prometheus(&self) -> String {
        let labels = self.format_labels();
        format!(
            "# TYPE {} counter\n{}{} {}\n\n",
            self.name, self.name, labels, self.value
        )
    }

    fn format_labels(&self) -> String {
        if self.labels.is_empty() {
            String::new()
        } else {
            let mut pairs: Vec<_> = self.labels.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let formatted = pairs
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, v))
                .collect::<Vec<_>>()
                .join(",");
            format!("{{{}}}", formatted)
        }
    }
}

/// Gauge metric (can go up or down)
#[derive(Debug, Clone, Serialize)]
pub struct Gauge {
    name: String,
    labels: HashMap<String, String>,
    value: f64,
}

impl Gauge {
    fn new(name: String, labels: HashMap<String, String>) -> Self {
        Self {
            name,
            labels,
            value: 0.0,
        }
    }

    fn set(&mut self, value: f64) {
        self.value = value;
    }

    fn export_prometheus(&self) -> String {
        let labels = self.format_labels();
        format!(
            "# TYPE {} gauge\n{}{} {}\n\n",
            self.name, self.name, labels, self.value
        )
    }

    fn format_labels(&self) -> String {
        if self.labels.is_empty() {
            String::new()
        } else {
            let mut pairs: Vec<_> = self.labels.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let formatted = pairs
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, v))
                .collect::<Vec<_>>()
                .join(",");
            format!("{{{}}}", formatted)
        }
    }
}

/// Histogram metric (distribution of values)
#[derive(Debug, Clone)]
pub struct Histogram {
    name: String,
    labels: HashMap<String, String>,
    values: Vec<f64>,
    sum: f64,
    count: u64,
}

impl Histogram {
    fn new(name: String, labels: HashMap<String, String>) -> Self {
        Self {
            name,
            labels,
            values: Vec::new(),
            sum: 0.0,
            count: 0,
        }
    }

    fn observe(&mut self, value: f64) {
        self.values.push(value);
        self.sum += value;
        self.count += 1;
    }

    fn quantile(&self, q: f64) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }

        let mut sorted = self.values.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let index = ((sorted.len() - 1) as f64 * q).round() as usize;
        sorted[index]
    }

    fn export_prometheus(&self) -> String {
        let labels = self.format_labels();
        let mut output = format!("# TYPE {} histogram\n", self.name);

        // Export quantiles
        for q in &[0.5, 0.9, 0.95, 0.99] {
            let quantile_labels = self.format_quantile_labels(*q);
            output.push_str(&format!(
                "{}{} {}\n",
                self.name,
                quantile_labels,
                self.quantile(*q)
            ));
        }

        // Export sum and count
        output.push_str(&format!("{}_sum{} {}\n", self.name, labels, self.sum));
        output.push_str(&format!("{}_count{} {}\n\n", self.name, labels, self.count));

        output
    }

    fn format_labels(&self) -> String {
        if self.labels.is_empty() {
            String::new()
        } else {
            let mut pairs: Vec<_> = self.labels.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let formatted = pairs
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, v))
                .collect::<Vec<_>>()
                .join(",");
            format!("{{{}}}", formatted)
        }
    }

    fn format_quantile_labels(&self, quantile: f64) -> String {
        let mut labels = self.labels.clone();
        labels.insert("quantile".to_string(), quantile.to_string());

        let mut pairs: Vec<_> = labels.iter().collect();
        pairs.sort_by_key(|(k, _)| *k);
        let formatted = pairs
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, v))
            .collect::<Vec<_>>()
            .join(",");
        format!("{{{}}}", formatted)
    }

    fn to_summary(&self) -> HistogramSummary {
        HistogramSummary {
            name: self.name.clone(),
            labels: self.labels.clone(),
            count: self.count,
            sum: self.sum,
            avg: if self.count > 0 {
                self.sum / self.count as f64
            } else {
                0.0
            },
            p50: self.quantile(0.5),
            p90: self.quantile(0.9),
            p95: self.quantile(0.95),
            p99: self.quantile(0.99),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistogramSummary {
    name: String,
    labels: HashMap<String, String>,
    count: u64,
    sum: f64,
    avg: f64,
    p50: f64,
    p90: f64,
    p95: f64,
    p99: f64,
}

// ============================================================================
// Metrics Statistics
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct MetricsStats {
    pub total_counters: usize,
    pub total_gauges: usize,
    pub total_histograms: usize,
    pub uptime_seconds: f64,
}

// ============================================================================
// Global Registry
// ============================================================================

use once_cell::sync::Lazy;

static GLOBAL_REGISTRY: Lazy<Arc<MetricsRegistry>> = Lazy::new(|| Arc::new(MetricsRegistry::new()));

/// Get the global metrics registry
pub fn global_registry() -> Arc<MetricsRegistry> {
    Arc::clone(&GLOBAL_REGISTRY)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Track a search request
pub async fn track_search(search_type: &str, results_count: usize, duration_ms: u64) {
    global_registry()
        .record_search(search_type, results_count, duration_ms)
        .await;
}

/// Track a categorization job
pub async fn track_categorization_job(emails_processed: usize, duration_ms: u64, success: bool) {
    global_registry()
        .record_categorization_job(emails_processed, duration_ms, success)
        .await;
}

/// Track cache hit
pub async fn track_cache_hit(cache_type: &str) {
    global_registry().record_cache_hit(cache_type).await;
}

/// Track cache miss
pub async fn track_cache_miss(cache_type: &str) {
    global_registry().record_cache_miss(cache_type).await;
}

/// Track a bulk-mutation call (delete/restore/archive)
pub async fn track_bulk_mutation(operation: &str, batch_count: usize, failed_batches: usize) {
    global_registry()
        .record_bulk_mutation(operation, batch_count, failed_batches)
        .await;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counter() {
        let registry = MetricsRegistry::new();
        let mut labels = HashMap::new();
        labels.insert("test".to_string(), "value".to_string());

        registry
            .increment_counter("test_counter", labels.clone())
            .await;
        registry
            .increment_counter("test_counter", labels.clone())
            .await;

        let export = registry.export_prometheus().await;
        assert!(export.contains("test_counter"));
        assert!(export.contains("2"));
    }

    #[tokio::test]
    async fn test_gauge() {
        let registry = MetricsRegistry::new();
        let mut labels = HashMap::new();
        labels.insert("test".to_string(), "value".to_string());

        registry.set_gauge("test_gauge", 42.5, labels).await;

        let export = registry.export_prometheus().await;
        assert!(export.contains("test_gauge"));
        assert!(export.contains("42.5"));
    }

    #[tokio::test]
    async fn test_histogram() {
        let registry = MetricsRegistry::new();
        let mut labels = HashMap::new();
        labels.insert("test".to_string(), "value".to_string());

        registry
            .observe_histogram("test_histogram", 10.0, labels.clone())
            .await;
        registry
            .observe_histogram("test_histogram", 20.0, labels.clone())
            .await;
        registry
            .observe_histogram("test_histogram", 30.0, labels)
            .await;

        let export = registry.export_prometheus().await;
        assert!(export.contains("test_histogram"));
        assert!(export.contains("_sum"));
        assert!(export.contains("_count"));
    }

    #[tokio::test]
    async fn test_bulk_mutation_metrics() {
        let registry = MetricsRegistry::new();
        registry.record_bulk_mutation("delete", 3, 1).await;

        let export = registry.export_prometheus().await;
        assert!(export.contains("bulk_mutation_calls_total"));
        assert!(export.contains("bulk_mutation_batches"));
        assert!(export.contains("bulk_mutation_failed_batches"));
    }

    #[test]
    fn test_histogram_quantiles() {
        let mut histogram = Histogram::new("test".to_string(), HashMap::new());

        for i in 1..=100 {
            histogram.observe(i as f64);
        }

        assert_eq!(histogram.quantile(0.5), 50.0);
        assert!(histogram.quantile(0.9) >= 90.0);
        assert!(histogram.quantile(0.99) >= 99.0);
    }

    #[tokio::test]
    async fn test_json_export() {
        let registry = MetricsRegistry::new();
        let mut labels = HashMap::new();
        labels.insert("test".to_string(), "value".to_string());

        registry
            .increment_counter("test_counter", labels.clone())
            .await;
        registry.set_gauge("test_gauge", 42.0, labels).await;

        let json = registry.export_json().await;
        assert!(json["counters"].is_array());
        assert!(json["gauges"].is_array());
        assert!(json["uptime_seconds"].is_number());
    }
}
