//! Metrics collection and export for object pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metrics snapshot for a pool
///
/// # Examples
///
/// ```
/// use elastic_pool::{Pool, PoolConfig};
///
/// let pool = Pool::with_config("numbers", PoolConfig::new().with_max_pool_size(3).with_min_pool_size(0));
/// pool.initialize(|| Ok(7u32)).unwrap();
/// pool.warmup().unwrap();
///
/// pool.execute(|n| Ok(*n + 1)).unwrap();
///
/// let metrics = pool.get_metrics();
/// assert_eq!(metrics.total_borrowed, 1);
/// assert_eq!(metrics.total_returned, 1);
/// assert_eq!(metrics.on_loan_instances, 0);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Total instances checked out
    pub total_borrowed: usize,

    /// Total instances checked back in
    pub total_returned: usize,

    /// Instances created by growth
    pub instances_created: usize,

    /// Factory calls that failed
    pub creation_failures: usize,

    /// Instances retired by the reaper
    pub instances_evicted: usize,

    /// Destroy hook calls that failed
    pub destroy_failures: usize,

    /// Borrows that gave up waiting
    pub borrow_timeouts: usize,

    /// Current on-loan instances
    pub on_loan_instances: usize,

    /// Current available instances
    pub available_instances: usize,

    /// Pool utilization ratio (0.0 to 1.0)
    pub utilization: f64,

    /// Configured ceiling
    pub max_capacity: usize,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_borrowed".to_string(), self.total_borrowed.to_string());
        metrics.insert("total_returned".to_string(), self.total_returned.to_string());
        metrics.insert("instances_created".to_string(), self.instances_created.to_string());
        metrics.insert("creation_failures".to_string(), self.creation_failures.to_string());
        metrics.insert("instances_evicted".to_string(), self.instances_evicted.to_string());
        metrics.insert("destroy_failures".to_string(), self.destroy_failures.to_string());
        metrics.insert("borrow_timeouts".to_string(), self.borrow_timeouts.to_string());
        metrics.insert("on_loan_instances".to_string(), self.on_loan_instances.to_string());
        metrics.insert("available_instances".to_string(), self.available_instances.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics.insert("max_capacity".to_string(), self.max_capacity.to_string());
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use elastic_pool::{Pool, PoolConfig};
    /// use std::collections::HashMap;
    ///
    /// let pool = Pool::with_config("db", PoolConfig::new().with_max_pool_size(2).with_min_pool_size(0));
    /// pool.initialize(|| Ok(())).unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("db", Some(&tags));
    /// assert!(output.contains("elasticpool_instances_on_loan"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let labels = Self::format_labels(pool_name, tags);
        let mut output = String::new();

        let gauges: [(&str, &str, String); 3] = [
            ("elasticpool_instances_on_loan", "Current on-loan instances", metrics.on_loan_instances.to_string()),
            ("elasticpool_instances_available", "Current available instances", metrics.available_instances.to_string()),
            ("elasticpool_utilization", "Pool utilization ratio", format!("{:.2}", metrics.utilization)),
        ];
        for (name, help, value) in gauges {
            Self::push_metric(&mut output, name, help, "gauge", &labels, &value);
        }

        let counters = [
            ("elasticpool_borrowed_total", "Total instances borrowed", metrics.total_borrowed),
            ("elasticpool_returned_total", "Total instances returned", metrics.total_returned),
            ("elasticpool_created_total", "Instances created by growth", metrics.instances_created),
            ("elasticpool_creation_failures_total", "Failed instance creations", metrics.creation_failures),
            ("elasticpool_evicted_total", "Instances retired by the reaper", metrics.instances_evicted),
            ("elasticpool_destroy_failures_total", "Failed destroy hooks", metrics.destroy_failures),
            ("elasticpool_borrow_timeouts_total", "Borrows that timed out", metrics.borrow_timeouts),
        ];
        for (name, help, value) in counters {
            Self::push_metric(&mut output, name, help, "counter", &labels, &value.to_string());
        }

        output
    }

    fn push_metric(output: &mut String, name: &str, help: &str, kind: &str, labels: &str, value: &str) {
        output.push_str(&format!("# HELP {name} {help}\n"));
        output.push_str(&format!("# TYPE {name} {kind}\n"));
        output.push_str(&format!("{name}{{{labels}}} {value}\n"));
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            let mut sorted: Vec<_> = tags.iter().collect();
            sorted.sort();
            for (key, value) in sorted {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    total_borrowed: AtomicUsize,
    total_returned: AtomicUsize,
    instances_created: AtomicUsize,
    creation_failures: AtomicUsize,
    instances_evicted: AtomicUsize,
    destroy_failures: AtomicUsize,
    borrow_timeouts: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_borrowed(&self) {
        self.total_borrowed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_returned(&self) {
        self.total_returned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_created(&self) {
        self.instances_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_creation_failure(&self) {
        self.creation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evicted(&self) {
        self.instances_evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_destroy_failure(&self) {
        self.destroy_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.borrow_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, on_loan: usize, available: usize, capacity: usize) -> PoolMetrics {
        let utilization = if capacity > 0 {
            on_loan as f64 / capacity as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_borrowed: self.total_borrowed.load(Ordering::Relaxed),
            total_returned: self.total_returned.load(Ordering::Relaxed),
            instances_created: self.instances_created.load(Ordering::Relaxed),
            creation_failures: self.creation_failures.load(Ordering::Relaxed),
            instances_evicted: self.instances_evicted.load(Ordering::Relaxed),
            destroy_failures: self.destroy_failures.load(Ordering::Relaxed),
            borrow_timeouts: self.borrow_timeouts.load(Ordering::Relaxed),
            on_loan_instances: on_loan,
            available_instances: available,
            utilization,
            max_capacity: capacity,
        }
    }
}
