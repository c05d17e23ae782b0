//! Health monitoring for object pools

/// Health status of an object pool
///
/// # Examples
///
/// ```
/// use elastic_pool::HealthStatus;
///
/// let health = HealthStatus::new(3, 1, 10, 2);
/// assert!(health.is_healthy());
/// assert_eq!(health.available_instances, 3);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Share of the ceiling currently on loan (0.0 to 1.0)
    pub utilization: f64,

    /// Available instances count
    pub available_instances: usize,

    /// On-loan instances count
    pub on_loan_instances: usize,

    /// Configured ceiling
    pub max_pool_size: usize,

    /// Configured floor
    pub min_pool_size: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Create a new health status
    pub fn new(available: usize, on_loan: usize, max_pool_size: usize, min_pool_size: usize) -> Self {
        let utilization = if max_pool_size > 0 {
            on_loan as f64 / max_pool_size as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
            is_healthy = false;
        }

        if available == 0 && max_pool_size > 0 {
            warnings.push("Pool is empty".to_string());
        }

        if available + on_loan < min_pool_size {
            warnings.push(format!(
                "Pool holds {} instances, below the minimum of {}",
                available + on_loan,
                min_pool_size
            ));
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization,
            available_instances: available,
            on_loan_instances: on_loan,
            max_pool_size,
            min_pool_size,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}
