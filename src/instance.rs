//! Pooled instance record

use std::time::{Duration, Instant};

/// Identifier assigned to every instance the pool creates
pub type InstanceId = u64;

/// One pooled value and the moment it was created
#[derive(Debug)]
pub(crate) struct Instance<T> {
    id: InstanceId,
    value: T,
    created_at: Instant,
}

impl<T> Instance<T> {
    pub fn new(id: InstanceId, value: T) -> Self {
        Self::with_created_at(id, value, Instant::now())
    }

    pub fn with_created_at(id: InstanceId, value: T, created_at: Instant) -> Self {
        Self {
            id,
            value,
            created_at,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Age relative to `now`; zero if `now` predates creation
    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_is_measured_from_creation() {
        let created = Instant::now();
        let instance = Instance::with_created_at(7, "conn", created);

        assert_eq!(instance.id(), 7);
        assert_eq!(instance.age_at(created + Duration::from_secs(3)), Duration::from_secs(3));
        assert_eq!(instance.into_value(), "conn");
    }

    #[test]
    fn test_age_never_negative() {
        let now = Instant::now();
        let instance = Instance::with_created_at(1, (), now + Duration::from_secs(5));
        assert_eq!(instance.age_at(now), Duration::ZERO);
    }
}
